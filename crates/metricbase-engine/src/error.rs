use crate::catalog::CatalogError;
use crate::custom::{BoxError, CustomStepName};
use crate::source::SourceError;
use metricbase_config::ConfigError;
use metricbase_table::{TableError, Value};
use std::fmt;

pub type EngineResult<T> = Result<T, EngineError>;

/// Identifies the aggregation unit an error belongs to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AggregationScope {
    pub block: Option<String>,
    pub entity: String,
    pub grain: String,
    pub period_start: Value,
    pub period_end: Value,
}

impl fmt::Display for AggregationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "block={} entity={} grain={} periods={}..={}",
            self.block.as_deref().unwrap_or("-"),
            self.entity,
            self.grain,
            self.period_start,
            self.period_end
        )
    }
}

/// Fatal configuration problems. Raised before any row is processed where possible.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("unsupported granularity: entity `{entity}` with grain `{grain}`")]
    UnsupportedGranularity { entity: String, grain: String },

    #[error("no grouping key resolved")]
    NoGroupingKey,

    #[error("group column `{column}` is missing from the input table")]
    MissingGroupColumn { column: String },

    #[error("period column `{column}` is missing from the input table")]
    MissingPeriodColumn { column: String },

    #[error("unknown metric `{name}` requested")]
    UnknownMetric { name: String },

    #[error("metric `{metric}` collides with a group key column")]
    MetricShadowsKey { metric: String },

    #[error("invalid period range {start}..={end}")]
    InvalidPeriodRange { start: Value, end: Value },

    #[error("result column `{column}` collides with the batch block column")]
    BlockColumnClash { column: String },
}

/// A declared custom step could not be honoured.
#[derive(Debug, thiserror::Error)]
pub enum ExtensionContractError {
    #[error("custom step `{name}` is declared but not registered")]
    CustomStepNotFound { name: CustomStepName },

    #[error("custom step `{name}` failed: {source}")]
    CustomStepFailed {
        name: CustomStepName,
        #[source]
        source: BoxError,
    },

    #[error("custom step `{name}` broke the result contract: {reason}")]
    CustomStepContractViolation { name: CustomStepName, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("configuration error [{scope}]: {source}")]
    Configuration {
        scope: Box<AggregationScope>,
        #[source]
        source: ConfigurationError,
    },

    #[error("extension contract error [{scope}]: {source}")]
    ExtensionContract {
        scope: Box<AggregationScope>,
        #[source]
        source: ExtensionContractError,
    },

    #[error(transparent)]
    Table(#[from] TableError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Source(#[from] SourceError),
}

impl EngineError {
    pub fn configuration(scope: &AggregationScope, source: impl Into<ConfigurationError>) -> Self {
        EngineError::Configuration {
            scope: Box::new(scope.clone()),
            source: source.into(),
        }
    }

    pub fn extension_contract(scope: &AggregationScope, source: ExtensionContractError) -> Self {
        EngineError::ExtensionContract {
            scope: Box::new(scope.clone()),
            source,
        }
    }

    pub fn scope(&self) -> Option<&AggregationScope> {
        match self {
            EngineError::Configuration { scope, .. } | EngineError::ExtensionContract { scope, .. } => {
                Some(scope)
            }
            _ => None,
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, EngineError::Configuration { .. })
    }

    pub fn is_extension_contract(&self) -> bool {
        matches!(self, EngineError::ExtensionContract { .. })
    }
}
