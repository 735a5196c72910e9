use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Names of the well-known columns of an input table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    pub period: String,
    pub team: String,
    pub release_train: String,
    pub community: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            period: "period".to_string(),
            team: "team".to_string(),
            release_train: "release_train".to_string(),
            community: "community".to_string(),
        }
    }
}

/// What to do when a resolved group key is not a column of the input table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingKeyPolicy {
    /// Fail the aggregation with a `MissingGroupColumn` configuration error.
    #[default]
    Fail,
    /// Treat the column as present and entirely null.
    FillNull,
}

/// What to do when `selected_metrics` names a metric the catalog does not define.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownMetricPolicy {
    /// Skip unknown names so callers can explore the catalog incrementally.
    #[default]
    Ignore,
    /// Fail with an `UnknownMetric` configuration error.
    Reject,
}

/// Engine-wide settings, passed explicitly to the engine constructor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub columns: ColumnNames,
    pub missing_key_policy: MissingKeyPolicy,
    pub unknown_metric_policy: UnknownMetricPolicy,
    /// Column the batch runner uses to tag each row with its block name.
    pub block_column: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            columns: ColumnNames::default(),
            missing_key_policy: MissingKeyPolicy::default(),
            unknown_metric_policy: UnknownMetricPolicy::default(),
            block_column: "block".to_string(),
        }
    }
}

impl EngineSettings {
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        serde_json::from_str(json).map_err(|source| ConfigError::Json {
            path: None,
            source,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Json {
            path: Some(path.to_path_buf()),
            source,
        })
    }
}
