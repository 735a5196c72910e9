use metricbase_config::Params;
use std::collections::{HashMap, HashSet};
use std::fmt;

pub type CatalogResult<T> = Result<T, CatalogError>;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("unknown treatment `{treatment}` for metric `{metric}` in {}", source_label(block))]
    UnknownTreatment {
        metric: String,
        treatment: String,
        block: Option<String>,
    },

    #[error(
        "metric `{metric}` ({treatment}) is missing required parameter `{parameter}` in {}",
        source_label(block)
    )]
    MissingParameter {
        metric: String,
        treatment: TreatmentKind,
        parameter: &'static str,
        block: Option<String>,
    },

    #[error(
        "duplicate metric `{metric}` defined in {} and {}",
        source_label(first_block),
        source_label(second_block)
    )]
    DuplicateMetric {
        metric: String,
        first_block: Option<String>,
        second_block: Option<String>,
    },

    #[error("conflicting group keys {first:?} and {second:?} in merged catalogs")]
    ConflictingKeys {
        first: Vec<String>,
        second: Vec<String>,
    },
}

fn source_label(block: &Option<String>) -> String {
    match block {
        Some(block) => format!("block `{block}`"),
        None => "an unnamed source".to_string(),
    }
}

/// The closed vocabulary of treatments, without parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TreatmentKind {
    Sum,
    AverageRatio,
    SimpleAverage,
    Percentage,
    DistinctCount,
}

impl TreatmentKind {
    pub const ALL: [TreatmentKind; 5] = [
        TreatmentKind::Sum,
        TreatmentKind::AverageRatio,
        TreatmentKind::SimpleAverage,
        TreatmentKind::Percentage,
        TreatmentKind::DistinctCount,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TreatmentKind::Sum => "sum",
            TreatmentKind::AverageRatio => "average_ratio",
            TreatmentKind::SimpleAverage => "simple_average",
            TreatmentKind::Percentage => "percentage",
            TreatmentKind::DistinctCount => "distinct_count",
        }
    }

    /// Parse a treatment name.
    ///
    /// Besides the canonical names this accepts the legacy configuration vocabulary
    /// (`soma`, `soma_campo`, `media`, `soma_divisao`, `media_ponderada`, `media_campo`,
    /// `percentual`, `contagem_distinta`).
    pub fn parse(name: &str) -> Option<Self> {
        let kind = match name.trim().to_ascii_lowercase().as_str() {
            "sum" | "soma" | "soma_campo" => TreatmentKind::Sum,
            "average_ratio" | "media" | "soma_divisao" | "media_ponderada" => {
                TreatmentKind::AverageRatio
            }
            "simple_average" | "media_campo" => TreatmentKind::SimpleAverage,
            "percentage" | "percentual" => TreatmentKind::Percentage,
            "distinct_count" | "contagem_distinta" => TreatmentKind::DistinctCount,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for TreatmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A treatment together with its typed parameters.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Treatment {
    Sum {
        field: String,
    },
    /// Ratio of the per-group sums of two fields.
    AverageRatio {
        numerator_field: String,
        denominator_field: String,
    },
    SimpleAverage {
        field: String,
    },
    /// Same arithmetic as [`Treatment::AverageRatio`]; a fully complete group reads `1.0`.
    Percentage {
        numerator_field: String,
        denominator_field: String,
    },
    DistinctCount {
        field: String,
    },
}

const FIELD_PARAMS: &[&str] = &["field", "campo"];
const NUMERATOR_PARAMS: &[&str] = &["numerator_field", "numerator", "nominador"];
const DENOMINATOR_PARAMS: &[&str] = &["denominator_field", "denominator", "denominador"];

impl Treatment {
    pub fn kind(&self) -> TreatmentKind {
        match self {
            Treatment::Sum { .. } => TreatmentKind::Sum,
            Treatment::AverageRatio { .. } => TreatmentKind::AverageRatio,
            Treatment::SimpleAverage { .. } => TreatmentKind::SimpleAverage,
            Treatment::Percentage { .. } => TreatmentKind::Percentage,
            Treatment::DistinctCount { .. } => TreatmentKind::DistinctCount,
        }
    }

    /// Every input column the treatment reads.
    pub fn fields(&self) -> Vec<&str> {
        match self {
            Treatment::Sum { field }
            | Treatment::SimpleAverage { field }
            | Treatment::DistinctCount { field } => vec![field.as_str()],
            Treatment::AverageRatio {
                numerator_field,
                denominator_field,
            }
            | Treatment::Percentage {
                numerator_field,
                denominator_field,
            } => vec![numerator_field.as_str(), denominator_field.as_str()],
        }
    }

    /// Build a treatment from its configured name and raw parameters.
    pub fn from_parts(
        metric: &str,
        treatment: &str,
        params: &Params,
        block: Option<&str>,
    ) -> CatalogResult<Self> {
        let kind = TreatmentKind::parse(treatment).ok_or_else(|| CatalogError::UnknownTreatment {
            metric: metric.to_string(),
            treatment: treatment.to_string(),
            block: block.map(str::to_string),
        })?;

        let param = |names: &'static [&'static str]| -> CatalogResult<String> {
            names
                .iter()
                .find_map(|name| params.get(*name))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| CatalogError::MissingParameter {
                    metric: metric.to_string(),
                    treatment: kind,
                    parameter: names[0],
                    block: block.map(str::to_string),
                })
        };

        Ok(match kind {
            TreatmentKind::Sum => Treatment::Sum {
                field: param(FIELD_PARAMS)?,
            },
            TreatmentKind::SimpleAverage => Treatment::SimpleAverage {
                field: param(FIELD_PARAMS)?,
            },
            TreatmentKind::DistinctCount => Treatment::DistinctCount {
                field: param(FIELD_PARAMS)?,
            },
            TreatmentKind::AverageRatio => Treatment::AverageRatio {
                numerator_field: param(NUMERATOR_PARAMS)?,
                denominator_field: param(DENOMINATOR_PARAMS)?,
            },
            TreatmentKind::Percentage => Treatment::Percentage {
                numerator_field: param(NUMERATOR_PARAMS)?,
                denominator_field: param(DENOMINATOR_PARAMS)?,
            },
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetricDefinition {
    pub name: String,
    pub treatment: Treatment,
    /// Block the definition was loaded from, for diagnostics.
    pub block: Option<String>,
}

impl MetricDefinition {
    pub fn new(name: impl Into<String>, treatment: Treatment) -> Self {
        Self {
            name: name.into(),
            treatment,
            block: None,
        }
    }

    pub fn in_block(mut self, block: impl Into<String>) -> Self {
        self.block = Some(block.into());
        self
    }

    pub fn sum(name: impl Into<String>, field: impl Into<String>) -> Self {
        Self::new(name, Treatment::Sum { field: field.into() })
    }

    pub fn simple_average(name: impl Into<String>, field: impl Into<String>) -> Self {
        Self::new(name, Treatment::SimpleAverage { field: field.into() })
    }

    pub fn distinct_count(name: impl Into<String>, field: impl Into<String>) -> Self {
        Self::new(name, Treatment::DistinctCount { field: field.into() })
    }

    pub fn average_ratio(
        name: impl Into<String>,
        numerator_field: impl Into<String>,
        denominator_field: impl Into<String>,
    ) -> Self {
        Self::new(
            name,
            Treatment::AverageRatio {
                numerator_field: numerator_field.into(),
                denominator_field: denominator_field.into(),
            },
        )
    }

    pub fn percentage(
        name: impl Into<String>,
        numerator_field: impl Into<String>,
        denominator_field: impl Into<String>,
    ) -> Self {
        Self::new(
            name,
            Treatment::Percentage {
                numerator_field: numerator_field.into(),
                denominator_field: denominator_field.into(),
            },
        )
    }
}

/// An insertion-ordered set of metric definitions with unique names.
///
/// Besides the definitions, a catalog records which blocks declared a custom step and, for
/// block-style configuration, an explicit list of group keys.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MetricCatalog {
    definitions: Vec<MetricDefinition>,
    index: HashMap<String, usize>,
    custom_step_blocks: Vec<String>,
    explicit_keys: Option<Vec<String>>,
}

impl MetricCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from definitions, rejecting duplicate names.
    pub fn from_definitions(
        definitions: impl IntoIterator<Item = MetricDefinition>,
    ) -> CatalogResult<Self> {
        let mut catalog = Self::new();
        for definition in definitions {
            catalog.insert(definition)?;
        }
        Ok(catalog)
    }

    pub fn insert(&mut self, definition: MetricDefinition) -> CatalogResult<()> {
        if let Some(&existing) = self.index.get(&definition.name) {
            return Err(CatalogError::DuplicateMetric {
                metric: definition.name,
                first_block: self.definitions[existing].block.clone(),
                second_block: definition.block,
            });
        }
        self.index
            .insert(definition.name.clone(), self.definitions.len());
        self.definitions.push(definition);
        Ok(())
    }

    /// Append every definition of `other`. Duplicate names are rejected, never overridden.
    pub fn merge(&mut self, other: MetricCatalog) -> CatalogResult<()> {
        if let Some(second) = other.explicit_keys {
            if let Some(first) = &self.explicit_keys {
                if *first != second {
                    return Err(CatalogError::ConflictingKeys {
                        first: first.clone(),
                        second,
                    });
                }
            } else {
                self.explicit_keys = Some(second);
            }
        }
        for definition in other.definitions {
            self.insert(definition)?;
        }
        for block in other.custom_step_blocks {
            self.declare_custom_step(block);
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&MetricDefinition> {
        self.index.get(name).map(|&idx| &self.definitions[idx])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MetricDefinition> {
        self.definitions.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.definitions.iter().map(|d| d.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Record that `block` declares a post-aggregation custom step.
    pub fn declare_custom_step(&mut self, block: impl Into<String>) {
        let block = block.into();
        if !self.custom_step_blocks.contains(&block) {
            self.custom_step_blocks.push(block);
        }
    }

    pub fn custom_step_blocks(&self) -> &[String] {
        &self.custom_step_blocks
    }

    pub fn set_explicit_keys(&mut self, keys: Vec<String>) {
        self.explicit_keys = Some(keys);
    }

    pub fn explicit_keys(&self) -> Option<&[String]> {
        self.explicit_keys.as_deref()
    }

    /// Restrict the catalog to `selected`, keeping catalog order.
    ///
    /// Returns the restricted catalog and the requested names the catalog does not define.
    pub fn restrict<S: AsRef<str>>(&self, selected: &[S]) -> (MetricCatalog, Vec<String>) {
        let wanted: HashSet<&str> = selected.iter().map(|s| s.as_ref()).collect();
        let unknown = selected
            .iter()
            .filter_map(|s| {
                let name: &str = s.as_ref();
                (!self.contains(name)).then(|| name.to_string())
            })
            .collect();

        let mut restricted = MetricCatalog {
            custom_step_blocks: self.custom_step_blocks.clone(),
            explicit_keys: self.explicit_keys.clone(),
            ..MetricCatalog::default()
        };
        for definition in self.definitions.iter().filter(|d| wanted.contains(d.name.as_str())) {
            restricted
                .index
                .insert(definition.name.clone(), restricted.definitions.len());
            restricted.definitions.push(definition.clone());
        }
        (restricted, unknown)
    }
}

impl<'a> IntoIterator for &'a MetricCatalog {
    type Item = &'a MetricDefinition;
    type IntoIter = std::slice::Iter<'a, MetricDefinition>;

    fn into_iter(self) -> Self::IntoIter {
        self.definitions.iter()
    }
}
