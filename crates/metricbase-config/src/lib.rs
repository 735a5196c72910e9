//! Configuration schema and loading for metricbase.
//!
//! Nothing here performs implicit filesystem lookups: settings and stores are built from
//! explicit strings or paths and handed to the engine by the caller.

#![forbid(unsafe_code)]

mod error;
mod schema;
mod settings;
mod store;

pub use crate::error::{ConfigError, ConfigResult};
pub use crate::schema::{BlockConfig, BlockMetric, CatalogConfig, CatalogMetric, Params};
pub use crate::settings::{ColumnNames, EngineSettings, MissingKeyPolicy, UnknownMetricPolicy};
pub use crate::store::ConfigStore;
