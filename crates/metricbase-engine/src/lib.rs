//! Configuration-driven metric aggregation.
//!
//! Given a raw table, a [`MetricCatalog`] and an [`AggregateRequest`], the
//! [`AggregationEngine`] groups rows by the keys of the requested [`Granularity`], applies each
//! metric's [`Treatment`] in a single pass and returns one row per key tuple. Registered
//! [`CustomStep`]s may extend the result afterwards.
//!
//! Catalogs are usually built from `metricbase-config` shapes through [`config_bridge`], and a
//! [`BatchRunner`] drives many blocks and entities over one input.

#![forbid(unsafe_code)]

mod batch;
mod catalog;
pub mod config_bridge;
mod custom;
mod engine;
mod error;
mod grain;
mod issues;
mod report;
mod source;
mod treatment;

pub use crate::batch::{BatchMode, BatchOutput, BatchRequest, BatchRunner};
pub use crate::catalog::{
    CatalogError, CatalogResult, MetricCatalog, MetricDefinition, Treatment, TreatmentKind,
};
pub use crate::custom::{BoxError, CustomStep, CustomStepName, CustomStepRegistry};
pub use crate::engine::{AggregateRequest, AggregationEngine, AggregationOutput};
pub use crate::error::{
    AggregationScope, ConfigurationError, EngineError, EngineResult, ExtensionContractError,
};
pub use crate::grain::{
    EntityKind, Granularity, GroupKeyResolver, GroupKeySet, KeySource, ResolvedKeys, TimeGrain,
};
pub use crate::issues::DataQualityIssue;
pub use crate::report::{Report, ReportAxes, ReportGenerator};
pub use crate::source::{filter_period_range, CsvDirectorySource, SourceError, TableSource};
pub use crate::treatment::{
    ratio, AggregationPlan, MetricSlot, PlannedMetric, Reducer, ReducerKind, TreatmentDispatcher,
};

pub use metricbase_config::{ColumnNames, EngineSettings, MissingKeyPolicy, UnknownMetricPolicy};
pub use metricbase_table::{Table, Value};
