use crate::catalog::MetricCatalog;
use crate::config_bridge::{block_config_for, catalog_for, merged_catalog_for};
use crate::custom::CustomStepName;
use crate::engine::{AggregateRequest, AggregationEngine};
use crate::error::{ConfigurationError, EngineError, EngineResult};
use crate::grain::{EntityKind, Granularity, TimeGrain};
use crate::issues::DataQualityIssue;
use crate::report::Report;
use metricbase_config::ConfigStore;
use metricbase_table::{Table, Value};
use std::collections::{BTreeMap, BTreeSet};

/// How the blocks of a batch map onto aggregation units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BatchMode {
    /// One unit per `(block, entity)`; results are stacked and tagged with the block column.
    #[default]
    PerBlock,
    /// Catalog-style configs of all blocks are merged into one catalog per entity and computed in
    /// a single pass, giving one wide row per key. Blocks with a block-style config for the
    /// granularity still run as their own units.
    MergedCatalogs,
}

/// Runs many `(block, entity)` aggregations over one input table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchRequest {
    /// Blocks to run. `None` runs every block in the store, sorted by name.
    pub blocks: Option<Vec<String>>,
    pub mode: BatchMode,
    pub entities: Vec<EntityKind>,
    pub grain: TimeGrain,
    pub period_start: Value,
    pub period_end: Value,
    pub selected_metrics: Option<Vec<String>>,
    pub entity_filter: Option<BTreeSet<Value>>,
    pub with_report: bool,
}

impl BatchRequest {
    pub fn new(
        entity: EntityKind,
        grain: TimeGrain,
        period_start: impl Into<Value>,
        period_end: impl Into<Value>,
    ) -> Self {
        Self {
            blocks: None,
            mode: BatchMode::PerBlock,
            entities: vec![entity],
            grain,
            period_start: period_start.into(),
            period_end: period_end.into(),
            selected_metrics: None,
            entity_filter: None,
            with_report: false,
        }
    }

    pub fn only_blocks<I, S>(mut self, blocks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.blocks = Some(blocks.into_iter().map(Into::into).collect());
        self
    }

    pub fn entities(mut self, entities: impl IntoIterator<Item = EntityKind>) -> Self {
        self.entities = entities.into_iter().collect();
        self
    }

    pub fn select_metrics<I, S>(mut self, metrics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selected_metrics = Some(metrics.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_report(mut self, with_report: bool) -> Self {
        self.with_report = with_report;
        self
    }

    pub fn mode(mut self, mode: BatchMode) -> Self {
        self.mode = mode;
        self
    }

    fn unit_request(&self, block: Option<&str>, granularity: Granularity) -> AggregateRequest {
        AggregateRequest {
            granularity,
            period_start: self.period_start.clone(),
            period_end: self.period_end.clone(),
            selected_metrics: self.selected_metrics.clone(),
            entity_filter: self.entity_filter.clone(),
            block: block.map(str::to_string),
            with_report: self.with_report,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BatchOutput {
    /// Union of every unit's result, tagged with the block column.
    pub table: Table,
    /// Reports keyed by unit name: `{block}__{entity}__{grain}`, or `{entity}__{grain}` for a
    /// merged unit.
    pub reports: BTreeMap<String, Report>,
    pub issues: Vec<(String, DataQualityIssue)>,
    /// Units that ran, in order.
    pub units: Vec<String>,
}

pub struct BatchRunner<'a> {
    engine: &'a AggregationEngine,
}

impl<'a> BatchRunner<'a> {
    pub fn new(engine: &'a AggregationEngine) -> Self {
        Self { engine }
    }

    /// Aggregate every requested `(block, entity)` pair that has a configuration.
    ///
    /// Pairs without a configuration are skipped. The first fatal error aborts the batch.
    pub fn run(
        &self,
        input: &Table,
        store: &ConfigStore,
        request: &BatchRequest,
    ) -> EngineResult<BatchOutput> {
        let blocks: Vec<String> = match &request.blocks {
            Some(blocks) => blocks.clone(),
            None => store.blocks().into_iter().map(str::to_string).collect(),
        };

        let mut units = Units::default();
        match request.mode {
            BatchMode::PerBlock => {
                for block in &blocks {
                    for &entity in &request.entities {
                        let granularity = Granularity::new(entity, request.grain);
                        self.run_block(input, store, block, granularity, request, &mut units)?;
                    }
                }
            }
            BatchMode::MergedCatalogs => {
                for &entity in &request.entities {
                    let granularity = Granularity::new(entity, request.grain);
                    let (separate, mergeable): (Vec<&String>, Vec<&String>) = blocks
                        .iter()
                        .partition(|block| block_config_for(store, block, granularity).is_some());

                    for block in separate {
                        self.run_block(input, store, block, granularity, request, &mut units)?;
                    }

                    let unit_request = request.unit_request(None, granularity);
                    let mergeable = mergeable.into_iter().map(String::as_str);
                    let catalog = merged_catalog_for(store, mergeable, entity)
                        .map_err(|e| EngineError::configuration(&unit_request.scope(), e))?;
                    self.run_unit(input, catalog, None, &unit_request, &mut units)?;
                }
            }
        }

        Ok(BatchOutput {
            table: Table::concat("batch", &units.tables),
            reports: units.reports,
            issues: units.issues,
            units: units.names,
        })
    }

    fn run_block(
        &self,
        input: &Table,
        store: &ConfigStore,
        block: &str,
        granularity: Granularity,
        request: &BatchRequest,
        units: &mut Units,
    ) -> EngineResult<()> {
        let unit_request = request.unit_request(Some(block), granularity);
        let catalog = catalog_for(store, block, granularity)
            .map_err(|e| EngineError::configuration(&unit_request.scope(), e))?;
        self.run_unit(input, catalog, Some(block), &unit_request, units)
    }

    /// Run one unit, tagging its rows with `block` when the unit belongs to a single block.
    fn run_unit(
        &self,
        input: &Table,
        catalog: Option<MetricCatalog>,
        block: Option<&str>,
        unit_request: &AggregateRequest,
        units: &mut Units,
    ) -> EngineResult<()> {
        let granularity = unit_request.granularity;
        let unit = match block {
            Some(block) => CustomStepName::new(block, granularity).to_string(),
            None => format!("{}__{}", granularity.entity, granularity.grain),
        };
        let Some(catalog) = catalog else {
            log::debug!("no configuration for {unit}; skipping");
            return Ok(());
        };

        let block_column = &self.engine.settings().block_column;
        let clash = || {
            EngineError::configuration(
                &unit_request.scope(),
                ConfigurationError::BlockColumnClash {
                    column: block_column.clone(),
                },
            )
        };
        if block.is_some() && catalog.contains(block_column) {
            return Err(clash());
        }

        log::info!("aggregating {unit} ({} metric(s))", catalog.len());
        let result = self
            .engine
            .aggregate_detailed(input, &catalog, unit_request)?;

        let table = match block {
            Some(block) => {
                if result.table.has_column(block_column) {
                    return Err(clash());
                }
                result
                    .table
                    .with_constant_column(block_column.clone(), Value::from(block))?
            }
            None => result.table,
        };
        units.tables.push(table);
        if let Some(report) = result.report {
            units.reports.insert(unit.clone(), report);
        }
        units
            .issues
            .extend(result.issues.into_iter().map(|issue| (unit.clone(), issue)));
        units.names.push(unit);
        Ok(())
    }
}

#[derive(Default)]
struct Units {
    tables: Vec<Table>,
    reports: BTreeMap<String, Report>,
    issues: Vec<(String, DataQualityIssue)>,
    names: Vec<String>,
}
