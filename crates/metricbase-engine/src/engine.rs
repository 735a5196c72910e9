use crate::catalog::MetricCatalog;
use crate::custom::{CustomStep, CustomStepName, CustomStepRegistry};
use crate::error::{
    AggregationScope, ConfigurationError, EngineError, EngineResult, ExtensionContractError,
};
use crate::grain::{GroupKeyResolver, Granularity, KeySource};
use crate::issues::{DataQualityIssue, IssueLog};
use crate::report::{Report, ReportAxes, ReportGenerator};
use crate::source::{in_period_range, TableSource};
use crate::treatment::{ratio, Accumulator, AggregationPlan, MetricSlot, TreatmentDispatcher};
use metricbase_config::{EngineSettings, UnknownMetricPolicy};
use metricbase_table::{Table, Value};
use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

/// One aggregation call: which granularity, which periods and which metrics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AggregateRequest {
    pub granularity: Granularity,
    pub period_start: Value,
    pub period_end: Value,
    /// Restrict the catalog to these metrics. `None` computes every metric.
    pub selected_metrics: Option<Vec<String>>,
    /// Keep only rows whose entity identity is in this set.
    pub entity_filter: Option<BTreeSet<Value>>,
    /// Block the catalog came from, for diagnostics.
    pub block: Option<String>,
    pub with_report: bool,
}

impl AggregateRequest {
    pub fn new(
        granularity: Granularity,
        period_start: impl Into<Value>,
        period_end: impl Into<Value>,
    ) -> Self {
        Self {
            granularity,
            period_start: period_start.into(),
            period_end: period_end.into(),
            selected_metrics: None,
            entity_filter: None,
            block: None,
            with_report: false,
        }
    }

    pub fn select_metrics<I, S>(mut self, metrics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selected_metrics = Some(metrics.into_iter().map(Into::into).collect());
        self
    }

    pub fn only_entities<I, V>(mut self, entities: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.entity_filter = Some(entities.into_iter().map(Into::into).collect());
        self
    }

    pub fn for_block(mut self, block: impl Into<String>) -> Self {
        self.block = Some(block.into());
        self
    }

    pub fn with_report(mut self, with_report: bool) -> Self {
        self.with_report = with_report;
        self
    }

    pub fn scope(&self) -> AggregationScope {
        AggregationScope {
            block: self.block.clone(),
            entity: self.granularity.entity.as_str().to_string(),
            grain: self.granularity.grain.as_str().to_string(),
            period_start: self.period_start.clone(),
            period_end: self.period_end.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AggregationOutput {
    pub table: Table,
    pub report: Option<Report>,
    pub issues: Vec<DataQualityIssue>,
}

/// Groups raw rows by the keys of a granularity and computes every metric of a catalog.
///
/// The engine holds no per-call state; it can be shared across threads and reused for any
/// number of calls.
#[derive(Clone, Debug, Default)]
pub struct AggregationEngine {
    settings: EngineSettings,
    custom_steps: CustomStepRegistry,
}

impl AggregationEngine {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            settings,
            custom_steps: CustomStepRegistry::new(),
        }
    }

    pub fn with_custom_steps(mut self, custom_steps: CustomStepRegistry) -> Self {
        self.custom_steps = custom_steps;
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn custom_steps(&self) -> &CustomStepRegistry {
        &self.custom_steps
    }

    pub fn aggregate(
        &self,
        input: &Table,
        catalog: &MetricCatalog,
        request: &AggregateRequest,
    ) -> EngineResult<Table> {
        Ok(self.aggregate_detailed(input, catalog, request)?.table)
    }

    /// Read `table` from `source` and aggregate it.
    pub fn aggregate_from_source(
        &self,
        source: &dyn TableSource,
        table: &str,
        catalog: &MetricCatalog,
        request: &AggregateRequest,
    ) -> EngineResult<AggregationOutput> {
        let input = source.read_table(
            table,
            &self.settings.columns.period,
            &request.period_start,
            &request.period_end,
        )?;
        self.aggregate_detailed(&input, catalog, request)
    }

    pub fn aggregate_detailed(
        &self,
        input: &Table,
        catalog: &MetricCatalog,
        request: &AggregateRequest,
    ) -> EngineResult<AggregationOutput> {
        let scope = request.scope();
        let config_err = |e: ConfigurationError| EngineError::configuration(&scope, e);
        let columns = &self.settings.columns;
        let granularity = request.granularity;

        match request.period_start.cmp_period(&request.period_end) {
            Some(Ordering::Less | Ordering::Equal) => {}
            _ => {
                return Err(config_err(ConfigurationError::InvalidPeriodRange {
                    start: request.period_start.clone(),
                    end: request.period_end.clone(),
                }))
            }
        }
        let period_idx = input.column_idx(&columns.period).ok_or_else(|| {
            config_err(ConfigurationError::MissingPeriodColumn {
                column: columns.period.clone(),
            })
        })?;

        let catalog = self
            .restrict_catalog(catalog, request.selected_metrics.as_deref())
            .map_err(config_err)?;

        let key_source = catalog
            .explicit_keys()
            .map(KeySource::Explicit)
            .unwrap_or(KeySource::Granularity);
        let resolved = GroupKeyResolver::new(columns, self.settings.missing_key_policy)
            .resolve(granularity, key_source, input.columns())
            .map_err(config_err)?;
        let keys = resolved.keys;
        if let Some(definition) = catalog.iter().find(|d| keys.contains(&d.name)) {
            return Err(config_err(ConfigurationError::MetricShadowsKey {
                metric: definition.name.clone(),
            }));
        }

        let steps = self.resolve_custom_steps(&catalog, granularity, &scope)?;

        let mut issues = IssueLog::new(scope.to_string());

        // Row filtering: period range, then identity, then the optional entity filter.
        let mut null_periods = 0usize;
        let mut raw = input.filter_rows(|row| {
            let period = &row[period_idx];
            if period.is_null() {
                null_periods += 1;
                return false;
            }
            in_period_range(period, &request.period_start, &request.period_end)
        });
        if null_periods > 0 {
            issues.record(DataQualityIssue::RowsWithoutPeriod {
                dropped: null_periods,
            });
        }

        let identity_column = granularity.entity.identity_column(columns);
        let identity_idx = raw.column_idx(identity_column);
        if let Some(idx) = identity_idx.filter(|_| keys.contains(identity_column)) {
            let before = raw.row_count();
            raw = raw.filter_rows(|row| !row[idx].is_null());
            let dropped = before - raw.row_count();
            if dropped > 0 {
                issues.record(DataQualityIssue::RowsWithoutIdentity {
                    column: identity_column.to_string(),
                    dropped,
                });
            }
        }
        if let Some(allowed) = &request.entity_filter {
            raw = raw.filter_rows(|row| match identity_idx {
                Some(idx) => allowed.contains(&row[idx]),
                None => false,
            });
        }

        for column in &resolved.missing {
            issues.record(DataQualityIssue::MissingKeyColumn {
                column: column.clone(),
            });
            raw.add_column(column.clone(), vec![Value::Null; raw.row_count()])?;
        }

        let plan = TreatmentDispatcher::aggregate_spec(&*catalog);
        log::debug!(
            "[{scope}] {} metric(s) over {} reducer(s), {} deferred ratio(s), keys {:?}",
            plan.metrics.len(),
            plan.reducers.len(),
            plan.deferred_ratios().count(),
            keys.as_slice()
        );

        let mut result = grouped_pass(&raw, keys.as_slice(), &plan, &mut issues)?;

        for (name, step) in steps {
            result = apply_custom_step(&name, step.as_ref(), &result, &raw, keys.as_slice())
                .map_err(|e| EngineError::extension_contract(&scope, e))?;
        }

        let table = project(&result, keys.as_slice(), catalog.names())?;

        let report = request.with_report.then(|| {
            let axes = ReportAxes {
                id_column: Some(identity_column.to_string()),
                period_column: Some(columns.period.clone()),
            };
            ReportGenerator::summarize_with_axes(&table, keys.as_slice(), &axes)
        });

        Ok(AggregationOutput {
            table,
            report,
            issues: issues.into_vec(),
        })
    }

    fn restrict_catalog<'c>(
        &self,
        catalog: &'c MetricCatalog,
        selected: Option<&[String]>,
    ) -> Result<Cow<'c, MetricCatalog>, ConfigurationError> {
        let Some(selected) = selected else {
            return Ok(Cow::Borrowed(catalog));
        };
        let (restricted, unknown) = catalog.restrict(selected);
        if let Some(name) = unknown.first() {
            match self.settings.unknown_metric_policy {
                UnknownMetricPolicy::Reject => {
                    return Err(ConfigurationError::UnknownMetric { name: name.clone() })
                }
                UnknownMetricPolicy::Ignore => {
                    log::debug!("ignoring unknown selected metric(s) {unknown:?}");
                }
            }
        }
        Ok(Cow::Owned(restricted))
    }

    /// Look up every declared custom step before any row is processed.
    fn resolve_custom_steps(
        &self,
        catalog: &MetricCatalog,
        granularity: Granularity,
        scope: &AggregationScope,
    ) -> EngineResult<Vec<(CustomStepName, Arc<dyn CustomStep>)>> {
        catalog
            .custom_step_blocks()
            .iter()
            .map(|block| {
                let name = CustomStepName::new(block, granularity);
                match self.custom_steps.get(&name) {
                    Some(step) => Ok((name, Arc::clone(step))),
                    None => Err(EngineError::extension_contract(
                        scope,
                        ExtensionContractError::CustomStepNotFound { name },
                    )),
                }
            })
            .collect()
    }
}

/// Group `raw` by `keys` in a single scan and finish every planned metric.
///
/// Output columns are the keys followed by the metrics in plan order.
fn grouped_pass(
    raw: &Table,
    keys: &[String],
    plan: &AggregationPlan,
    issues: &mut IssueLog,
) -> EngineResult<Table> {
    let key_idxs = keys
        .iter()
        .map(|k| {
            raw.column_idx(k).ok_or_else(|| {
                EngineError::from(metricbase_table::TableError::UnknownColumn {
                    table: raw.name().to_string(),
                    column: k.clone(),
                })
            })
        })
        .collect::<EngineResult<Vec<_>>>()?;
    let reducer_idxs: Vec<Option<usize>> = plan
        .reducers
        .iter()
        .map(|r| raw.column_idx(&r.field))
        .collect();

    for metric in &plan.metrics {
        for idx in AggregationPlan::reducer_indices(metric.slot) {
            if reducer_idxs[idx].is_none() {
                issues.record(DataQualityIssue::MissingMetricField {
                    metric: metric.name.clone(),
                    field: plan.reducers[idx].field.clone(),
                });
            }
        }
    }

    let fresh = || -> Vec<Accumulator> {
        plan.reducers
            .iter()
            .map(|r| Accumulator::new(r.kind))
            .collect()
    };
    let mut group_index: HashMap<Vec<Value>, usize> = HashMap::new();
    let mut group_keys: Vec<Vec<Value>> = Vec::new();
    let mut accumulators: Vec<Vec<Accumulator>> = Vec::new();
    let mut non_numeric = vec![0usize; plan.reducers.len()];

    for row in raw.rows() {
        let key: Vec<Value> = key_idxs.iter().map(|&idx| row[idx].clone()).collect();
        let group = match group_index.entry(key) {
            Entry::Occupied(entry) => *entry.get(),
            Entry::Vacant(entry) => {
                let group = group_keys.len();
                group_keys.push(entry.key().clone());
                accumulators.push(fresh());
                *entry.insert(group)
            }
        };
        for (reducer, acc) in accumulators[group].iter_mut().enumerate() {
            if let Some(idx) = reducer_idxs[reducer] {
                if !acc.update(&row[idx]) {
                    non_numeric[reducer] += 1;
                }
            }
        }
    }
    log::debug!(
        "grouped {} row(s) into {} group(s)",
        raw.row_count(),
        group_keys.len()
    );

    let mut reported_fields: HashSet<&str> = HashSet::new();
    for (reducer, &count) in plan.reducers.iter().zip(&non_numeric) {
        if count > 0 && reported_fields.insert(reducer.field.as_str()) {
            issues.record(DataQualityIssue::NonNumericValues {
                field: reducer.field.clone(),
                count,
            });
        }
    }

    let finish = |accs: &[Accumulator], reducer: usize| -> Value {
        match reducer_idxs[reducer] {
            Some(_) => accs[reducer].finish(),
            None => Value::Null,
        }
    };
    let mut undefined = vec![0usize; plan.metrics.len()];
    let mut rows = Vec::with_capacity(group_keys.len());
    for (key, accs) in group_keys.into_iter().zip(&accumulators) {
        let mut row = key;
        row.reserve(plan.metrics.len());
        for (metric_idx, metric) in plan.metrics.iter().enumerate() {
            let value = match metric.slot {
                MetricSlot::Direct(reducer) => finish(accs, reducer),
                MetricSlot::Ratio {
                    numerator,
                    denominator,
                } => {
                    let value = ratio(&finish(accs, numerator), &finish(accs, denominator));
                    let fields_present =
                        reducer_idxs[numerator].is_some() && reducer_idxs[denominator].is_some();
                    if value.is_null() && fields_present {
                        undefined[metric_idx] += 1;
                    }
                    value
                }
            };
            row.push(value);
        }
        rows.push(row);
    }
    for (metric, groups) in plan.metrics.iter().zip(undefined) {
        if groups > 0 {
            issues.record(DataQualityIssue::UndefinedRatio {
                metric: metric.name.clone(),
                groups,
            });
        }
    }

    let columns: Vec<String> = keys
        .iter()
        .cloned()
        .chain(plan.metrics.iter().map(|m| m.name.clone()))
        .collect();
    Ok(Table::from_rows(raw.name(), columns, rows)?)
}

fn apply_custom_step(
    name: &CustomStepName,
    step: &dyn CustomStep,
    aggregated: &Table,
    raw: &Table,
    keys: &[String],
) -> Result<Table, ExtensionContractError> {
    let out = step
        .apply(aggregated, raw)
        .map_err(|source| ExtensionContractError::CustomStepFailed {
            name: name.clone(),
            source,
        })?;
    let violation = |reason: String| ExtensionContractError::CustomStepContractViolation {
        name: name.clone(),
        reason,
    };

    if let Some(key) = keys.iter().find(|k| !out.has_column(k)) {
        return Err(violation(format!("group column `{key}` was removed")));
    }
    match out.find_duplicate_key(keys) {
        Ok(None) => {}
        Ok(Some((first, second))) => {
            return Err(violation(format!(
                "rows {first} and {second} share the same group key"
            )))
        }
        Err(e) => return Err(violation(e.to_string())),
    }
    log::debug!(
        "custom step {name} produced {} row(s) and {} column(s)",
        out.row_count(),
        out.column_count()
    );
    Ok(out)
}

/// Reorder columns as keys, then catalog metrics, then any extra columns, and sort rows by key.
fn project<'a>(
    table: &'a Table,
    keys: &'a [String],
    metrics: impl Iterator<Item = &'a str>,
) -> EngineResult<Table> {
    let mut order: Vec<&'a str> = keys.iter().map(String::as_str).collect();
    order.extend(metrics.filter(|m| table.has_column(m)));
    let placed: HashSet<&str> = order.iter().copied().collect();
    let extras: Vec<&str> = table
        .columns()
        .iter()
        .map(String::as_str)
        .filter(|c| !placed.contains(c))
        .collect();
    order.extend(extras);

    let key_len = keys.len();
    Ok(table
        .select(&order)?
        .sorted_by(|a, b| a[..key_len].cmp(&b[..key_len])))
}
