//! Turns on-disk configuration shapes into [`MetricCatalog`]s.

use crate::catalog::{CatalogResult, MetricCatalog, MetricDefinition, Treatment, TreatmentKind};
use crate::grain::{EntityKind, Granularity};
use metricbase_config::{BlockConfig, CatalogConfig, ConfigStore, Params};
use std::borrow::Cow;

/// Build the catalog of one block-style configuration.
pub fn catalog_from_block_config(block: &str, config: &BlockConfig) -> CatalogResult<MetricCatalog> {
    let mut catalog = MetricCatalog::new();
    for metric in &config.metrics {
        let treatment =
            Treatment::from_parts(&metric.name, &metric.treatment, &metric.params, Some(block))?;
        catalog.insert(MetricDefinition::new(metric.name.clone(), treatment).in_block(block))?;
    }
    if let Some(keys) = &config.keys {
        catalog.set_explicit_keys(keys.clone());
    }
    if config.declares_custom_step() {
        catalog.declare_custom_step(block);
    }
    Ok(catalog)
}

/// Build the catalog of one catalog-style configuration.
///
/// In this shape a `sum` or `distinct_count` without a `field` parameter reads the column named
/// after the metric itself.
pub fn catalog_from_catalog_config(
    block: &str,
    config: &CatalogConfig,
) -> CatalogResult<MetricCatalog> {
    let mut catalog = MetricCatalog::new();
    for (name, metric) in &config.metrics {
        let params = params_with_default_field(name, &metric.treatment, &metric.params);
        let treatment = Treatment::from_parts(name, &metric.treatment, &params, Some(block))?;
        catalog.insert(MetricDefinition::new(name.clone(), treatment).in_block(block))?;
    }
    if config.declares_custom_step() {
        catalog.declare_custom_step(block);
    }
    Ok(catalog)
}

fn params_with_default_field<'p>(name: &str, treatment: &str, params: &'p Params) -> Cow<'p, Params> {
    let defaults_to_name = matches!(
        TreatmentKind::parse(treatment),
        Some(TreatmentKind::Sum | TreatmentKind::DistinctCount)
    );
    let has_field = ["field", "campo"]
        .iter()
        .any(|key| params.get(*key).is_some_and(|v| !v.trim().is_empty()));
    if !defaults_to_name || has_field {
        return Cow::Borrowed(params);
    }
    let mut params = params.clone();
    params.insert("field".to_string(), name.to_string());
    Cow::Owned(params)
}

/// Merge several catalog-style configurations, rejecting metric names defined twice.
pub fn catalog_from_catalog_configs<'a>(
    configs: impl IntoIterator<Item = (&'a str, &'a CatalogConfig)>,
) -> CatalogResult<MetricCatalog> {
    let mut merged = MetricCatalog::new();
    for (block, config) in configs {
        merged.merge(catalog_from_catalog_config(block, config)?)?;
    }
    Ok(merged)
}

/// Find the catalog of `block` for `granularity` in `store`.
///
/// A block-style config for the exact granularity wins over a catalog-style config for the
/// entity. Every accepted spelling of the entity and grain is tried. Returns `Ok(None)` when the
/// store has neither.
pub fn catalog_for(
    store: &ConfigStore,
    block: &str,
    granularity: Granularity,
) -> CatalogResult<Option<MetricCatalog>> {
    if let Some(config) = block_config_for(store, block, granularity) {
        return catalog_from_block_config(block, config).map(Some);
    }
    match catalog_config_for(store, block, granularity.entity) {
        Some(config) => catalog_from_catalog_config(block, config).map(Some),
        None => Ok(None),
    }
}

/// Merge the catalog-style configs of `blocks` for `entity` into a single catalog.
///
/// Blocks with no catalog-style config for the entity are skipped. A metric name defined by two
/// blocks is rejected. Returns `Ok(None)` when none of the blocks has a config.
pub fn merged_catalog_for<'a>(
    store: &'a ConfigStore,
    blocks: impl IntoIterator<Item = &'a str>,
    entity: EntityKind,
) -> CatalogResult<Option<MetricCatalog>> {
    let configs: Vec<(&str, &CatalogConfig)> = blocks
        .into_iter()
        .filter_map(|block| catalog_config_for(store, block, entity).map(|c| (block, c)))
        .collect();
    if configs.is_empty() {
        return Ok(None);
    }
    catalog_from_catalog_configs(configs).map(Some)
}

/// The block-style config of `block` for `granularity`, under any accepted spelling.
pub fn block_config_for<'s>(
    store: &'s ConfigStore,
    block: &str,
    granularity: Granularity,
) -> Option<&'s BlockConfig> {
    granularity.entity.aliases().iter().find_map(|entity| {
        granularity
            .grain
            .aliases()
            .iter()
            .find_map(|grain| store.block_config(block, entity, grain))
    })
}

fn catalog_config_for<'s>(
    store: &'s ConfigStore,
    block: &str,
    entity: EntityKind,
) -> Option<&'s CatalogConfig> {
    entity
        .aliases()
        .iter()
        .find_map(|alias| store.catalog_config(block, alias))
}
