use crate::grain::Granularity;
use metricbase_table::Table;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A post-aggregation transformation registered for one `(block, granularity)`.
///
/// Steps receive the aggregated table and the filtered raw input by shared reference and return
/// a new table. They may add columns or rows but must keep every group key column with unique
/// key tuples.
pub trait CustomStep: Send + Sync {
    fn apply(&self, aggregated: &Table, raw: &Table) -> Result<Table, BoxError>;
}

impl<F> CustomStep for F
where
    F: Fn(&Table, &Table) -> Result<Table, BoxError> + Send + Sync,
{
    fn apply(&self, aggregated: &Table, raw: &Table) -> Result<Table, BoxError> {
        self(aggregated, raw)
    }
}

/// Registry key of a custom step: `{block}__{entity}__{grain}`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CustomStepName(String);

impl CustomStepName {
    pub fn new(block: &str, granularity: Granularity) -> Self {
        Self(format!(
            "{block}__{}__{}",
            granularity.entity.as_str(),
            granularity.grain.as_str()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CustomStepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Default)]
pub struct CustomStepRegistry {
    steps: HashMap<CustomStepName, Arc<dyn CustomStep>>,
}

impl fmt::Debug for CustomStepRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomStepRegistry")
            .field("steps", &self.names())
            .finish()
    }
}

impl CustomStepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `step` under `name`, returning the step it replaced, if any.
    pub fn register(
        &mut self,
        name: CustomStepName,
        step: Arc<dyn CustomStep>,
    ) -> Option<Arc<dyn CustomStep>> {
        self.steps.insert(name, step)
    }

    pub fn register_fn<F>(&mut self, block: &str, granularity: Granularity, step: F)
    where
        F: Fn(&Table, &Table) -> Result<Table, BoxError> + Send + Sync + 'static,
    {
        self.register(CustomStepName::new(block, granularity), Arc::new(step));
    }

    pub fn get(&self, name: &CustomStepName) -> Option<&Arc<dyn CustomStep>> {
        self.steps.get(name)
    }

    pub fn contains(&self, name: &CustomStepName) -> bool {
        self.steps.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&CustomStepName> {
        let mut names: Vec<_> = self.steps.keys().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
