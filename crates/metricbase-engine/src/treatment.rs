use crate::catalog::{MetricDefinition, Treatment};
use metricbase_table::Value;
use std::collections::{HashMap, HashSet};

/// Single-pass reduction applied to one input column within a group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReducerKind {
    Sum,
    Mean,
    DistinctCount,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Reducer {
    pub field: String,
    pub kind: ReducerKind,
}

/// How a metric's value is read off the reducers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetricSlot {
    /// The finished value of one reducer.
    Direct(usize),
    /// A ratio of two `Sum` reducers, resolved after grouping.
    Ratio { numerator: usize, denominator: usize },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlannedMetric {
    pub name: String,
    pub slot: MetricSlot,
}

/// Output of [`TreatmentDispatcher::aggregate_spec`].
///
/// `reducers` holds each `(field, kind)` pair at most once, however many metrics need it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AggregationPlan {
    pub reducers: Vec<Reducer>,
    pub metrics: Vec<PlannedMetric>,
}

impl AggregationPlan {
    /// Metrics whose value is computed after grouping.
    pub fn deferred_ratios(&self) -> impl Iterator<Item = &PlannedMetric> + '_ {
        self.metrics
            .iter()
            .filter(|m| matches!(m.slot, MetricSlot::Ratio { .. }))
    }

    /// Indices of the reducers a metric reads.
    pub fn reducer_indices(slot: MetricSlot) -> Vec<usize> {
        match slot {
            MetricSlot::Direct(idx) => vec![idx],
            MetricSlot::Ratio {
                numerator,
                denominator,
            } => vec![numerator, denominator],
        }
    }
}

/// Maps treatments onto reducers.
pub struct TreatmentDispatcher;

impl TreatmentDispatcher {
    pub fn aggregate_spec<'a>(
        definitions: impl IntoIterator<Item = &'a MetricDefinition>,
    ) -> AggregationPlan {
        let mut plan = AggregationPlan::default();
        let mut index: HashMap<Reducer, usize> = HashMap::new();
        let mut reducer = |field: &str, kind: ReducerKind| -> usize {
            let key = Reducer {
                field: field.to_string(),
                kind,
            };
            *index.entry(key.clone()).or_insert_with(|| {
                plan.reducers.push(key);
                plan.reducers.len() - 1
            })
        };

        let mut metrics = Vec::new();
        for definition in definitions {
            let slot = match &definition.treatment {
                Treatment::Sum { field } => MetricSlot::Direct(reducer(field, ReducerKind::Sum)),
                Treatment::SimpleAverage { field } => {
                    MetricSlot::Direct(reducer(field, ReducerKind::Mean))
                }
                Treatment::DistinctCount { field } => {
                    MetricSlot::Direct(reducer(field, ReducerKind::DistinctCount))
                }
                Treatment::AverageRatio {
                    numerator_field,
                    denominator_field,
                }
                | Treatment::Percentage {
                    numerator_field,
                    denominator_field,
                } => MetricSlot::Ratio {
                    numerator: reducer(numerator_field, ReducerKind::Sum),
                    denominator: reducer(denominator_field, ReducerKind::Sum),
                },
            };
            metrics.push(PlannedMetric {
                name: definition.name.clone(),
                slot,
            });
        }
        plan.metrics = metrics;
        plan
    }
}

/// Running state of one reducer within one group.
#[derive(Clone, Debug)]
pub(crate) enum Accumulator {
    Sum { sum: f64, seen: bool },
    Mean { sum: f64, count: usize },
    Distinct(HashSet<Value>),
}

impl Accumulator {
    pub(crate) fn new(kind: ReducerKind) -> Self {
        match kind {
            ReducerKind::Sum => Accumulator::Sum {
                sum: 0.0,
                seen: false,
            },
            ReducerKind::Mean => Accumulator::Mean { sum: 0.0, count: 0 },
            ReducerKind::DistinctCount => Accumulator::Distinct(HashSet::new()),
        }
    }

    /// Fold one cell into the state.
    ///
    /// Nulls are skipped. Returns `false` when a non-null cell had to be skipped because it has
    /// no numeric view.
    pub(crate) fn update(&mut self, value: &Value) -> bool {
        if value.is_null() {
            return true;
        }
        match self {
            Accumulator::Sum { sum, seen } => match value.as_f64() {
                Some(v) => {
                    *sum += v;
                    *seen = true;
                    true
                }
                None => false,
            },
            Accumulator::Mean { sum, count } => match value.as_f64() {
                Some(v) => {
                    *sum += v;
                    *count += 1;
                    true
                }
                None => false,
            },
            Accumulator::Distinct(values) => {
                if !values.contains(value) {
                    values.insert(value.clone());
                }
                true
            }
        }
    }

    /// A group with no numeric cell has no sum or mean: the result is null.
    pub(crate) fn finish(&self) -> Value {
        match self {
            Accumulator::Sum { sum, seen: true } => Value::from(*sum),
            Accumulator::Sum { seen: false, .. } => Value::Null,
            Accumulator::Mean { count: 0, .. } => Value::Null,
            Accumulator::Mean { sum, count } => Value::from(*sum / *count as f64),
            Accumulator::Distinct(values) => Value::from(values.len() as f64),
        }
    }
}

/// Divide two aggregated values.
///
/// A null numerator, a null denominator or a zero denominator yields null, so "could not be
/// computed" stays distinguishable from a measured zero.
pub fn ratio(numerator: &Value, denominator: &Value) -> Value {
    match (numerator.as_f64(), denominator.as_f64()) {
        (Some(n), Some(d)) if d != 0.0 => {
            let q = n / d;
            if q.is_finite() {
                Value::from(q)
            } else {
                Value::Null
            }
        }
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn shared_ratio_fields_are_summed_once() {
        let definitions = [
            MetricDefinition::percentage("completion", "done", "total"),
            MetricDefinition::average_ratio("avg_done", "done", "total"),
            MetricDefinition::sum("done_total", "done"),
            MetricDefinition::distinct_count("people", "done"),
        ];
        let plan = TreatmentDispatcher::aggregate_spec(&definitions);

        assert_eq!(
            plan.reducers,
            vec![
                Reducer {
                    field: "done".to_string(),
                    kind: ReducerKind::Sum
                },
                Reducer {
                    field: "total".to_string(),
                    kind: ReducerKind::Sum
                },
                Reducer {
                    field: "done".to_string(),
                    kind: ReducerKind::DistinctCount
                },
            ]
        );
        assert_eq!(
            plan.metrics.iter().map(|m| m.slot).collect::<Vec<_>>(),
            vec![
                MetricSlot::Ratio {
                    numerator: 0,
                    denominator: 1
                },
                MetricSlot::Ratio {
                    numerator: 0,
                    denominator: 1
                },
                MetricSlot::Direct(0),
                MetricSlot::Direct(2),
            ]
        );
        assert_eq!(
            plan.deferred_ratios().map(|m| m.name.as_str()).collect::<Vec<_>>(),
            vec!["completion", "avg_done"]
        );
    }

    #[test]
    fn accumulators_skip_nulls_and_flag_non_numeric_cells() {
        let mut sum = Accumulator::new(ReducerKind::Sum);
        assert!(sum.update(&Value::from(2)));
        assert!(sum.update(&Value::Null));
        assert!(!sum.update(&Value::from("n/a")));
        assert!(sum.update(&Value::from("3")));
        assert_eq!(sum.finish(), Value::from(5.0));

        let mut mean = Accumulator::new(ReducerKind::Mean);
        for v in [4.5, 4.7] {
            mean.update(&Value::from(v));
        }
        assert_eq!(mean.finish(), Value::from((4.5 + 4.7) / 2.0));

        let mut distinct = Accumulator::new(ReducerKind::DistinctCount);
        for v in [Value::from("a"), Value::Null, Value::from("a"), Value::from("b")] {
            distinct.update(&v);
        }
        assert_eq!(distinct.finish(), Value::from(2.0));
    }

    #[test]
    fn empty_groups_finish_as_null_except_distinct_count() {
        assert_eq!(Accumulator::new(ReducerKind::Sum).finish(), Value::Null);
        assert_eq!(Accumulator::new(ReducerKind::Mean).finish(), Value::Null);
        assert_eq!(
            Accumulator::new(ReducerKind::DistinctCount).finish(),
            Value::from(0.0)
        );
    }

    #[test]
    fn ratio_is_null_when_it_cannot_be_computed() {
        assert_eq!(ratio(&Value::from(20.0), &Value::from(20.0)), Value::from(1.0));
        assert_eq!(ratio(&Value::from(0.0), &Value::from(5.0)), Value::from(0.0));
        assert_eq!(ratio(&Value::from(3.0), &Value::from(0.0)), Value::Null);
        assert_eq!(ratio(&Value::from(3.0), &Value::Null), Value::Null);
        assert_eq!(ratio(&Value::Null, &Value::from(3.0)), Value::Null);
    }
}
