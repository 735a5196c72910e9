use crate::value::Value;
use std::collections::HashSet;

/// Cheap per-column statistics used by summaries.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ColumnStats {
    pub row_count: usize,
    pub null_count: usize,
    /// Distinct non-null values.
    pub distinct_count: usize,
}

impl ColumnStats {
    pub fn from_values<'a>(values: impl IntoIterator<Item = &'a Value>) -> Self {
        let mut row_count = 0usize;
        let mut null_count = 0usize;
        let mut distinct: HashSet<&Value> = HashSet::new();
        for value in values {
            row_count += 1;
            if value.is_null() {
                null_count += 1;
            } else {
                distinct.insert(value);
            }
        }
        Self {
            row_count,
            null_count,
            distinct_count: distinct.len(),
        }
    }

    pub fn non_null_count(&self) -> usize {
        self.row_count - self.null_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn nulls_are_excluded_from_distinct_count() {
        let values = [
            Value::from("a"),
            Value::Null,
            Value::from("a"),
            Value::from(1),
            Value::Null,
        ];
        let stats = ColumnStats::from_values(&values);
        assert_eq!(
            stats,
            ColumnStats {
                row_count: 5,
                null_count: 2,
                distinct_count: 2,
            }
        );
        assert_eq!(stats.non_null_count(), 3);
    }
}
