use metricbase_table::{Table, Value};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Descriptive summary of a result table.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Report {
    pub row_count: usize,
    /// Non-null cells per column, for every column of the table.
    pub non_null_counts: BTreeMap<String, usize>,
    /// Distinct values per group key column.
    pub distinct_key_counts: BTreeMap<String, usize>,
    pub distinct_ids: Option<usize>,
    pub distinct_periods: Option<BTreeSet<Value>>,
}

/// Columns that play the identity and period roles in a [`Report`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReportAxes {
    pub id_column: Option<String>,
    pub period_column: Option<String>,
}

impl ReportAxes {
    /// The positional convention: the first key is the identity and, when there is more than
    /// one key, the last key is the period.
    pub fn from_key_convention<S: AsRef<str>>(keys: &[S]) -> Self {
        let id_column = keys.first().map(|k| k.as_ref().to_string());
        let period_column = if keys.len() > 1 {
            keys.last().map(|k| k.as_ref().to_string())
        } else {
            None
        };
        Self {
            id_column,
            period_column,
        }
    }
}

pub struct ReportGenerator;

impl ReportGenerator {
    pub fn summarize<S: AsRef<str>>(table: &Table, keys: &[S]) -> Report {
        Self::summarize_with_axes(table, keys, &ReportAxes::from_key_convention(keys))
    }

    /// Summarize `table`, reading identity and period from the named columns.
    ///
    /// Axes naming a column the table does not have are reported as `None`.
    pub fn summarize_with_axes<S: AsRef<str>>(table: &Table, keys: &[S], axes: &ReportAxes) -> Report {
        let mut report = Report {
            row_count: table.row_count(),
            ..Report::default()
        };

        for column in table.columns() {
            if let Some(stats) = table.column_stats(column) {
                report
                    .non_null_counts
                    .insert(column.clone(), stats.non_null_count());
            }
        }
        for key in keys {
            let key = key.as_ref();
            if let Some(stats) = table.column_stats(key) {
                report
                    .distinct_key_counts
                    .insert(key.to_string(), stats.distinct_count);
            }
        }

        report.distinct_ids = axes
            .id_column
            .as_deref()
            .and_then(|column| table.column_stats(column))
            .map(|stats| stats.distinct_count);
        report.distinct_periods = axes
            .period_column
            .as_deref()
            .and_then(|column| table.column_values(column))
            .map(|values| values.filter(|v| !v.is_null()).cloned().collect());

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn key_convention_picks_first_and_last_keys() {
        let axes = ReportAxes::from_key_convention(&["team", "community", "period"]);
        assert_eq!(axes.id_column.as_deref(), Some("team"));
        assert_eq!(axes.period_column.as_deref(), Some("period"));

        let single = ReportAxes::from_key_convention(&["team"]);
        assert_eq!(single.period_column, None);
    }

    #[test]
    fn axes_naming_absent_columns_report_nothing() {
        let table = Table::from_rows("r", vec!["team"], vec![vec!["a".into()]]).unwrap();
        let axes = ReportAxes {
            id_column: Some("team".to_string()),
            period_column: Some("period".to_string()),
        };
        let report = ReportGenerator::summarize_with_axes(&table, &["team"], &axes);
        assert_eq!(report.distinct_ids, Some(1));
        assert_eq!(report.distinct_periods, None);
    }
}
