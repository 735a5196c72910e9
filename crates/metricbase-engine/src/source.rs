use metricbase_table::{Table, TableError, Value};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("table `{table}` not found at {}", path.display())]
    NotFound { table: String, path: PathBuf },

    #[error("table `{table}` has no period column `{column}`")]
    MissingPeriodColumn { table: String, column: String },

    #[error(transparent)]
    Table(#[from] TableError),
}

/// Supplies raw input tables, pre-filtered to an inclusive period range.
pub trait TableSource {
    fn read_table(
        &self,
        table: &str,
        period_column: &str,
        start: &Value,
        end: &Value,
    ) -> Result<Table, SourceError>;
}

/// Keep the rows whose period lies in `start..=end`. Rows with a null period are dropped.
pub fn filter_period_range(input: &Table, period_idx: usize, start: &Value, end: &Value) -> Table {
    input.filter_rows(|row| in_period_range(&row[period_idx], start, end))
}

pub(crate) fn in_period_range(period: &Value, start: &Value, end: &Value) -> bool {
    matches!(
        period.cmp_period(start),
        Some(Ordering::Greater | Ordering::Equal)
    ) && matches!(
        period.cmp_period(end),
        Some(Ordering::Less | Ordering::Equal)
    )
}

/// Reads `<root>/<table>.csv`.
#[derive(Clone, Debug)]
pub struct CsvDirectorySource {
    root: PathBuf,
}

impl CsvDirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn table_path(&self, table: &str) -> PathBuf {
        self.root.join(format!("{table}.csv"))
    }
}

impl TableSource for CsvDirectorySource {
    fn read_table(
        &self,
        table: &str,
        period_column: &str,
        start: &Value,
        end: &Value,
    ) -> Result<Table, SourceError> {
        let path = self.table_path(table);
        if !path.is_file() {
            return Err(SourceError::NotFound {
                table: table.to_string(),
                path,
            });
        }
        let raw = Table::from_csv_path(table, &path)?;
        let period_idx =
            raw.column_idx(period_column)
                .ok_or_else(|| SourceError::MissingPeriodColumn {
                    table: table.to_string(),
                    column: period_column.to_string(),
                })?;
        let filtered = filter_period_range(&raw, period_idx, start, end);
        log::debug!(
            "read {} of {} rows from {} for periods {start}..={end}",
            filtered.row_count(),
            raw.row_count(),
            path.display()
        );
        Ok(filtered)
    }
}
