use crate::error::{TableError, TableResult};
use crate::stats::ColumnStats;
use crate::value::Value;
use std::collections::{HashMap, HashSet};

/// A named, row-major in-memory table.
///
/// Tables are treated as immutable inputs by the aggregation engine: the transforming helpers
/// (`filter_rows`, `select`, `with_column`, ...) all return a new table.
#[derive(Clone, Debug, PartialEq)]
pub struct Table {
    name: String,
    columns: Vec<String>,
    column_index: HashMap<String, usize>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<impl Into<String>>) -> Self {
        let name = name.into();
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        let column_index = columns
            .iter()
            .enumerate()
            .map(|(idx, c)| (c.clone(), idx))
            .collect();

        Self {
            name,
            columns,
            column_index,
            rows: Vec::new(),
        }
    }

    /// Build a table from a column list and rows, validating the schema.
    pub fn from_rows(
        name: impl Into<String>,
        columns: Vec<impl Into<String>>,
        rows: Vec<Vec<Value>>,
    ) -> TableResult<Self> {
        let mut table = Self::new(name, columns);
        table.check_unique_columns()?;
        table.rows.reserve(rows.len());
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    fn check_unique_columns(&self) -> TableResult<()> {
        if self.column_index.len() == self.columns.len() {
            return Ok(());
        }
        let mut seen = HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.as_str()) {
                return Err(TableError::DuplicateColumn {
                    table: self.name.clone(),
                    column: column.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_idx(&self, column: &str) -> Option<usize> {
        self.column_index.get(column).copied()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.column_index.contains_key(column)
    }

    pub fn push_row(&mut self, row: Vec<Value>) -> TableResult<()> {
        if row.len() != self.columns.len() {
            return Err(TableError::SchemaMismatch {
                table: self.name.clone(),
                expected: self.columns.len(),
                actual: row.len(),
            });
        }

        self.rows.push(row);
        Ok(())
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Value]> + '_ {
        self.rows.iter().map(Vec::as_slice)
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_idx(column)?;
        self.rows.get(row)?.get(idx)
    }

    /// Iterate over the values of a single column, or `None` if the column does not exist.
    pub fn column_values<'a>(&'a self, column: &str) -> Option<impl Iterator<Item = &'a Value> + 'a> {
        let idx = self.column_idx(column)?;
        Some(self.rows.iter().map(move |row| &row[idx]))
    }

    fn require_column(&self, column: &str) -> TableResult<usize> {
        self.column_idx(column).ok_or_else(|| TableError::UnknownColumn {
            table: self.name.clone(),
            column: column.to_string(),
        })
    }

    /// Keep only the rows accepted by `keep`.
    pub fn filter_rows(&self, mut keep: impl FnMut(&[Value]) -> bool) -> Table {
        Table {
            name: self.name.clone(),
            columns: self.columns.clone(),
            column_index: self.column_index.clone(),
            rows: self.rows.iter().filter(|row| keep(row)).cloned().collect(),
        }
    }

    /// Project the table onto `columns`, in that order.
    pub fn select<S: AsRef<str>>(&self, columns: &[S]) -> TableResult<Table> {
        let idxs = columns
            .iter()
            .map(|c| self.require_column(c.as_ref()))
            .collect::<TableResult<Vec<_>>>()?;
        let rows = self
            .rows
            .iter()
            .map(|row| idxs.iter().map(|&idx| row[idx].clone()).collect())
            .collect();
        Table::from_rows(
            self.name.clone(),
            columns.iter().map(|c| c.as_ref().to_string()).collect(),
            rows,
        )
    }

    pub fn add_column(&mut self, name: impl Into<String>, values: Vec<Value>) -> TableResult<()> {
        let name = name.into();
        if self.column_index.contains_key(&name) {
            return Err(TableError::DuplicateColumn {
                table: self.name.clone(),
                column: name,
            });
        }
        if values.len() != self.rows.len() {
            return Err(TableError::ColumnLengthMismatch {
                table: self.name.clone(),
                column: name,
                expected: self.rows.len(),
                actual: values.len(),
            });
        }

        let idx = self.columns.len();
        self.columns.push(name.clone());
        self.column_index.insert(name, idx);
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.push(value);
        }
        Ok(())
    }

    /// Return a copy of the table with an extra column appended.
    pub fn with_column(&self, name: impl Into<String>, values: Vec<Value>) -> TableResult<Table> {
        let mut out = self.clone();
        out.add_column(name, values)?;
        Ok(out)
    }

    /// Return a copy of the table with `name` filled with `value` on every row.
    pub fn with_constant_column(&self, name: impl Into<String>, value: Value) -> TableResult<Table> {
        self.with_column(name, vec![value; self.rows.len()])
    }

    /// Return a copy of the table with every value of `column` replaced by `f(row)`.
    pub fn map_column(
        &self,
        column: &str,
        mut f: impl FnMut(&[Value]) -> Value,
    ) -> TableResult<Table> {
        let idx = self.require_column(column)?;
        let mut out = self.clone();
        for row in out.rows.iter_mut() {
            let value = f(row);
            row[idx] = value;
        }
        Ok(out)
    }

    /// Return a copy of the table with its rows reordered by `compare`.
    pub fn sorted_by(&self, mut compare: impl FnMut(&[Value], &[Value]) -> std::cmp::Ordering) -> Table {
        let mut out = self.clone();
        out.rows.sort_by(|a, b| compare(a, b));
        out
    }

    /// Return the first pair of row indices that share the same values in `columns`.
    pub fn find_duplicate_key<S: AsRef<str>>(
        &self,
        columns: &[S],
    ) -> TableResult<Option<(usize, usize)>> {
        let idxs = columns
            .iter()
            .map(|c| self.require_column(c.as_ref()))
            .collect::<TableResult<Vec<_>>>()?;
        let mut seen: HashMap<Vec<&Value>, usize> = HashMap::with_capacity(self.rows.len());
        for (row_idx, row) in self.rows.iter().enumerate() {
            let key: Vec<&Value> = idxs.iter().map(|&idx| &row[idx]).collect();
            if let Some(first) = seen.insert(key, row_idx) {
                return Ok(Some((first, row_idx)));
            }
        }
        Ok(None)
    }

    pub fn column_stats(&self, column: &str) -> Option<ColumnStats> {
        Some(ColumnStats::from_values(self.column_values(column)?))
    }

    /// Stack tables vertically.
    ///
    /// The output schema is the union of the input schemas in first-seen order; cells for
    /// columns a table does not have are null.
    pub fn concat<'a>(name: impl Into<String>, tables: impl IntoIterator<Item = &'a Table>) -> Table {
        let tables: Vec<&Table> = tables.into_iter().collect();
        let mut columns: Vec<String> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        for table in &tables {
            for column in &table.columns {
                if seen.insert(column.as_str()) {
                    columns.push(column.clone());
                }
            }
        }

        let mut out = Table::new(name, columns);
        let total: usize = tables.iter().map(|t| t.row_count()).sum();
        out.rows.reserve(total);
        for table in tables {
            let mapping: Vec<Option<usize>> =
                out.columns.iter().map(|c| table.column_idx(c)).collect();
            for row in &table.rows {
                out.rows.push(
                    mapping
                        .iter()
                        .map(|idx| idx.map(|idx| row[idx].clone()).unwrap_or(Value::Null))
                        .collect(),
                );
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn events() -> Table {
        Table::from_rows(
            "events",
            vec!["community", "period", "events"],
            vec![
                vec!["A".into(), 202501.into(), 20.into()],
                vec!["A".into(), 202501.into(), 40.into()],
                vec!["B".into(), 202502.into(), Value::Null],
            ],
        )
        .unwrap()
    }

    #[test]
    fn push_row_rejects_wrong_arity() {
        let mut table = Table::new("t", vec!["a", "b"]);
        let err = table.push_row(vec![1.into()]).unwrap_err();
        assert!(matches!(
            err,
            TableError::SchemaMismatch {
                expected: 2,
                actual: 1,
                ..
            }
        ));
    }

    #[test]
    fn from_rows_rejects_duplicate_columns() {
        let err = Table::from_rows("t", vec!["a", "a"], Vec::new()).unwrap_err();
        assert!(matches!(err, TableError::DuplicateColumn { column, .. } if column == "a"));
    }

    #[test]
    fn filter_and_select_return_new_tables() {
        let table = events();
        let filtered = table.filter_rows(|row| row[0] == Value::from("A"));
        let projected = filtered.select(&["events", "community"]).unwrap();

        assert_eq!(table.row_count(), 3);
        assert_eq!(projected.columns(), &["events".to_string(), "community".to_string()]);
        assert_eq!(
            projected.rows().collect::<Vec<_>>(),
            vec![
                &[Value::from(20), Value::from("A")][..],
                &[Value::from(40), Value::from("A")][..],
            ]
        );
    }

    #[test]
    fn select_unknown_column_is_an_error() {
        let err = events().select(&["missing"]).unwrap_err();
        assert!(matches!(err, TableError::UnknownColumn { column, .. } if column == "missing"));
    }

    #[test]
    fn add_column_checks_length_and_duplicates() {
        let mut table = events();
        assert!(matches!(
            table.add_column("x", vec![Value::Null]),
            Err(TableError::ColumnLengthMismatch { expected: 3, actual: 1, .. })
        ));
        assert!(matches!(
            table.add_column("events", vec![Value::Null; 3]),
            Err(TableError::DuplicateColumn { .. })
        ));
        table.add_column("x", vec![1.into(), 2.into(), 3.into()]).unwrap();
        assert_eq!(table.value(2, "x"), Some(&Value::from(3)));
    }

    #[test]
    fn find_duplicate_key_reports_first_collision() {
        let table = events();
        assert_eq!(
            table.find_duplicate_key(&["community", "period"]).unwrap(),
            Some((0, 1))
        );
        assert_eq!(
            table.find_duplicate_key(&["community", "events"]).unwrap(),
            None
        );
    }

    #[test]
    fn concat_unions_schemas_with_nulls() {
        let a = Table::from_rows("a", vec!["k", "x"], vec![vec![1.into(), 10.into()]]).unwrap();
        let b = Table::from_rows("b", vec!["y", "k"], vec![vec![5.into(), 2.into()]]).unwrap();
        let out = Table::concat("out", [&a, &b]);

        assert_eq!(
            out.columns(),
            &["k".to_string(), "x".to_string(), "y".to_string()]
        );
        assert_eq!(
            out.rows().collect::<Vec<_>>(),
            vec![
                &[Value::from(1), Value::from(10), Value::Null][..],
                &[Value::from(2), Value::Null, Value::from(5)][..],
            ]
        );
    }

    #[test]
    fn map_column_rewrites_values() {
        let out = events()
            .map_column("events", |row| {
                Value::from(row[2].as_f64().map(|v| v * 2.0))
            })
            .unwrap();
        assert_eq!(
            out.column_values("events").unwrap().cloned().collect::<Vec<_>>(),
            vec![Value::from(40), Value::from(80), Value::Null]
        );
    }
}
