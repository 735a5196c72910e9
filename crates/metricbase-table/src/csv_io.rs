//! CSV import/export for [`Table`].
//!
//! Cells are typed on read: an empty cell is null, `true`/`false` are booleans, anything that
//! parses as a float is a number and everything else is text.

use crate::error::{TableError, TableResult};
use crate::table::Table;
use crate::value::Value;
use std::io::{Read, Write};
use std::path::Path;

pub fn parse_cell(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    match trimmed {
        "true" | "TRUE" | "True" => return Value::Boolean(true),
        "false" | "FALSE" | "False" => return Value::Boolean(false),
        _ => {}
    }
    match trimmed.parse::<f64>() {
        Ok(n) if n.is_finite() => Value::from(n),
        _ => Value::from(raw),
    }
}

impl Table {
    /// Read a table from CSV data with a header row.
    pub fn from_csv_reader<R: Read>(name: impl Into<String>, reader: R) -> TableResult<Table> {
        let name = name.into();
        let csv_err = |source| TableError::Csv {
            table: name.clone(),
            source,
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_reader(reader);
        let headers: Vec<String> = reader
            .headers()
            .map_err(csv_err)?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(csv_err)?;
            rows.push(record.iter().map(parse_cell).collect());
        }
        log::debug!("read {} rows from csv table {name}", rows.len());
        Table::from_rows(name, headers, rows)
    }

    pub fn from_csv_path(name: impl Into<String>, path: impl AsRef<Path>) -> TableResult<Table> {
        let name = name.into();
        let file = std::fs::File::open(path.as_ref()).map_err(|source| TableError::Io {
            table: name.clone(),
            source,
        })?;
        Table::from_csv_reader(name, std::io::BufReader::new(file))
    }

    /// Write the table as CSV with a header row. Nulls become empty cells.
    pub fn write_csv<W: Write>(&self, writer: W) -> TableResult<()> {
        let csv_err = |source| TableError::Csv {
            table: self.name().to_string(),
            source,
        };
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(self.columns()).map_err(csv_err)?;
        for row in self.rows() {
            writer
                .write_record(row.iter().map(|v| v.to_string()))
                .map_err(csv_err)?;
        }
        writer.flush().map_err(|source| TableError::Io {
            table: self.name().to_string(),
            source,
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn reads_typed_cells() {
        let data = "community,period,events,label\n101,202501,20,x\n102,202501,,true\n";
        let table = Table::from_csv_reader("input", data.as_bytes()).unwrap();
        assert_eq!(
            table.rows().collect::<Vec<_>>(),
            vec![
                &[
                    Value::from(101),
                    Value::from(202501),
                    Value::from(20),
                    Value::from("x")
                ][..],
                &[
                    Value::from(102),
                    Value::from(202501),
                    Value::Null,
                    Value::from(true)
                ][..],
            ]
        );
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let data = "a,b\n1,2\n3\n";
        let err = Table::from_csv_reader("input", data.as_bytes()).unwrap_err();
        assert!(matches!(err, TableError::Csv { table, .. } if table == "input"));
    }

    #[test]
    fn write_then_read_preserves_values() {
        let table = Table::from_rows(
            "out",
            vec!["k", "rate"],
            vec![
                vec!["A".into(), 0.5.into()],
                vec!["B".into(), Value::Null],
            ],
        )
        .unwrap();
        let mut buf = Vec::new();
        table.write_csv(&mut buf).unwrap();
        assert_eq!(String::from_utf8(buf.clone()).unwrap(), "k,rate\nA,0.5\nB,\n");
        let back = Table::from_csv_reader("out", buf.as_slice()).unwrap();
        assert_eq!(back, table);
    }
}
