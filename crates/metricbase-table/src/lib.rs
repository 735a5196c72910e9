//! In-memory tables for the metricbase aggregation engine.
//!
//! This crate focuses on:
//! - A small, hashable/ordered scalar [`Value`] usable as a group-by key part.
//! - A row-major [`Table`] whose transforming helpers never mutate their input.
//! - CSV import/export and lightweight per-column statistics.

#![forbid(unsafe_code)]

mod csv_io;
mod error;
mod stats;
mod table;
mod value;

pub use crate::csv_io::parse_cell;
pub use crate::error::{TableError, TableResult};
pub use crate::stats::ColumnStats;
pub use crate::table::Table;
pub use crate::value::Value;
