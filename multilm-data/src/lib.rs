//! multilm-data: Tabular data ingestion for multilm
//!
//! Reads delimited files (comma or tab, header row) into a
//! column-typed Frame, with missing-value handling, column renames,
//! complete-case filtering, and per-column summaries.

pub mod frame;
pub mod summary;

pub use frame::{Column, Frame};
pub use summary::{describe, ColumnSummary};
