//! Output table: column naming, CSV writing and the manifest sidecar

pub mod columns;
pub mod manifest;
pub mod writer;

pub use columns::{ColumnMap, map_column_name};
pub use manifest::TableManifest;
pub use writer::TableWriter;
