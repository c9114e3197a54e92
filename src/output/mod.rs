//! Output module
//!
//! Converts usage rows to Arrow RecordBatches and writes Parquet files.

mod schema;
mod writer;

pub use schema::{usage_schema, usage_to_arrow};
pub use writer::{write_usage_parquet, ParquetWriter, ParquetWriterConfig};
