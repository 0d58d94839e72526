//! Table transports.
//!
//! The engine only sees an in-memory `RowTable`; transports load it from and
//! emit selections to delimited files.

/// CSV load and emission over files or any reader/writer.
pub mod fs;

pub use fs::{default_output_path, read_csv, read_csv_path, write_csv, write_csv_path};
