use std::io;

use thiserror::Error;

/// Error type for sampling preconditions, configuration, and table IO failures.
#[derive(Debug, Error)]
pub enum SamplerError {
    /// The input is below the row floor; nothing was sampled or written.
    #[error("input has only {rows} rows; at least {minimum} are required to run sampling")]
    InsufficientRows {
        /// Rows in the input.
        rows: usize,
        /// Required minimum.
        minimum: usize,
    },
    /// The input has no header row.
    #[error("csv input has no headers")]
    MissingHeaders,
    /// Invalid configuration or table shape.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// CSV parse or write failure.
    #[error(transparent)]
    Csv(#[from] csv::Error),
    /// Filesystem failure.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// Config or summary JSON failure.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
