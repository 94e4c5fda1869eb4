//! I/O and format failures. Validation diagnostics are not represented
//! here — see [`crate::diagnostics::Diagnostic`]; they are data, not errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("malformed city-catalogue row: {0}")]
    Catalogue(String),
}
