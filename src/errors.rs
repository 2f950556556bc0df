use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Ambiguous resolution: {0}")]
    AmbiguousResolution(String),

    #[error("Value mismatch: expected '{expected}', displayed '{actual}'")]
    ValueMismatch { expected: String, actual: String },

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Grid not found: {0}")]
    GridNotFound(String),

    #[error("Row {requested} out of range: grid has {rows} rows")]
    RowOutOfRange { requested: usize, rows: usize },

    #[error("Container still blocked: {0}")]
    StillBlocked(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("Invalid field spec: {0}")]
    InvalidSpec(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Whether this error aborts the current test case. `StillBlocked` is
    /// diagnostic only and soft timeouts are reported as booleans by the
    /// wait APIs, so neither is fatal on its own.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, EngineError::StillBlocked(_))
    }
}
