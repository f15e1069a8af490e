/// Run-level error types for the ranking engine.
/// Only structural problems abort a run. Per-value gaps (unparseable numbers,
/// non-positive prices, unknown type tags) never reach this type: they travel
/// as `None` and surface as NO_CALC.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("config error: {0}")]
    Config(String),

    #[error("missing columns in input: {missing:?}. expected: {expected:?}")]
    MissingColumns {
        missing: Vec<String>,
        expected: Vec<String>,
    },

    #[error("csv error: {0}")]
    Csv(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("task failed: {0}")]
    Task(String),
}

impl From<csv::Error> for EngineError {
    fn from(e: csv::Error) -> Self {
        EngineError::Csv(e.to_string())
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::Io(e.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
