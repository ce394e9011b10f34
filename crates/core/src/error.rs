use thiserror::Error;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, ParamsError>;

/// Errors surfaced by explicit engine calls.
///
/// Extraction never returns these to the consumer; a failed parse degrades to
/// an empty pass instead.
#[derive(Error, Debug)]
pub enum ParamsError {
    /// The query text could not be scanned
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// No parameter with this name is currently extracted
    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),

    /// The display value is not acceptable for the parameter's kind
    #[error("Invalid value for {kind} parameter: {message}")]
    InvalidValue { kind: String, message: String },

    /// Schema file could not be interpreted
    #[error("Schema error: {0}")]
    Schema(String),

    /// Engine configuration rejected
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The owning editor is gone
    #[error("Engine has been disposed")]
    Disposed,

    /// Engine was started outside a tokio runtime
    #[error("No tokio runtime available: {0}")]
    NoRuntime(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl ParamsError {
    pub fn unknown_parameter(name: impl Into<String>) -> Self {
        Self::UnknownParameter(name.into())
    }

    pub fn invalid_value(kind: impl ToString, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            kind: kind.to_string(),
            message: message.into(),
        }
    }

    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

/// Failure to scan a query document
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} at offset {offset}")]
pub struct ParseError {
    pub offset: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}
