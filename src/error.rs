use thiserror::Error;

#[derive(Error, Debug)]
pub enum DmmError {
    #[error("IO error: {context}: {source}")]
    Io {
        #[source]
        source: std::io::Error,
        context: String,
    },
    #[error("Connection to {target} failed: {source}")]
    Connection {
        target: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Connection timeout")]
    Timeout,
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("mode should be one of: {allowed}")]
    UnknownMode { mode: String, allowed: String },
    #[error("range '{value}' not valid for mode {mode}, should be one of: {allowed}")]
    InvalidRange {
        mode: String,
        value: String,
        allowed: String,
    },
    #[error("NPLC not supported for mode {0}")]
    NplcUnsupported(String),
    #[error("inappropriate nplc value '{value}' for mode {mode}, should be one of: {allowed}")]
    InvalidNplc {
        mode: String,
        value: String,
        allowed: String,
    },
    #[error("Bandwidth not supported for mode {0}")]
    BandwidthUnsupported(String),
    #[error("inappropriate bandwidth '{value}' for mode {mode}, should be one of: {allowed}")]
    InvalidBandwidth {
        mode: String,
        value: String,
        allowed: String,
    },
    #[error("No USB instruments found. Available: {0:?}")]
    NoInstrumentFound(Vec<String>),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Session is closed")]
    SessionClosed,
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("VISA error: {0}")]
    Visa(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DmmError {
    pub(crate) fn io(source: std::io::Error, context: impl Into<String>) -> Self {
        if matches!(
            source.kind(),
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
        ) {
            return DmmError::Timeout;
        }
        DmmError::Io {
            source,
            context: context.into(),
        }
    }
}
