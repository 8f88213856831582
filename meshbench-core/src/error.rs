use std::fmt;

/// Result type alias for meshbench core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for meshbench core operations
#[derive(Debug)]
pub enum Error {
    /// I/O errors from report and sample sinks
    Io(std::io::Error),

    /// Invalid configuration supplied at setup time
    Config(String),

    /// Resource sampler lifecycle misuse
    Sampler(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {e}"),
            Error::Config(msg) => write!(f, "Configuration error: {msg}"),
            Error::Sampler(msg) => write!(f, "Sampler error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}
