pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("format error: {0}")]
    Format(String),

    #[error("pair mismatch: {0}")]
    PairMismatch(String),

    #[error("transfer error: {0}")]
    Transfer(String),

    #[error("credential error: {0}")]
    Credential(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cancelled")]
    Cancelled,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Stable classification of an [`Error`], reported per input by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Format,
    PairMismatch,
    Transfer,
    Credential,
    Io,
    Cancelled,
    InvalidInput,
    Internal,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Format(_) => ErrorKind::Format,
            Error::PairMismatch(_) => ErrorKind::PairMismatch,
            Error::Transfer(_) => ErrorKind::Transfer,
            Error::Credential(_) => ErrorKind::Credential,
            Error::Io(_) => ErrorKind::Io,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
            Error::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Errors raised while reading or validating sequence data.
    ///
    /// These describe the input itself, so they take precedence over any
    /// transport failure they caused downstream.
    pub fn is_content_error(&self) -> bool {
        matches!(self, Error::Format(_) | Error::PairMismatch(_))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transfer(err.to_string())
    }
}

impl From<Error> for std::io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(e) => e,
            Error::Format(_) | Error::PairMismatch(_) => {
                std::io::Error::new(std::io::ErrorKind::InvalidData, err)
            }
            other => std::io::Error::other(other),
        }
    }
}
