/// Errors that can occur while computing or reconstructing an image.
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// The caller supplied parameters that cannot be rendered; nothing was computed.
    InvalidArgument(String),
    /// The computation was superseded before it finished.
    Cancelled,
    /// An internal invariant was broken.
    Internal(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            Error::Cancelled => write!(f, "computation cancelled"),
            Error::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}
