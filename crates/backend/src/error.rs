use std::error::Error;

/// The kind of error that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The backend could not be reached at all (connection refused,
    /// timeout before any chunk arrived).
    Unreachable,
    /// The backend answered, but the response was malformed or carried
    /// a non-success status.
    Protocol,
    /// Any other errors.
    Other,
}

/// The error type for a chat backend.
pub trait ChatBackendError: Error + Send + Sync + 'static {
    /// Returns the kind of this error.
    fn kind(&self) -> ErrorKind;
}
