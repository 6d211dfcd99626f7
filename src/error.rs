use thiserror::Error;

/// Application-wide result type alias.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// I/O errors from filesystem operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An entry the operation needed is no longer present.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Access to a handle has not been granted.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The adapter lacks a capability (e.g. atomic move).
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// A file name contains a character that is not allowed.
    #[error("Invalid character \"{ch}\" in file name")]
    InvalidName { ch: char },

    /// Session persistence could not encode or decode a value.
    #[error("Persistence error: {0}")]
    Persistence(#[from] serde_json::Error),

    /// Configuration file could not be used.
    #[error("Config error: {0}")]
    Config(String),

    /// Invalid path provided by the user.
    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

impl AppError {
    /// Whether this error means "permission not granted yet" rather than a real failure.
    pub fn is_permission(&self) -> bool {
        match self {
            AppError::PermissionDenied(_) => true,
            AppError::Io(e) => e.kind() == std::io::ErrorKind::PermissionDenied,
            _ => false,
        }
    }
}
