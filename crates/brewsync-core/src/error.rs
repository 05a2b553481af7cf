//! Error types for brewsync-core

use thiserror::Error;

use crate::session::SessionError;
use crate::tags::ParseError;

/// Result type alias using brewsync-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in brewsync-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Local recipe database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Malformed embedded comment tag
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Remote session failure
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Recipe not found
    #[error("Recipe not found: {0}")]
    NotFound(String),
}

impl Error {
    /// Whether the error stops a whole run rather than a single recipe.
    pub const fn is_fatal(&self) -> bool {
        match self {
            Self::Parse(_) => false,
            Self::Session(error) => error.is_fatal(),
            _ => true,
        }
    }
}
