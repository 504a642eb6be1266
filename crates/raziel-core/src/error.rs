//! Engine error taxonomy.

use raziel_model::TransportError;

/// Errors returned by every engine operation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The key input is not an ordered sequence of strings.
    #[error("Expected an array")]
    KeyType,
    /// The key has fewer than two segments.
    #[error("Malformed key, expected [hash, range, ...]")]
    KeyLength,
    /// The partition or first sort segment is empty.
    #[error("Hash or Range can not be empty")]
    KeyEmpty,
    /// A payload could not be encoded or decoded as JSON.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    /// No live row exists for the key.
    #[error("Not Found")]
    NotFound,
    /// The transport failed; passed through unchanged.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// A TTL specification could not be turned into epoch seconds.
    #[error("invalid ttl: {0}")]
    InvalidTtl(String),
    /// A multi-row operation was given nothing to do.
    #[error("{0} requires at least one entry")]
    EmptyRequest(&'static str),
    /// A caller expression used a name placeholder the engine binds itself.
    #[error("name placeholder {0} is reserved")]
    ReservedName(String),
    /// A table was opened without a name.
    #[error("a table name is required")]
    MissingTableName,
}

impl Error {
    /// Whether this is a point-read miss.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Whether this error was raised by key validation.
    #[must_use]
    pub fn is_key_error(&self) -> bool {
        matches!(self, Self::KeyType | Self::KeyLength | Self::KeyEmpty)
    }
}

/// Engine result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;
