//! Errors reported by a store transport.
//!
//! The engine never inspects these beyond `code` and never retries them; they
//! are carried to the caller unchanged.

use std::fmt;

/// Store error codes the engine distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum TransportErrorCode {
    /// The table does not exist.
    ResourceNotFoundException,
    /// A conditional write was rejected.
    ConditionalCheckFailedException,
    /// Provisioned throughput was exceeded.
    ProvisionedThroughputExceededException,
    /// Account-level request limit was exceeded.
    RequestLimitExceeded,
    /// The request was malformed.
    ValidationException,
    /// The request body could not be (de)serialized.
    SerializationException,
    /// The store failed internally.
    InternalServerError,
    /// The request never reached the store, or the response never came back.
    Network,
    /// Anything the transport could not classify.
    #[default]
    Unknown,
}

impl TransportErrorCode {
    /// Short code string, as the store spells it.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ResourceNotFoundException => "ResourceNotFoundException",
            Self::ConditionalCheckFailedException => "ConditionalCheckFailedException",
            Self::ProvisionedThroughputExceededException => {
                "ProvisionedThroughputExceededException"
            }
            Self::RequestLimitExceeded => "RequestLimitExceeded",
            Self::ValidationException => "ValidationException",
            Self::SerializationException => "SerializationException",
            Self::InternalServerError => "InternalServerError",
            Self::Network => "Network",
            Self::Unknown => "Unknown",
        }
    }

    /// Parse a store error code. Unrecognized codes map to [`Self::Unknown`].
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        match code {
            "ResourceNotFoundException" => Self::ResourceNotFoundException,
            "ConditionalCheckFailedException" => Self::ConditionalCheckFailedException,
            "ProvisionedThroughputExceededException" => {
                Self::ProvisionedThroughputExceededException
            }
            "RequestLimitExceeded" => Self::RequestLimitExceeded,
            "ValidationException" => Self::ValidationException,
            "SerializationException" => Self::SerializationException,
            "InternalServerError" => Self::InternalServerError,
            _ => Self::Unknown,
        }
    }

    /// Whether a caller-side retry could plausibly succeed.
    #[must_use]
    pub fn is_throttling(&self) -> bool {
        matches!(
            self,
            Self::ProvisionedThroughputExceededException | Self::RequestLimitExceeded
        )
    }
}

impl fmt::Display for TransportErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error returned by a transport call.
#[derive(Debug)]
pub struct TransportError {
    /// Classified error code.
    pub code: TransportErrorCode,
    /// Human-readable message.
    pub message: String,
    /// The underlying client error, if any.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl TransportError {
    /// Create an error whose message is the code itself.
    #[must_use]
    pub fn new(code: TransportErrorCode) -> Self {
        Self {
            message: code.as_str().to_owned(),
            code,
            source: None,
        }
    }

    /// Create an error with a custom message.
    #[must_use]
    pub fn with_message(code: TransportErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Attach the underlying error.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// The table does not exist.
    #[must_use]
    pub fn resource_not_found(table: &str) -> Self {
        Self::with_message(
            TransportErrorCode::ResourceNotFoundException,
            format!("Requested resource not found: Table: {table} not found"),
        )
    }

    /// A put/delete condition evaluated to false.
    #[must_use]
    pub fn conditional_check_failed() -> Self {
        Self::with_message(
            TransportErrorCode::ConditionalCheckFailedException,
            "The conditional request failed",
        )
    }

    /// The request was malformed.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::with_message(TransportErrorCode::ValidationException, message)
    }
}

/// Build a [`TransportError`] from a code name and optional message.
///
/// ```
/// use raziel_model::transport_error;
/// use raziel_model::error::TransportErrorCode;
///
/// let err = transport_error!(RequestLimitExceeded);
/// assert_eq!(err.code, TransportErrorCode::RequestLimitExceeded);
///
/// let err = transport_error!(Network, "connection reset");
/// assert_eq!(err.message, "connection reset");
/// ```
#[macro_export]
macro_rules! transport_error {
    ($code:ident) => {
        $crate::error::TransportError::new($crate::error::TransportErrorCode::$code)
    };
    ($code:ident, $msg:expr) => {
        $crate::error::TransportError::with_message(
            $crate::error::TransportErrorCode::$code,
            $msg,
        )
    };
}
