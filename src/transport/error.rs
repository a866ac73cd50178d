use std::fmt;
use thiserror::Error;

use super::timeout::Timeout;

/// Boxed lower-level failure kept as the chained cause of a [`TransportError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A specialized `Result` type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

pub(crate) const PROTOCOL_MESSAGE: &str = "Transport encountered an error";
pub(crate) const CLOSED_MESSAGE: &str = "Transport is closed";
pub(crate) const ENDPOINT_NOT_FOUND_MESSAGE: &str = "Transport endpoint not found";
pub(crate) const ACCESS_DENIED_MESSAGE: &str = "Transport access denied";

/// Tag identifying one of the five transport failure kinds.
///
/// `Protocol` is the root: every other kind is a specialization of it, so a
/// caller that handles `Protocol` handles any transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Protocol,
    Timeout,
    Closed,
    EndpointNotFound,
    AccessDenied,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 5] = [
        ErrorKind::Protocol,
        ErrorKind::Timeout,
        ErrorKind::Closed,
        ErrorKind::EndpointNotFound,
        ErrorKind::AccessDenied,
    ];

    /// Whether `self` is the same kind as `parent` or a specialization of it.
    pub fn is_a(self, parent: ErrorKind) -> bool {
        self == parent || parent == ErrorKind::Protocol
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Protocol => "ProtocolError",
            ErrorKind::Timeout => "TimeoutError",
            ErrorKind::Closed => "ClosedError",
            ErrorKind::EndpointNotFound => "EndpointNotFound",
            ErrorKind::AccessDenied => "AccessDenied",
        };
        f.write_str(name)
    }
}

/// The error type for every failure surfaced across the transport boundary.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("{message}")]
    Protocol {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("{message}")]
    Timeout {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("{message}")]
    Closed {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("{message}")]
    EndpointNotFound {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("{message}")]
    AccessDenied {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
}

impl TransportError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            ErrorKind::Protocol => TransportError::Protocol {
                message,
                source: None,
            },
            ErrorKind::Timeout => TransportError::Timeout {
                message,
                source: None,
            },
            ErrorKind::Closed => TransportError::Closed {
                message,
                source: None,
            },
            ErrorKind::EndpointNotFound => TransportError::EndpointNotFound {
                message,
                source: None,
            },
            ErrorKind::AccessDenied => TransportError::AccessDenied {
                message,
                source: None,
            },
        }
    }

    /// Error of `kind` carrying the kind's standard message.
    ///
    /// Timeouts built this way report an unknown deadline (`inf`); use
    /// [`TransportError::timeout`] when the deadline is known.
    pub fn of_kind(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::Protocol => Self::protocol(PROTOCOL_MESSAGE),
            ErrorKind::Timeout => Self::timeout(Timeout::Unspecified),
            ErrorKind::Closed => Self::closed(),
            ErrorKind::EndpointNotFound => Self::endpoint_not_found(ENDPOINT_NOT_FOUND_MESSAGE),
            ErrorKind::AccessDenied => Self::access_denied(ACCESS_DENIED_MESSAGE),
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Protocol, message)
    }

    /// Timeout error worded after the deadline the caller asked for.
    pub fn timeout(timeout: Timeout) -> Self {
        Self::new(
            ErrorKind::Timeout,
            format!("Exceeded timeout of {timeout} ms"),
        )
    }

    pub fn closed() -> Self {
        Self::new(ErrorKind::Closed, CLOSED_MESSAGE)
    }

    pub fn endpoint_not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::EndpointNotFound, message)
    }

    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AccessDenied, message)
    }

    /// Chain `cause` as the lower-level failure behind this error.
    pub fn with_source(mut self, cause: impl Into<BoxError>) -> Self {
        *self.source_slot() = Some(cause.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            TransportError::Protocol { .. } => ErrorKind::Protocol,
            TransportError::Timeout { .. } => ErrorKind::Timeout,
            TransportError::Closed { .. } => ErrorKind::Closed,
            TransportError::EndpointNotFound { .. } => ErrorKind::EndpointNotFound,
            TransportError::AccessDenied { .. } => ErrorKind::AccessDenied,
        }
    }

    /// Whether this error is of `kind` or a specialization of it.
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind().is_a(kind)
    }

    pub fn message(&self) -> &str {
        match self {
            TransportError::Protocol { message, .. }
            | TransportError::Timeout { message, .. }
            | TransportError::Closed { message, .. }
            | TransportError::EndpointNotFound { message, .. }
            | TransportError::AccessDenied { message, .. } => message,
        }
    }

    /// The chained lower-level failure, downcast to its concrete type.
    pub fn cause<E: std::error::Error + 'static>(&self) -> Option<&E> {
        match self {
            TransportError::Protocol { source, .. }
            | TransportError::Timeout { source, .. }
            | TransportError::Closed { source, .. }
            | TransportError::EndpointNotFound { source, .. }
            | TransportError::AccessDenied { source, .. } => {
                source.as_deref().and_then(|s| s.downcast_ref::<E>())
            }
        }
    }

    fn source_slot(&mut self) -> &mut Option<BoxError> {
        match self {
            TransportError::Protocol { source, .. }
            | TransportError::Timeout { source, .. }
            | TransportError::Closed { source, .. }
            | TransportError::EndpointNotFound { source, .. }
            | TransportError::AccessDenied { source, .. } => source,
        }
    }
}

/// Invalid value found while loading a [`TransportConfig`](super::TransportConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {key}: expected a number of milliseconds, 'none' or 'inf'")]
    InvalidTimeout { key: String, value: String },

    #[error("Invalid value '{value}' for {key}: expected a positive integer")]
    InvalidCapacity { key: String, value: String },
}
