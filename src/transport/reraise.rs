//! Normalization of carrier-native failures into [`TransportError`].
//!
//! A carrier declares, per operation, which of its native failures map to
//! which [`ErrorKind`]. Matched failures are re-raised as the normalized kind
//! with the native error chained as the cause; anything else is handed back
//! untouched as [`Reraised::Native`].

use std::fmt;
use std::future::Future;
use std::io;

use super::error::{
    ACCESS_DENIED_MESSAGE, ENDPOINT_NOT_FOUND_MESSAGE, ErrorKind, PROTOCOL_MESSAGE, TransportError,
};
use super::timeout::Timeout;

/// Selects the native failures a rule intercepts.
pub trait Catch<E>: Send + Sync {
    fn matches(&self, err: &E) -> bool;
}

impl<E, F> Catch<E> for F
where
    F: Fn(&E) -> bool + Send + Sync,
{
    fn matches(&self, err: &E) -> bool {
        self(err)
    }
}

impl Catch<io::Error> for io::ErrorKind {
    fn matches(&self, err: &io::Error) -> bool {
        err.kind() == *self
    }
}

impl Catch<io::Error> for [io::ErrorKind] {
    fn matches(&self, err: &io::Error) -> bool {
        self.contains(&err.kind())
    }
}

impl<const N: usize> Catch<io::Error> for [io::ErrorKind; N] {
    fn matches(&self, err: &io::Error) -> bool {
        self.contains(&err.kind())
    }
}

/// Intercepts every native failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyError;

impl<E> Catch<E> for AnyError {
    fn matches(&self, _err: &E) -> bool {
        true
    }
}

/// Outcome of a failed, wrapped operation.
#[derive(Debug)]
pub enum Reraised<E> {
    /// The failure matched a rule and was normalized.
    Transport(TransportError),

    /// No rule matched; the original failure, unchanged.
    Native(E),
}

impl<E: fmt::Display> fmt::Display for Reraised<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reraised::Transport(err) => fmt::Display::fmt(err, f),
            Reraised::Native(err) => fmt::Display::fmt(err, f),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for Reraised<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Reraised::Transport(err) => std::error::Error::source(err),
            Reraised::Native(err) => std::error::Error::source(err),
        }
    }
}

impl<E> Reraised<E> {
    pub fn transport(&self) -> Option<&TransportError> {
        match self {
            Reraised::Transport(err) => Some(err),
            Reraised::Native(_) => None,
        }
    }

    pub fn native(&self) -> Option<&E> {
        match self {
            Reraised::Transport(_) => None,
            Reraised::Native(err) => Some(err),
        }
    }
}

impl<E> From<TransportError> for Reraised<E> {
    fn from(err: TransportError) -> Self {
        Reraised::Transport(err)
    }
}

/// Crossing the transport boundary: a failure no rule claimed still becomes a
/// `ProtocolError`, with the native error kept as its cause.
impl<E> From<Reraised<E>> for TransportError
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(err: Reraised<E>) -> Self {
        match err {
            Reraised::Transport(err) => err,
            Reraised::Native(native) => {
                log::warn!("Unclassified transport failure: {native}");
                TransportError::protocol(PROTOCOL_MESSAGE).with_source(native)
            }
        }
    }
}

struct Rule<E> {
    kind: ErrorKind,
    catch: Box<dyn Catch<E>>,
}

/// Ordered table of `native failure -> ErrorKind` rules. The first match wins.
pub struct Reraise<E> {
    rules: Vec<Rule<E>>,
}

impl<E> Default for Reraise<E> {
    fn default() -> Self {
        Self { rules: Vec::new() }
    }
}

impl<E> fmt::Debug for Reraise<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.rules.iter().map(|rule| rule.kind))
            .finish()
    }
}

impl<E> Reraise<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Map failures selected by `catch` onto `kind`.
    pub fn on(mut self, kind: ErrorKind, catch: impl Catch<E> + 'static) -> Self {
        self.rules.push(Rule {
            kind,
            catch: Box::new(catch),
        });
        self
    }

    pub fn protocol(self, catch: impl Catch<E> + 'static) -> Self {
        self.on(ErrorKind::Protocol, catch)
    }

    pub fn timeout(self, catch: impl Catch<E> + 'static) -> Self {
        self.on(ErrorKind::Timeout, catch)
    }

    /// The kind `err` would be normalized to, if any rule claims it.
    pub fn classify(&self, err: &E) -> Option<ErrorKind> {
        self.rules
            .iter()
            .find(|rule| rule.catch.matches(err))
            .map(|rule| rule.kind)
    }

    /// Normalize one failure. `timeout` is the value the caller passed to the
    /// failing operation; it only shapes the message of a `TimeoutError`.
    pub fn normalize(&self, err: E, timeout: Timeout) -> Reraised<E> {
        match self.classify(&err) {
            Some(kind) => {
                log::debug!("Normalizing native failure to {kind}: {err}");
                Reraised::Transport(normalized(kind, timeout).with_source(err))
            }
            None => Reraised::Native(err),
        }
    }

    /// Await `op`, normalizing its failure. Success passes through unchanged.
    pub async fn call<T, F>(&self, timeout: Timeout, op: F) -> Result<T, Reraised<E>>
    where
        F: Future<Output = Result<T, E>>,
    {
        op.await.map_err(|err| self.normalize(err, timeout))
    }
}

fn normalized(kind: ErrorKind, timeout: Timeout) -> TransportError {
    match kind {
        ErrorKind::Protocol => TransportError::protocol(PROTOCOL_MESSAGE),
        ErrorKind::Timeout => TransportError::timeout(timeout),
        ErrorKind::Closed => TransportError::closed(),
        ErrorKind::EndpointNotFound => TransportError::endpoint_not_found(ENDPOINT_NOT_FOUND_MESSAGE),
        ErrorKind::AccessDenied => TransportError::access_denied(ACCESS_DENIED_MESSAGE),
    }
}

/// Re-raise failures selected by `catch` as `ProtocolError`
/// ("Transport encountered an error").
pub async fn reraise<T, E, F>(catch: impl Catch<E> + 'static, op: F) -> Result<T, Reraised<E>>
where
    E: std::error::Error + Send + Sync + 'static,
    F: Future<Output = Result<T, E>>,
{
    reraise_as(ErrorKind::Protocol, catch, Timeout::Unspecified, op).await
}

/// Re-raise failures selected by `catch` as `TimeoutError`
/// ("Exceeded timeout of {timeout} ms", `inf` when no finite timeout was given).
pub async fn reraise_timeout<T, E, F>(
    catch: impl Catch<E> + 'static,
    timeout: Timeout,
    op: F,
) -> Result<T, Reraised<E>>
where
    E: std::error::Error + Send + Sync + 'static,
    F: Future<Output = Result<T, E>>,
{
    reraise_as(ErrorKind::Timeout, catch, timeout, op).await
}

/// Re-raise failures selected by `catch` as `kind`.
pub async fn reraise_as<T, E, F>(
    kind: ErrorKind,
    catch: impl Catch<E> + 'static,
    timeout: Timeout,
    op: F,
) -> Result<T, Reraised<E>>
where
    E: std::error::Error + Send + Sync + 'static,
    F: Future<Output = Result<T, E>>,
{
    Reraise::new().on(kind, catch).call(timeout, op).await
}
