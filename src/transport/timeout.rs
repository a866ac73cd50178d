// Timeout arguments accepted by every transport operation, and the one policy
// carriers use to turn them into a concrete deadline.

use std::fmt;
use std::future::Future;
use std::io;
use std::time::Duration;

/// Milliseconds a caller is willing to wait for a transport operation.
///
/// `Unspecified` and `Infinite` are different requests: the first lets the
/// carrier apply its own default, the second asks it to block until the
/// operation completes or the transport fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Timeout {
    #[default]
    Unspecified,
    Infinite,
    Millis(u64),
}

impl Timeout {
    pub fn is_unspecified(&self) -> bool {
        matches!(self, Timeout::Unspecified)
    }

    /// Deadline to wait with, falling back to `default_ms` when unspecified.
    /// `None` means wait forever.
    pub fn resolve(self, default_ms: Option<u64>) -> Option<Duration> {
        transport_timeout(self, default_ms, false).map(Duration::from_millis)
    }
}

impl From<u64> for Timeout {
    fn from(ms: u64) -> Self {
        Timeout::Millis(ms)
    }
}

/// `None` is an explicit request to wait forever, not "use the default".
impl From<Option<u64>> for Timeout {
    fn from(ms: Option<u64>) -> Self {
        ms.map_or(Timeout::Infinite, Timeout::Millis)
    }
}

impl From<Duration> for Timeout {
    fn from(d: Duration) -> Self {
        Timeout::Millis(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }
}

impl fmt::Display for Timeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timeout::Millis(ms) => write!(f, "{ms}"),
            Timeout::Unspecified | Timeout::Infinite => f.write_str("inf"),
        }
    }
}

/// Resolve a caller-supplied timeout against a carrier default.
///
/// Returns `default` when nothing was supplied, otherwise the supplied value,
/// integer-divided down to seconds when `seconds` is set. `None` is "wait
/// forever" and is preserved as-is.
pub fn transport_timeout(value: Timeout, default: Option<u64>, seconds: bool) -> Option<u64> {
    let value = match value {
        Timeout::Unspecified => default,
        Timeout::Infinite => None,
        Timeout::Millis(ms) => Some(ms),
    };
    if seconds { value.map(|ms| ms / 1000) } else { value }
}

/// Await `fut`, giving up with `io::ErrorKind::TimedOut` once `deadline` elapses.
pub async fn with_deadline<T, F>(deadline: Option<Duration>, fut: F) -> io::Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    match deadline {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|elapsed| io::Error::new(io::ErrorKind::TimedOut, elapsed))?,
        None => fut.await,
    }
}
