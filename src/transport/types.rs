// Core transport contract implemented by every carrier (TCP, USB, in-memory)
use super::error::{TransportError, TransportResult};
use super::timeout::Timeout;

/// Byte-oriented duplex channel carrying ADB protocol traffic.
///
/// A transport is open once constructed and closed exactly once, after which
/// it stays closed. All methods take `&self`: one read and one write may be in
/// flight at the same time, and `close()` may race either of them. Two
/// concurrent reads (or two concurrent writes) on one instance are only safe
/// if the carrier serializes them internally.
///
/// Every failure is reported as a [`TransportError`]; carriers normalize their
/// native failures with [`Reraise`](super::Reraise) before returning.
#[allow(async_fn_in_trait)]
pub trait Transport: Send + Sync {
    /// Whether the transport has been closed, either by `close()` or because
    /// the carrier lost its peer. Reflects a completed `close()` immediately.
    fn closed(&self) -> bool;

    /// Read exactly `num_bytes` bytes.
    ///
    /// Fails with `Timeout` when `timeout` elapses first, `Closed` when the
    /// transport is (or becomes) closed, and `Protocol` or one of its
    /// specializations for any other carrier fault.
    async fn read(&self, num_bytes: usize, timeout: Timeout) -> TransportResult<Vec<u8>>;

    /// Write all of `data`. Either every byte is sent or an error is
    /// returned; partial writes are never reported as success.
    async fn write(&self, data: &[u8], timeout: Timeout) -> TransportResult<()>;

    /// Release the underlying carrier handle and mark the transport closed.
    async fn close(&self) -> TransportResult<()>;

    /// Fail with `Closed` if the transport can no longer be used.
    fn ensure_open(&self) -> TransportResult<()> {
        if self.closed() {
            Err(TransportError::closed())
        } else {
            Ok(())
        }
    }
}

/// Run `body` against `transport`, then close it.
///
/// `close()` is called exactly once whether `body` returns a value or an
/// error, including errors propagated early with `?`. When both fail the
/// body's error is returned and the close failure is logged.
pub async fn scoped<T, R, E>(transport: T, body: impl AsyncFnOnce(&T) -> Result<R, E>) -> Result<R, E>
where
    T: Transport,
    E: From<TransportError>,
{
    let outcome = body(&transport).await;
    let closed = transport.close().await;
    match (outcome, closed) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(close_err)) => Err(close_err.into()),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(close_err)) => {
            log::warn!("Failed to close transport after scoped error: {close_err}");
            Err(err)
        }
    }
}
