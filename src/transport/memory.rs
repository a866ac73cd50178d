// In-process loopback carrier: two connected ends of a duplex byte pipe.
// Used to exercise the transport contract and as a stand-in for a device link
// in protocol tests.

use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::sync::PoisonError;

use tokio::sync::{Mutex, mpsc, watch};

use super::config::TransportConfig;
use super::error::{ErrorKind, TransportResult};
use super::reraise::{AnyError, Reraise};
use super::timeout::{Timeout, with_deadline};
use super::types::Transport;

struct Inbound {
    rx: mpsc::Receiver<Vec<u8>>,
    // bytes received but not yet handed to a reader
    pending: VecDeque<u8>,
}

pub struct MemoryTransport {
    name: &'static str,
    config: TransportConfig,
    outbound: std::sync::Mutex<Option<mpsc::Sender<Vec<u8>>>>,
    inbound: Mutex<Inbound>,
    closed: watch::Sender<bool>,
    reraise: Reraise<io::Error>,
}

impl MemoryTransport {
    /// Two connected ends: bytes written to one are read from the other.
    pub fn pair(config: TransportConfig) -> (Self, Self) {
        let capacity = config.channel_capacity.max(1);
        let (left_tx, right_rx) = mpsc::channel(capacity);
        let (right_tx, left_rx) = mpsc::channel(capacity);
        (
            Self::new("left", config.clone(), left_tx, left_rx),
            Self::new("right", config, right_tx, right_rx),
        )
    }

    fn new(
        name: &'static str,
        config: TransportConfig,
        tx: mpsc::Sender<Vec<u8>>,
        rx: mpsc::Receiver<Vec<u8>>,
    ) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            name,
            config,
            outbound: std::sync::Mutex::new(Some(tx)),
            inbound: Mutex::new(Inbound {
                rx,
                pending: VecDeque::new(),
            }),
            closed,
            reraise: Reraise::new()
                .timeout(io::ErrorKind::TimedOut)
                .on(ErrorKind::Closed, io::ErrorKind::NotConnected)
                .on(
                    ErrorKind::EndpointNotFound,
                    [io::ErrorKind::BrokenPipe, io::ErrorKind::UnexpectedEof],
                )
                .protocol(AnyError),
        }
    }

    pub fn name(&self) -> &str {
        self.name
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Flip to closed. Returns false if already closed.
    fn mark_closed(&self) -> bool {
        self.closed.send_if_modified(|closed| {
            if *closed {
                false
            } else {
                *closed = true;
                true
            }
        })
    }

    async fn wait_closed(&self) {
        let mut rx = self.closed.subscribe();
        // the sender lives in `self`, so this only returns once closed
        let _ = rx.wait_for(|closed| *closed).await;
    }

    fn release(&self) {
        self.outbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    fn peer_lost(&self) -> io::Error {
        if self.mark_closed() {
            log::debug!("{}: peer disconnected, closing", self.name);
        }
        self.release();
        io::Error::new(io::ErrorKind::BrokenPipe, "memory peer disconnected")
    }

    async fn read_exact(&self, num_bytes: usize) -> io::Result<Vec<u8>> {
        let mut inbound = tokio::select! {
            guard = self.inbound.lock() => guard,
            _ = self.wait_closed() => return Err(closed_error()),
        };
        while inbound.pending.len() < num_bytes {
            let chunk = tokio::select! {
                chunk = inbound.rx.recv() => chunk,
                _ = self.wait_closed() => return Err(closed_error()),
            };
            match chunk {
                Some(chunk) => inbound.pending.extend(chunk),
                None => {
                    inbound.rx.close();
                    return Err(self.peer_lost());
                }
            }
        }
        Ok(inbound.pending.drain(..num_bytes).collect())
    }

    async fn send_all(&self, data: &[u8]) -> io::Result<()> {
        let sender = self
            .outbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(closed_error)?;
        if data.is_empty() {
            return Ok(());
        }
        // a chunk is queued whole or not at all
        tokio::select! {
            sent = sender.send(data.to_vec()) => sent.map_err(|_| self.peer_lost()),
            _ = self.wait_closed() => Err(closed_error()),
        }
    }
}

fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "memory transport closed")
}

impl Transport for MemoryTransport {
    fn closed(&self) -> bool {
        *self.closed.borrow()
    }

    async fn read(&self, num_bytes: usize, timeout: Timeout) -> TransportResult<Vec<u8>> {
        self.ensure_open()?;
        let deadline = timeout.resolve(self.config.read_timeout_ms);
        log::trace!("{}: read {num_bytes} bytes (deadline {deadline:?})", self.name);
        let bytes = self
            .reraise
            .call(timeout, with_deadline(deadline, self.read_exact(num_bytes)))
            .await?;
        Ok(bytes)
    }

    async fn write(&self, data: &[u8], timeout: Timeout) -> TransportResult<()> {
        self.ensure_open()?;
        let deadline = timeout.resolve(self.config.write_timeout_ms);
        log::trace!("{}: write {} bytes (deadline {deadline:?})", self.name, data.len());
        self.reraise
            .call(timeout, with_deadline(deadline, self.send_all(data)))
            .await?;
        Ok(())
    }

    async fn close(&self) -> TransportResult<()> {
        if self.mark_closed() {
            log::debug!("{}: closed", self.name);
        }
        self.release();
        // in-flight reads observe the flag and drop the lock promptly
        self.inbound.lock().await.rx.close();
        Ok(())
    }
}

impl fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryTransport")
            .field("name", &self.name)
            .field("closed", &self.closed())
            .finish()
    }
}
