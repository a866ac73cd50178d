pub mod transport;

pub use transport::{
    ErrorKind, MemoryTransport, Timeout, Transport, TransportConfig, TransportError,
    TransportResult, scoped, transport_timeout,
};
