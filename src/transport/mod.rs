// Transport module - the contract every ADB carrier (TCP socket, USB endpoint)
// implements, plus the timeout policy and error taxonomy they share.

pub mod config;
pub mod error;
pub mod memory;
pub mod reraise;
pub mod timeout;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export the main types and functions for easy access
pub use config::TransportConfig;
pub use error::{BoxError, ConfigError, ErrorKind, TransportError, TransportResult};
pub use memory::MemoryTransport;
pub use reraise::{AnyError, Catch, Reraise, Reraised, reraise, reraise_as, reraise_timeout};
pub use timeout::{Timeout, transport_timeout, with_deadline};
pub use types::{Transport, scoped};
