//! Collaborator traits
//!
//! The connection manager does not know how sockets reconnect or how the
//! console user is detected; it drives these traits instead.

mod monitor;
mod transport;

pub use monitor::{OwnerChangeSink, SessionMonitor};
pub use transport::{Transport, TransportEvent, TransportEventSink, TransportFactory, TransportOptions};
