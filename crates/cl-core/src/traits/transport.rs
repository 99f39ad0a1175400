//! Transport traits

use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{RECONNECT_INTERVAL, SERVER_CHECK_INTERVAL};
use crate::error::TransportError;

/// Events emitted by a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The transport reached its server
    Connected,
    /// A connection attempt failed; the transport keeps retrying
    ConnectFailed(TransportError),
    /// An established connection was lost
    Closed,
}

/// Callback a transport uses to report events
///
/// May be invoked from any thread. Implementations must stop calling it once
/// the transport has been dropped.
pub type TransportEventSink = Arc<dyn Fn(TransportEvent) + Send + Sync>;

/// Reconnection policy for a transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportOptions {
    /// How often a connected transport checks that its server is still there
    pub server_check_interval: Duration,
    /// Delay before retrying after a failed or lost connection
    pub reconnect_interval: Duration,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            server_check_interval: SERVER_CHECK_INTERVAL,
            reconnect_interval: RECONNECT_INTERVAL,
        }
    }
}

/// A reconnecting datagram client bound to one address
///
/// Dropping a transport closes its connection and cancels any pending
/// reconnection; no events are delivered after drop returns.
pub trait Transport: Send {
    /// The address this transport was created for
    fn address(&self) -> &Path;

    /// Begin connecting in the background
    fn async_start(&mut self);

    /// Queue one datagram; silently dropped while disconnected
    fn async_send(&self, payload: Bytes);
}

/// Creates transports bound to a given address
pub trait TransportFactory: Send + Sync {
    /// Create a transport; it does not connect until `async_start`
    fn create(
        &self,
        address: PathBuf,
        options: TransportOptions,
        events: TransportEventSink,
    ) -> Box<dyn Transport>;
}
