//! Public connection events

use tokio::sync::mpsc;

use cl_core::traits::TransportEvent;
use cl_core::TransportError;

/// Connection events relayed from the current transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Connected to the console user's receiver
    Connected,
    /// A connection attempt failed; retries continue
    ConnectFailed(TransportError),
    /// The connection was lost
    Closed,
}

impl From<TransportEvent> for ClientEvent {
    fn from(event: TransportEvent) -> Self {
        match event {
            TransportEvent::Connected => Self::Connected,
            TransportEvent::ConnectFailed(err) => Self::ConnectFailed(err),
            TransportEvent::Closed => Self::Closed,
        }
    }
}

/// Subscriber registry; only touched from dispatcher tasks
#[derive(Default)]
pub(crate) struct EventHub {
    subscribers: Vec<mpsc::UnboundedSender<ClientEvent>>,
}

impl EventHub {
    pub(crate) fn subscribe(&mut self, tx: mpsc::UnboundedSender<ClientEvent>) {
        self.subscribers.push(tx);
    }

    /// Deliver to every live subscriber, pruning closed ones
    pub(crate) fn emit(&mut self, event: ClientEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub(crate) fn clear(&mut self) {
        self.subscribers.clear();
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.subscribers.len()
    }
}
