//! cl-client: console-link client
//!
//! Runs inside a privileged, session-less process and keeps a datagram
//! connection to the companion receiver of whichever user currently owns
//! the console. Commands are encoded with `cl-protocol` and sent over that
//! connection; console user changes swap the connection underneath.

pub mod dispatcher;
pub mod events;
pub mod manager;
pub mod monitor;
pub mod transport;

pub use dispatcher::{Dispatcher, DispatcherClient};
pub use events::ClientEvent;
pub use manager::ConnectionManager;
