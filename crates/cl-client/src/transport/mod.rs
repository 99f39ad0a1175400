//! Transports to the console user's receiver socket

#[cfg(unix)]
mod datagram;

#[cfg(unix)]
pub use datagram::{DatagramTransport, DatagramTransportFactory};
