//! cl-core: Core abstractions and configuration for console-link
//!
//! This crate provides the shared types, error types, configuration and
//! collaborator traits (transport, session monitor) used by the client.

pub mod config;
pub mod error;
pub mod time;
pub mod traits;
pub mod types;

pub use error::{ConfigError, TransportError};
pub use types::{socket_directory, socket_file_path, SessionOwnerId};
