//! Console user observation

mod console_user;

pub use console_user::{ConsoleUserMonitor, ConsoleUserProbe};

#[cfg(unix)]
pub use console_user::DeviceOwnerProbe;
