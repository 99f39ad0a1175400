//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// File name of the receiver socket inside a user's socket directory
pub const RECEIVER_SOCKET_NAME: &str = "receiver";

/// User id owning the active console session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionOwnerId(pub u32);

impl SessionOwnerId {
    /// Create a new owner id
    pub fn new(uid: u32) -> Self {
        Self(uid)
    }

    /// Get the raw uid
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for SessionOwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for SessionOwnerId {
    fn from(uid: u32) -> Self {
        Self(uid)
    }
}

/// Per-user socket directory: `<root>/<uid>`
pub fn socket_directory(root: &Path, owner: SessionOwnerId) -> PathBuf {
    root.join(owner.to_string())
}

/// Per-user receiver socket: `<root>/<uid>/receiver`
pub fn socket_file_path(root: &Path, owner: SessionOwnerId) -> PathBuf {
    socket_directory(root, owner).join(RECEIVER_SOCKET_NAME)
}
