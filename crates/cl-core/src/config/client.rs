//! Client configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::types::{socket_file_path, SessionOwnerId};

/// What to do with the current transport when the console session ends
/// without a new owner (logout, fast user switching to the login window)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbsentOwnerPolicy {
    /// Destroy the transport; sends are dropped until a new owner appears
    #[default]
    Close,
    /// Keep talking to the last owner's socket until a new owner appears
    KeepLast,
}

/// Configuration for the console user client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Root directory holding one socket directory per user id
    pub socket_root_dir: PathBuf,

    /// Device whose owner is the console user
    pub console_device: PathBuf,

    /// Behaviour when the console session owner becomes absent
    pub absent_owner_policy: AbsentOwnerPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            socket_root_dir: PathBuf::from("/var/run/console-link/user"),
            console_device: PathBuf::from("/dev/console"),
            absent_owner_policy: AbsentOwnerPolicy::default(),
        }
    }
}

impl ClientConfig {
    /// Receiver socket path for a session owner
    pub fn socket_path(&self, owner: SessionOwnerId) -> PathBuf {
        socket_file_path(&self.socket_root_dir, owner)
    }

    /// Root directory for per-user sockets
    pub fn socket_root(&self) -> &Path {
        &self.socket_root_dir
    }
}
