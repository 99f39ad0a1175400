//! Polling console user monitor
//!
//! The monitor asks a [`ConsoleUserProbe`] for the console user once per
//! poll interval and reports only changes. The first successful poll after
//! start always reports, so a fresh subscriber learns the current owner.
//!
//! Probes may block; each reading runs on the blocking thread pool.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use cl_core::traits::{OwnerChangeSink, SessionMonitor};
use cl_core::SessionOwnerId;

/// Source of the current console user
pub trait ConsoleUserProbe: Send + Sync + 'static {
    /// The user owning the console, or `None` when nobody is logged in
    fn console_user(&self) -> io::Result<Option<SessionOwnerId>>;
}

/// Reports the owner of the console device as the console user
///
/// Root owning the device means the login window has the console, which is
/// reported as no user.
#[cfg(unix)]
#[derive(Debug, Clone)]
pub struct DeviceOwnerProbe {
    device: std::path::PathBuf,
}

#[cfg(unix)]
impl DeviceOwnerProbe {
    /// Probe the owner of `device` (normally `/dev/console`)
    pub fn new(device: impl Into<std::path::PathBuf>) -> Self {
        Self {
            device: device.into(),
        }
    }
}

#[cfg(unix)]
impl ConsoleUserProbe for DeviceOwnerProbe {
    fn console_user(&self) -> io::Result<Option<SessionOwnerId>> {
        use std::os::unix::fs::MetadataExt;

        match std::fs::metadata(&self.device) {
            Ok(metadata) => Ok(match metadata.uid() {
                0 => None,
                uid => Some(SessionOwnerId::new(uid)),
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Polls a probe on a tokio runtime and reports console user changes
pub struct ConsoleUserMonitor {
    runtime: Handle,
    probe: Arc<dyn ConsoleUserProbe>,
    cancel: Option<CancellationToken>,
}

impl ConsoleUserMonitor {
    /// Create a stopped monitor
    pub fn new(runtime: Handle, probe: Arc<dyn ConsoleUserProbe>) -> Self {
        Self {
            runtime,
            probe,
            cancel: None,
        }
    }

    /// True while a poll loop is running
    pub fn is_running(&self) -> bool {
        self.cancel.is_some()
    }
}

impl SessionMonitor for ConsoleUserMonitor {
    fn async_start(&mut self, poll_interval: Duration, sink: OwnerChangeSink) {
        self.async_stop();

        let cancel = CancellationToken::new();
        self.runtime.spawn(poll_loop(
            Arc::clone(&self.probe),
            poll_interval,
            sink,
            cancel.clone(),
        ));
        self.cancel = Some(cancel);
    }

    fn async_stop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
    }
}

impl Drop for ConsoleUserMonitor {
    fn drop(&mut self) {
        self.async_stop();
    }
}

async fn poll_loop(
    probe: Arc<dyn ConsoleUserProbe>,
    poll_interval: Duration,
    sink: OwnerChangeSink,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last: Option<Option<SessionOwnerId>> = None;

    loop {
        let reading = tokio::select! {
            _ = cancel.cancelled() => break,
            reading = next_reading(&mut ticker, &probe) => reading,
        };

        let current = match reading {
            Ok(current) => current,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read console user");
                continue;
            }
        };

        if last != Some(current) {
            tracing::debug!(owner = ?current, "Console user observed");
            last = Some(current);
            sink(current);
        }
    }

    tracing::debug!("Console user monitor stopped");
}

/// Wait for the next tick, then query the probe off the runtime threads
async fn next_reading(
    ticker: &mut tokio::time::Interval,
    probe: &Arc<dyn ConsoleUserProbe>,
) -> io::Result<Option<SessionOwnerId>> {
    ticker.tick().await;

    let probe = Arc::clone(probe);
    tokio::task::spawn_blocking(move || probe.console_user())
        .await
        .map_err(io::Error::other)?
}
