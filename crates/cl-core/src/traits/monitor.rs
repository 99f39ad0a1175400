//! Session monitor trait

use std::sync::Arc;
use std::time::Duration;

use crate::types::SessionOwnerId;

/// Callback a monitor uses to report the console session owner
///
/// `None` means no user owns the console.
pub type OwnerChangeSink = Arc<dyn Fn(Option<SessionOwnerId>) + Send + Sync>;

/// Observes the active console user
pub trait SessionMonitor: Send {
    /// Start observing; the sink is called once per change.
    ///
    /// Calling this while already started replaces the sink.
    fn async_start(&mut self, poll_interval: Duration, sink: OwnerChangeSink);

    /// Stop observing and release the sink
    fn async_stop(&mut self);
}
