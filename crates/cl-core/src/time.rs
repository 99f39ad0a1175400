//! Time utilities for console-link

use std::sync::OnceLock;
use std::time::Instant;

use cl_protocol::AbsoluteTime;

fn process_epoch() -> Instant {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    *EPOCH.get_or_init(Instant::now)
}

/// Current monotonic time as an opaque timestamp token.
///
/// Tokens are nanoseconds since the first call in this process, so they are
/// only comparable within one process.
///
/// # Examples
/// ```
/// use cl_core::time::monotonic_now;
///
/// let a = monotonic_now();
/// let b = monotonic_now();
/// assert!(b >= a);
/// ```
pub fn monotonic_now() -> AbsoluteTime {
    let nanos = process_epoch().elapsed().as_nanos();
    AbsoluteTime::new(u64::try_from(nanos).unwrap_or(u64::MAX))
}
