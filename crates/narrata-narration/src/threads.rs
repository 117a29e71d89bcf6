//! Bounded thread joins.

use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Join `handle`, waiting at most `timeout`.
///
/// Returns `false` if the thread is still running when the bound expires;
/// the handle is dropped and the thread is left to die with the process.
pub(crate) fn join_with_timeout(handle: JoinHandle<()>, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    handle.join().is_ok()
}
