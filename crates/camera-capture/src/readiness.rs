//! Bounded condition waiting

use std::time::Duration;

/// Poll `cond` until it returns true or `timeout` elapses.
///
/// Returns true if the condition held before the deadline. Used for
/// camera readiness and for settling delays during enrollment; replaces
/// ad hoc one-shot timers with a single primitive.
pub async fn wait_until<F>(mut cond: F, timeout: Duration, poll: Duration) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if cond() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(poll).await;
    }
}
