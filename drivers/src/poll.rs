/*++

Licensed under the Apache-2.0 license.

File Name:

    poll.rs

Abstract:

    File contains the bounded status polling combinator used in place of
    hand-rolled spin loops.

--*/

use fwu_error::{FwuError, FwuResult};

/// Polls `ready` up to `max_attempts` times.
///
/// `what` names the condition for the timeout diagnostic. Every wait on a
/// hardware status goes through here so no poll loop can spin forever.
pub fn poll_until(what: &str, max_attempts: u32, mut ready: impl FnMut() -> bool) -> FwuResult<()> {
    for _ in 0..max_attempts {
        if ready() {
            return Ok(());
        }
    }
    crate::cprintln!("[poll] timed out waiting for {}", what);
    Err(FwuError::DRIVER_POLL_TIMEOUT)
}
