//! One-shot rendezvous between a requesting task and a completing task.
//!
//! Each synchronous gateway call allocates a fresh rendezvous and ships it
//! with the request, so completions can never clobber another caller's
//! pending result. The completing side stores exactly one value; the waiting
//! side polls cooperatively with a bounded timeout.

use core::cell::RefCell;

use critical_section::Mutex;
use embassy_time::Duration;

use crate::kernel::Kernel;

/// Poll interval while waiting on a completion.
const RENDEZVOUS_POLL: Duration = Duration::from_millis(1);

/// Single-use completion slot shared between two tasks.
pub struct Rendezvous<T> {
    slot: Mutex<RefCell<Option<T>>>,
}

impl<T> Rendezvous<T> {
    /// Create an empty rendezvous.
    pub const fn new() -> Self {
        Self {
            slot: Mutex::new(RefCell::new(None)),
        }
    }

    /// Deliver the completion value.
    ///
    /// Intended to be called once; a repeated completion before the waiter
    /// claims the slot replaces the unclaimed value.
    pub fn complete(&self, value: T) {
        critical_section::with(|cs| {
            self.slot.borrow(cs).replace(Some(value));
        });
    }

    /// Claim the completion value if one has been delivered.
    pub fn try_take(&self) -> Option<T> {
        critical_section::with(|cs| self.slot.borrow(cs).take())
    }

    /// Wait up to `timeout` for the completion value.
    ///
    /// Sleeps in short kernel slices between polls. Returns `None` if the
    /// timeout elapses first; the request keeps running on the completing
    /// task regardless, a timed-out wait does not retract it.
    pub fn wait(&self, timeout: Duration, kernel: &dyn Kernel) -> Option<T> {
        let mut waited = Duration::from_millis(0);
        loop {
            if let Some(value) = self.try_take() {
                return Some(value);
            }
            if waited >= timeout {
                return None;
            }
            kernel.sleep(RENDEZVOUS_POLL);
            waited += RENDEZVOUS_POLL;
        }
    }
}

impl<T> Default for Rendezvous<T> {
    fn default() -> Self {
        Self::new()
    }
}
