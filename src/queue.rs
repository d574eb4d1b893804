//! Bounded message queue for inter-task handoffs.
//!
//! A fixed-capacity FIFO built on `critical-section` and `heapless::Deque`,
//! safe to share between tasks and interrupt contexts. Messages are owned
//! values; a successful send transfers ownership to the receiving task.
//! Bounded-blocking variants poll in short kernel sleeps so the calling task
//! yields while it waits.

use core::cell::RefCell;

use critical_section::Mutex;
use embassy_time::Duration;
use heapless::Deque;

use crate::kernel::Kernel;

/// Poll interval for the bounded-blocking queue operations.
const QUEUE_POLL: Duration = Duration::from_millis(1);

/// Error returned when trying to send to a full queue.
///
/// Carries the rejected message back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrySendError<T>(pub T);

/// Error returned when trying to receive from an empty queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TryReceiveError;

/// A bounded, thread-safe FIFO message queue.
///
/// Uses critical sections for synchronization, making it suitable for
/// embedded environments. Backed by a fixed-size `heapless::Deque`; messages
/// within one queue are delivered in send order.
pub struct MessageQueue<T, const DEPTH: usize> {
    inner: Mutex<RefCell<Deque<T, DEPTH>>>,
}

impl<T, const DEPTH: usize> MessageQueue<T, DEPTH> {
    /// Create a new empty queue.
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(Deque::new())),
        }
    }

    /// Try to send a message without blocking.
    ///
    /// Returns `Err(TrySendError(message))` if the queue is full.
    pub fn try_send(&self, message: T) -> Result<(), TrySendError<T>> {
        critical_section::with(|cs| {
            let mut queue = self.inner.borrow(cs).borrow_mut();
            queue.push_back(message).map_err(TrySendError)
        })
    }

    /// Try to receive a message without blocking.
    ///
    /// Returns `Err(TryReceiveError)` if the queue is empty.
    pub fn try_receive(&self) -> Result<T, TryReceiveError> {
        critical_section::with(|cs| {
            let mut queue = self.inner.borrow(cs).borrow_mut();
            queue.pop_front().ok_or(TryReceiveError)
        })
    }

    /// Number of messages currently queued.
    pub fn len(&self) -> usize {
        critical_section::with(|cs| self.inner.borrow(cs).borrow().len())
    }

    /// Whether the queue holds no messages.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Send a message, waiting up to `timeout` for free capacity.
    ///
    /// The wait is cooperative: the calling task sleeps in short slices via
    /// the kernel between attempts. On timeout the message is handed back in
    /// the error, so nothing is lost.
    pub fn send_timeout(
        &self,
        message: T,
        timeout: Duration,
        kernel: &dyn Kernel,
    ) -> Result<(), TrySendError<T>> {
        let mut message = message;
        let mut waited = Duration::from_millis(0);
        loop {
            match self.try_send(message) {
                Ok(()) => return Ok(()),
                Err(TrySendError(rejected)) => {
                    if waited >= timeout {
                        return Err(TrySendError(rejected));
                    }
                    kernel.sleep(QUEUE_POLL);
                    waited += QUEUE_POLL;
                    message = rejected;
                }
            }
        }
    }

    /// Receive a message, waiting up to `timeout` for one to arrive.
    ///
    /// Returns `None` if the timeout elapses with the queue still empty.
    pub fn receive_timeout(&self, timeout: Duration, kernel: &dyn Kernel) -> Option<T> {
        let mut waited = Duration::from_millis(0);
        loop {
            if let Ok(message) = self.try_receive() {
                return Some(message);
            }
            if waited >= timeout {
                return None;
            }
            kernel.sleep(QUEUE_POLL);
            waited += QUEUE_POLL;
        }
    }
}

impl<T, const DEPTH: usize> Default for MessageQueue<T, DEPTH> {
    fn default() -> Self {
        Self::new()
    }
}
