//! Kernel abstraction for task spawning, delays, and monotonic time.
//!
//! The crate never talks to an RTOS directly. Platforms implement [`Kernel`]
//! over their native primitives (FreeRTOS tasks, std threads on a host) and
//! everything else is built on top of it.

use alloc::boxed::Box;

use embassy_time::{Duration, Instant};

/// Core placement for a spawned task on a dual-core target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoreAffinity {
    /// Pin to the first core
    #[default]
    Core0,
    /// Pin to the second core
    Core1,
    /// Let the kernel place the task on either core
    Any,
}

impl CoreAffinity {
    /// Affinity expressed as a core bitmask (bit 0 = core 0, bit 1 = core 1).
    pub const fn mask(self) -> u8 {
        match self {
            Self::Core0 => 0x01,
            Self::Core1 => 0x02,
            Self::Any => 0xFF,
        }
    }
}

/// Parameters for a kernel task spawn request.
#[derive(Debug, Clone, Copy)]
pub struct SpawnOptions<'a> {
    /// Task name, for diagnostics
    pub name: &'a str,
    /// Requested stack size in bytes
    pub stack_size: usize,
    /// Kernel priority (higher runs first)
    pub priority: u8,
    /// Core placement
    pub core: CoreAffinity,
}

/// Error returned when the kernel rejects a spawn request,
/// typically for lack of memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpawnError;

/// Entry point handed to the kernel; runs once on the new task.
pub type TaskEntry = Box<dyn FnOnce() + Send>;

/// Minimal surface of the underlying real-time kernel.
///
/// `sleep` is a cooperative bounded delay of the calling task. All blocking
/// with timeout in this crate is built from counted `sleep` slices, so any
/// kernel with a millisecond-grained delay can host the engine. `now` is the
/// monotonic time source used to stamp transition timers.
pub trait Kernel: Send + Sync {
    /// Create a kernel task running `entry`.
    fn spawn(&self, options: &SpawnOptions<'_>, entry: TaskEntry) -> Result<(), SpawnError>;

    /// Suspend the calling task for at least `duration`.
    fn sleep(&self, duration: Duration);

    /// Current monotonic time.
    fn now(&self) -> Instant;
}
