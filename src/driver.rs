//! Tick pacing and the main effect-engine task.
//!
//! Provides drift-corrected pacing without async/await or platform-specific
//! timers, and the task body that drives the registry at that pace. The
//! pacer only computes deadlines; sleeping is the caller's job.

use alloc::boxed::Box;
use alloc::sync::Arc;

use embassy_time::{Duration, Instant};

use crate::kernel::Kernel;
use crate::persist::{FxState, read_fx_state, save_fx_state};
use crate::registry::EffectRegistry;
use crate::scheduler::TaskBody;
use crate::storage::gateway::SyncedStorage;
use crate::{EventSink, RenderSurface};

/// Default effect engine tick rate (90 ticks per second).
pub const DEFAULT_TICK_HZ: u32 = 90;

/// Default tick period based on the target rate.
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_millis(1000 / DEFAULT_TICK_HZ as u64);

/// Result of one pacing step.
#[derive(Debug, Clone, Copy)]
pub struct TickResult {
    /// The deadline for the next tick.
    pub next_deadline: Instant,
    /// How long to wait until the next tick (zero if behind schedule).
    pub sleep_duration: Duration,
}

/// Drift-corrected tick pacer.
///
/// Tracks the next deadline across ticks. If the caller has fallen behind
/// by more than two periods, the backlog is skipped instead of replayed in
/// a catch-up burst after a stall.
pub struct TickPacer {
    next_tick: Instant,
    period: Duration,
}

impl TickPacer {
    /// Pacer at the default tick rate.
    pub fn new() -> Self {
        Self::with_period(DEFAULT_TICK_PERIOD)
    }

    /// Pacer with a custom tick period.
    pub fn with_period(period: Duration) -> Self {
        Self {
            next_tick: Instant::from_millis(0),
            period,
        }
    }

    /// Account for one tick at `now` and compute the wait for the next.
    pub fn tick(&mut self, now: Instant) -> TickResult {
        // Drift correction: reset instead of bursting through the backlog
        let max_drift_ms = self.period.as_millis() * 2;
        if now.as_millis() > self.next_tick.as_millis() + max_drift_ms {
            self.next_tick = now;
        }

        self.next_tick += self.period;

        let sleep_duration = if self.next_tick.as_millis() > now.as_millis() {
            Duration::from_millis(self.next_tick.as_millis() - now.as_millis())
        } else {
            Duration::from_millis(0)
        };

        TickResult {
            next_deadline: self.next_tick,
            sleep_duration,
        }
    }
}

impl Default for TickPacer {
    fn default() -> Self {
        Self::new()
    }
}

/// Main application task: drives the registry at the paced tick rate.
///
/// Owns the registry, the render surface, and the event sink; start it
/// through the task scheduler. Each iteration runs one registry tick, saves
/// the persisted fields when they changed, and sleeps out the remainder of
/// the period.
pub struct FxTask {
    registry: EffectRegistry,
    surface: Box<dyn RenderSurface + Send>,
    events: Box<dyn EventSink + Send>,
    pacer: TickPacer,
    kernel: Arc<dyn Kernel>,
    storage: Option<SyncedStorage>,
    last_saved: Option<FxState>,
}

impl FxTask {
    /// Assemble the effect-engine task.
    pub fn new(
        registry: EffectRegistry,
        surface: Box<dyn RenderSurface + Send>,
        events: Box<dyn EventSink + Send>,
        kernel: Arc<dyn Kernel>,
    ) -> Self {
        Self {
            registry,
            surface,
            events,
            pacer: TickPacer::new(),
            kernel,
            storage: None,
            last_saved: None,
        }
    }

    /// Attach the storage gateway for state persistence.
    ///
    /// With storage attached, setup restores the saved state and each tick
    /// saves the persisted fields whenever they changed.
    pub fn with_storage(mut self, storage: SyncedStorage) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Replace the default pacer.
    pub fn with_pacer(mut self, pacer: TickPacer) -> Self {
        self.pacer = pacer;
        self
    }

    /// Read access to the registry.
    pub fn registry(&self) -> &EffectRegistry {
        &self.registry
    }

    /// Mutable access to the registry, for control surfaces sharing the
    /// driving task.
    pub fn registry_mut(&mut self) -> &mut EffectRegistry {
        &mut self.registry
    }

    fn save_if_dirty(&mut self) {
        let Some(storage) = &self.storage else {
            return;
        };
        let snapshot = self.registry.persisted();
        if self.last_saved != Some(snapshot) && save_fx_state(storage, &self.registry) {
            self.last_saved = Some(snapshot);
        }
    }
}

impl TaskBody for FxTask {
    fn setup(&mut self) {
        let now = self.kernel.now();
        self.registry.setup(now);
        if let Some(storage) = self.storage.clone() {
            read_fx_state(&storage, &mut self.registry, now);
            self.last_saved = Some(self.registry.persisted());
        }
    }

    fn run(&mut self) {
        let now = self.kernel.now();
        self.registry
            .loop_tick(now, &mut *self.surface, &mut *self.events);
        self.save_if_dirty();
        let step = self.pacer.tick(now);
        self.kernel.sleep(step.sleep_duration);
    }
}
