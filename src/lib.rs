#![no_std]

extern crate alloc;

pub mod driver;
pub mod effect;
pub mod kernel;
pub mod persist;
pub mod queue;
pub mod registry;
pub mod rendezvous;
pub mod scheduler;
pub mod storage;

pub use driver::{FxTask, TickPacer, TickResult};
pub use effect::machine::{EffectMachine, EffectState};
pub use effect::{DEFAULT_BRIGHTNESS, EFFECT_ID_LEN, Effect, EffectId, EffectInfo, derive_effect_id};
pub use kernel::{CoreAffinity, Kernel, SpawnError, SpawnOptions, TaskEntry};
pub use persist::{FX_STATE_FILE, FxState, read_fx_state, save_fx_state};
pub use queue::{MessageQueue, TryReceiveError, TrySendError};
pub use registry::{
    AdvanceMode, EffectRegistry, HistoryEntry, MAX_EFFECTS_HISTORY, RegistryConfig,
};
pub use rendezvous::Rendezvous;
pub use scheduler::{
    MAX_TASKS, SchedulerError, TaskBody, TaskDef, TaskId, TaskScheduler, TaskState, TaskWrapper,
};
pub use storage::gateway::{
    ListVisitor, STORAGE_OP_TIMEOUT, STORAGE_QUEUE_DEPTH, StorageTask, SyncedStorage,
};
pub use storage::mem::MemVolume;
pub use storage::{FileInfo, StorageBackend};

pub use embassy_time::{Duration, Instant};
pub use smart_leds::RGB8;

/// Abstract render surface trait
///
/// Implement this trait to bridge the effect engine to a concrete pixel
/// pipeline. The engine never interprets pixel data; wind-down hooks call
/// these operations to fade the outgoing frame and drive the transition
/// choreography between two effects.
pub trait RenderSurface {
    /// Blend the whole surface toward `color` by `amount` (0..=255)
    fn blend(&mut self, color: RGB8, amount: u8);

    /// Push the current frame to the pixels at the given brightness
    fn show(&mut self, brightness: u8);

    /// Arm the transition choreography, seeded for variant selection
    fn prepare(&mut self, seed: u16);

    /// Advance the transition choreography one step
    ///
    /// Returns true once the choreography has finished.
    fn transition(&mut self) -> bool;
}

/// Sink for registry lifecycle events
///
/// The registry announces committed effect changes through this trait so a
/// broadcast/network collaborator can fan them out. Implementations must not
/// block; the call happens on the task driving the effect loop.
pub trait EventSink {
    /// An effect change was committed; `index` is the new active effect
    fn effect_changed(&mut self, index: u16);
}

/// No-op event sink for hosts without a broadcast collaborator.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn effect_changed(&mut self, _index: u16) {}
}
