//! Cooperative task lifecycle management over the kernel abstraction.
//!
//! Maps a task definition (setup, loop body, stack size, priority, core
//! affinity) onto a kernel task and tracks it in a fixed-capacity slot
//! table. Shutdown is cooperative: a stop flag is raised and the task is
//! given a bounded window to observe it between loop iterations.

use alloc::boxed::Box;
use alloc::sync::Arc;
use core::fmt::Write as _;
use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use embassy_time::Duration;
use heapless::String;

use crate::kernel::{CoreAffinity, Kernel, SpawnError, SpawnOptions};

/// Hard cap on concurrently tracked tasks.
pub const MAX_TASKS: usize = 10;

/// Stack size used when a definition does not specify one.
pub const DEFAULT_STACK_SIZE: usize = 1024;

/// Interval between checks for a stopping task reaching terminal state.
const STOP_POLL: Duration = Duration::from_millis(100);

/// Total time budget for a cooperative stop.
const STOP_BUDGET: Duration = Duration::from_millis(1000);

const TASK_NAME_CAPACITY: usize = 16;

/// Definition of a task to start.
#[derive(Debug, Clone, Copy)]
pub struct TaskDef {
    /// Task name; a `task-N` name is generated when absent
    pub name: Option<&'static str>,
    /// Requested stack size in bytes
    pub stack_size: usize,
    /// Kernel priority (higher runs first)
    pub priority: u8,
    /// Core placement
    pub core: CoreAffinity,
}

impl Default for TaskDef {
    fn default() -> Self {
        Self {
            name: None,
            stack_size: DEFAULT_STACK_SIZE,
            priority: 1,
            core: CoreAffinity::Core0,
        }
    }
}

/// Behavior of a scheduled task.
///
/// `setup` runs once on the new task before the first loop iteration; `run`
/// is invoked repeatedly until the task is stopped. `run` must not block
/// except briefly and cooperatively, so the stop flag is observed between
/// iterations.
pub trait TaskBody: Send {
    /// One-time initialization on the task's own context.
    fn setup(&mut self) {}

    /// One loop iteration.
    fn run(&mut self);
}

/// Task lifecycle state.
///
/// ```text
/// New ──(kernel runs entry)──> Executing ──(stop observed)──> Terminated
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TaskState {
    /// Submitted to the kernel, entry not yet running
    New = 0,
    /// Setup or loop body running
    Executing = 1,
    /// Loop exited after a stop request
    Terminated = 2,
}

impl TaskState {
    const fn from_raw(raw: u8) -> Self {
        match raw {
            0 => Self::New,
            1 => Self::Executing,
            _ => Self::Terminated,
        }
    }
}

/// Process-wide unique id of a started task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskId(u32);

impl TaskId {
    /// Raw numeric id.
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// State shared between the scheduler and the task entry.
struct TaskShared {
    state: AtomicU8,
    stop: AtomicBool,
}

/// Bookkeeping for one started task.
pub struct TaskWrapper {
    name: String<TASK_NAME_CAPACITY>,
    uid: TaskId,
    index: usize,
    stack_size: usize,
    priority: u8,
    core: CoreAffinity,
    shared: Arc<TaskShared>,
}

impl TaskWrapper {
    /// Task name.
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Unique id assigned at start.
    pub fn uid(&self) -> TaskId {
        self.uid
    }

    /// Slot index in the scheduler table.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Declared stack size in bytes.
    pub fn stack_size(&self) -> usize {
        self.stack_size
    }

    /// Kernel priority. Collaborators starting helper tasks conventionally
    /// derive theirs from this (same or one above).
    pub fn priority(&self) -> u8 {
        self.priority
    }

    /// Core placement.
    pub fn core(&self) -> CoreAffinity {
        self.core
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TaskState {
        TaskState::from_raw(self.shared.state.load(Ordering::Acquire))
    }
}

/// Errors reported by task control operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerError {
    /// No free slot in the task table
    SlotsExhausted,
    /// The kernel rejected the spawn request
    Spawn(SpawnError),
}

/// Fixed-capacity task table over an injected kernel.
///
/// The table is mutated only through `start_task`/`stop_task`; callers are
/// responsible for not racing concurrent calls against the same scheduler.
pub struct TaskScheduler {
    kernel: Arc<dyn Kernel>,
    slots: [Option<TaskWrapper>; MAX_TASKS],
    next_uid: u32,
}

impl TaskScheduler {
    /// Create a scheduler with an empty slot table.
    pub fn new(kernel: Arc<dyn Kernel>) -> Self {
        Self {
            kernel,
            slots: [const { None }; MAX_TASKS],
            next_uid: 1,
        }
    }

    /// Shared handle to the underlying kernel.
    pub fn kernel(&self) -> Arc<dyn Kernel> {
        self.kernel.clone()
    }

    /// Start a task from a definition and a boxed body.
    ///
    /// Finds a free slot, spawns the kernel task, and records the wrapper.
    /// Fails without mutating the table when the slot table is full or the
    /// kernel rejects the spawn; failed starts are not queued or retried.
    pub fn start_task(
        &mut self,
        def: &TaskDef,
        body: Box<dyn TaskBody>,
    ) -> Result<TaskId, SchedulerError> {
        let Some(index) = self.slots.iter().position(Option::is_none) else {
            log::error!("task table full ({MAX_TASKS} slots), cannot start task");
            return Err(SchedulerError::SlotsExhausted);
        };
        let uid = TaskId(self.next_uid);
        let name = task_name(def.name, uid);
        let shared = Arc::new(TaskShared {
            state: AtomicU8::new(TaskState::New as u8),
            stop: AtomicBool::new(false),
        });

        let entry_shared = shared.clone();
        let mut body = body;
        let entry = Box::new(move || {
            entry_shared.state.store(TaskState::Executing as u8, Ordering::Release);
            body.setup();
            while !entry_shared.stop.load(Ordering::Acquire) {
                body.run();
            }
            entry_shared.state.store(TaskState::Terminated as u8, Ordering::Release);
        });

        let options = SpawnOptions {
            name: name.as_str(),
            stack_size: def.stack_size,
            priority: def.priority,
            core: def.core,
        };
        if let Err(err) = self.kernel.spawn(&options, entry) {
            log::error!("kernel rejected task {}", name.as_str());
            return Err(SchedulerError::Spawn(err));
        }

        log::info!(
            "task {} started in slot {} (stack {}, priority {}, core mask {:#04x})",
            name.as_str(),
            index,
            def.stack_size,
            def.priority,
            def.core.mask()
        );
        self.slots[index] = Some(TaskWrapper {
            name,
            uid,
            index,
            stack_size: def.stack_size,
            priority: def.priority,
            core: def.core,
            shared,
        });
        self.next_uid += 1;
        Ok(uid)
    }

    /// Stop a task cooperatively.
    ///
    /// Raises the stop flag, then polls in 100 ms increments for up to 1 s
    /// for the task to reach terminal state. On success the slot is freed
    /// and `true` returned. On timeout the task is left running, the slot
    /// stays occupied, and `false` is returned; the leak is logged rather
    /// than silently retried.
    pub fn stop_task(&mut self, id: TaskId) -> bool {
        let Some(index) = self.slot_of(id) else {
            return false;
        };
        let Some(wrapper) = self.slots[index].as_ref() else {
            return false;
        };
        wrapper.shared.stop.store(true, Ordering::Release);

        let mut waited = Duration::from_millis(0);
        while wrapper.state() != TaskState::Terminated {
            if waited >= STOP_BUDGET {
                log::warn!(
                    "task {} did not stop within {}ms, leaving it running",
                    wrapper.name(),
                    STOP_BUDGET.as_millis()
                );
                return false;
            }
            self.kernel.sleep(STOP_POLL);
            waited += STOP_POLL;
        }
        log::info!("task {} stopped, slot {} freed", wrapper.name(), index);
        self.slots[index] = None;
        true
    }

    /// Look up a task by unique id.
    pub fn task(&self, id: TaskId) -> Option<&TaskWrapper> {
        self.slot_of(id).and_then(|index| self.slots[index].as_ref())
    }

    /// Look up a task by slot index.
    pub fn task_at(&self, index: usize) -> Option<&TaskWrapper> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    /// Look up a task by name.
    pub fn task_by_name(&self, name: &str) -> Option<&TaskWrapper> {
        self.slots
            .iter()
            .flatten()
            .find(|wrapper| wrapper.name() == name)
    }

    /// Number of free slots left in the table.
    pub fn available_slots(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_none()).count()
    }

    fn slot_of(&self, id: TaskId) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|wrapper| wrapper.uid == id))
    }
}

/// Resolve the name for a new task, generating one when the definition
/// leaves it out. Overlong names are truncated to the wrapper capacity.
fn task_name(given: Option<&'static str>, uid: TaskId) -> String<TASK_NAME_CAPACITY> {
    let mut name = String::new();
    match given {
        Some(text) => {
            for ch in text.chars() {
                if name.push(ch).is_err() {
                    break;
                }
            }
        }
        None => {
            let _ = write!(name, "task-{}", uid.raw());
        }
    }
    name
}
