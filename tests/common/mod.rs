#![allow(dead_code)]

//! Shared host-side test harness: a std-thread kernel, a recording render
//! surface, counting effects, and event sinks.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use embassy_time::{Duration, Instant};
use lightfx_conductor::{
    DEFAULT_BRIGHTNESS, Effect, EffectRegistry, EffectState, EventSink, Kernel, RGB8,
    RegistryConfig, RenderSurface, SpawnError, SpawnOptions, TaskEntry,
};

/// Kernel over std threads for host tests.
///
/// Spawned tasks keep the host's default stack; the requested stack size,
/// priority, and core placement only matter on target kernels.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostKernel;

impl Kernel for HostKernel {
    fn spawn(&self, options: &SpawnOptions<'_>, entry: TaskEntry) -> Result<(), SpawnError> {
        thread::Builder::new()
            .name(options.name.to_string())
            .spawn(entry)
            .map(|_| ())
            .map_err(|_| SpawnError)
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(std::time::Duration::from_millis(duration.as_millis()));
    }

    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Kernel that rejects every spawn, for failure-path tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct RejectingKernel;

impl Kernel for RejectingKernel {
    fn spawn(&self, _options: &SpawnOptions<'_>, _entry: TaskEntry) -> Result<(), SpawnError> {
        Err(SpawnError)
    }

    fn sleep(&self, _duration: Duration) {}

    fn now(&self) -> Instant {
        Instant::from_millis(0)
    }
}

/// Render surface that records the calls made against it.
///
/// `transition` reports done once it has been polled `transition_after`
/// times since the last `prepare`; the default of zero finishes a wind-down
/// on its first poll.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    pub blends: usize,
    pub shows: usize,
    pub prepares: usize,
    pub transition_steps: usize,
    pub transition_after: usize,
}

impl RenderSurface for RecordingSurface {
    fn blend(&mut self, _color: RGB8, _amount: u8) {
        self.blends += 1;
    }

    fn show(&mut self, _brightness: u8) {
        self.shows += 1;
    }

    fn prepare(&mut self, _seed: u16) {
        self.prepares += 1;
        self.transition_steps = 0;
    }

    fn transition(&mut self) -> bool {
        self.transition_steps += 1;
        self.transition_steps >= self.transition_after
    }
}

/// Effect that counts its hook invocations.
pub struct CountingEffect {
    description: &'static str,
    weight: u8,
    setups: Arc<AtomicUsize>,
    runs: Arc<AtomicUsize>,
}

impl CountingEffect {
    pub fn new(description: &'static str) -> Self {
        Self {
            description,
            weight: 1,
            setups: Arc::default(),
            runs: Arc::default(),
        }
    }

    pub fn with_weight(mut self, weight: u8) -> Self {
        self.weight = weight;
        self
    }

    /// Shared (setup, run) invocation counters, observable after the effect
    /// moves into a registry.
    pub fn counters(&self) -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
        (self.setups.clone(), self.runs.clone())
    }
}

impl Effect for CountingEffect {
    fn description(&self) -> &str {
        self.description
    }

    fn setup(&mut self, _surface: &mut dyn RenderSurface) {
        self.setups.fetch_add(1, Ordering::Relaxed);
    }

    fn run(&mut self, _now: Instant, surface: &mut dyn RenderSurface) {
        self.runs.fetch_add(1, Ordering::Relaxed);
        surface.show(DEFAULT_BRIGHTNESS);
    }

    fn selection_weight(&self) -> u8 {
        self.weight
    }
}

/// Event sink collecting committed effect changes.
#[derive(Debug, Default)]
pub struct RecordingEvents {
    pub changes: Vec<u16>,
}

impl EventSink for RecordingEvents {
    fn effect_changed(&mut self, index: u16) {
        self.changes.push(index);
    }
}

/// Cloneable event sink readable after the original moved into a task.
#[derive(Clone, Default)]
pub struct SharedEvents {
    changes: Arc<Mutex<Vec<u16>>>,
}

impl SharedEvents {
    pub fn snapshot(&self) -> Vec<u16> {
        self.changes.lock().unwrap().clone()
    }
}

impl EventSink for SharedEvents {
    fn effect_changed(&mut self, index: u16) {
        self.changes.lock().unwrap().push(index);
    }
}

/// Registry with one counting effect per description.
pub fn registry_with(descriptions: &[&'static str]) -> EffectRegistry {
    let mut registry = EffectRegistry::new(&RegistryConfig::default());
    for description in descriptions {
        registry.register_effect(Box::new(CountingEffect::new(description)));
    }
    registry
}

/// Tick the registry in 100 ms steps until `expected` is the running active
/// effect. Returns the next free timestamp. Panics after 200 ticks; a full
/// unwind takes about 16.
pub fn run_until_running(
    registry: &mut EffectRegistry,
    surface: &mut RecordingSurface,
    events: &mut RecordingEvents,
    start_ms: u64,
    expected: u16,
) -> u64 {
    let mut t = start_ms;
    for _ in 0..200 {
        registry.loop_tick(Instant::from_millis(t), surface, events);
        t += 100;
        let running = registry
            .effect(expected)
            .is_some_and(|machine| machine.state() == EffectState::Running);
        if registry.active_effect_pos() == expected && running {
            return t;
        }
    }
    panic!("effect {expected} never reached running");
}
