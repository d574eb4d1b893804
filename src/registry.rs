//! Effect inventory, sequencing, and selection policy.
//!
//! The registry owns every registered effect (insertion order is cycle
//! order, indices are stable for the process lifetime) and mediates what
//! runs next. Cursor moves never tear an effect down mid-run: the outgoing
//! effect is asked to unwind to idle through its state machine, and the
//! hand-off commits only once it gets there.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;

use embassy_time::{Duration, Instant};
use heapless::Deque;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::effect::machine::{EffectMachine, EffectState};
use crate::effect::{Effect, EffectInfo};
use crate::persist::FxState;
use crate::{EventSink, RenderSurface};

/// Capacity of the effect history ring.
pub const MAX_EFFECTS_HISTORY: usize = 20;

/// Default period between automatic effect advances.
pub const DEFAULT_AUTO_ADVANCE: Duration = Duration::from_secs(300);

/// Bounded re-draws when a random pick landed in recent history.
const RANDOM_DRAW_ATTEMPTS: usize = 8;

/// How the auto-advance timer selects the next effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdvanceMode {
    /// Registration order, wrapping
    Sequential,
    /// Weighted random draw
    #[default]
    Random,
}

/// Registry construction parameters.
#[derive(Debug, Clone, Copy)]
pub struct RegistryConfig {
    /// Period between automatic advances while enabled
    pub auto_advance_period: Duration,
    /// Selection mode for automatic advances
    pub advance_mode: AdvanceMode,
    /// Seed for the selection RNG
    pub rng_seed: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            auto_advance_period: DEFAULT_AUTO_ADVANCE,
            advance_mode: AdvanceMode::Random,
            rng_seed: 1,
        }
    }
}

/// One reported history record.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    /// Registry index of the retired effect
    pub index: u16,
    /// Its short id
    pub name: String,
}

/// Bounded FIFO of recently retired effect indices, oldest first.
#[derive(Default)]
struct HistoryRing {
    entries: Deque<u16, MAX_EFFECTS_HISTORY>,
}

impl HistoryRing {
    fn record(&mut self, index: u16) {
        if self.entries.is_full() {
            let _ = self.entries.pop_front();
        }
        let _ = self.entries.push_back(index);
    }

    fn contains(&self, index: u16) -> bool {
        self.entries.iter().any(|&entry| entry == index)
    }
}

/// Owner and sequencer of all effects.
///
/// Strictly single-threaded: only the task driving [`Self::loop_tick`] may
/// call mutation methods. The `cursor` is the nominal current effect; the
/// `active` index is the effect actually being driven, which lags the cursor
/// while the outgoing effect unwinds and diverges from it during sleep.
pub struct EffectRegistry {
    effects: Vec<EffectMachine>,
    history: HistoryRing,
    cursor: u16,
    active: u16,
    sleep_effect: u16,
    auto_advance: bool,
    sleep_enabled: bool,
    asleep: bool,
    advance_mode: AdvanceMode,
    advance_period: Duration,
    last_advance: Option<Instant>,
    rng: SmallRng,
}

impl EffectRegistry {
    /// Create an empty registry.
    pub fn new(config: &RegistryConfig) -> Self {
        Self {
            effects: Vec::new(),
            history: HistoryRing::default(),
            cursor: 0,
            active: 0,
            sleep_effect: 0,
            auto_advance: true,
            sleep_enabled: false,
            asleep: false,
            advance_mode: config.advance_mode,
            advance_period: config.auto_advance_period,
            last_advance: None,
            rng: SmallRng::seed_from_u64(config.rng_seed),
        }
    }

    /// Register an effect, returning its stable index.
    ///
    /// Append-only; intended for the one-time registration phase at startup.
    /// There is no de-registration.
    pub fn register_effect(&mut self, behavior: Box<dyn Effect>) -> u16 {
        let index = self.effects.len() as u16;
        let machine = EffectMachine::new(behavior, index);
        log::info!(
            "effect {} [{}] registered at index {}",
            machine.name(),
            machine.description(),
            index
        );
        self.effects.push(machine);
        index
    }

    /// Designate the effect rendered while asleep.
    pub fn set_sleep_effect(&mut self, index: u16) {
        if index < self.size() {
            self.sleep_effect = index;
        } else {
            log::warn!("sleep effect index {index} out of range, ignored");
        }
    }

    /// Number of registered effects.
    pub fn size(&self) -> u16 {
        self.effects.len() as u16
    }

    /// Whether no effects are registered yet.
    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Bounds-checked effect lookup.
    pub fn effect(&self, index: u16) -> Option<&EffectMachine> {
        self.effects.get(usize::from(index))
    }

    /// The effect the cursor points at.
    pub fn current_effect(&self) -> Option<&EffectMachine> {
        self.effect(self.cursor)
    }

    /// Cursor position.
    pub fn cur_effect_pos(&self) -> u16 {
        self.cursor
    }

    /// Index of the effect currently being driven.
    ///
    /// Lags [`Self::cur_effect_pos`] until a pending hand-off commits.
    pub fn active_effect_pos(&self) -> u16 {
        self.active
    }

    /// Find an effect index by its derived short id.
    pub fn find_effect(&self, id: &str) -> Option<u16> {
        self.effects
            .iter()
            .position(|machine| machine.name() == id)
            .map(|index| index as u16)
    }

    /// Arm every registered effect for its initial run.
    ///
    /// Part of startup: requests each machine toward `Setup` and starts the
    /// auto-advance clock.
    pub fn setup(&mut self, now: Instant) {
        for machine in &mut self.effects {
            machine.request(EffectState::Setup, now);
        }
        self.last_advance = Some(now);
    }

    /// Advance the cursor to the next index in registration order.
    ///
    /// Pure cyclic increment modulo the effect count; skips nothing.
    /// Returns the new cursor.
    pub fn next_effect_pos(&mut self, now: Instant) -> u16 {
        if self.effects.is_empty() {
            return 0;
        }
        self.cursor = (self.cursor + 1) % self.size();
        self.transition_effect(now);
        self.cursor
    }

    /// Move the cursor to an explicit index, clamped to the valid range.
    pub fn next_effect_pos_at(&mut self, index: u16, now: Instant) -> u16 {
        if self.effects.is_empty() {
            return 0;
        }
        self.cursor = index.min(self.size() - 1);
        self.transition_effect(now);
        self.cursor
    }

    /// Move the cursor to the effect with the given short id.
    ///
    /// Returns the new cursor, or `None` when no effect matches.
    pub fn next_effect_pos_named(&mut self, id: &str, now: Instant) -> Option<u16> {
        let index = self.find_effect(id)?;
        Some(self.next_effect_pos_at(index, now))
    }

    /// Move the cursor to a weighted random pick.
    ///
    /// Draws proportionally to each effect's selection weight; weight 0 is
    /// never chosen. Picks landing in recent history (or on the active
    /// effect) are re-drawn a bounded number of times, then accepted, so the
    /// avoidance is best-effort while the weight exclusion is absolute.
    /// With no selectable weight the cursor stays put.
    pub fn next_random_effect_pos(&mut self, now: Instant) -> u16 {
        if self.effects.is_empty() {
            return 0;
        }
        let total: u32 = self
            .effects
            .iter()
            .map(|machine| u32::from(machine.selection_weight()))
            .sum();
        if total == 0 {
            log::warn!("no effect has a selectable weight, keeping cursor at {}", self.cursor);
            return self.cursor;
        }

        let mut pick = self.cursor;
        for _ in 0..RANDOM_DRAW_ATTEMPTS {
            let mut roll = self.rng.random_range(0..total);
            for (index, machine) in self.effects.iter().enumerate() {
                let weight = u32::from(machine.selection_weight());
                if roll < weight {
                    pick = index as u16;
                    break;
                }
                roll -= weight;
            }
            if pick != self.active && !self.history.contains(pick) {
                break;
            }
        }
        self.cursor = pick;
        self.transition_effect(now);
        self.cursor
    }

    /// Complete a cursor move by unwinding the outgoing effect and arming
    /// the incoming one.
    ///
    /// The outgoing (active) effect is requested toward `Idle`; the commit
    /// itself happens inside [`Self::loop_tick`] once it arrives there.
    /// While asleep the driven target is the sleep effect, so cursor moves
    /// only take visible effect after wake-up.
    pub fn transition_effect(&mut self, now: Instant) {
        if self.effects.is_empty() {
            return;
        }
        self.last_advance = Some(now);
        let target = self.target();
        if target != self.active {
            let index = usize::from(self.active);
            self.effects[index].request(EffectState::Idle, now);
        }
        self.arm(target, now);
    }

    /// Enable or disable automatic advancing.
    pub fn set_auto_advance(&mut self, enabled: bool) {
        self.auto_advance = enabled;
    }

    /// Whether automatic advancing is enabled.
    pub fn is_auto_advance(&self) -> bool {
        self.auto_advance
    }

    /// Enable or disable sleep mode.
    ///
    /// Turning sleep off while asleep hands rendering back to the cursor
    /// effect through the usual unwind choreography.
    pub fn set_sleep_enabled(&mut self, enabled: bool, now: Instant) {
        if self.sleep_enabled == enabled {
            return;
        }
        self.sleep_enabled = enabled;
        log::info!("sleep mode {}", if enabled { "enabled" } else { "disabled" });
        self.transition_effect(now);
    }

    /// Whether sleep mode is enabled.
    pub fn is_sleep_enabled(&self) -> bool {
        self.sleep_enabled
    }

    /// Flip the asleep flag.
    ///
    /// Falling asleep substitutes the sleep effect for the driven one
    /// without disturbing the cursor; waking up restores the cursor target.
    /// No-op while the flag already matches.
    pub fn set_sleep_state(&mut self, asleep: bool, now: Instant) {
        if self.asleep == asleep {
            return;
        }
        self.asleep = asleep;
        log::info!("sleep state changed to {}", if asleep { "asleep" } else { "awake" });
        self.transition_effect(now);
    }

    /// Whether the registry is currently asleep.
    pub fn is_asleep(&self) -> bool {
        self.asleep
    }

    /// One tick of the effect engine.
    ///
    /// Runs the auto-advance check, commits a pending hand-off once the
    /// outgoing effect has gone idle (recording it in history and posting
    /// the change event), then drives the active effect's state machine.
    pub fn loop_tick(
        &mut self,
        now: Instant,
        surface: &mut dyn RenderSurface,
        events: &mut dyn EventSink,
    ) {
        if self.effects.is_empty() {
            return;
        }
        self.maybe_auto_advance(now);

        let target = self.target();
        if target != self.active
            && self.effects[usize::from(self.active)].state() == EffectState::Idle
        {
            let outgoing = self.active;
            self.active = target;
            self.history.record(outgoing);
            log::info!(
                "effect change committed: {} [{}] -> {} [{}]",
                outgoing,
                self.effects[usize::from(outgoing)].name(),
                target,
                self.effects[usize::from(target)].name()
            );
            events.effect_changed(self.active);
            self.arm(self.active, now);
        }

        let index = usize::from(self.active);
        self.effects[index].tick(now, surface);
    }

    /// Metadata for every registered effect, in registration order.
    pub fn describe_config(&self) -> Vec<EffectInfo> {
        self.effects.iter().map(EffectMachine::info).collect()
    }

    /// Retired-effect history, oldest first.
    pub fn past_effects_run(&self) -> Vec<HistoryEntry> {
        self.history
            .entries
            .iter()
            .map(|&index| HistoryEntry {
                index,
                name: self
                    .effects
                    .get(usize::from(index))
                    .map(|machine| String::from(machine.name()))
                    .unwrap_or_default(),
            })
            .collect()
    }

    /// Snapshot of the persisted fields.
    pub(crate) fn persisted(&self) -> FxState {
        FxState {
            current_effect: self.cursor,
            auto: self.auto_advance,
            sleep: self.sleep_enabled,
        }
    }

    /// Restore persisted fields, moving the cursor through the regular
    /// transition choreography.
    pub(crate) fn apply_persisted(&mut self, state: &FxState, now: Instant) {
        self.auto_advance = state.auto;
        self.sleep_enabled = state.sleep;
        if !self.effects.is_empty() {
            self.next_effect_pos_at(state.current_effect, now);
        }
    }

    /// The index rendering should be driving right now.
    fn target(&self) -> u16 {
        if self.sleep_enabled && self.asleep {
            self.sleep_effect
        } else {
            self.cursor
        }
    }

    /// Request an effect into its running phase.
    ///
    /// Routed through the path table: an idle machine gets armed for setup,
    /// an already-running one is left alone.
    fn arm(&mut self, index: u16, now: Instant) {
        self.effects[usize::from(index)].request(EffectState::Running, now);
    }

    fn maybe_auto_advance(&mut self, now: Instant) {
        if !self.auto_advance || (self.sleep_enabled && self.asleep) {
            return;
        }
        let Some(last) = self.last_advance else {
            self.last_advance = Some(now);
            return;
        };
        if now.as_millis() - last.as_millis() < self.advance_period.as_millis() {
            return;
        }
        match self.advance_mode {
            AdvanceMode::Sequential => {
                self.next_effect_pos(now);
            }
            AdvanceMode::Random => {
                self.next_random_effect_pos(now);
            }
        }
    }
}
