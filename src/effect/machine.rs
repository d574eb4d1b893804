//! Effect lifecycle state machine.
//!
//! Every effect cycles through seven states. External requests never jump
//! between states; they follow a transition-path table one hop at a time so
//! an outgoing effect always unwinds through its wind-down phases before it
//! goes idle. A separate default-advance map moves a state forward once its
//! one-time work is done.

use alloc::boxed::Box;
use alloc::string::String;

use embassy_time::{Duration, Instant};

use crate::RenderSurface;
use crate::effect::{Effect, EffectId, EffectInfo, derive_effect_id};

/// Minimum pause spent in the transition break between two effects.
pub const TRANSITION_BREAK_PAUSE: Duration = Duration::from_millis(1000);

/// Lifecycle state of an effect.
///
/// The canonical cycle:
///
/// ```text
/// Idle -> Setup -> Running -> WindDownPrep -> WindDown
///   ^                                            |
///   '-- TransitionBreak <- TransitionBreakPrep <-'
/// ```
///
/// Exactly one effect is in `Running` at any time; all others sit in `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectState {
    /// One-time initialization of the next effect
    Setup,
    /// Steady-state animation
    Running,
    /// One-time preparation of the wind-down animation
    WindDownPrep,
    /// Wind-down animation in progress
    WindDown,
    /// One-time preparation of the transition break
    TransitionBreakPrep,
    /// Neutral pause between two effects
    TransitionBreak,
    /// Parked; not rendering
    Idle,
}

impl EffectState {
    /// All states, in default-advance order starting at `Setup`.
    pub const ALL: [Self; 7] = [
        Self::Setup,
        Self::Running,
        Self::WindDownPrep,
        Self::WindDown,
        Self::TransitionBreakPrep,
        Self::TransitionBreak,
        Self::Idle,
    ];

    /// Next hop on the canonical path from `current` toward `desired`.
    ///
    /// Requests are resolved one hop at a time: asking for `Idle` while
    /// `Running` yields `WindDownPrep`, never `Idle` directly. `None` means
    /// the pair is not routable and the request is ignored, the diagonal
    /// included.
    pub const fn next_hop(current: Self, desired: Self) -> Option<Self> {
        match (current, desired) {
            (Self::Setup, Self::Idle) => Some(Self::Idle),
            // A running effect unwinds toward any other state
            (
                Self::Running,
                Self::Setup
                | Self::WindDownPrep
                | Self::WindDown
                | Self::TransitionBreakPrep
                | Self::TransitionBreak
                | Self::Idle,
            ) => Some(Self::WindDownPrep),
            (Self::WindDownPrep, Self::Running) => Some(Self::Running),
            (
                Self::WindDownPrep,
                Self::Setup
                | Self::WindDown
                | Self::TransitionBreakPrep
                | Self::TransitionBreak
                | Self::Idle,
            ) => Some(Self::WindDown),
            // A wind-down in progress can be cut short back to running
            (Self::WindDown, Self::Running) => Some(Self::Running),
            (
                Self::WindDown,
                Self::Setup | Self::TransitionBreakPrep | Self::TransitionBreak | Self::Idle,
            ) => Some(Self::TransitionBreakPrep),
            (Self::TransitionBreakPrep, Self::Setup | Self::Idle) => Some(Self::Idle),
            (Self::TransitionBreakPrep, Self::Running) => Some(Self::Setup),
            (Self::TransitionBreakPrep, Self::TransitionBreak) => Some(Self::TransitionBreak),
            (Self::TransitionBreak, Self::Setup | Self::Idle) => Some(Self::Idle),
            (Self::TransitionBreak, Self::Running) => Some(Self::Setup),
            (Self::Idle, Self::Setup | Self::Running) => Some(Self::Setup),
            _ => None,
        }
    }

    /// Unconditional next state once the current state's work is done.
    ///
    /// Applied repeatedly this is a single 7-cycle with no shortcuts.
    pub const fn advanced(self) -> Self {
        match self {
            Self::Setup => Self::Running,
            Self::Running => Self::WindDownPrep,
            Self::WindDownPrep => Self::WindDown,
            Self::WindDown => Self::TransitionBreakPrep,
            Self::TransitionBreakPrep => Self::TransitionBreak,
            Self::TransitionBreak => Self::Idle,
            Self::Idle => Self::Setup,
        }
    }
}

/// One effect with its lifecycle bookkeeping.
///
/// Owns the boxed behavior, the current state, and the timestamp of the last
/// entry into a transition-break phase. The registry holds one machine per
/// registered effect and drives the active one every tick.
pub struct EffectMachine {
    behavior: Box<dyn Effect>,
    name: EffectId,
    index: u16,
    state: EffectState,
    break_since: Instant,
}

impl EffectMachine {
    /// Wrap a behavior, deriving its short id from the description.
    ///
    /// Machines start out `Idle`; `index` is the stable registry position.
    pub fn new(behavior: Box<dyn Effect>, index: u16) -> Self {
        let name = derive_effect_id(behavior.description());
        Self {
            behavior,
            name,
            index,
            state: EffectState::Idle,
            break_since: Instant::from_millis(0),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> EffectState {
        self.state
    }

    /// Derived short id.
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Full description from the behavior.
    pub fn description(&self) -> &str {
        self.behavior.description()
    }

    /// Stable registry index.
    pub fn index(&self) -> u16 {
        self.index
    }

    /// Current selection weight of the behavior.
    pub fn selection_weight(&self) -> u8 {
        self.behavior.selection_weight()
    }

    /// Reported metadata for this effect.
    pub fn info(&self) -> EffectInfo {
        EffectInfo {
            description: String::from(self.behavior.description()),
            name: String::from(self.name.as_str()),
            registry_index: self.index,
        }
    }

    /// Request the machine move toward `desired`.
    ///
    /// Resolves one hop through the path table. Requests for the current
    /// state or for unroutable pairs are no-ops.
    pub fn request(&mut self, desired: EffectState, now: Instant) {
        if self.state == desired {
            return;
        }
        if let Some(next) = EffectState::next_hop(self.state, desired) {
            self.enter(next, now);
        }
    }

    /// Drive one tick of the lifecycle.
    ///
    /// One-shot states run their work and advance; polled states advance
    /// only when their hook reports completion; `Running` invokes the
    /// animation step and `Idle` does nothing.
    pub fn tick(&mut self, now: Instant, surface: &mut dyn RenderSurface) {
        match self.state {
            EffectState::Setup => {
                self.behavior.setup(surface);
                log::info!("effect {} set up", self.name.as_str());
                self.advance(now);
            }
            EffectState::Running => self.behavior.run(now, surface),
            EffectState::WindDownPrep => {
                self.behavior.wind_down_prep(now, surface);
                self.advance(now);
            }
            EffectState::WindDown => {
                if self.behavior.wind_down(now, surface) {
                    log::info!("effect {} wind-down finished", self.name.as_str());
                    self.advance(now);
                }
            }
            EffectState::TransitionBreakPrep => {
                self.behavior.transition_break_prep(now, surface);
                self.advance(now);
            }
            EffectState::TransitionBreak => {
                if self.behavior.transition_break(now, self.break_since) {
                    log::info!("effect {} transition break over", self.name.as_str());
                    self.advance(now);
                }
            }
            EffectState::Idle => {}
        }
    }

    fn advance(&mut self, now: Instant) {
        self.enter(self.state.advanced(), now);
    }

    /// Entering a transition-break phase by any route restamps the timer.
    fn enter(&mut self, next: EffectState, now: Instant) {
        if matches!(
            next,
            EffectState::TransitionBreakPrep | EffectState::TransitionBreak
        ) {
            self.break_since = now;
        }
        self.state = next;
    }
}
