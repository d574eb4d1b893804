//! Effect behavior contract and shared effect types.
//!
//! An effect is a self-contained animation with its own lifecycle, driven by
//! the state machine in [`machine`]. Implementations provide the steady-state
//! animation and may override the wind-down hooks; the defaults fade the
//! surface toward black and hand the hard work to the transition
//! choreography of the render surface.

pub mod machine;

use alloc::string::String;

use embassy_time::Instant;
use serde::Serialize;
use smart_leds::RGB8;

use crate::RenderSurface;

/// Length of a derived effect id (short name).
pub const EFFECT_ID_LEN: usize = 5;

/// Default strip brightness used by the stock wind-down preparation.
pub const DEFAULT_BRIGHTNESS: u8 = 224;

/// Blend amount toward background used by the stock wind-down preparation.
const WIND_DOWN_BLEND: u8 = 80;

/// Short effect identity derived from the description.
pub type EffectId = heapless::String<EFFECT_ID_LEN>;

/// Derive the short id of an effect from its description.
///
/// Takes characters up to the first `:` delimiter, truncated to
/// [`EFFECT_ID_LEN`]. Descriptions follow the `FxA1: details` convention,
/// making `FxA1` the id.
pub fn derive_effect_id(description: &str) -> EffectId {
    let mut id = EffectId::new();
    for ch in description.chars() {
        if ch == ':' {
            break;
        }
        if id.push(ch).is_err() {
            break;
        }
    }
    id
}

/// Behavior contract for one effect.
///
/// `run` is invoked every tick while the effect is the running one; the
/// remaining hooks serve the wind-down and transition-break phases and all
/// have working defaults. A hook that reports not-done simply holds its
/// state another tick; there is no forced advance.
pub trait Effect: Send {
    /// Human description; characters up to the first `:` form the short id.
    fn description(&self) -> &str;

    /// One-time initialization each time the effect is (re)started.
    fn setup(&mut self, _surface: &mut dyn RenderSurface) {}

    /// Steady-state animation step.
    fn run(&mut self, now: Instant, surface: &mut dyn RenderSurface);

    /// One-time preparation before the wind-down animation.
    ///
    /// The default dims the outgoing frame toward black, pushes it at the
    /// default brightness, and arms the transition choreography with a
    /// time-derived seed.
    fn wind_down_prep(&mut self, now: Instant, surface: &mut dyn RenderSurface) {
        surface.blend(RGB8::new(0, 0, 0), WIND_DOWN_BLEND);
        surface.show(DEFAULT_BRIGHTNESS);
        surface.prepare(now.as_millis() as u16);
    }

    /// Wind-down animation step; return true when finished.
    fn wind_down(&mut self, _now: Instant, surface: &mut dyn RenderSurface) -> bool {
        surface.transition()
    }

    /// One-time preparation before the transition break.
    fn transition_break_prep(&mut self, _now: Instant, _surface: &mut dyn RenderSurface) {}

    /// Transition-break gate; return true once the pause has been held.
    ///
    /// `since` is the time the break phase was entered. The default holds
    /// for [`machine::TRANSITION_BREAK_PAUSE`].
    fn transition_break(&mut self, now: Instant, since: Instant) -> bool {
        now.as_millis() > since.as_millis() + machine::TRANSITION_BREAK_PAUSE.as_millis()
    }

    /// Relative weight for random selection, 0 excludes the effect.
    ///
    /// Implementations may vary this dynamically (seasonal effects return 0
    /// outside their window).
    fn selection_weight(&self) -> u8 {
        1
    }
}

/// Reported effect metadata for configuration introspection.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectInfo {
    /// Full human description
    pub description: String,
    /// Derived short id
    pub name: String,
    /// Stable index assigned at registration
    pub registry_index: u16,
}
