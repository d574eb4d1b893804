//! Persisted effect-engine state.
//!
//! The registry's durable fields travel as a small JSON document at a fixed
//! well-known path, saved through the storage gateway. These two functions
//! are the only code with access to the registry's persisted fields.

use alloc::string::String;

use embassy_time::Instant;
use serde::{Deserialize, Serialize};

use crate::registry::EffectRegistry;
use crate::storage::gateway::SyncedStorage;

/// Well-known path of the persisted state document.
pub const FX_STATE_FILE: &str = "/state.json";

/// Persisted registry fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FxState {
    /// Cursor position to restore
    pub current_effect: u16,
    /// Auto-advance flag
    pub auto: bool,
    /// Sleep-mode-enabled flag
    pub sleep: bool,
}

/// Load the persisted state and apply it to the registry.
///
/// A missing or unparseable document leaves the registry defaults untouched
/// and returns false.
pub fn read_fx_state(
    storage: &SyncedStorage,
    registry: &mut EffectRegistry,
    now: Instant,
) -> bool {
    let mut document = String::new();
    let size = storage.read_file(FX_STATE_FILE, &mut document);
    if size == 0 {
        log::info!("no saved state at {FX_STATE_FILE}, keeping defaults");
        return false;
    }
    match serde_json::from_str::<FxState>(&document) {
        Ok(state) => {
            registry.apply_persisted(&state, now);
            log::info!(
                "state restored from {FX_STATE_FILE} [{size} bytes]: effect {}, auto {}, sleep {}",
                state.current_effect,
                state.auto,
                state.sleep
            );
            true
        }
        Err(err) => {
            log::error!("could not parse saved state at {FX_STATE_FILE} [{size} bytes]: {err}");
            false
        }
    }
}

/// Snapshot the registry's persisted fields and save them.
pub fn save_fx_state(storage: &SyncedStorage, registry: &EffectRegistry) -> bool {
    let state = registry.persisted();
    match serde_json::to_string(&state) {
        Ok(document) => {
            let written = storage.write_file(FX_STATE_FILE, &document);
            if written == 0 {
                log::error!("failed to save state to {FX_STATE_FILE}");
                return false;
            }
            log::info!("state saved to {FX_STATE_FILE} [{written} bytes]");
            true
        }
        Err(err) => {
            log::error!("could not serialize state: {err}");
            false
        }
    }
}
