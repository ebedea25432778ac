//! critter_bench: trajectory simulation tests for the pet engine.
//!
//! Validates emergent behavior over long simulated time spans:
//! - Neglect in the foreground ends in death
//! - Foreground vs background decay pacing
//! - An attentive player finishes a run
//! - Booster pacing, offline sessions and determinism

use critter_core::{
    ActionKind, Clock, CritterConfig, ManualClock, MemoryStore, PetEngine, PetState, Signal,
};

pub const T0: f64 = 1_700_000_000.0;

/// Engine on a manual clock and an in-memory store.
pub fn engine_with(state: PetState) -> (PetEngine, ManualClock) {
    let clock = ManualClock::new(T0);
    let engine = PetEngine::new(
        CritterConfig::default(),
        clock.clone(),
        MemoryStore::with_state(state),
    );
    (engine, clock)
}

/// Tick for `total_secs` in `step_secs` increments, calling `care` after each
/// tick. Stops early if the pet dies.
pub fn simulate<F>(
    engine: &mut PetEngine,
    clock: &ManualClock,
    total_secs: f64,
    step_secs: f64,
    foreground: bool,
    mut care: F,
) where
    F: FnMut(&mut PetEngine, f64),
{
    let steps = (total_secs / step_secs) as usize;
    engine.tick(clock.now(), foreground);
    for _ in 0..steps {
        let now = clock.advance(step_secs);
        engine.tick(now, foreground);
        if engine.is_dead() {
            break;
        }
        care(engine, now);
    }
}

/// Perform every action whose gate is open.
pub fn attentive(engine: &mut PetEngine, now: f64) {
    for kind in ActionKind::ALL {
        engine.perform_action_at(kind, now);
    }
}
