//! Anti-spam gate for player actions.
//!
//! Each action has an absolute cooldown since its last use and a sliding
//! window (at most N uses in the trailing W seconds). The usage log is pruned
//! lazily on every query and append; nothing runs in the background.

use crate::config::ActionsConfig;
use crate::state::{ActionKind, PetState, Timestamp};
use std::time::Duration;

/// Gate parameters of one action.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CooldownRule {
    pub cooldown_secs: f64,
    pub window_uses: usize,
    pub window_secs: f64,
    /// Hard cap on any wait, as a multiple of `cooldown_secs`.
    pub cap_multiplier: f64,
}

impl CooldownRule {
    fn max_wait(&self) -> f64 {
        (self.cooldown_secs * self.cap_multiplier).max(0.0)
    }
}

/// Cooldown rules for the four actions.
#[derive(Debug, Clone)]
pub struct CooldownLimiter {
    rules: [CooldownRule; 4],
}

impl CooldownLimiter {
    pub fn new(cfg: &ActionsConfig) -> Self {
        let rule = |t: &crate::config::ActionTuning| CooldownRule {
            cooldown_secs: t.cooldown_secs,
            window_uses: t.window_uses,
            window_secs: t.window_secs,
            cap_multiplier: cfg.cap_multiplier,
        };
        Self {
            rules: [rule(&cfg.thirst), rule(&cfg.energy), rule(&cfg.calm), rule(&cfg.joy)],
        }
    }

    pub fn rule(&self, kind: ActionKind) -> CooldownRule {
        self.rules[kind as usize]
    }

    /// Drop log entries that fell out of the window.
    pub fn prune(&self, state: &mut PetState, kind: ActionKind, now: Timestamp) {
        let window = self.rule(kind).window_secs;
        if let Some(log) = state.action_usage_log.get_mut(&kind) {
            log.retain(|t| *t > now - window);
        }
    }

    /// Seconds until `kind` may run again (0.0 when ready).
    pub fn remaining_secs(&self, state: &mut PetState, kind: ActionKind, now: Timestamp) -> f64 {
        self.prune(state, kind, now);
        let rule = self.rule(kind);

        let absolute = state
            .last_action(kind)
            .map_or(0.0, |last| (last + rule.cooldown_secs - now).max(0.0));

        let window = state
            .action_usage_log
            .get(&kind)
            .filter(|log| rule.window_uses > 0 && log.len() >= rule.window_uses)
            .and_then(|log| log.iter().copied().reduce(f64::min))
            .map_or(0.0, |earliest| (earliest + rule.window_secs - now).max(0.0));

        absolute.max(window).min(rule.max_wait())
    }

    pub fn remaining(&self, state: &mut PetState, kind: ActionKind, now: Timestamp) -> Duration {
        Duration::from_secs_f64(self.remaining_secs(state, kind, now))
    }

    /// Record a successful use.
    pub fn record(&self, state: &mut PetState, kind: ActionKind, now: Timestamp) {
        self.prune(state, kind, now);
        state.action_usage_log.entry(kind).or_default().push(now);
        state.last_action_at.insert(kind, Some(now));
    }

    /// Check the gate and record the use if it is open. Returns the remaining
    /// wait when rejected.
    pub fn try_acquire(
        &self,
        state: &mut PetState,
        kind: ActionKind,
        now: Timestamp,
    ) -> Result<(), f64> {
        let remaining = self.remaining_secs(state, kind, now);
        if remaining > 0.0 {
            return Err(remaining);
        }
        self.record(state, kind, now);
        Ok(())
    }
}

impl Default for CooldownLimiter {
    fn default() -> Self {
        Self::new(&ActionsConfig::default())
    }
}
