//! Offline catch-up.
//!
//! When the host returns to the foreground, the time spent away is replayed
//! in fixed steps with the same attribute dynamics as `tick`, but with slower
//! offline decay and a separate, self-limiting currency model. Replay stops
//! early if the pet dies.

use crate::attributes::{AttributeModel, DecayRates, StepContext};
use crate::config::{FormTuning, MoodConfig, OfflineConfig};
use crate::mood::{self, Mood};
use crate::progression::Progression;
use crate::state::{PetState, StatKind, Timestamp};
use serde::Serialize;

/// Summary of one offline session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OfflineReport {
    pub elapsed_secs: f64,
    pub processed_secs: f64,
    pub steps: u32,
    pub coins_granted: u64,
    pub died: bool,
    pub life_before: f64,
    pub life_after: f64,
    /// Stats that crossed into the critical band while away.
    pub became_low: Vec<StatKind>,
}

#[derive(Debug, Clone)]
pub struct OfflineReconciler {
    cfg: OfflineConfig,
    rates: DecayRates,
}

impl OfflineReconciler {
    pub fn new(cfg: OfflineConfig) -> Self {
        let rates = DecayRates::offline(&cfg);
        Self { cfg, rates }
    }

    pub fn config(&self) -> &OfflineConfig {
        &self.cfg
    }

    /// Seconds per coin for one offline step, after both penalties.
    pub fn seconds_per_coin(
        &self,
        mood: Mood,
        balance: u64,
        processed: f64,
        form: FormTuning,
    ) -> f64 {
        let threshold = self.cfg.soft_cap_threshold.max(1) as f64;
        let over = (balance as f64 - threshold).max(0.0);
        let soft_cap = (1.0 + over / threshold).min(self.cfg.soft_cap_max_penalty);

        let afk = if self.cfg.afk_growth_secs > 0.0 {
            (1.0 + processed / self.cfg.afk_growth_secs).min(self.cfg.afk_max_penalty)
        } else {
            self.cfg.afk_max_penalty
        };

        (self.cfg.seconds_per_coin.get(mood) * soft_cap * afk / form.coin_rate.max(0.01)).max(0.001)
    }

    /// Replay `elapsed` seconds starting at `start`.
    pub fn reconcile(
        &self,
        state: &mut PetState,
        elapsed: f64,
        start: Timestamp,
        model: &AttributeModel,
        progression: &Progression,
        mood_cfg: &MoodConfig,
    ) -> OfflineReport {
        let mut report = OfflineReport {
            elapsed_secs: elapsed,
            life_before: state.life,
            life_after: state.life,
            ..Default::default()
        };
        if !elapsed.is_finite() || elapsed <= self.cfg.min_elapsed_secs || state.is_dead() {
            return report;
        }

        let step_secs = self.cfg.step_secs.max(1.0);
        let context_multiplier = model.decay.foreground_multiplier * self.cfg.foreground_fraction;
        let mut processed = 0.0;
        let mut coins = 0.0;

        while processed < elapsed {
            let step = step_secs.min(elapsed - processed);
            let sim_now = start + processed;

            let level = progression.level_for_xp(state.xp);
            let stat_cap = progression.stat_cap(level);
            let form = progression.form_tuning(progression.form_for_level(level));
            let mood = mood::classify(
                mood_cfg,
                &state.stats,
                state.life,
                stat_cap,
                state.last_activity(),
                sim_now,
            );

            let ctx = StepContext {
                rates: self.rates,
                context_multiplier,
                mood,
                level,
                form,
                booster_active: state.booster_active(sim_now),
                stat_cap,
            };
            let step_report = model.step(&mut state.stats, &mut state.life, &ctx, step);
            state.add_age(step);

            coins += step / self.seconds_per_coin(mood, state.currency, processed, form);
            processed += step;
            report.steps += 1;

            for kind in step_report.became_low {
                if !report.became_low.contains(&kind) {
                    report.became_low.push(kind);
                }
            }
            if step_report.died {
                report.died = true;
                break;
            }
        }

        let granted = (coins.floor() as u64).min(self.cfg.session_coin_cap);
        state.currency += granted;

        report.processed_secs = processed;
        report.coins_granted = granted;
        report.life_after = state.life;
        report
    }
}

impl Default for OfflineReconciler {
    fn default() -> Self {
        Self::new(OfflineConfig::default())
    }
}
