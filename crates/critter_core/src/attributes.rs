//! Attribute dynamics: stat decay, Joy smoothing and Life regen/penalty.
//!
//! d(stat)/dt = -base_rate * context * level * form * booster * mood
//!   for Thirst, Energy and Calm
//! Joy relaxes toward the mean of the other three.
//! d(life)/dt = -sum((threshold - stat) * coeff) when any stat is critical,
//!   otherwise a positive regen rate.
//!
//! Decay is linear in `dt`, so one step of length `a + b` matches two steps
//! of `a` and `b` as long as mood and the life regime do not flip in between.

use crate::config::{DecayConfig, FormTuning, LifeConfig, OfflineConfig};
use crate::mood::Mood;
use crate::state::{StatKind, Stats};

/// Base per-second drain of the three decaying stats.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecayRates {
    pub thirst: f64,
    pub energy: f64,
    pub calm: f64,
}

impl DecayRates {
    /// Rate that drains a full (100) stat in the given number of hours.
    pub fn from_hours(thirst: f64, energy: f64, calm: f64) -> Self {
        let per_sec = |hours: f64| if hours > 0.0 { 100.0 / (hours * 3600.0) } else { 0.0 };
        Self {
            thirst: per_sec(thirst),
            energy: per_sec(energy),
            calm: per_sec(calm),
        }
    }

    pub fn live(cfg: &DecayConfig) -> Self {
        Self::from_hours(
            cfg.thirst_hours_to_drain,
            cfg.energy_hours_to_drain,
            cfg.calm_hours_to_drain,
        )
    }

    pub fn offline(cfg: &OfflineConfig) -> Self {
        Self::from_hours(
            cfg.thirst_hours_to_drain,
            cfg.energy_hours_to_drain,
            cfg.calm_hours_to_drain,
        )
    }
}

/// Everything outside the stats that shapes one step.
#[derive(Debug, Clone, Copy)]
pub struct StepContext {
    pub rates: DecayRates,
    /// Foreground, background or offline multiplier.
    pub context_multiplier: f64,
    pub mood: Mood,
    pub level: u32,
    pub form: FormTuning,
    pub booster_active: bool,
    pub stat_cap: f64,
}

/// What a step did besides moving the numbers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepReport {
    /// Life change per second applied during this step (negative = penalty).
    pub life_rate: f64,
    /// Stats that dropped below the critical threshold during this step.
    pub became_low: Vec<StatKind>,
    /// True if life reached zero during this step.
    pub died: bool,
}

#[derive(Debug, Clone, Default)]
pub struct AttributeModel {
    pub decay: DecayConfig,
    pub life: LifeConfig,
}

impl AttributeModel {
    pub fn new(decay: DecayConfig, life: LifeConfig) -> Self {
        Self { decay, life }
    }

    pub fn level_multiplier(&self, level: u32) -> f64 {
        (1.0 - self.decay.level_step * level as f64).max(self.decay.level_floor)
    }

    /// Product of every multiplier except the base rate.
    pub fn effective_multiplier(&self, ctx: &StepContext) -> f64 {
        let booster = if ctx.booster_active { self.decay.booster_multiplier } else { 1.0 };
        ctx.context_multiplier
            * self.level_multiplier(ctx.level)
            * ctx.form.decay
            * booster
            * self.decay.mood_adjust.get(ctx.mood)
    }

    /// Stat level below which Life starts draining.
    pub fn critical_threshold(&self, stat_cap: f64) -> f64 {
        self.life.critical_ratio * stat_cap
    }

    /// Signed per-second Life change for the given stats.
    pub fn life_rate(&self, stats: &Stats, stat_cap: f64) -> f64 {
        let threshold = self.critical_threshold(stat_cap);
        let coeff = &self.life.penalty;
        let penalty: f64 = [
            (stats.thirst, coeff.thirst),
            (stats.energy, coeff.energy),
            (stats.calm, coeff.calm),
            (stats.joy, coeff.joy),
        ]
        .iter()
        .filter(|(stat, _)| *stat < threshold)
        .map(|(stat, c)| (threshold - stat) * c)
        .sum();

        if penalty > 0.0 {
            return -penalty;
        }

        let thriving = self.life.thriving_ratio * stat_cap;
        if StatKind::ALL.iter().all(|k| stats.get(*k) > thriving) {
            self.life.regen_thriving
        } else {
            self.life.regen_base
        }
    }

    /// Advance stats and life by `dt` seconds.
    pub fn step(
        &self,
        stats: &mut Stats,
        life: &mut f64,
        ctx: &StepContext,
        dt: f64,
    ) -> StepReport {
        let dt = dt.max(0.0);
        let cap = ctx.stat_cap.max(1.0);
        let threshold = self.critical_threshold(cap);
        let before = *stats;

        // === Decay ===
        let mult = self.effective_multiplier(ctx);
        stats.adjust(StatKind::Thirst, -ctx.rates.thirst * mult * dt, cap);
        stats.adjust(StatKind::Energy, -ctx.rates.energy * mult * dt, cap);
        stats.adjust(StatKind::Calm, -ctx.rates.calm * mult * dt, cap);

        // === Joy ===
        // Exponential pull toward the needs mean; time-scaled so sub-steps compose.
        let alpha = 1.0 - (-self.decay.joy_smoothing_rate * dt).exp();
        let target = stats.needs_mean();
        stats.joy += (target - stats.joy) * alpha;
        stats.normalize(cap);

        // === Life ===
        let life_rate = self.life_rate(stats, cap);
        let was_alive = *life > 0.0;
        *life = (*life + life_rate * dt).clamp(0.0, 100.0);

        let became_low = StatKind::ALL
            .iter()
            .copied()
            .filter(|k| before.get(*k) >= threshold && stats.get(*k) < threshold)
            .collect();

        StepReport {
            life_rate,
            became_low,
            died: was_alive && *life <= 0.0,
        }
    }
}
