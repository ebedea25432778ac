//! Progression: XP, levels, evolutionary forms and the stat cap.
//!
//! Level is a step function of cumulative XP over a fixed cost table. Form is
//! a step function of level. Neither is stored; both are recomputed from `xp`
//! so a reloaded snapshot always lands on the same level and form.

use crate::config::{FormTuning, ProgressionConfig};
use crate::mood::Mood;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Evolutionary tier, keyed by minimum level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Form {
    Egg,
    Hatchling,
    Juvenile,
    Adult,
    Elder,
}

impl Form {
    pub const ALL: [Form; 5] = [
        Form::Egg,
        Form::Hatchling,
        Form::Juvenile,
        Form::Adult,
        Form::Elder,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Form::Egg => "Egg",
            Form::Hatchling => "Hatchling",
            Form::Juvenile => "Juvenile",
            Form::Adult => "Adult",
            Form::Elder => "Elder",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a single XP grant changed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct XpGrant {
    /// XP actually added after the mood multiplier and the max-level clamp.
    pub applied: u32,
    /// Every level crossed, in order.
    pub levels_gained: Vec<u32>,
    /// `(level, form)` for every level that entered a new form, in order.
    pub evolutions: Vec<(u32, Form)>,
    /// True only on the grant that first reaches the max level.
    pub finished_run: bool,
}

/// Level curve plus form and cap tables.
#[derive(Debug, Clone)]
pub struct Progression {
    cfg: ProgressionConfig,
    /// thresholds[n] = cumulative XP needed to reach level n + 1
    thresholds: Vec<u32>,
}

impl Progression {
    pub fn new(cfg: ProgressionConfig) -> Self {
        let thresholds = cfg
            .level_costs
            .iter()
            .scan(0u32, |acc, cost| {
                *acc = acc.saturating_add(*cost);
                Some(*acc)
            })
            .collect();
        Self { cfg, thresholds }
    }

    pub fn max_level(&self) -> u32 {
        self.thresholds.len() as u32
    }

    /// Cumulative XP at which the run finishes.
    pub fn max_xp(&self) -> u32 {
        self.thresholds.last().copied().unwrap_or(0)
    }

    /// Cumulative XP needed to reach `level`.
    pub fn xp_for_level(&self, level: u32) -> u32 {
        match (level as usize).min(self.thresholds.len()) {
            0 => 0,
            n => self.thresholds[n - 1],
        }
    }

    /// Walk the cost table greedily.
    pub fn level_for_xp(&self, xp: u32) -> u32 {
        self.thresholds.iter().take_while(|t| xp >= **t).count() as u32
    }

    pub fn form_for_level(&self, level: u32) -> Form {
        Form::ALL
            .iter()
            .rev()
            .copied()
            .find(|f| level >= self.cfg.forms[f.index()].min_level)
            .unwrap_or(Form::Egg)
    }

    pub fn form_tuning(&self, form: Form) -> FormTuning {
        self.cfg.forms[form.index()]
    }

    /// `min(max, base + per_level * level)`, never below 1.
    pub fn stat_cap(&self, level: u32) -> f64 {
        (self.cfg.stat_cap_base + self.cfg.stat_cap_per_level * level as f64)
            .min(self.cfg.stat_cap_max)
            .max(1.0)
    }

    pub fn xp_multiplier(&self, mood: Mood) -> f64 {
        self.cfg.xp_multiplier.get(mood)
    }

    /// Fraction of the way from the current level to the next (1.0 at max).
    pub fn progress_to_next_level(&self, xp: u32) -> f64 {
        let level = self.level_for_xp(xp);
        if level >= self.max_level() {
            return 1.0;
        }
        let floor = self.xp_for_level(level);
        let ceil = self.xp_for_level(level + 1);
        if ceil <= floor {
            return 1.0;
        }
        (xp.saturating_sub(floor)) as f64 / (ceil - floor) as f64
    }

    /// Grant `amount` XP scaled by the mood multiplier.
    ///
    /// Cumulative XP is clamped at `max_xp`. `finished_run` is only reported
    /// when `already_finished` is false, so re-entering at max never re-fires.
    pub fn grant(&self, xp: &mut u32, amount: u32, mood: Mood, already_finished: bool) -> XpGrant {
        let scaled = (amount as f64 * self.xp_multiplier(mood)).round().max(0.0) as u32;
        let before = *xp;
        let after = before.saturating_add(scaled).min(self.max_xp());
        *xp = after;

        let level_before = self.level_for_xp(before);
        let level_after = self.level_for_xp(after);
        let levels_gained: Vec<u32> = ((level_before + 1)..=level_after).collect();

        let mut form = self.form_for_level(level_before);
        let mut evolutions = Vec::new();
        for level in &levels_gained {
            let next = self.form_for_level(*level);
            if next != form {
                evolutions.push((*level, next));
                form = next;
            }
        }

        XpGrant {
            applied: after - before,
            levels_gained,
            evolutions,
            finished_run: !already_finished && level_after >= self.max_level(),
        }
    }
}

impl Default for Progression {
    fn default() -> Self {
        Self::new(ProgressionConfig::default())
    }
}
