//! Persisted pet state
//!
//! `PetState` is the single aggregate the engine owns and the persistence
//! gateway round-trips. Everything derived (level, form, mood, stat cap) is
//! recomputed from these fields and never stored.
//!
//! Every field carries a serde default so snapshots written by older builds
//! (for example, before `xp` existed) still decode.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Seconds since the Unix epoch.
pub type Timestamp = f64;

/// Snapshot layout version written by this build.
pub const SCHEMA_VERSION: u32 = 2;

/// Guard against NaN and Infinity in state values.
/// If the value is NaN or Inf, replace with the provided fallback.
#[inline]
pub(crate) fn sanitize_f64(v: f64, fallback: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        tracing::warn!("NaN/Inf detected in pet state, resetting to fallback {}", fallback);
        fallback
    }
}

/// Deserialize helper: non-finite numbers in a snapshot decode as 0.0.
pub fn deserialize_safe_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0);
    Ok(if v.is_finite() { v } else { 0.0 })
}

// =============================================================================
// Stats
// =============================================================================

/// The four managed attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatKind {
    Thirst,
    Energy,
    Calm,
    Joy,
}

impl StatKind {
    pub const ALL: [StatKind; 4] = [
        StatKind::Thirst,
        StatKind::Energy,
        StatKind::Calm,
        StatKind::Joy,
    ];
}

impl fmt::Display for StatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatKind::Thirst => "thirst",
            StatKind::Energy => "energy",
            StatKind::Calm => "calm",
            StatKind::Joy => "joy",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Stats {
    #[serde(deserialize_with = "deserialize_safe_f64")]
    pub thirst: f64,
    #[serde(deserialize_with = "deserialize_safe_f64")]
    pub energy: f64,
    #[serde(deserialize_with = "deserialize_safe_f64")]
    pub calm: f64,
    #[serde(deserialize_with = "deserialize_safe_f64")]
    pub joy: f64,
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            thirst: 60.0,
            energy: 55.0,
            calm: 60.0,
            joy: 65.0,
        }
    }
}

impl Stats {
    pub fn get(&self, kind: StatKind) -> f64 {
        match kind {
            StatKind::Thirst => self.thirst,
            StatKind::Energy => self.energy,
            StatKind::Calm => self.calm,
            StatKind::Joy => self.joy,
        }
    }

    pub fn get_mut(&mut self, kind: StatKind) -> &mut f64 {
        match kind {
            StatKind::Thirst => &mut self.thirst,
            StatKind::Energy => &mut self.energy,
            StatKind::Calm => &mut self.calm,
            StatKind::Joy => &mut self.joy,
        }
    }

    pub fn min(&self) -> f64 {
        self.thirst.min(self.energy).min(self.calm).min(self.joy)
    }

    pub fn average(&self) -> f64 {
        (self.thirst + self.energy + self.calm + self.joy) / 4.0
    }

    /// Mean of the three independently decaying stats (Joy's target).
    pub fn needs_mean(&self) -> f64 {
        (self.thirst + self.energy + self.calm) / 3.0
    }

    /// Add `delta` to one stat, keeping it inside `[0, cap]`.
    pub fn adjust(&mut self, kind: StatKind, delta: f64, cap: f64) {
        let slot = self.get_mut(kind);
        *slot = (*slot + delta).clamp(0.0, cap);
    }

    /// Sanitize and clamp all stats to `[0, cap]`.
    pub fn normalize(&mut self, cap: f64) {
        let defaults = Stats::default();
        for kind in StatKind::ALL {
            let slot = self.get_mut(kind);
            *slot = sanitize_f64(*slot, defaults.get(kind).min(cap)).clamp(0.0, cap);
        }
    }
}

// =============================================================================
// Actions
// =============================================================================

/// The four player actions, one per need.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Thirst,
    Energy,
    Calm,
    Joy,
}

impl ActionKind {
    pub const ALL: [ActionKind; 4] = [
        ActionKind::Thirst,
        ActionKind::Energy,
        ActionKind::Calm,
        ActionKind::Joy,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ActionKind::Thirst => "hydrate",
            ActionKind::Energy => "rest",
            ActionKind::Calm => "soothe",
            ActionKind::Joy => "play",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for ActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "thirst" | "hydrate" => Ok(ActionKind::Thirst),
            "energy" | "rest" => Ok(ActionKind::Energy),
            "calm" | "soothe" => Ok(ActionKind::Calm),
            "joy" | "play" => Ok(ActionKind::Joy),
            other => Err(format!("unknown action '{}'", other)),
        }
    }
}

// =============================================================================
// Pet State
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PetState {
    pub schema_version: u32,

    /// Optional player-chosen name.
    pub display_name: Option<String>,

    /// Survival stat (0 - 100). Zero is death.
    #[serde(deserialize_with = "deserialize_safe_f64")]
    pub life: f64,

    pub stats: Stats,

    /// Whole seconds lived, plus the fractional remainder not yet counted.
    pub age_seconds: u64,
    #[serde(deserialize_with = "deserialize_safe_f64")]
    pub age_carry: f64,

    /// Cumulative XP. Level and form are derived from it.
    pub xp: u32,

    pub currency: u64,

    /// Last successful use per action.
    pub last_action_at: BTreeMap<ActionKind, Option<Timestamp>>,

    /// Recent uses per action, pruned to the action's window on access.
    pub action_usage_log: BTreeMap<ActionKind, Vec<Timestamp>>,

    /// Decay-halving booster expiry.
    pub boost_until: Option<Timestamp>,

    pub has_finished_run: bool,
    pub runs_completed: u32,

    /// Time of the last tick (foreground or background).
    pub last_tick_at: Option<Timestamp>,
    /// Time the host last left the foreground.
    pub backgrounded_at: Option<Timestamp>,

    /// Passive currency accrual bucket, in seconds.
    #[serde(deserialize_with = "deserialize_safe_f64")]
    pub coin_bucket_secs: f64,
    /// Wall-clock minute (`floor(now / 60)`) the per-minute cap refers to.
    pub coin_minute: Option<i64>,
    pub coins_this_minute: u32,
}

impl Default for PetState {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            display_name: None,
            life: 75.0,
            stats: Stats::default(),
            age_seconds: 0,
            age_carry: 0.0,
            xp: 0,
            currency: 10,
            last_action_at: ActionKind::ALL.iter().map(|k| (*k, None)).collect(),
            action_usage_log: ActionKind::ALL.iter().map(|k| (*k, Vec::new())).collect(),
            boost_until: None,
            has_finished_run: false,
            runs_completed: 0,
            last_tick_at: None,
            backgrounded_at: None,
            coin_bucket_secs: 0.0,
            coin_minute: None,
            coins_this_minute: 0,
        }
    }
}

impl PetState {
    /// Fresh pet that keeps the identity carried across runs.
    pub fn reborn_from(previous: &PetState) -> Self {
        Self {
            display_name: previous.display_name.clone(),
            runs_completed: previous.runs_completed,
            ..Self::default()
        }
    }

    pub fn is_dead(&self) -> bool {
        self.life <= 0.0
    }

    pub fn last_action(&self, kind: ActionKind) -> Option<Timestamp> {
        self.last_action_at.get(&kind).copied().flatten()
    }

    /// Most recent use of any action.
    pub fn last_activity(&self) -> Option<Timestamp> {
        self.last_action_at
            .values()
            .flatten()
            .copied()
            .fold(None, |acc: Option<f64>, t| Some(acc.map_or(t, |a| a.max(t))))
    }

    pub fn booster_active(&self, now: Timestamp) -> bool {
        self.boost_until.is_some_and(|until| now < until)
    }

    /// Advance age by `dt` seconds, carrying the fractional part.
    pub fn add_age(&mut self, dt: f64) {
        let total = self.age_carry + dt.max(0.0);
        let whole = total.floor();
        self.age_seconds += whole as u64;
        self.age_carry = total - whole;
    }

    /// Sanitize and clamp every numeric field.
    pub fn normalize(&mut self, stat_cap: f64) {
        self.life = sanitize_f64(self.life, 75.0).clamp(0.0, 100.0);
        self.stats.normalize(stat_cap);
        self.age_carry = sanitize_f64(self.age_carry, 0.0).clamp(0.0, 0.999_999);
        self.coin_bucket_secs = sanitize_f64(self.coin_bucket_secs, 0.0).max(0.0);
        for kind in ActionKind::ALL {
            self.last_action_at.entry(kind).or_insert(None);
            self.action_usage_log.entry(kind).or_default();
        }
    }
}
