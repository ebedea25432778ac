use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::mood::Mood;

// ============================================================================
// Top-level config
// ============================================================================

/// Every balance constant of the simulation. The defaults are the shipped
/// tuning; any subset can be overridden from a TOML file, down to a single
/// field of a single action.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CritterConfig {
    pub engine: EngineConfig,
    pub decay: DecayConfig,
    pub life: LifeConfig,
    pub mood: MoodConfig,
    pub progression: ProgressionConfig,
    pub economy: EconomyConfig,
    pub actions: ActionsConfig,
    pub shop: ShopConfig,
    pub offline: OfflineConfig,
    pub storage: StorageConfig,
}

impl CritterConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    /// After loading, env var overrides are applied.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let mut config = Self::from_toml_str(&content)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse TOML overrides on top of the shipped defaults.
    ///
    /// Tables merge key by key and arrays of tables merge by position, so an
    /// override only replaces the fields it names. Other arrays replace the
    /// default wholesale.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let overrides: toml::Value = content.parse().context("Failed to parse TOML config")?;
        let mut merged =
            toml::Value::try_from(Self::default()).context("Failed to encode default config")?;
        merge_value(&mut merged, overrides);
        merged.try_into().context("Invalid config value")
    }

    /// Try to load from path; if file doesn't exist, return defaults with env overrides.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!("Config file {} not found, using defaults", path.display());
            return Self::defaults_with_env();
        }
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::warn!(
                    "Config file {} is invalid ({:#}), using defaults",
                    path.display(),
                    e
                );
                Self::defaults_with_env()
            }
        }
    }

    fn defaults_with_env() -> Self {
        let mut cfg = Self::default();
        cfg.apply_env_overrides();
        cfg
    }

    /// Apply environment variable overrides on top of file-based config.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("CRITTER_FOREGROUND_MULTIPLIER") {
            if let Ok(n) = v.parse() {
                self.decay.foreground_multiplier = n;
            }
        }
        if let Ok(v) = std::env::var("CRITTER_OFFLINE_SESSION_CAP") {
            if let Ok(n) = v.parse() {
                self.offline.session_coin_cap = n;
            }
        }
        if let Ok(v) = std::env::var("CRITTER_STATE_PATH") {
            self.storage.state_path = Some(PathBuf::from(v));
        }
    }
}

/// Overlay `overrides` onto `base` in place.
fn merge_value(base: &mut toml::Value, overrides: toml::Value) {
    match (base, overrides) {
        (toml::Value::Table(base), toml::Value::Table(overrides)) => {
            for (key, value) in overrides {
                match base.get_mut(&key) {
                    Some(slot) => merge_value(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (toml::Value::Array(base), toml::Value::Array(overrides))
            if base.iter().all(toml::Value::is_table)
                && overrides.iter().all(toml::Value::is_table) =>
        {
            for (i, value) in overrides.into_iter().enumerate() {
                match base.get_mut(i) {
                    Some(slot) => merge_value(slot, value),
                    None => base.push(value),
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

// ============================================================================
// Shared tables
// ============================================================================

/// One value per mood, used for every mood-dependent multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoodTable<T> {
    pub critical: T,
    pub happy: T,
    pub tired: T,
    pub angry: T,
    pub bored: T,
    pub neutral: T,
}

impl<T: Copy> MoodTable<T> {
    pub fn get(&self, mood: Mood) -> T {
        match mood {
            Mood::Critical => self.critical,
            Mood::Happy => self.happy,
            Mood::Tired => self.tired,
            Mood::Angry => self.angry,
            Mood::Bored => self.bored,
            Mood::Neutral => self.neutral,
        }
    }

    /// Same value for every mood.
    fn uniform(default: T) -> Self {
        Self {
            critical: default,
            happy: default,
            tired: default,
            angry: default,
            bored: default,
            neutral: default,
        }
    }
}

// ============================================================================
// Sub-configs
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on the time a single `tick` may advance (debugger/suspend gaps).
    pub max_tick_secs: f64,
    /// Name shown when the pet has not been named.
    pub default_name: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_tick_secs: 5.0,
            default_name: "Critter".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecayConfig {
    /// Hours for a full stat to drain at base rate.
    pub thirst_hours_to_drain: f64,
    pub energy_hours_to_drain: f64,
    pub calm_hours_to_drain: f64,
    /// Context multipliers: foreground drains ~14.5x faster than background.
    pub foreground_multiplier: f64,
    pub background_multiplier: f64,
    /// Level multiplier is `max(level_floor, 1 - level_step * level)`.
    pub level_step: f64,
    pub level_floor: f64,
    /// Applied while a booster is active.
    pub booster_multiplier: f64,
    pub mood_adjust: MoodTable<f64>,
    /// Exponential pull of Joy toward the mean of the other stats, per second.
    pub joy_smoothing_rate: f64,
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            thirst_hours_to_drain: 6.0,
            energy_hours_to_drain: 8.0,
            calm_hours_to_drain: 10.0,
            foreground_multiplier: 5.8,
            background_multiplier: 0.4,
            level_step: 0.02,
            level_floor: 0.7,
            booster_multiplier: 0.5,
            mood_adjust: MoodTable {
                critical: 1.15,
                happy: 0.90,
                tired: 1.10,
                angry: 1.10,
                bored: 1.05,
                neutral: 1.0,
            },
            joy_smoothing_rate: 0.02,
        }
    }
}

/// Per-stat weights of the critical-drain penalty.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PenaltyCoefficients {
    pub thirst: f64,
    pub energy: f64,
    pub calm: f64,
    pub joy: f64,
}

impl Default for PenaltyCoefficients {
    fn default() -> Self {
        Self {
            thirst: 0.012,
            energy: 0.010,
            calm: 0.011,
            joy: 0.010,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LifeConfig {
    /// Stats below this fraction of the cap drain life.
    pub critical_ratio: f64,
    pub penalty: PenaltyCoefficients,
    /// Regen per second when every stat is above `thriving_ratio` of the cap.
    pub regen_thriving: f64,
    pub regen_base: f64,
    pub thriving_ratio: f64,
}

impl Default for LifeConfig {
    fn default() -> Self {
        Self {
            critical_ratio: 0.15,
            penalty: PenaltyCoefficients::default(),
            regen_thriving: 0.06,
            regen_base: 0.03,
            thriving_ratio: 0.60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MoodConfig {
    pub critical_life: f64,
    pub critical_stat_floor: f64,
    pub critical_stat_ratio: f64,

    pub happy_min_ratio: f64,
    pub happy_min_life: f64,
    pub happy_avg_ratio: f64,
    pub happy_avg_life: f64,
    pub recent_action_secs: f64,
    pub recent_avg_ratio: f64,
    pub recent_life: f64,

    pub tired_energy_ratio: f64,

    pub angry_joy_ratio: f64,
    pub angry_need_ratio: f64,

    pub bored_idle_secs: f64,
    pub bored_joy_ratio: f64,
}

impl Default for MoodConfig {
    fn default() -> Self {
        Self {
            critical_life: 15.0,
            critical_stat_floor: 8.0,
            critical_stat_ratio: 0.08,
            happy_min_ratio: 0.58,
            happy_min_life: 48.0,
            happy_avg_ratio: 0.65,
            happy_avg_life: 45.0,
            recent_action_secs: 120.0,
            recent_avg_ratio: 0.55,
            recent_life: 40.0,
            tired_energy_ratio: 0.40,
            angry_joy_ratio: 0.42,
            angry_need_ratio: 0.45,
            bored_idle_secs: 100.0,
            bored_joy_ratio: 0.65,
        }
    }
}

/// Multipliers attached to one evolutionary form.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FormTuning {
    pub min_level: u32,
    pub decay: f64,
    pub coin_rate: f64,
    pub booster: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressionConfig {
    /// XP needed for each level-up, 0→1 first. The table length is the max level.
    pub level_costs: Vec<u32>,
    pub xp_multiplier: MoodTable<f64>,
    pub stat_cap_base: f64,
    pub stat_cap_per_level: f64,
    pub stat_cap_max: f64,
    /// Egg, Hatchling, Juvenile, Adult, Elder.
    pub forms: [FormTuning; 5],
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        let mut xp_multiplier = MoodTable::uniform(1.0);
        xp_multiplier.happy = 1.10;
        xp_multiplier.tired = 0.95;
        xp_multiplier.critical = 0.90;
        Self {
            level_costs: vec![40, 60, 80, 80, 100],
            xp_multiplier,
            stat_cap_base: 60.0,
            stat_cap_per_level: 5.0,
            stat_cap_max: 100.0,
            forms: [
                FormTuning {
                    min_level: 0,
                    decay: 1.00,
                    coin_rate: 1.00,
                    booster: 1.0,
                },
                FormTuning {
                    min_level: 1,
                    decay: 0.98,
                    coin_rate: 1.05,
                    booster: 1.0,
                },
                FormTuning {
                    min_level: 2,
                    decay: 0.96,
                    coin_rate: 1.10,
                    booster: 1.1,
                },
                FormTuning {
                    min_level: 4,
                    decay: 0.94,
                    coin_rate: 1.15,
                    booster: 1.2,
                },
                FormTuning {
                    min_level: 5,
                    decay: 0.92,
                    coin_rate: 1.20,
                    booster: 1.3,
                },
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    pub seconds_per_coin: MoodTable<f64>,
    /// Passive accrual runs this many times slower in the foreground.
    pub foreground_slowdown: f64,
    pub foreground_coins_per_minute: u32,
    pub background_coins_per_minute: u32,
    /// Prices grow by this factor per level.
    pub price_growth: f64,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        let mut seconds_per_coin = MoodTable::uniform(20.0);
        seconds_per_coin.happy = 15.0;
        seconds_per_coin.critical = 30.0;
        Self {
            seconds_per_coin,
            foreground_slowdown: 2.5,
            foreground_coins_per_minute: 1,
            background_coins_per_minute: 3,
            price_growth: 1.04,
        }
    }
}

/// Gate and effect of one player action.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActionTuning {
    pub cooldown_secs: f64,
    pub window_uses: usize,
    pub window_secs: f64,
    pub thirst: f64,
    pub energy: f64,
    pub calm: f64,
    pub joy: f64,
    pub life: f64,
    pub xp: u32,
    pub coins: u64,
}

impl Default for ActionTuning {
    fn default() -> Self {
        Self {
            cooldown_secs: 120.0,
            window_uses: 3,
            window_secs: 600.0,
            thirst: 0.0,
            energy: 0.0,
            calm: 0.0,
            joy: 0.0,
            life: 0.0,
            xp: 10,
            coins: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionsConfig {
    pub thirst: ActionTuning,
    pub energy: ActionTuning,
    pub calm: ActionTuning,
    pub joy: ActionTuning,
    /// Hard cap on any wait, as a multiple of the action's base cooldown.
    pub cap_multiplier: f64,
}

impl Default for ActionsConfig {
    fn default() -> Self {
        Self {
            thirst: ActionTuning {
                thirst: 25.0,
                joy: 3.0,
                ..Default::default()
            },
            energy: ActionTuning {
                cooldown_secs: 180.0,
                window_secs: 900.0,
                energy: 30.0,
                joy: 2.0,
                ..Default::default()
            },
            calm: ActionTuning {
                cooldown_secs: 90.0,
                window_uses: 4,
                calm: 20.0,
                joy: 3.0,
                xp: 8,
                coins: 1,
                ..Default::default()
            },
            joy: ActionTuning {
                cooldown_secs: 150.0,
                joy: 20.0,
                energy: -5.0,
                thirst: -3.0,
                life: 1.0,
                xp: 15,
                coins: 3,
                ..Default::default()
            },
            cap_multiplier: 1.0,
        }
    }
}

/// Price and magnitude of one shop item. `amount` is the stat heal, or the
/// booster duration in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ItemTuning {
    pub base_cost: u32,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShopConfig {
    pub water_bottle: ItemTuning,
    pub energy_snack: ItemTuning,
    pub calm_tea: ItemTuning,
    pub toy: ItemTuning,
    pub growth_booster: ItemTuning,
}

impl Default for ShopConfig {
    fn default() -> Self {
        Self {
            water_bottle: ItemTuning {
                base_cost: 12,
                amount: 30.0,
            },
            energy_snack: ItemTuning {
                base_cost: 12,
                amount: 30.0,
            },
            calm_tea: ItemTuning {
                base_cost: 10,
                amount: 25.0,
            },
            toy: ItemTuning {
                base_cost: 15,
                amount: 25.0,
            },
            growth_booster: ItemTuning {
                base_cost: 40,
                amount: 600.0,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OfflineConfig {
    pub step_secs: f64,
    /// Gaps at or below this are ignored.
    pub min_elapsed_secs: f64,
    pub thirst_hours_to_drain: f64,
    pub energy_hours_to_drain: f64,
    pub calm_hours_to_drain: f64,
    /// Offline context multiplier as a fraction of the foreground multiplier.
    pub foreground_fraction: f64,
    pub seconds_per_coin: MoodTable<f64>,
    pub soft_cap_threshold: u64,
    pub soft_cap_max_penalty: f64,
    /// Seconds of processed time that add +1x to the AFK penalty.
    pub afk_growth_secs: f64,
    pub afk_max_penalty: f64,
    pub session_coin_cap: u64,
}

impl Default for OfflineConfig {
    fn default() -> Self {
        let mut seconds_per_coin = MoodTable::uniform(60.0);
        seconds_per_coin.happy = 40.0;
        seconds_per_coin.critical = 90.0;
        Self {
            step_secs: 60.0,
            min_elapsed_secs: 1.0,
            thirst_hours_to_drain: 8.0,
            energy_hours_to_drain: 10.0,
            calm_hours_to_drain: 12.0,
            foreground_fraction: 0.25,
            seconds_per_coin,
            soft_cap_threshold: 200,
            soft_cap_max_penalty: 3.0,
            afk_growth_secs: 7200.0,
            afk_max_penalty: 3.0,
            session_coin_cap: 60,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Snapshot location for file-backed hosts.
    pub state_path: Option<PathBuf>,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = CritterConfig::default();
        assert_eq!(cfg.engine.max_tick_secs, 5.0);
        assert_eq!(cfg.progression.level_costs.iter().sum::<u32>(), 360);
        assert_eq!(cfg.economy.foreground_coins_per_minute, 1);
        assert!(cfg.storage.state_path.is_none());
    }

    #[test]
    fn test_foreground_background_ratio() {
        let cfg = DecayConfig::default();
        let ratio = cfg.foreground_multiplier / cfg.background_multiplier;
        assert!((14.0..=15.0).contains(&ratio), "ratio was {}", ratio);
    }

    #[test]
    fn test_mood_table_lookup() {
        let cfg = EconomyConfig::default();
        assert_eq!(cfg.seconds_per_coin.get(Mood::Happy), 15.0);
        assert_eq!(cfg.seconds_per_coin.get(Mood::Critical), 30.0);
        assert_eq!(cfg.seconds_per_coin.get(Mood::Bored), 20.0);
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml_str = r#"
[decay]
foreground_multiplier = 4.0

[offline]
session_coin_cap = 25
"#;
        let cfg = CritterConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(cfg.decay.foreground_multiplier, 4.0);
        assert_eq!(cfg.offline.session_coin_cap, 25);
        // Defaults for unspecified fields
        assert_eq!(cfg.decay.background_multiplier, 0.4);
        assert_eq!(cfg.offline.step_secs, 60.0);
    }

    #[test]
    fn test_partial_action_keeps_shipped_values() {
        let toml_str = r#"
[actions.thirst]
cooldown_secs = 30.0
window_uses = 5

[actions.energy]
xp = 12
"#;
        let cfg = CritterConfig::from_toml_str(toml_str).unwrap();
        let shipped = ActionsConfig::default();

        assert_eq!(cfg.actions.thirst.cooldown_secs, 30.0);
        assert_eq!(cfg.actions.thirst.window_uses, 5);
        assert_eq!(cfg.actions.thirst.thirst, 25.0);
        assert_eq!(cfg.actions.thirst.joy, 3.0);
        assert_eq!(cfg.actions.thirst.window_secs, shipped.thirst.window_secs);

        assert_eq!(cfg.actions.energy.xp, 12);
        assert_eq!(cfg.actions.energy.cooldown_secs, 180.0);
        assert_eq!(cfg.actions.energy.window_secs, 900.0);
        assert_eq!(cfg.actions.energy.energy, 30.0);

        assert_eq!(cfg.actions.joy, shipped.joy);
    }

    #[test]
    fn test_partial_tables_keep_shipped_values() {
        let toml_str = r#"
[economy.seconds_per_coin]
critical = 45.0

[shop.toy]
base_cost = 20

[progression]
level_costs = [10, 10]

[[progression.forms]]
decay = 0.9
"#;
        let cfg = CritterConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(cfg.economy.seconds_per_coin.get(Mood::Critical), 45.0);
        assert_eq!(cfg.economy.seconds_per_coin.get(Mood::Happy), 15.0);
        assert_eq!(cfg.shop.toy.base_cost, 20);
        assert_eq!(cfg.shop.toy.amount, 25.0);

        let forms = cfg.progression.forms;
        assert_eq!(forms[0].decay, 0.9);
        assert_eq!(forms[0].coin_rate, 1.00);
        assert_eq!(forms[4], ProgressionConfig::default().forms[4]);
        // Plain arrays replace the default
        assert_eq!(cfg.progression.level_costs, vec![10, 10]);
    }

    #[test]
    fn test_invalid_value_is_an_error() {
        assert!(CritterConfig::from_toml_str("[actions.thirst]\nxp = \"lots\"").is_err());
        assert!(CritterConfig::from_toml_str("not toml at all [").is_err());
    }

    #[test]
    fn test_env_overrides_and_defaults() {
        std::env::set_var("CRITTER_FOREGROUND_MULTIPLIER", "3.5");
        std::env::set_var("CRITTER_OFFLINE_SESSION_CAP", "not-a-number");

        let mut cfg = CritterConfig::default();
        cfg.apply_env_overrides();

        assert_eq!(cfg.decay.foreground_multiplier, 3.5);
        // Unparseable values are ignored
        assert_eq!(cfg.offline.session_coin_cap, 60);

        std::env::remove_var("CRITTER_FOREGROUND_MULTIPLIER");
        std::env::remove_var("CRITTER_OFFLINE_SESSION_CAP");

        let cfg = CritterConfig::load_or_default("/nonexistent/critter.toml");
        assert_eq!(cfg.decay.foreground_multiplier, 5.8);
    }
}
