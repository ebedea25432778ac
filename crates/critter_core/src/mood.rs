//! Mood classification
//!
//! Mood is a pure function of the current stats, life and recent activity.
//! It is recomputed on every tick and action and never persisted, so it can
//! never drift from the numbers it summarizes.

use crate::config::MoodConfig;
use crate::state::{Stats, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    Critical,
    Happy,
    Tired,
    Angry,
    Bored,
    Neutral,
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mood::Critical => "critical",
            Mood::Happy => "happy",
            Mood::Tired => "tired",
            Mood::Angry => "angry",
            Mood::Bored => "bored",
            Mood::Neutral => "neutral",
        };
        f.write_str(name)
    }
}

/// Classify the pet's mood. First matching rule wins:
/// Critical > Happy > Tired > Angry > Bored > Neutral.
///
/// `last_activity` is the most recent action time; when no action was ever
/// taken, idle time is measured from the last tick and counts as zero.
pub fn classify(
    cfg: &MoodConfig,
    stats: &Stats,
    life: f64,
    stat_cap: f64,
    last_activity: Option<Timestamp>,
    now: Timestamp,
) -> Mood {
    let cap = stat_cap.max(1.0);
    let ratio = |v: f64| v / cap;

    let critical_floor = cfg.critical_stat_floor.max(cfg.critical_stat_ratio * cap);
    if life < cfg.critical_life || stats.min() < critical_floor {
        return Mood::Critical;
    }

    let min = ratio(stats.min());
    let avg = ratio(stats.average());
    let idle = last_activity.map_or(0.0, |t| (now - t).max(0.0));
    let acted_recently = last_activity.is_some() && idle <= cfg.recent_action_secs;

    if (min >= cfg.happy_min_ratio && life >= cfg.happy_min_life)
        || (avg >= cfg.happy_avg_ratio && life >= cfg.happy_avg_life)
        || (acted_recently && avg >= cfg.recent_avg_ratio && life >= cfg.recent_life)
    {
        return Mood::Happy;
    }

    if ratio(stats.energy) < cfg.tired_energy_ratio {
        return Mood::Tired;
    }

    if ratio(stats.joy) < cfg.angry_joy_ratio
        && (ratio(stats.thirst) < cfg.angry_need_ratio || ratio(stats.calm) < cfg.angry_need_ratio)
    {
        return Mood::Angry;
    }

    if idle > cfg.bored_idle_secs && ratio(stats.joy) < cfg.bored_joy_ratio {
        return Mood::Bored;
    }

    Mood::Neutral
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(thirst: f64, energy: f64, calm: f64, joy: f64) -> Stats {
        Stats {
            thirst,
            energy,
            calm,
            joy,
        }
    }

    fn mood(s: Stats, life: f64, last: Option<f64>, now: f64) -> Mood {
        classify(&MoodConfig::default(), &s, life, 100.0, last, now)
    }

    #[test]
    fn test_critical_by_life() {
        assert_eq!(mood(stats(90.0, 90.0, 90.0, 90.0), 14.9, None, 0.0), Mood::Critical);
    }

    #[test]
    fn test_critical_by_stat_floor() {
        // 8% of 100 = 8
        assert_eq!(mood(stats(7.9, 90.0, 90.0, 90.0), 90.0, None, 0.0), Mood::Critical);
        assert_ne!(mood(stats(8.0, 90.0, 90.0, 90.0), 90.0, None, 0.0), Mood::Critical);
    }

    #[test]
    fn test_critical_floor_has_absolute_minimum() {
        // At cap 60, 8% is 4.8 but the floor is 8.
        let s = stats(7.0, 50.0, 50.0, 50.0);
        let m = classify(&MoodConfig::default(), &s, 80.0, 60.0, None, 0.0);
        assert_eq!(m, Mood::Critical);
    }

    #[test]
    fn test_critical_beats_happy() {
        assert_eq!(mood(stats(100.0, 100.0, 100.0, 100.0), 10.0, Some(0.0), 1.0), Mood::Critical);
    }

    #[test]
    fn test_happy_by_minimum() {
        assert_eq!(mood(stats(58.0, 60.0, 70.0, 80.0), 48.0, None, 0.0), Mood::Happy);
    }

    #[test]
    fn test_happy_by_average() {
        // min is low but the average carries it
        assert_eq!(mood(stats(40.0, 80.0, 80.0, 80.0), 45.0, None, 0.0), Mood::Happy);
    }

    #[test]
    fn test_happy_by_recent_action() {
        let s = stats(50.0, 55.0, 60.0, 57.0);
        assert_eq!(mood(s, 40.0, Some(1000.0), 1100.0), Mood::Happy);
        // Same stats, action too long ago
        assert_ne!(mood(s, 40.0, Some(1000.0), 1121.0), Mood::Happy);
    }

    #[test]
    fn test_tired() {
        assert_eq!(mood(stats(50.0, 39.0, 50.0, 50.0), 50.0, None, 0.0), Mood::Tired);
    }

    #[test]
    fn test_angry() {
        assert_eq!(mood(stats(44.0, 50.0, 60.0, 41.0), 50.0, None, 0.0), Mood::Angry);
        // Joy low but needs fine
        assert_ne!(mood(stats(50.0, 50.0, 50.0, 41.0), 50.0, None, 0.0), Mood::Angry);
    }

    #[test]
    fn test_bored_requires_idle() {
        let s = stats(50.0, 50.0, 50.0, 50.0);
        assert_eq!(mood(s, 30.0, Some(0.0), 101.0), Mood::Bored);
        assert_eq!(mood(s, 30.0, Some(0.0), 100.0), Mood::Neutral);
        // Never acted: idle counts from the last tick, i.e. zero
        assert_eq!(mood(s, 30.0, None, 10_000.0), Mood::Neutral);
    }

    #[test]
    fn test_neutral_default() {
        assert_eq!(mood(stats(50.0, 50.0, 50.0, 70.0), 30.0, Some(0.0), 500.0), Mood::Neutral);
    }

    #[test]
    fn test_zero_cap_does_not_divide_by_zero() {
        let m = classify(&MoodConfig::default(), &stats(0.0, 0.0, 0.0, 0.0), 50.0, 0.0, None, 0.0);
        assert_eq!(m, Mood::Critical);
    }
}
