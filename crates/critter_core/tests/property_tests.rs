//! Property-based tests for critter_core.
//!
//! Uses proptest to check invariants that must hold for every input, not just
//! the hand-picked cases in the unit tests.

use critter_core::attributes::{AttributeModel, DecayRates, StepContext};
use critter_core::config::{DecayConfig, MoodConfig, ProgressionConfig};
use critter_core::{
    ActionKind, CooldownLimiter, CritterConfig, Economy, ManualClock, MemoryStore, Mood,
    OfflineReconciler, PetEngine, PetState, Progression, PurchaseOutcome, ShopItem, Stats,
};
use proptest::prelude::*;

const T0: f64 = 1_700_000_000.0;

// ============================================================================
// Strategies
// ============================================================================

fn arb_stats(lo: f64, hi: f64) -> impl Strategy<Value = Stats> {
    (lo..=hi, lo..=hi, lo..=hi, lo..=hi).prop_map(|(thirst, energy, calm, joy)| Stats {
        thirst,
        energy,
        calm,
        joy,
    })
}

fn arb_state() -> impl Strategy<Value = PetState> {
    (arb_stats(0.0, 60.0), 0.0f64..=100.0, 0u32..=400, 0u64..=1000).prop_map(
        |(stats, life, xp, currency)| PetState {
            stats,
            life,
            xp,
            currency,
            ..PetState::default()
        },
    )
}

fn arb_action() -> impl Strategy<Value = ActionKind> {
    prop_oneof![
        Just(ActionKind::Thirst),
        Just(ActionKind::Energy),
        Just(ActionKind::Calm),
        Just(ActionKind::Joy),
    ]
}

fn arb_item() -> impl Strategy<Value = ShopItem> {
    prop_oneof![
        Just(ShopItem::WaterBottle),
        Just(ShopItem::EnergySnack),
        Just(ShopItem::CalmTea),
        Just(ShopItem::Toy),
        Just(ShopItem::GrowthBooster),
    ]
}

fn arb_mood() -> impl Strategy<Value = Mood> {
    prop_oneof![
        Just(Mood::Critical),
        Just(Mood::Happy),
        Just(Mood::Tired),
        Just(Mood::Angry),
        Just(Mood::Bored),
        Just(Mood::Neutral),
    ]
}

/// One step of a random session: advance the clock, then maybe act or buy.
#[derive(Debug, Clone)]
enum Op {
    Tick { dt: f64, foreground: bool },
    Act(ActionKind),
    Buy(ShopItem),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0.0f64..=12.0, any::<bool>())
            .prop_map(|(dt, foreground)| Op::Tick { dt, foreground }),
        1 => arb_action().prop_map(Op::Act),
        1 => arb_item().prop_map(Op::Buy),
    ]
}

fn step_ctx(mood: Mood, foreground: bool) -> StepContext {
    let decay = DecayConfig::default();
    StepContext {
        rates: DecayRates::live(&decay),
        context_multiplier: if foreground {
            decay.foreground_multiplier
        } else {
            decay.background_multiplier
        },
        mood,
        level: 0,
        form: ProgressionConfig::default().forms[0],
        booster_active: false,
        stat_cap: 60.0,
    }
}

// ============================================================================
// Engine bounds
// ============================================================================

proptest! {
    /// Stats stay inside [0, cap] and life inside [0, 100] for any session.
    #[test]
    fn engine_keeps_values_in_bounds(
        state in arb_state(),
        ops in prop::collection::vec(arb_op(), 1..60),
    ) {
        let clock = ManualClock::new(T0);
        let mut engine = PetEngine::new(
            CritterConfig::default(),
            clock.clone(),
            MemoryStore::with_state(state),
        );
        let mut now = T0;
        engine.tick(now, true);

        for op in ops {
            match op {
                Op::Tick { dt, foreground } => {
                    now += dt;
                    clock.set(now);
                    engine.tick(now, foreground);
                }
                Op::Act(kind) => {
                    engine.perform_action_at(kind, now);
                }
                Op::Buy(item) => {
                    engine.purchase_at(item, now);
                }
            }

            let cap = engine.stat_cap();
            let s = engine.state();
            for v in [s.stats.thirst, s.stats.energy, s.stats.calm, s.stats.joy] {
                prop_assert!(
                    v.is_finite() && (0.0..=cap).contains(&v),
                    "stat {} outside [0, {}]",
                    v,
                    cap
                );
            }
            prop_assert!((0.0..=100.0).contains(&s.life), "life {}", s.life);
            prop_assert!(engine.level() <= 5);
        }
    }

    /// Splitting a tick into two halves lands in (nearly) the same place.
    #[test]
    fn tick_sub_delta_additivity(
        stats in arb_stats(40.0, 58.0),
        life in 10.0f64..=90.0,
        dt in 0.1f64..=5.0,
        mood in arb_mood(),
        foreground in any::<bool>(),
    ) {
        let model = AttributeModel::default();
        let ctx = step_ctx(mood, foreground);

        let mut whole = stats;
        let mut whole_life = life;
        model.step(&mut whole, &mut whole_life, &ctx, dt);

        let mut split = stats;
        let mut split_life = life;
        model.step(&mut split, &mut split_life, &ctx, dt / 2.0);
        model.step(&mut split, &mut split_life, &ctx, dt / 2.0);

        prop_assert!((whole.thirst - split.thirst).abs() < 1e-9);
        prop_assert!((whole.energy - split.energy).abs() < 1e-9);
        prop_assert!((whole.calm - split.calm).abs() < 1e-9);
        prop_assert!((whole.joy - split.joy).abs() < 1e-2);
        prop_assert!((whole_life - split_life).abs() < 1e-6);
    }
}

// ============================================================================
// Progression
// ============================================================================

proptest! {
    /// level(xp) is monotone and capped at the table length.
    #[test]
    fn level_is_monotone(a in 0u32..=1000, b in 0u32..=1000) {
        let p = Progression::default();
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(p.level_for_xp(lo) <= p.level_for_xp(hi));
        prop_assert!(p.level_for_xp(hi) <= p.max_level());
        prop_assert!(p.stat_cap(p.level_for_xp(lo)) <= p.stat_cap(p.level_for_xp(hi)));
    }

    /// A reloaded snapshot derives the same level.
    #[test]
    fn level_survives_reload(xp in 0u32..=360) {
        let p = Progression::default();
        let state = PetState {
            xp,
            ..PetState::default()
        };
        let json = serde_json::to_string(&state).unwrap();
        let back: PetState = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(p.level_for_xp(back.xp), p.level_for_xp(xp));
    }

    /// XP never exceeds the terminal total, whatever the grants.
    #[test]
    fn xp_clamped(grants in prop::collection::vec((0u32..=500, arb_mood()), 0..20)) {
        let p = Progression::default();
        let mut xp = 0;
        let mut finished = false;
        let mut finish_count = 0;
        for (amount, mood) in grants {
            let grant = p.grant(&mut xp, amount, mood, finished);
            if grant.finished_run {
                finished = true;
                finish_count += 1;
            }
            prop_assert!(xp <= p.max_xp());
        }
        prop_assert!(finish_count <= 1);
    }
}

// ============================================================================
// Cooldowns & economy
// ============================================================================

proptest! {
    /// Right after a successful action the gate is closed, and a repeat at the
    /// same instant changes nothing.
    #[test]
    fn cooldown_closes_after_success(kind in arb_action(), offset in 0.0f64..=100_000.0) {
        let limiter = CooldownLimiter::default();
        let mut state = PetState::default();
        let now = T0 + offset;

        prop_assert!(limiter.try_acquire(&mut state, kind, now).is_ok());
        prop_assert!(limiter.remaining_secs(&mut state, kind, now) > 0.0);

        let before = state.clone();
        prop_assert!(limiter.try_acquire(&mut state, kind, now).is_err());
        prop_assert_eq!(state, before);
    }

    /// A purchase never overdraws and never mutates on insufficient funds.
    #[test]
    fn purchase_never_overdraws(currency in 0u64..=100, item in arb_item(), level in 0u32..=5) {
        let economy = Economy::default();
        let form = ProgressionConfig::default().forms[0];
        let mut state = PetState {
            currency,
            ..PetState::default()
        };
        let before = state.clone();
        let price = economy.price_of(item, level);

        match economy.purchase(&mut state, item, level, 60.0, form, T0) {
            PurchaseOutcome::Purchased { price: paid } => {
                prop_assert_eq!(paid, price);
                prop_assert_eq!(state.currency, currency - price);
            }
            PurchaseOutcome::InsufficientFunds { .. } => {
                prop_assert!(currency < price);
                prop_assert_eq!(state, before);
            }
            PurchaseOutcome::Unavailable => {
                prop_assert!(false, "economy never reports unavailable")
            }
        }
    }
}

// ============================================================================
// Offline
// ============================================================================

proptest! {
    /// Offline sessions respect the coin cap, the value bounds and the age clock.
    #[test]
    fn offline_session_bounds(state in arb_state(), elapsed in 0.0f64..=172_800.0) {
        let reconciler = OfflineReconciler::default();
        let mut state = state;
        let start_currency = state.currency;
        let start_age = state.age_seconds;

        let report = reconciler.reconcile(
            &mut state,
            elapsed,
            T0,
            &AttributeModel::default(),
            &Progression::default(),
            &MoodConfig::default(),
        );

        prop_assert!(report.coins_granted <= 60);
        prop_assert_eq!(state.currency, start_currency + report.coins_granted);
        prop_assert!(report.processed_secs <= elapsed);
        prop_assert!((0.0..=100.0).contains(&state.life));
        prop_assert!(state.age_seconds >= start_age);
        prop_assert!(state.age_seconds - start_age <= report.processed_secs.ceil() as u64);
        if !report.died && report.steps > 0 {
            prop_assert!((report.processed_secs - elapsed).abs() < 1e-6);
        }
    }
}
