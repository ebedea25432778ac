//! The pet engine
//!
//! `PetEngine` is the single owner of `PetState` and the only place it is
//! mutated. Every operation runs to completion on `&mut self`: recompute the
//! derived values it needs, mutate, emit signals, then save a snapshot.
//! Timers belong to the host, which calls `tick` with its own timestamps.

use crate::attributes::{AttributeModel, DecayRates, StepContext};
use crate::clock::Clock;
use crate::config::{ActionTuning, CritterConfig, FormTuning};
use crate::cooldown::CooldownLimiter;
use crate::economy::{Economy, PurchaseOutcome, ShopItem};
use crate::mood::{self, Mood};
use crate::offline::{OfflineReconciler, OfflineReport};
use crate::persistence::{PersistenceGateway, PersistenceResult};
use crate::progression::{Form, Progression, XpGrant};
use crate::signals::{Signal, SignalBus};
use crate::state::{ActionKind, PetState, StatKind, Stats, Timestamp, SCHEMA_VERSION};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

/// Result of a player action.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    Performed { xp: XpGrant, coins: u64 },
    /// Gate closed; nothing changed.
    OnCooldown { remaining: Duration },
    /// The pet is dead; nothing changed.
    Dead,
    /// `now` was not a finite timestamp; nothing changed.
    InvalidTime,
}

impl ActionOutcome {
    pub fn performed(&self) -> bool {
        matches!(self, ActionOutcome::Performed { .. })
    }
}

/// What one `tick` call did.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TickReport {
    /// Simulated seconds after clamping.
    pub advanced_secs: f64,
    pub coins_granted: u64,
    pub mood: Mood,
}

pub struct PetEngine {
    config: CritterConfig,
    progression: Progression,
    attributes: AttributeModel,
    live_rates: DecayRates,
    economy: Economy,
    cooldowns: CooldownLimiter,
    offline: OfflineReconciler,
    clock: Box<dyn Clock>,
    store: Box<dyn PersistenceGateway>,
    signals: SignalBus,
    state: PetState,
    /// False until the first tick after construction or reset.
    ticking: bool,
    /// Last save failed; the next mutation retries.
    dirty: bool,
}

impl PetEngine {
    /// Build an engine and restore the pet from `store`, or hatch a new one
    /// when nothing is stored or the snapshot cannot be read.
    pub fn new<C, S>(config: CritterConfig, clock: C, store: S) -> Self
    where
        C: Clock + 'static,
        S: PersistenceGateway + 'static,
    {
        Self::with_parts(config, Box::new(clock), Box::new(store))
    }

    pub fn with_parts(
        config: CritterConfig,
        clock: Box<dyn Clock>,
        store: Box<dyn PersistenceGateway>,
    ) -> Self {
        let progression = Progression::new(config.progression.clone());
        let attributes = AttributeModel::new(config.decay.clone(), config.life.clone());
        let live_rates = DecayRates::live(&config.decay);
        let economy = Economy::new(config.economy.clone(), config.shop.clone());
        let cooldowns = CooldownLimiter::new(&config.actions);
        let offline = OfflineReconciler::new(config.offline.clone());

        let state = match store.load() {
            Ok(Some(mut state)) => {
                let cap = progression.stat_cap(progression.level_for_xp(state.xp));
                state.normalize(cap);
                state.xp = state.xp.min(progression.max_xp());
                state.schema_version = SCHEMA_VERSION;
                info!(
                    "Restored pet: level {}, life {:.1}, currency {}",
                    progression.level_for_xp(state.xp),
                    state.life,
                    state.currency
                );
                state
            }
            Ok(None) => {
                info!("No saved pet found, hatching a new one");
                hatch(&progression, PetState::default())
            }
            Err(e) => {
                warn!("Failed to load pet state ({}), hatching a new one", e);
                hatch(&progression, PetState::default())
            }
        };

        Self {
            config,
            progression,
            attributes,
            live_rates,
            economy,
            cooldowns,
            offline,
            clock,
            store,
            signals: SignalBus::new(),
            state,
            ticking: false,
            dirty: false,
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn state(&self) -> &PetState {
        &self.state
    }

    pub fn config(&self) -> &CritterConfig {
        &self.config
    }

    pub fn progression(&self) -> &Progression {
        &self.progression
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn level(&self) -> u32 {
        self.progression.level_for_xp(self.state.xp)
    }

    pub fn form(&self) -> Form {
        self.progression.form_for_level(self.level())
    }

    fn form_tuning(&self) -> FormTuning {
        self.progression.form_tuning(self.form())
    }

    pub fn stat_cap(&self) -> f64 {
        self.progression.stat_cap(self.level())
    }

    pub fn progress_to_next_level(&self) -> f64 {
        self.progression.progress_to_next_level(self.state.xp)
    }

    pub fn mood(&self) -> Mood {
        self.mood_at(self.clock.now())
    }

    pub fn mood_at(&self, now: Timestamp) -> Mood {
        mood::classify(
            &self.config.mood,
            &self.state.stats,
            self.state.life,
            self.stat_cap(),
            self.state.last_activity(),
            now,
        )
    }

    pub fn is_dead(&self) -> bool {
        self.state.is_dead()
    }

    /// Player-chosen name, or the configured default.
    pub fn display_name(&self) -> &str {
        self.state
            .display_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.config.engine.default_name)
    }

    /// Remaining wait for `kind`. Prunes the usage log as a side effect.
    pub fn cooldown_remaining(&mut self, kind: ActionKind) -> Duration {
        let now = self.clock.now();
        self.cooldowns.remaining(&mut self.state, kind, now)
    }

    pub fn price_of(&self, item: ShopItem) -> u64 {
        self.economy.price_of(item, self.level())
    }

    /// Coins an offline session of `elapsed` seconds would grant right now.
    pub fn offline_currency_preview(&self, elapsed: f64) -> u64 {
        let mut scratch = self.state.clone();
        let start = self.clock.now();
        self.offline
            .reconcile(
                &mut scratch,
                elapsed,
                start,
                &self.attributes,
                &self.progression,
                &self.config.mood,
            )
            .coins_granted
    }

    /// True when the last save failed and has not been retried yet.
    pub fn has_unsaved_changes(&self) -> bool {
        self.dirty
    }

    /// Register for every signal emitted from now on.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<Signal> {
        self.signals.subscribe()
    }

    // =========================================================================
    // Tick
    // =========================================================================

    /// Advance the simulation to `now`.
    ///
    /// The step is `now - last_tick_at` clamped to `[0, max_tick_secs]`; the
    /// first tick after construction or reset only records `now`. A dead pet
    /// does not change.
    pub fn tick(&mut self, now: Timestamp, is_foreground: bool) -> TickReport {
        let mood = self.mood_at(now);
        if self.state.is_dead() || !now.is_finite() {
            return TickReport {
                advanced_secs: 0.0,
                coins_granted: 0,
                mood,
            };
        }

        let dt = match (self.ticking, self.state.last_tick_at) {
            (true, Some(last)) => {
                (now - last).clamp(0.0, self.config.engine.max_tick_secs.max(0.0))
            }
            _ => 0.0,
        };
        self.ticking = true;
        self.state.last_tick_at = Some(now);

        let mut coins = 0;
        if dt > 0.0 {
            let level = self.level();
            let form = self.form_tuning();
            let context_multiplier = if is_foreground {
                self.config.decay.foreground_multiplier
            } else {
                self.config.decay.background_multiplier
            };
            let ctx = StepContext {
                rates: self.live_rates,
                context_multiplier,
                mood,
                level,
                form,
                booster_active: self.state.booster_active(now),
                stat_cap: self.stat_cap(),
            };

            let report = self
                .attributes
                .step(&mut self.state.stats, &mut self.state.life, &ctx, dt);
            self.state.add_age(dt);
            coins = self.economy.accrue(&mut self.state, dt, now, mood, is_foreground, form);
            if coins > 0 {
                debug!(
                    "Passive accrual granted {} coin(s), balance {}",
                    coins, self.state.currency
                );
            }
            trace!(
                dt,
                ?mood,
                life = self.state.life,
                life_rate = report.life_rate,
                "tick"
            );

            self.warn_low(&report.became_low);
            if report.died {
                self.on_death();
            }
        }

        self.persist();
        TickReport {
            advanced_secs: dt,
            coins_granted: coins,
            mood,
        }
    }

    // =========================================================================
    // Actions
    // =========================================================================

    pub fn perform_thirst_action(&mut self) -> ActionOutcome {
        self.perform_action_at(ActionKind::Thirst, self.clock.now())
    }

    pub fn perform_energy_action(&mut self) -> ActionOutcome {
        self.perform_action_at(ActionKind::Energy, self.clock.now())
    }

    pub fn perform_calm_action(&mut self) -> ActionOutcome {
        self.perform_action_at(ActionKind::Calm, self.clock.now())
    }

    pub fn perform_joy_action(&mut self) -> ActionOutcome {
        self.perform_action_at(ActionKind::Joy, self.clock.now())
    }

    /// Run `kind` at `now` if its cooldown allows it.
    pub fn perform_action_at(&mut self, kind: ActionKind, now: Timestamp) -> ActionOutcome {
        if self.state.is_dead() {
            return ActionOutcome::Dead;
        }
        if !now.is_finite() {
            warn!("Ignoring {} at non-finite time {}", kind, now);
            return ActionOutcome::InvalidTime;
        }
        // XP is scaled by the mood the pet was in when the player acted.
        let mood = self.mood_at(now);
        if let Err(remaining) = self.cooldowns.try_acquire(&mut self.state, kind, now) {
            debug!("{} rejected, {:.1}s remaining", kind, remaining);
            return ActionOutcome::OnCooldown {
                remaining: Duration::from_secs_f64(remaining),
            };
        }

        let tuning = self.action_tuning(kind);
        let cap = self.stat_cap();
        let before = self.state.stats;
        let stats = &mut self.state.stats;
        stats.adjust(StatKind::Thirst, tuning.thirst, cap);
        stats.adjust(StatKind::Energy, tuning.energy, cap);
        stats.adjust(StatKind::Calm, tuning.calm, cap);
        stats.adjust(StatKind::Joy, tuning.joy, cap);
        self.state.life = (self.state.life + tuning.life).clamp(0.0, 100.0);
        self.state.currency += tuning.coins;

        let grant = self.apply_xp(tuning.xp, mood);
        let crossed = self.crossed_low(&before);
        self.warn_low(&crossed);
        debug!(
            "{}: +{} xp, +{} coins (mood {})",
            kind, grant.applied, tuning.coins, mood
        );

        self.persist();
        ActionOutcome::Performed {
            xp: grant,
            coins: tuning.coins,
        }
    }

    fn action_tuning(&self, kind: ActionKind) -> ActionTuning {
        let actions = &self.config.actions;
        match kind {
            ActionKind::Thirst => actions.thirst,
            ActionKind::Energy => actions.energy,
            ActionKind::Calm => actions.calm,
            ActionKind::Joy => actions.joy,
        }
    }

    // =========================================================================
    // Progression
    // =========================================================================

    /// Grant XP outside of an action, scaled by the current mood.
    pub fn add_xp(&mut self, amount: u32) -> XpGrant {
        if self.state.is_dead() {
            return XpGrant::default();
        }
        let mood = self.mood();
        let grant = self.apply_xp(amount, mood);
        self.persist();
        grant
    }

    fn apply_xp(&mut self, amount: u32, mood: Mood) -> XpGrant {
        let grant = self
            .progression
            .grant(&mut self.state.xp, amount, mood, self.state.has_finished_run);

        for level in &grant.levels_gained {
            debug!("Level up: {}", level);
            self.signals.emit(Signal::LevelUp(*level));
            for (_, form) in grant.evolutions.iter().filter(|(at, _)| at == level) {
                info!("Evolved into {}", form);
                self.signals.emit(Signal::Evolution(*form));
            }
        }
        if grant.finished_run {
            self.state.has_finished_run = true;
            self.state.runs_completed += 1;
            info!("Run finished (#{})", self.state.runs_completed);
            self.signals.emit(Signal::RunFinished);
        }
        grant
    }

    // =========================================================================
    // Shop
    // =========================================================================

    pub fn purchase(&mut self, item: ShopItem) -> bool {
        self.purchase_at(item, self.clock.now()).succeeded()
    }

    pub fn purchase_at(&mut self, item: ShopItem, now: Timestamp) -> PurchaseOutcome {
        if self.state.is_dead() {
            return PurchaseOutcome::Unavailable;
        }
        if !now.is_finite() {
            warn!("Ignoring purchase of {} at non-finite time {}", item, now);
            return PurchaseOutcome::Unavailable;
        }
        let level = self.level();
        let cap = self.stat_cap();
        let form = self.form_tuning();
        let outcome = self.economy.purchase(&mut self.state, item, level, cap, form, now);
        match outcome {
            PurchaseOutcome::Purchased { price } => {
                debug!("Bought {} for {}, balance {}", item, price, self.state.currency);
                self.persist();
            }
            PurchaseOutcome::InsufficientFunds { price, balance } => {
                debug!("Cannot afford {} ({} > {})", item, price, balance);
            }
            PurchaseOutcome::Unavailable => {}
        }
        outcome
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Record that the host left the foreground.
    pub fn enter_background(&mut self, now: Timestamp) {
        if !now.is_finite() {
            warn!("Ignoring background transition at non-finite time {}", now);
            return;
        }
        self.state.backgrounded_at = Some(now);
        self.persist();
    }

    /// Catch up on the time since `enter_background` (or the last tick when
    /// no background time was recorded) and resume live ticking at `now`.
    pub fn resume(&mut self, now: Timestamp) -> OfflineReport {
        if !now.is_finite() {
            warn!("Ignoring resume at non-finite time {}", now);
            return OfflineReport {
                life_before: self.state.life,
                life_after: self.state.life,
                ..Default::default()
            };
        }
        let start = self.state.backgrounded_at.or(self.state.last_tick_at);
        let elapsed = start.map_or(0.0, |t| (now - t).max(0.0));
        let report = self.reconcile(elapsed, start.unwrap_or(now));

        self.state.backgrounded_at = None;
        self.state.last_tick_at = Some(now);
        self.ticking = true;
        self.persist();
        report
    }

    /// Replay `elapsed` seconds ending at the clock's current time.
    pub fn reconcile_offline(&mut self, elapsed: f64) -> OfflineReport {
        let start = self.clock.now() - elapsed.max(0.0);
        let report = self.reconcile(elapsed, start);
        self.persist();
        report
    }

    fn reconcile(&mut self, elapsed: f64, start: Timestamp) -> OfflineReport {
        let report = self.offline.reconcile(
            &mut self.state,
            elapsed,
            start,
            &self.attributes,
            &self.progression,
            &self.config.mood,
        );
        if report.steps > 0 {
            info!(
                "Offline catch-up: {:.0}s in {} steps, +{} coins, life {:.1} -> {:.1}",
                report.processed_secs,
                report.steps,
                report.coins_granted,
                report.life_before,
                report.life_after
            );
        }
        self.warn_low(&report.became_low);
        if report.died {
            self.on_death();
        }
        report
    }

    /// Start a new run. Keeps the display name and the finished-run count.
    pub fn reset(&mut self) {
        self.state = hatch(&self.progression, PetState::reborn_from(&self.state));
        self.ticking = false;
        info!("Pet reset, {} run(s) completed so far", self.state.runs_completed);
        self.persist();
    }

    pub fn set_display_name(&mut self, name: Option<String>) {
        self.state.display_name = name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
        self.persist();
    }

    /// Save now, returning the error instead of swallowing it.
    pub fn flush(&mut self) -> PersistenceResult<()> {
        self.store.save(&self.state)?;
        self.dirty = false;
        Ok(())
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn crossed_low(&self, before: &Stats) -> Vec<StatKind> {
        let threshold = self.attributes.critical_threshold(self.stat_cap());
        StatKind::ALL
            .iter()
            .copied()
            .filter(|k| before.get(*k) >= threshold && self.state.stats.get(*k) < threshold)
            .collect()
    }

    fn warn_low(&mut self, kinds: &[StatKind]) {
        for kind in kinds {
            debug!("{} dropped into the critical band", kind);
            self.signals.emit(Signal::LowResourceWarning(*kind));
        }
    }

    fn on_death(&mut self) {
        info!(
            "{} died at age {}s (level {})",
            self.display_name(),
            self.state.age_seconds,
            self.level()
        );
        self.signals.emit(Signal::Death);
    }

    /// Best-effort save. Failures are logged and retried on the next mutation.
    fn persist(&mut self) {
        match self.store.save(&self.state) {
            Ok(()) => {
                if self.dirty {
                    info!("Pet state saved after earlier failure");
                }
                self.dirty = false;
            }
            Err(e) => {
                warn!("Failed to save pet state: {}", e);
                self.dirty = true;
            }
        }
    }
}

/// Clamp a newborn pet to the level-0 stat cap.
fn hatch(progression: &Progression, mut state: PetState) -> PetState {
    state.normalize(progression.stat_cap(progression.level_for_xp(state.xp)));
    state
}

impl std::fmt::Debug for PetEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PetEngine")
            .field("state", &self.state)
            .field("ticking", &self.ticking)
            .field("dirty", &self.dirty)
            .finish_non_exhaustive()
    }
}
