//! Soft-currency economy: passive accrual, level-scaled pricing and the shop.

use crate::config::{EconomyConfig, FormTuning, ItemTuning, ShopConfig};
use crate::mood::Mood;
use crate::state::{PetState, StatKind, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed shop catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShopItem {
    WaterBottle,
    EnergySnack,
    CalmTea,
    Toy,
    GrowthBooster,
}

impl ShopItem {
    pub const ALL: [ShopItem; 5] = [
        ShopItem::WaterBottle,
        ShopItem::EnergySnack,
        ShopItem::CalmTea,
        ShopItem::Toy,
        ShopItem::GrowthBooster,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ShopItem::WaterBottle => "water_bottle",
            ShopItem::EnergySnack => "energy_snack",
            ShopItem::CalmTea => "calm_tea",
            ShopItem::Toy => "toy",
            ShopItem::GrowthBooster => "growth_booster",
        }
    }
}

impl fmt::Display for ShopItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for ShopItem {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.to_ascii_lowercase().replace('-', "_");
        ShopItem::ALL
            .iter()
            .copied()
            .find(|item| item.name() == wanted)
            .ok_or_else(|| format!("unknown shop item '{}'", s))
    }
}

/// What buying an item does.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ItemEffect {
    Heal(StatKind, f64),
    /// Decay-halving booster for this many (unscaled) seconds.
    Booster(f64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PurchaseOutcome {
    Purchased { price: u64 },
    InsufficientFunds { price: u64, balance: u64 },
    /// The pet is dead or the timestamp is not finite; nothing changed.
    Unavailable,
}

impl PurchaseOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self, PurchaseOutcome::Purchased { .. })
    }
}

#[derive(Debug, Clone, Default)]
pub struct Economy {
    pub cfg: EconomyConfig,
    pub shop: ShopConfig,
}

impl Economy {
    pub fn new(cfg: EconomyConfig, shop: ShopConfig) -> Self {
        Self { cfg, shop }
    }

    // === Pricing ===

    /// `max(1, round(base * growth^level))`
    pub fn effective_price(&self, base_cost: u32, level: u32) -> u64 {
        let price = (base_cost as f64 * self.cfg.price_growth.powi(level as i32)).round();
        if price.is_finite() {
            (price as u64).max(1)
        } else {
            1
        }
    }

    pub fn item_tuning(&self, item: ShopItem) -> ItemTuning {
        match item {
            ShopItem::WaterBottle => self.shop.water_bottle,
            ShopItem::EnergySnack => self.shop.energy_snack,
            ShopItem::CalmTea => self.shop.calm_tea,
            ShopItem::Toy => self.shop.toy,
            ShopItem::GrowthBooster => self.shop.growth_booster,
        }
    }

    pub fn item_effect(&self, item: ShopItem) -> ItemEffect {
        let amount = self.item_tuning(item).amount;
        match item {
            ShopItem::WaterBottle => ItemEffect::Heal(StatKind::Thirst, amount),
            ShopItem::EnergySnack => ItemEffect::Heal(StatKind::Energy, amount),
            ShopItem::CalmTea => ItemEffect::Heal(StatKind::Calm, amount),
            ShopItem::Toy => ItemEffect::Heal(StatKind::Joy, amount),
            ShopItem::GrowthBooster => ItemEffect::Booster(amount),
        }
    }

    pub fn price_of(&self, item: ShopItem, level: u32) -> u64 {
        self.effective_price(self.item_tuning(item).base_cost, level)
    }

    /// Charge for `item` and apply its effect. Nothing changes when the
    /// balance is short.
    pub fn purchase(
        &self,
        state: &mut PetState,
        item: ShopItem,
        level: u32,
        stat_cap: f64,
        form: FormTuning,
        now: Timestamp,
    ) -> PurchaseOutcome {
        let price = self.price_of(item, level);
        if state.currency < price {
            return PurchaseOutcome::InsufficientFunds {
                price,
                balance: state.currency,
            };
        }
        state.currency -= price;

        match self.item_effect(item) {
            ItemEffect::Heal(kind, amount) => state.stats.adjust(kind, amount, stat_cap),
            ItemEffect::Booster(secs) => {
                let start = state.boost_until.map_or(now, |until| until.max(now));
                state.boost_until = Some(start + secs * form.booster);
            }
        }
        PurchaseOutcome::Purchased { price }
    }

    // === Passive accrual ===

    pub fn seconds_per_coin(&self, mood: Mood, foreground: bool, form: FormTuning) -> f64 {
        let slowdown = if foreground { self.cfg.foreground_slowdown } else { 1.0 };
        (self.cfg.seconds_per_coin.get(mood) * slowdown / form.coin_rate.max(0.01)).max(0.001)
    }

    pub fn coins_per_minute_cap(&self, foreground: bool) -> u32 {
        if foreground {
            self.cfg.foreground_coins_per_minute
        } else {
            self.cfg.background_coins_per_minute
        }
    }

    /// Feed `dt` seconds into the accrual bucket and pay out whole coins,
    /// honoring the per-wall-clock-minute cap. Returns the coins granted.
    pub fn accrue(
        &self,
        state: &mut PetState,
        dt: f64,
        now: Timestamp,
        mood: Mood,
        foreground: bool,
        form: FormTuning,
    ) -> u64 {
        let minute = (now / 60.0).floor() as i64;
        if state.coin_minute != Some(minute) {
            state.coin_minute = Some(minute);
            state.coins_this_minute = 0;
        }

        let spc = self.seconds_per_coin(mood, foreground, form);
        let cap = self.coins_per_minute_cap(foreground);
        state.coin_bucket_secs += dt.max(0.0);

        let mut granted = 0;
        while state.coin_bucket_secs >= spc && state.coins_this_minute < cap {
            state.coin_bucket_secs -= spc;
            state.coins_this_minute += 1;
            state.currency += 1;
            granted += 1;
        }
        // A capped minute does not bank unlimited time.
        if state.coins_this_minute >= cap {
            state.coin_bucket_secs = state.coin_bucket_secs.min(spc);
        }
        granted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProgressionConfig;

    fn egg() -> FormTuning {
        ProgressionConfig::default().forms[0]
    }

    #[test]
    fn test_effective_price() {
        let e = Economy::default();
        assert_eq!(e.effective_price(12, 0), 12);
        // 12 * 1.04^5 = 14.6
        assert_eq!(e.effective_price(12, 5), 15);
        assert_eq!(e.effective_price(0, 3), 1);
        for level in 0..5 {
            assert!(e.effective_price(40, level + 1) >= e.effective_price(40, level));
        }
    }

    #[test]
    fn test_item_parse() {
        assert_eq!("water-bottle".parse::<ShopItem>().unwrap(), ShopItem::WaterBottle);
        assert_eq!("GROWTH_BOOSTER".parse::<ShopItem>().unwrap(), ShopItem::GrowthBooster);
        assert!("sword".parse::<ShopItem>().is_err());
    }

    #[test]
    fn test_purchase_insufficient_funds_is_noop() {
        let e = Economy::default();
        let mut state = PetState::default();
        state.currency = 5;
        let before = state.clone();
        let outcome = e.purchase(&mut state, ShopItem::WaterBottle, 0, 60.0, egg(), 0.0);
        assert_eq!(
            outcome,
            PurchaseOutcome::InsufficientFunds {
                price: 12,
                balance: 5
            }
        );
        assert_eq!(state, before);
    }

    #[test]
    fn test_purchase_heal_clamps_to_cap() {
        let e = Economy::default();
        let mut state = PetState::default();
        state.currency = 12;
        let outcome = e.purchase(&mut state, ShopItem::WaterBottle, 0, 60.0, egg(), 0.0);
        assert!(outcome.succeeded());
        assert_eq!(state.currency, 0);
        assert_eq!(state.stats.thirst, 60.0);
    }

    #[test]
    fn test_booster_extends_from_expiry() {
        let e = Economy::default();
        let mut state = PetState::default();
        state.currency = 100;
        e.purchase(&mut state, ShopItem::GrowthBooster, 0, 60.0, egg(), 1000.0);
        assert_eq!(state.boost_until, Some(1600.0));
        e.purchase(&mut state, ShopItem::GrowthBooster, 0, 60.0, egg(), 1100.0);
        assert_eq!(state.boost_until, Some(2200.0));
        assert_eq!(state.currency, 20);
    }

    #[test]
    fn test_booster_scaled_by_form() {
        let e = Economy::default();
        let mut state = PetState::default();
        state.currency = 100;
        let elder = ProgressionConfig::default().forms[4];
        e.purchase(&mut state, ShopItem::GrowthBooster, 5, 85.0, elder, 0.0);
        assert!((state.boost_until.unwrap() - 780.0).abs() < 1e-9);
    }

    #[test]
    fn test_seconds_per_coin() {
        let e = Economy::default();
        assert_eq!(e.seconds_per_coin(Mood::Neutral, false, egg()), 20.0);
        assert_eq!(e.seconds_per_coin(Mood::Happy, false, egg()), 15.0);
        assert_eq!(e.seconds_per_coin(Mood::Critical, true, egg()), 75.0);
    }

    #[test]
    fn test_background_accrual_respects_minute_cap() {
        let e = Economy::default();
        let mut state = PetState::default();
        let start = state.currency;
        // 60 s at 20 s/coin would be 3 coins; feed 120 s into one minute
        let mut granted = 0;
        for i in 0..24 {
            let now = 600.0 + i as f64 * 2.0;
            granted += e.accrue(&mut state, 5.0, now, Mood::Neutral, false, egg());
        }
        assert_eq!(granted, 3);
        assert_eq!(state.currency, start + 3);
        assert!(state.coin_bucket_secs <= 20.0);
    }

    #[test]
    fn test_foreground_accrual_is_slow() {
        let e = Economy::default();
        let mut state = PetState::default();
        let mut granted = 0;
        // 10 minutes of foreground in 5 s ticks
        for i in 0..120 {
            let now = 6000.0 + i as f64 * 5.0;
            granted += e.accrue(&mut state, 5.0, now, Mood::Neutral, true, egg());
        }
        // 600 s / 50 s per coin = 12 coins, but only 1 per minute
        assert_eq!(granted, 10);
    }
}
