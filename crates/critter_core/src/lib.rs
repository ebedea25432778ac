pub mod attributes;
pub mod clock;
pub mod config;
pub mod cooldown;
pub mod economy;
pub mod engine;
pub mod mood;
pub mod offline;
pub mod persistence;
pub mod progression;
pub mod signals;
pub mod state;

pub use attributes::{AttributeModel, DecayRates, StepContext, StepReport};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CritterConfig;
pub use cooldown::{CooldownLimiter, CooldownRule};
pub use economy::{Economy, ItemEffect, PurchaseOutcome, ShopItem};
pub use engine::{ActionOutcome, PetEngine, TickReport};
pub use mood::Mood;
pub use offline::{OfflineReconciler, OfflineReport};
pub use persistence::{
    JsonFileStore, MemoryStore, PersistenceError, PersistenceGateway, PersistenceResult,
};
pub use progression::{Form, Progression, XpGrant};
pub use signals::{Signal, SignalBus};
pub use state::{ActionKind, PetState, StatKind, Stats, Timestamp};
