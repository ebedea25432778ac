use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use critter_core::signals::drain;
use critter_core::{
    ActionKind, ActionOutcome, CritterConfig, JsonFileStore, OfflineReport, PetEngine,
    PurchaseOutcome, ShopItem, Signal, StatKind, SystemClock,
};
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, default_value = "critter.toml", global = true)]
    config: PathBuf,

    /// Path to the pet snapshot (overrides config and CRITTER_STATE_PATH)
    #[arg(short, long, global = true)]
    state: Option<PathBuf>,

    /// Emit JSON output and JSON logs
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the pet
    Status,
    /// Advance simulated time from the last recorded tick
    Tick {
        #[arg(long, default_value_t = 5.0)]
        seconds: f64,
        /// Use background decay instead of foreground
        #[arg(long)]
        background: bool,
    },
    /// Perform an action: thirst|energy|calm|joy (or hydrate|rest|soothe|play)
    Act { action: ActionKind },
    /// Buy a shop item
    Buy { item: ShopItem },
    /// List shop prices at the current level
    Shop,
    /// Mark the app as backgrounded now
    Background,
    /// Catch up on time away (since `background`, or the given seconds)
    Resume {
        #[arg(long)]
        elapsed: Option<f64>,
    },
    /// Set or clear the pet's name
    Name { name: Option<String> },
    /// Start a new run
    Reset,
    /// Drive the pet live against the wall clock
    Run {
        #[arg(long, default_value_t = 60)]
        ticks: u32,
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,
        #[arg(long)]
        background: bool,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}

fn state_path(args: &Args, config: &CritterConfig) -> PathBuf {
    args.state
        .clone()
        .or_else(|| config.storage.state_path.clone())
        .or_else(|| dirs::data_dir().map(|d| d.join("critter").join("state.json")))
        .unwrap_or_else(|| PathBuf::from("critter_state.json"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.json);

    let config = CritterConfig::load_or_default(&args.config);
    let path = state_path(&args, &config);
    info!("Using pet snapshot at {}", path.display());

    let mut engine = PetEngine::new(config, SystemClock, JsonFileStore::new(&path));
    let mut rx = engine.subscribe();

    match args.command.as_ref().unwrap_or(&Command::Status) {
        Command::Status => {}
        Command::Tick {
            seconds,
            background,
        } => {
            anyhow::ensure!(seconds.is_finite() && *seconds >= 0.0, "--seconds must be >= 0");
            let start = engine.state().last_tick_at.unwrap_or_else(|| engine.now());
            let step = engine.config().engine.max_tick_secs.max(0.1);
            engine.tick(start, !background);
            let mut advanced = 0.0;
            while advanced < *seconds {
                advanced = (advanced + step).min(*seconds);
                engine.tick(start + advanced, !background);
            }
        }
        Command::Act { action } => {
            let now = engine.now();
            let outcome = engine.perform_action_at(*action, now);
            print_action(*action, &outcome, args.json);
        }
        Command::Buy { item } => {
            let now = engine.now();
            let outcome = engine.purchase_at(*item, now);
            print_purchase(*item, outcome, engine.state().currency, args.json);
        }
        Command::Shop => {
            print_shop(&engine, args.json);
            return Ok(());
        }
        Command::Background => {
            let now = engine.now();
            engine.enter_background(now);
        }
        Command::Resume { elapsed } => {
            let report = match elapsed {
                Some(secs) => engine.reconcile_offline(*secs),
                None => {
                    let now = engine.now();
                    engine.resume(now)
                }
            };
            print_offline(&report, args.json);
        }
        Command::Name { name } => engine.set_display_name(name.clone()),
        Command::Reset => engine.reset(),
        Command::Run {
            ticks,
            interval_ms,
            background,
        } => {
            run_live(&mut engine, &mut rx, *ticks, *interval_ms, *background, args.json).await?;
        }
    }

    print_signals(&drain(&mut rx), args.json);
    engine
        .flush()
        .with_context(|| format!("Failed to save pet state to {}", path.display()))?;
    print_status(&mut engine, args.json);
    Ok(())
}

async fn run_live(
    engine: &mut PetEngine,
    rx: &mut tokio::sync::mpsc::UnboundedReceiver<Signal>,
    ticks: u32,
    interval_ms: u64,
    background: bool,
    json: bool,
) -> Result<()> {
    let report = engine.resume(engine.now());
    if report.steps > 0 {
        print_offline(&report, json);
    }

    let mut interval = tokio::time::interval(Duration::from_millis(interval_ms.max(1)));
    for _ in 0..ticks {
        tokio::select! {
            _ = interval.tick() => {
                let now = engine.now();
                engine.tick(now, !background);
                print_signals(&drain(rx), json);
                if engine.is_dead() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, saving");
                break;
            }
        }
    }

    engine.enter_background(engine.now());
    Ok(())
}

// ============================================================================
// Output
// ============================================================================

fn print_status(engine: &mut PetEngine, json: bool) {
    let cooldowns: Vec<(ActionKind, f64)> = ActionKind::ALL
        .iter()
        .map(|k| (*k, engine.cooldown_remaining(*k).as_secs_f64()))
        .collect();
    let state = engine.state();

    if json {
        let cooldowns: serde_json::Map<String, serde_json::Value> = cooldowns
            .iter()
            .map(|(k, secs)| (k.label().to_string(), json!(secs)))
            .collect();
        let out = json!({
            "name": engine.display_name(),
            "alive": !engine.is_dead(),
            "life": state.life,
            "stats": state.stats,
            "stat_cap": engine.stat_cap(),
            "mood": engine.mood(),
            "level": engine.level(),
            "form": engine.form(),
            "xp": state.xp,
            "progress": engine.progress_to_next_level(),
            "currency": state.currency,
            "age_seconds": state.age_seconds,
            "booster_until": state.boost_until,
            "finished_run": state.has_finished_run,
            "runs_completed": state.runs_completed,
            "cooldowns": cooldowns,
        });
        println!("{}", out);
        return;
    }

    let cap = engine.stat_cap();
    println!(
        "{} the {} (level {}, {}){}",
        engine.display_name(),
        engine.form(),
        engine.level(),
        engine.mood(),
        if engine.is_dead() { " - dead, run `reset`" } else { "" }
    );
    println!("  life    {:>5.1} / 100", state.life);
    for kind in StatKind::ALL {
        println!("  {:<7} {:>5.1} / {}", kind.to_string(), state.stats.get(kind), cap);
    }
    println!(
        "  xp {} ({:.0}% to next)  coins {}  age {}s",
        state.xp,
        engine.progress_to_next_level() * 100.0,
        state.currency,
        state.age_seconds
    );
    for (kind, secs) in cooldowns {
        if secs > 0.0 {
            println!("  {} ready in {:.0}s", kind, secs.ceil());
        }
    }
}

fn print_action(kind: ActionKind, outcome: &ActionOutcome, json: bool) {
    match (outcome, json) {
        (ActionOutcome::Performed { xp, coins }, true) => println!(
            "{}",
            json!({ "action": kind.label(), "performed": true, "xp": xp.applied, "coins": coins })
        ),
        (ActionOutcome::Performed { xp, coins }, false) => {
            println!("{}: +{} xp, +{} coins", kind, xp.applied, coins)
        }
        (ActionOutcome::OnCooldown { remaining }, true) => println!(
            "{}",
            json!({
                "action": kind.label(),
                "performed": false,
                "remaining_secs": remaining.as_secs_f64(),
            })
        ),
        (ActionOutcome::OnCooldown { remaining }, false) => {
            println!("{}: not yet, {:.0}s to go", kind, remaining.as_secs_f64().ceil())
        }
        (ActionOutcome::Dead, true) => {
            println!("{}", json!({ "action": kind.label(), "performed": false, "dead": true }))
        }
        (ActionOutcome::Dead, false) => println!("{}: the pet is dead", kind),
        (ActionOutcome::InvalidTime, true) => println!(
            "{}",
            json!({ "action": kind.label(), "performed": false, "invalid_time": true })
        ),
        (ActionOutcome::InvalidTime, false) => println!("{}: the clock is unusable", kind),
    }
}

fn print_purchase(item: ShopItem, outcome: PurchaseOutcome, balance: u64, json: bool) {
    let (bought, price) = match outcome {
        PurchaseOutcome::Purchased { price } => (true, Some(price)),
        PurchaseOutcome::InsufficientFunds { price, .. } => (false, Some(price)),
        PurchaseOutcome::Unavailable => (false, None),
    };
    if json {
        println!(
            "{}",
            json!({ "item": item.name(), "purchased": bought, "price": price, "balance": balance })
        );
    } else if bought {
        println!("bought {} for {} (balance {})", item, price.unwrap_or(0), balance);
    } else if let Some(price) = price {
        println!("cannot afford {} ({} > {})", item, price, balance);
    } else {
        println!("the shop is closed to the dead");
    }
}

fn print_shop(engine: &PetEngine, json: bool) {
    if json {
        let prices: serde_json::Map<String, serde_json::Value> = ShopItem::ALL
            .iter()
            .map(|i| (i.name().to_string(), json!(engine.price_of(*i))))
            .collect();
        println!("{}", json!({ "balance": engine.state().currency, "prices": prices }));
        return;
    }
    for item in ShopItem::ALL {
        println!("  {:<15} {:>4}", item.to_string(), engine.price_of(item));
    }
    println!("  balance {}", engine.state().currency);
}

fn print_offline(report: &OfflineReport, json: bool) {
    if json {
        println!("{}", json!({ "offline": report }));
        return;
    }
    println!(
        "away {:.0}s: +{} coins, life {:.1} -> {:.1}{}",
        report.processed_secs,
        report.coins_granted,
        report.life_before,
        report.life_after,
        if report.died { " (died)" } else { "" }
    );
}

fn print_signals(signals: &[Signal], json: bool) {
    for signal in signals {
        if json {
            println!("{}", json!({ "event": signal }));
            continue;
        }
        match signal {
            Signal::LevelUp(level) => println!("* level up! now level {}", level),
            Signal::Evolution(form) => println!("* evolved into a {}", form),
            Signal::RunFinished => println!("* run complete!"),
            Signal::LowResourceWarning(stat) => println!("* {} is critically low", stat),
            Signal::Death => println!("* your pet has died"),
        }
    }
}
