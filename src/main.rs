use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use tileburg::{
    config::{ConfigLoader, GameConfig, Profile},
    mapgen::MapGenerator,
    service::{spawn_day_timer, SimEvent, SimHandle},
    Catalog, Session,
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Tileburg settlement simulator")]
struct Cli {
    /// Path to a game config YAML file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Platform profile (overrides the config file)
    #[arg(long, global = true, value_enum)]
    profile: Option<Profile>,

    /// Override the world seed
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Override the save directory
    #[arg(long, global = true)]
    save_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Generate a new map and write the first save
    New,
    /// Continue the saved game (or start one) and simulate a number of days
    Run {
        #[arg(long, default_value_t = 30)]
        days: u32,
    },
    /// Keep the simulation running on its day timer until Ctrl+C
    Serve {
        /// Override the real-time length of one day
        #[arg(long)]
        day_ms: Option<u64>,
    },
    /// Print the generated map as text without saving it
    Map,
}

fn load_config(cli: &Cli) -> Result<GameConfig> {
    let mut config = match &cli.config {
        Some(path) => ConfigLoader::new(".").load(path)?,
        None => GameConfig::for_profile(cli.profile.unwrap_or_default()),
    };
    if let Some(profile) = cli.profile {
        config.profile = profile;
    }
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    if let Some(dir) = &cli.save_dir {
        config.save.dir = dir.clone();
    }
    Ok(config)
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_tracing(&config.logging.level);
    let catalog = Arc::new(Catalog::standard());

    match cli.command {
        Commands::New => {
            let session = Session::new_game(config, catalog)?;
            let world = session.world();
            println!(
                "Settlement '{}' founded on a {}x{} map. Town hall at {}. Saved to {}",
                session.config().name,
                world.grid().bounds(),
                world.grid().bounds(),
                world
                    .town_hall()
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "?".into()),
                session.store().primary_path().display()
            );
        }
        Commands::Run { days } => {
            let mut session = Session::open(config, catalog)?;
            for _ in 0..days {
                session.advance_day();
            }
            let path = session.save().context("failed to save after running")?;
            let world = session.world();
            let inventory = world.inventory().balances();
            println!(
                "Simulated {days} days; now day {} (year {}). \
                 Gold {}, wood {}, stone {}, food {}, residents {}. Saved to {}",
                world.day(),
                world.year(),
                inventory.gold,
                inventory.wood,
                inventory.stone,
                inventory.food,
                world.total_residents(),
                path.display()
            );
        }
        Commands::Serve { day_ms } => {
            let period = Duration::from_millis(day_ms.unwrap_or(config.day_interval_ms).max(1));
            let session = Session::open(config, catalog)?;
            let (handle, actor) = SimHandle::spawn(session);
            let mut events = handle.subscribe();
            let timer = spawn_day_timer(handle.clone(), period);
            info!(period_ms = period.as_millis() as u64, "serve.started");

            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    event = events.recv() => match event {
                        Ok(SimEvent::DayAdvanced { day, inventory }) => {
                            println!(
                                "day {day}: gold {} food {} energy {}",
                                inventory.gold, inventory.food, inventory.energy
                            );
                        }
                        Ok(_) => {}
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {}
                        Err(_) => break,
                    },
                }
            }

            timer.abort();
            let saved = handle.save().await;
            handle.shutdown().await?;
            let session = actor.await.context("simulation task failed")?;
            match saved {
                Ok(path) => println!(
                    "Stopped on day {}. Saved to {}",
                    session.world().day(),
                    path.display()
                ),
                Err(err) => eprintln!(
                    "Stopped on day {} without saving: {err}",
                    session.world().day()
                ),
            }
        }
        Commands::Map => {
            let map = MapGenerator::new(&catalog, &config).generate(config.seed);
            print!("{}", map.grid.to_ascii());
            println!("town hall at {} (index {})", map.town_hall, map.town_hall_index);
        }
    }
    Ok(())
}
