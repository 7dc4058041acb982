use std::sync::{Arc, Mutex};
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use voxelcraft_engine::world::World;
use voxelcraft_server::blocks;
use voxelcraft_server::config::{Args, ServerConfig};
use voxelcraft_server::console::{self, Command, Outcome};
use voxelcraft_server::event_bus::{self, ChangeBroadcaster, HookRegistry, WorldEvent};
use voxelcraft_server::generator::FlatGenerator;
use voxelcraft_server::metrics::{Metrics, TICK_BUDGET};
use voxelcraft_server::persistence::RegionStorage;
use voxelcraft_server::player_registry::{PlayerEvent, PlayerRegistry};

type SharedWorld = Arc<Mutex<World>>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut config = ServerConfig::load_or_create(&args.config)?;
    config.apply(&args);

    tracing::info!("voxelcraft server, world directory {}", config.world_dir.display());

    // ── Open the world ───────────────────────────────────────────────────
    let storage = RegionStorage::open(&config.world_dir)?;
    let generator = FlatGenerator::classic().with_biome(config.generator.biome);
    let mut world = World::open(
        &config.level_name,
        config.seed,
        config.world.clone(),
        Arc::new(blocks::registry()),
        Box::new(generator),
        Box::new(storage),
    )
    .context("open world")?;

    // Plugin hooks: the bedrock floor is unbreakable.
    let hooks = Arc::new(HookRegistry::new());
    event_bus::protect_bedrock_floor(&hooks);
    world.set_hook(hooks);

    // World-change event bus: the tick loop publishes, async tasks follow.
    let (bus_tx, _) = broadcast::channel::<WorldEvent>(event_bus::BUS_CAPACITY);
    world.add_observer(Box::new(ChangeBroadcaster::new(bus_tx.clone())));

    let spawn = world.spawn();
    let loaded = world
        .preload(spawn.chunk(), config.spawn_radius)
        .context("preload spawn area")?;
    tracing::info!("Spawn area ready around {}: {} chunks loaded", spawn, loaded);

    let world: SharedWorld = Arc::new(Mutex::new(world));
    let players = Arc::new(PlayerRegistry::new());
    let metrics = Arc::new(Metrics::new());

    spawn_event_logger(bus_tx.subscribe(), players.subscribe());

    // ── Tick loop ────────────────────────────────────────────────────────
    let tick_task = {
        let world = Arc::clone(&world);
        let metrics = Arc::clone(&metrics);
        let mut interval = tokio::time::interval(config.tick_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::spawn(async move {
            loop {
                interval.tick().await;
                let started = Instant::now();
                let result = world.lock().expect("world lock poisoned").tick();
                let elapsed = started.elapsed();
                match result {
                    Ok(report) => {
                        metrics.record_tick(&report, elapsed);
                        if elapsed > TICK_BUDGET {
                            tracing::warn!("Tick {} took {:?}", report.time, elapsed);
                        }
                    }
                    Err(e) => {
                        metrics.record_fault();
                        tracing::error!("Tick failed: {:#}", anyhow::Error::new(e));
                    }
                }
            }
        })
    };

    // ── Console, until stop or Ctrl+C ────────────────────────────────────
    tracing::info!("Ready, type 'help' for commands");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    loop {
        tokio::select! {
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    if run_command(&line, &world, &players, &metrics) {
                        break;
                    }
                }
                Ok(None) => {
                    tracing::info!("Console closed, running until Ctrl+C");
                    stdin_open = false;
                }
                Err(e) => {
                    tracing::error!("Console read failed: {}", e);
                    stdin_open = false;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received, shutting down...");
                break;
            }
        }
    }

    tick_task.abort();

    // ── Save on shutdown ─────────────────────────────────────────────────
    tracing::info!("Saving world before exit...");
    let saved = world.lock().expect("world lock poisoned").save(true, None);
    match saved {
        Ok(n) => tracing::info!("Shutdown save complete: {} chunks written", n),
        Err(e) => tracing::error!("Shutdown save failed: {:#}", anyhow::Error::new(e)),
    }
    Ok(())
}

/// Parse and run one console line. Returns `true` when the server should
/// stop.
fn run_command(line: &str, world: &SharedWorld, players: &PlayerRegistry, metrics: &Metrics) -> bool {
    let command = match Command::parse(line) {
        Ok(command) => command,
        Err(e) => {
            println!("{:#}", e);
            return false;
        }
    };
    let outcome = {
        let mut world = world.lock().expect("world lock poisoned");
        console::execute(command, &mut world, players, metrics)
    };
    match outcome {
        Ok(Outcome::Reply(reply)) => {
            println!("{}", reply);
            false
        }
        Ok(Outcome::Stop) => true,
        Err(e) => {
            println!("error: {:#}", e);
            false
        }
    }
}

/// Follow the event buses and log the notable events.
fn spawn_event_logger(
    mut world_rx: broadcast::Receiver<WorldEvent>,
    mut player_rx: broadcast::Receiver<PlayerEvent>,
) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                event = world_rx.recv() => match event {
                    Ok(WorldEvent::Blocks(batch)) => {
                        tracing::trace!("tick {}: {} block changes", batch.time, batch.changes.len());
                    }
                    Ok(WorldEvent::Lightning(pos)) => tracing::debug!("Lightning struck {}", pos),
                    Ok(WorldEvent::AmbientSound { x, y, z }) => {
                        tracing::trace!("Cave sound at ({:.1}, {:.1}, {:.1})", x, y, z);
                    }
                    Ok(WorldEvent::NightSkipped { time }) => {
                        tracing::info!("Night skipped, time is now {}", time);
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("Event logger lagged by {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                event = player_rx.recv() => match event {
                    Ok(PlayerEvent::Joined { name, .. }) => tracing::debug!("join event for {}", name),
                    Ok(PlayerEvent::Left { name, .. }) => tracing::debug!("leave event for {}", name),
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
    });
}
