//! Operator console.
//!
//! One command per line on stdin. Parsing is separate from execution so the
//! grammar can be tested without a world.

use anyhow::{Context, bail};
use voxelcraft_engine::world::World;
use voxelcraft_engine::world::block::BlockId;
use voxelcraft_engine::world::position::BlockPos;

use crate::metrics::Metrics;
use crate::player_registry::PlayerRegistry;

/// Weather a `weather` command asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Weather {
    Clear,
    Rain,
    Thunder,
}

/// Block reference on the command line: a numeric id or a registered name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockRef {
    Id(u8),
    Name(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    SaveAll,
    Stop,
    TimeQuery,
    TimeSet(u64),
    TimeAdd(u64),
    Weather(Weather),
    SetBlock { pos: BlockPos, block: BlockRef, data: u8 },
    GetBlock(BlockPos),
    TickInfo,
    List,
    Join { name: String },
    Leave { name: String },
    Teleport { name: String, x: f64, y: f64, z: f64 },
    Sleep { name: String, sleeping: bool },
}

/// What the caller should do after a command ran.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Reply(String),
    Stop,
}

const HELP: &str = "commands: save-all, stop, time [set|add <n>], weather <clear|rain|thunder>, \
setblock <x> <y> <z> <block> [data], getblock <x> <y> <z>, tickinfo, list, join <name>, \
leave <name>, tp <name> <x> <y> <z>, sleep <name> [on|off]";

fn int<T: std::str::FromStr>(word: Option<&str>, what: &str) -> anyhow::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let word = word.with_context(|| format!("missing {}", what))?;
    word.parse().with_context(|| format!("bad {} '{}'", what, word))
}

fn block_pos<'a>(words: &mut impl Iterator<Item = &'a str>) -> anyhow::Result<BlockPos> {
    Ok(BlockPos::new(
        int(words.next(), "x")?,
        int(words.next(), "y")?,
        int(words.next(), "z")?,
    ))
}

fn name<'a>(words: &mut impl Iterator<Item = &'a str>) -> anyhow::Result<String> {
    words
        .next()
        .map(str::to_string)
        .context("missing player name")
}

impl Command {
    /// Parse one console line. Blank lines are an error like any other.
    pub fn parse(line: &str) -> anyhow::Result<Self> {
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            bail!("empty command");
        };
        let command = match head.to_ascii_lowercase().as_str() {
            "help" | "?" => Command::Help,
            "save-all" | "save" => Command::SaveAll,
            "stop" | "quit" => Command::Stop,
            "time" => match words.next() {
                None | Some("query") => Command::TimeQuery,
                Some("set") => Command::TimeSet(int(words.next(), "time")?),
                Some("add") => Command::TimeAdd(int(words.next(), "time")?),
                Some(other) => bail!("unknown time action '{}'", other),
            },
            "weather" => match words.next() {
                Some("clear") => Command::Weather(Weather::Clear),
                Some("rain") => Command::Weather(Weather::Rain),
                Some("thunder") => Command::Weather(Weather::Thunder),
                Some(other) => bail!("unknown weather '{}'", other),
                None => bail!("missing weather"),
            },
            "setblock" => {
                let pos = block_pos(&mut words)?;
                let word = words.next().context("missing block")?;
                let block = match word.parse::<u8>() {
                    Ok(id) => BlockRef::Id(id),
                    Err(_) => BlockRef::Name(word.to_ascii_lowercase()),
                };
                let data = match words.next() {
                    Some(word) => int(Some(word), "data")?,
                    None => 0,
                };
                if data > 15 {
                    bail!("data must be 0-15");
                }
                Command::SetBlock { pos, block, data }
            }
            "getblock" => Command::GetBlock(block_pos(&mut words)?),
            "tickinfo" | "tps" => Command::TickInfo,
            "list" => Command::List,
            "join" => Command::Join { name: name(&mut words)? },
            "leave" | "kick" => Command::Leave { name: name(&mut words)? },
            "tp" => Command::Teleport {
                name: name(&mut words)?,
                x: int(words.next(), "x")?,
                y: int(words.next(), "y")?,
                z: int(words.next(), "z")?,
            },
            "sleep" => {
                let name = name(&mut words)?;
                let sleeping = match words.next() {
                    None | Some("on") => true,
                    Some("off") => false,
                    Some(other) => bail!("expected on or off, got '{}'", other),
                };
                Command::Sleep { name, sleeping }
            }
            other => bail!("unknown command '{}', try 'help'", other),
        };
        if let Some(extra) = words.next() {
            bail!("unexpected argument '{}'", extra);
        }
        Ok(command)
    }
}

/// Run a parsed command against the world.
pub fn execute(
    command: Command,
    world: &mut World,
    players: &PlayerRegistry,
    metrics: &Metrics,
) -> anyhow::Result<Outcome> {
    let reply = match command {
        Command::Help => HELP.to_string(),
        Command::Stop => return Ok(Outcome::Stop),
        Command::SaveAll => {
            let saved = world.save(true, None)?;
            format!("saved {} chunks", saved)
        }
        Command::TimeQuery => format!(
            "time is {} (day time {})",
            world.time(),
            world.data().time_of_day()
        ),
        Command::TimeSet(time) => {
            world.set_time(time);
            format!("time set to {}", time)
        }
        Command::TimeAdd(ticks) => {
            let time = world.time() + ticks;
            world.set_time(time);
            format!("time set to {}", time)
        }
        Command::Weather(weather) => {
            let (raining, thundering) = match weather {
                Weather::Clear => (false, false),
                Weather::Rain => (true, false),
                Weather::Thunder => (true, true),
            };
            world.set_weather(raining, thundering);
            format!("weather set to {:?}", weather).to_lowercase()
        }
        Command::SetBlock { pos, block, data } => {
            let id = resolve(world, &block)?;
            if !pos.is_valid() {
                bail!("{} is outside the world", pos);
            }
            if world.set_type_and_data(pos, id, data) {
                format!("set {} to {}", pos, world.registry().get(id).name)
            } else {
                format!("{} unchanged", pos)
            }
        }
        Command::GetBlock(pos) => {
            let block = world.get_block(pos);
            format!(
                "{} is {} ({}:{}), light {}",
                pos,
                world.registry().get(block.id).name,
                block.id.0,
                block.data,
                world.get_light_level(pos)
            )
        }
        Command::TickInfo => {
            let snapshot = metrics.snapshot(world.store().len(), players.player_count());
            serde_json::to_string(&snapshot)?
        }
        Command::List => {
            let mut names: Vec<String> = players.snapshot().into_iter().map(|p| p.name).collect();
            names.sort();
            format!("{} online: {}", names.len(), names.join(", "))
        }
        Command::Join { name } => {
            let spawn = world.spawn_surface();
            let (x, y, z) = (spawn.x as f64 + 0.5, spawn.y as f64, spawn.z as f64 + 0.5);
            match players.join(world, &name, x, y, z) {
                Some(uuid) => format!("{} joined as {}", name, uuid),
                None => bail!("{} is already online", name),
            }
        }
        Command::Leave { name } => {
            let info = players.find(&name).with_context(|| format!("{} is not online", name))?;
            players.leave(world, info.uuid);
            format!("{} left", info.name)
        }
        Command::Teleport { name, x, y, z } => {
            let info = players.find(&name).with_context(|| format!("{} is not online", name))?;
            players.move_to(world, info.uuid, x, y, z);
            format!("moved {} to ({:.1}, {:.1}, {:.1})", info.name, x, y, z)
        }
        Command::Sleep { name, sleeping } => {
            let info = players.find(&name).with_context(|| format!("{} is not online", name))?;
            players.set_sleeping(world, info.uuid, sleeping);
            if sleeping {
                format!("{} is asleep", info.name)
            } else {
                format!("{} woke up", info.name)
            }
        }
    };
    Ok(Outcome::Reply(reply))
}

fn resolve(world: &World, block: &BlockRef) -> anyhow::Result<BlockId> {
    let registry = world.registry();
    let id = match block {
        BlockRef::Id(id) => BlockId(*id),
        BlockRef::Name(name) => registry
            .by_name(name)
            .with_context(|| format!("unknown block '{}'", name))?,
    };
    if !registry.is_registered(id) {
        bail!("block id {} is not registered", id.0);
    }
    Ok(id)
}
