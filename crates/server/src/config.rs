//! Server configuration: a TOML file with command-line overrides.
//!
//! Missing files are created with defaults on first start so operators have
//! something to edit. Every section is optional.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use serde::{Deserialize, Serialize};
use voxelcraft_engine::world::chunk::Biome;
use voxelcraft_engine::world::config::WorldConfig;

#[derive(Parser, Debug)]
#[command(name = "voxelcraft-server", about = "Headless voxel world server")]
pub struct Args {
    /// Configuration file, created with defaults when missing.
    #[arg(long, default_value = "server.toml")]
    pub config: PathBuf,
    /// Overrides `world_dir`.
    #[arg(long)]
    pub world: Option<PathBuf>,
    /// Overrides `seed` for newly created worlds.
    #[arg(long)]
    pub seed: Option<i64>,
    /// Overrides `tick_rate_hz`.
    #[arg(long)]
    pub tick_rate: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub world_dir: PathBuf,
    pub level_name: String,
    pub seed: i64,
    /// Chunk radius loaded around spawn before the first tick.
    pub spawn_radius: i32,
    pub tick_rate_hz: u32,
    pub generator: GeneratorConfig,
    pub world: WorldConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            world_dir: PathBuf::from("world"),
            level_name: "world".to_string(),
            seed: 0,
            spawn_radius: 4,
            tick_rate_hz: 20,
            generator: GeneratorConfig::default(),
            world: WorldConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub biome: Biome,
}

impl ServerConfig {
    /// Read `path`, writing the defaults there first if it does not exist.
    pub fn load_or_create(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            let config = Self::default();
            let text = toml::to_string_pretty(&config).context("serialize default config")?;
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create {}", parent.display()))?;
            }
            std::fs::write(path, text).with_context(|| format!("write {}", path.display()))?;
            tracing::info!("Wrote default configuration to {}", path.display());
            return Ok(config);
        }
        let text =
            std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parse {}", path.display()))
    }

    /// Apply command-line overrides.
    pub fn apply(&mut self, args: &Args) {
        if let Some(world) = &args.world {
            self.world_dir = world.clone();
        }
        if let Some(seed) = args.seed {
            self.seed = seed;
        }
        if let Some(rate) = args.tick_rate {
            self.tick_rate_hz = rate;
        }
    }

    pub fn tick_interval(&self) -> std::time::Duration {
        std::time::Duration::from_nanos(1_000_000_000 / self.tick_rate_hz.max(1) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: ServerConfig = toml::from_str(
            r#"
            seed = 42

            [generator]
            biome = "tundra"

            [world]
            light_budget = 64
            "#,
        )
        .unwrap();
        assert_eq!(config.seed, 42);
        assert_eq!(config.tick_rate_hz, 20);
        assert_eq!(config.generator.biome, Biome::Tundra);
        assert_eq!(config.world.light_budget, 64);
        assert_eq!(config.world.tick_drain_cap, 1000);
    }

    #[test]
    fn test_load_or_create_writes_defaults() {
        let dir = std::env::temp_dir().join("voxelcraft_test_config");
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("server.toml");

        let created = ServerConfig::load_or_create(&path).unwrap();
        assert!(path.exists());
        let reread = ServerConfig::load_or_create(&path).unwrap();
        assert_eq!(created, reread);

        std::fs::write(&path, "tick_rate_hz = \"fast\"").unwrap();
        assert!(ServerConfig::load_or_create(&path).is_err());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_cli_overrides() {
        let args =
            Args::try_parse_from(["voxelcraft-server", "--world", "/tmp/w", "--seed=-7"]).unwrap();
        let mut config = ServerConfig::default();
        config.apply(&args);
        assert_eq!(config.world_dir, PathBuf::from("/tmp/w"));
        assert_eq!(config.seed, -7);
        assert_eq!(config.tick_rate_hz, 20);
        assert_eq!(config.tick_interval(), std::time::Duration::from_millis(50));
    }
}
