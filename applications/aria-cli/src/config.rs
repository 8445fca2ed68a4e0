/// CLI configuration
use anyhow::Context;
use aria_playback::PlayerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file picked up from the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "aria.toml";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub player: PlayerConfig,

    /// Locators played when no files are passed on the command line
    #[serde(default)]
    pub queue: Vec<String>,

    #[serde(default = "default_catalog_dir")]
    pub catalog_dir: PathBuf,

    /// Clock resolution of the simulated engine
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            player: PlayerConfig::default(),
            queue: Vec::new(),
            catalog_dir: default_catalog_dir(),
            tick_ms: default_tick_ms(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// `path` must exist when given; otherwise `aria.toml` is read if present.
    /// `ARIA_`-prefixed variables override both, with `__` between nested
    /// keys (`ARIA_PLAYER__DESIRED_RATE=1.5`).
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut settings = config::Config::builder();

        match path {
            Some(path) => {
                settings = settings.add_source(config::File::from(path).required(true));
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    settings = settings.add_source(config::File::from(default_path));
                }
            }
        }

        settings = settings.add_source(
            config::Environment::with_prefix("ARIA")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = settings
            .build()
            .context("failed to read configuration")?
            .try_deserialize()
            .context("invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.player.validate()?;
        anyhow::ensure!(self.tick_ms > 0, "tick_ms must be positive");
        Ok(())
    }
}

fn default_catalog_dir() -> PathBuf {
    PathBuf::from("./data/catalog")
}

fn default_tick_ms() -> u64 {
    250
}
