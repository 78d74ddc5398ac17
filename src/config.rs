use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::engine::{LogFlag, LogFlags, SimulatedEngineConfig, WaveFormat};
use crate::session::SessionConfig;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub session: SessionConfig,
    pub output: OutputConfig,
    pub engine: SimulatedEngineConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory for wave and log captures; `~` is expanded
    pub directory: String,
    pub wave_format: WaveFormat,
    pub log_flags: Vec<LogFlag>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: ".".to_string(),
            wave_format: WaveFormat::Mono16Khz11,
            log_flags: vec![LogFlag::Text],
        }
    }
}

impl OutputConfig {
    pub fn directory(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.directory).as_ref())
    }

    pub fn log_flags(&self) -> LogFlags {
        self.log_flags.iter().copied().collect()
    }
}

impl Config {
    /// Load from a TOML file (extension optional) with `DECTALK__` environment
    /// overrides, e.g. `DECTALK__SESSION__RATE=250`.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("DECTALK").separator("__"))
            .build()
            .with_context(|| format!("Failed to read config {path}"))?;

        Ok(settings.try_deserialize()?)
    }
}
