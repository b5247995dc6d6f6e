use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::Level;

use crate::error::{AppError, Result};

const CONFIG_FILE_NAME: &str = "lanecap";
const ENV_PREFIX: &str = "LANECAP";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub settings_path: PathBuf,
    pub features_path: PathBuf,
    pub labels_path: PathBuf,
    pub tick_ms: u64,
    pub log_level: String,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            settings_path: PathBuf::from("settings.json"),
            features_path: PathBuf::from("data.csv"),
            labels_path: PathBuf::from("data_label.csv"),
            tick_ms: 30,
            log_level: "info".to_string(),
        }
    }
}

impl Configuration {
    /// Defaults, then `lanecap.{toml,json,...}` in the working directory if
    /// present, then `file` if given, then `LANECAP_*` environment variables.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name(CONFIG_FILE_NAME).required(false));
        if let Some(file) = file {
            builder = builder.add_source(config::File::from(file).required(true));
        }
        let configuration: Configuration = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| AppError::Configuration(e.to_string()))?;
        configuration.validate()?;
        Ok(configuration)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tick_ms == 0 {
            return Err(AppError::Configuration(
                "tick_ms must be greater than 0".to_string(),
            ));
        }
        self.max_log_level()?;
        Ok(())
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn max_log_level(&self) -> Result<Level> {
        self.log_level
            .parse::<Level>()
            .map_err(|_| AppError::Configuration(format!("unknown log level '{}'", self.log_level)))
    }
}
