//! Configuration
//!
//! Resolved in layers: built-in defaults, then a TOML file (`funcscript.toml`, an
//! explicit path, or `FUNCSCRIPT_CONFIG_PATH`), then `FUNCSCRIPT_*` environment
//! variables with `__` between sections and keys.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const ENV_PREFIX: &str = "FUNCSCRIPT";
pub const CONFIG_PATH_ENV: &str = "FUNCSCRIPT_CONFIG_PATH";
const DEFAULT_CONFIG_FILE: &str = "funcscript.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Engine behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Let script calls to undeclared functions synthesize a template.
    #[serde(default)]
    pub templates_optional: bool,
    /// Argument slots of the expression-call surface, including the function
    /// name and repeat count.
    #[serde(default = "default_expression_slots")]
    pub expression_slots: usize,
}

fn default_expression_slots() -> usize {
    16
}

impl EngineConfig {
    /// Most parameters a template may declare.
    pub fn max_params(&self) -> usize {
        self.expression_slots.saturating_sub(2)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            templates_optional: false,
            expression_slots: default_expression_slots(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Load with no overrides.
    pub fn load() -> Result<Self> {
        Self::builder().build()
    }

    fn validate(&self) -> Result<()> {
        if self.engine.expression_slots < 2 {
            bail!(
                "engine.expression_slots must be at least 2, got {}",
                self.engine.expression_slots
            );
        }
        Ok(())
    }
}

/// Builder for [`Config`]; explicit values win over every other layer.
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    config_path: Option<PathBuf>,
    templates_optional: Option<bool>,
    log_level: Option<String>,
    skip_dotenv: bool,
}

impl ConfigBuilder {
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    pub fn templates_optional(mut self, value: Option<bool>) -> Self {
        self.templates_optional = value;
        self
    }

    pub fn log_level(mut self, level: Option<String>) -> Self {
        self.log_level = level;
        self
    }

    /// Don't read `.env` before resolving environment variables.
    pub fn skip_dotenv(mut self) -> Self {
        self.skip_dotenv = true;
        self
    }

    pub fn build(self) -> Result<Config> {
        if !self.skip_dotenv {
            dotenvy::dotenv().ok();
        }

        let mut builder = config::Config::builder()
            .set_default("engine.templates_optional", false)?
            .set_default("engine.expression_slots", default_expression_slots() as i64)?
            .set_default("logging.level", default_log_level())?;

        let path = self
            .config_path
            .or_else(|| std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from));
        builder = match path {
            Some(path) => {
                if !path.exists() {
                    bail!("Config file not found: {}", path.display());
                }
                builder.add_source(config::File::new(
                    &path.to_string_lossy(),
                    config::FileFormat::Toml,
                ))
            }
            None => builder.add_source(
                config::File::new(DEFAULT_CONFIG_FILE, config::FileFormat::Toml).required(false),
            ),
        };

        builder = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("engine.templates_optional", self.templates_optional)?
            .set_override_option("logging.level", self.log_level)?;

        let config: Config = builder
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;
        config.validate()?;
        Ok(config)
    }
}
