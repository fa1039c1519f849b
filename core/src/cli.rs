use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info};

use crate::config::Config;
use crate::engine::Engine;
use crate::script_host::ScriptHost;

#[derive(Parser)]
#[command(name = "funcscript")]
#[command(about = "FuncScript - declared script functions run against a TOML host", long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default search)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Let calls to undeclared functions make up a template
    #[arg(long, global = true)]
    pub templates_optional: bool,

    /// Log level filter (overrides config file and env vars)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Declare every function of a host file and print the templates as JSON
    Check {
        /// Host file
        host: PathBuf,
    },

    /// Run a call expression against a host file
    Run {
        /// Host file
        host: PathBuf,

        /// Call expression, e.g. 'Add(5, 2)'
        expression: String,

        /// Most ticks to pump delayed calls for after the call returns
        #[arg(long, default_value = "600")]
        max_ticks: u64,

        /// Milliseconds per tick
        #[arg(long, default_value = "16")]
        tick_ms: u64,
    },
}

impl Cli {
    /// Configuration with this command line's overrides applied.
    pub fn load_config(&self) -> Result<Config> {
        Config::builder()
            .config_path(self.config.clone())
            .templates_optional(self.templates_optional.then_some(true))
            .log_level(self.log_level.clone())
            .build()
    }
}

/// Run the CLI by parsing process arguments
pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;
    crate::logging::init(&config.logging)?;
    run_cli_with_config(cli, config).await
}

/// Handle a parsed command line with already-loaded configuration.
pub async fn run_cli_with_config(cli: Cli, config: Config) -> Result<()> {
    match cli.command {
        Commands::Check { host } => {
            let host = ScriptHost::load(&host)?;
            let mut engine = Engine::new(config.engine);
            host.declare_all(&mut engine)?;

            let templates: Vec<_> = engine.templates().collect();
            println!("{}", serde_json::to_string_pretty(&templates)?);
        }

        Commands::Run {
            host,
            expression,
            max_ticks,
            tick_ms,
        } => {
            let mut host = ScriptHost::load(&host)?;
            let mut engine = Engine::new(config.engine);
            host.declare_all(&mut engine)?;

            let result = engine.run_script(&mut host, &expression);
            pump_delayed(&mut engine, &mut host, max_ticks, Duration::from_millis(tick_ms.max(1))).await;

            for line in &host.output {
                println!("{}", line);
            }
            let log = engine.current_log(true);
            if !log.is_empty() {
                eprintln!("{}", log);
            }

            match result {
                Ok(value) => println!("=> {} ({})", value.as_string(), engine.last_return_type()),
                Err(err) => bail!("{}", err),
            }
        }
    }

    Ok(())
}

/// Drive the delayed queue on a fixed tick until it empties or `max_ticks` pass.
/// Returns the number of ticks pumped.
pub async fn pump_delayed(engine: &mut Engine, host: &mut ScriptHost, max_ticks: u64, tick: Duration) -> u64 {
    let mut interval = tokio::time::interval(tick);
    let mut last = Instant::now();
    let mut ticks = 0;

    while ticks < max_ticks && engine.delayed_functions().next().is_some() {
        interval.tick().await;
        let now = Instant::now();
        let ran = engine.advance_ticks(host, 1) + engine.advance_time(host, now - last);
        last = now;
        ticks += 1;
        if ran > 0 {
            debug!(tick = ticks, ran, "pumped delayed functions");
        }
    }

    let left = engine.delayed_functions().count();
    if left > 0 {
        info!(left, ticks, "stopped pumping with delayed functions still queued");
    }
    ticks
}
