//! CLI command definitions and handlers.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::process::Child;
use tokio::sync::mpsc;

use quickshare_core::config::Config;
use quickshare_core::engine::{BridgeProcess, MissingHostEngine};
use quickshare_core::history::HistoryStore;
use quickshare_core::progress::EngineEvent;
use quickshare_core::Orchestrator;

pub mod config;
pub mod history;
pub mod receive;
pub mod settings;
pub mod share;

/// Load configuration with graceful fallback to defaults.
pub fn load_config() -> Config {
    Config::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "using default configuration");
        Config::default()
    })
}

/// An orchestrator wired to the configured engine.
pub struct Runtime {
    /// The orchestrator
    pub app: Orchestrator,
    /// Engine pushes, when a real engine is attached
    pub events: Option<mpsc::UnboundedReceiver<EngineEvent>>,
    /// Engine process, killed on drop
    _child: Option<Child>,
}

impl Runtime {
    /// Launch the configured engine, or run without one.
    pub fn open(config: &Config, engine_override: Option<&str>, record_history: bool) -> Result<Self> {
        let command = engine_override
            .map(str::to_string)
            .or_else(|| config.engine.command.clone());

        let (app, events, child) = match command {
            Some(program) => {
                let (engine, events, child) =
                    BridgeProcess::launch(&program, &config.engine.args, config.engine.request_timeout)
                        .with_context(|| format!("could not start engine '{program}'"))?
                        .into_parts();
                (Orchestrator::with_config(engine, config), Some(events), Some(child))
            }
            None => (Orchestrator::with_config(MissingHostEngine, config), None, None),
        };

        let app = if record_history && config.history.enabled {
            match HistoryStore::load(config.history.clone()) {
                Ok(store) => app.with_history(store),
                Err(e) => {
                    tracing::warn!(error = %e, "history unavailable");
                    app
                }
            }
        } else {
            app
        };

        Ok(Self {
            app,
            events,
            _child: child,
        })
    }

    /// Wait for the next engine push; pends forever without an engine.
    pub async fn next_event(&mut self) -> Option<EngineEvent> {
        match self.events.as_mut() {
            Some(rx) => rx.recv().await,
            None => std::future::pending().await,
        }
    }
}

/// QuickShare - peer-to-peer and cloud file sharing
#[derive(Parser)]
#[command(name = "quickshare")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Log engine traffic and state transitions
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Engine executable, overriding the configuration
    #[arg(long, global = true, env = "QUICKSHARE_ENGINE")]
    pub engine: Option<String>,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand)]
pub enum Command {
    /// Share files through a P2P room or a cloud link
    Share(ShareArgs),

    /// Join a room or open a cloud link
    Receive(ReceiveArgs),

    /// View or edit the engine's tunnel and signaling settings
    Settings(SettingsArgs),

    /// View transfer history
    History(HistoryArgs),

    /// Manage local configuration
    Config(ConfigArgs),
}

/// Arguments for the share command
#[derive(Args)]
pub struct ShareArgs {
    /// Files and folders to share
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Share through a public cloud link instead of a P2P room
    #[arg(long)]
    pub cloud: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the receive command
#[derive(Args)]
pub struct ReceiveArgs {
    /// Room code or share link
    pub code_or_url: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the settings command
#[derive(Args)]
pub struct SettingsArgs {
    /// Settings subcommand
    #[command(subcommand)]
    pub action: SettingsAction,
}

/// Settings subcommands
#[derive(Subcommand)]
pub enum SettingsAction {
    /// Show the current settings
    Show {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Change one field and save
    Set {
        /// Field name, e.g. `signaling_url` or `use_duckdns`
        field: String,

        /// New value
        value: String,
    },
}

/// Arguments for the history command
#[derive(Args)]
pub struct HistoryArgs {
    /// Number of entries to show
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Clear history
    #[arg(long)]
    pub clear: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the config command
#[derive(Args)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config subcommands
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show all configuration
    Show,

    /// Show the configuration file path
    Path,
}
