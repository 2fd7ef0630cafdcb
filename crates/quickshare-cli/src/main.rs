//! QuickShare CLI - peer-to-peer and cloud file sharing
//!
//! A thin front end over `quickshare-core`. File pickers, tunnels and
//! transfers are handled by an external engine process configured in
//! `config.toml` or passed with `--engine`.
//!
//! ## Quick Start
//!
//! ```bash
//! # Share files through a P2P room
//! quickshare share ./document.pdf
//!
//! # Join the room (on another device)
//! quickshare receive 482910
//! ```

#![allow(clippy::doc_markdown)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

use anyhow::Result;
use clap::Parser;

mod commands;
pub mod ui;

use commands::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let engine = cli.engine.as_deref();
    match cli.command {
        Command::Share(args) => commands::share::run(args, engine).await,
        Command::Receive(args) => commands::receive::run(args, engine).await,
        Command::Settings(args) => commands::settings::run(args, engine).await,
        Command::History(args) => commands::history::run(args).await,
        Command::Config(args) => commands::config::run(args).await,
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let default = if verbose {
        "warn,quickshare=debug,quickshare_core=debug"
    } else {
        "warn,quickshare=info,quickshare_core=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}
