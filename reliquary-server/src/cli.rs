// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Command line entry points. */

use clap::{Parser, Subcommand};
use reliquary::{reindex::reindex, settings::Settings, store::Store};
use std::{net::SocketAddr, path::PathBuf};
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::{server, state::AppState};

#[derive(Debug, Parser)]
#[command(name = "reliquary-server", about = "Self-hosted artifact repository")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server.
    Serve {
        /// Path to the TOML configuration file.
        config: PathBuf,

        /// Address to listen on.
        #[arg(long, default_value = "0.0.0.0:6543")]
        bind: SocketAddr,
    },

    /// Reconcile the catalog with the storage tree.
    Reindex {
        /// Path to the TOML configuration file.
        config: Option<PathBuf>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run_serve(config: PathBuf, bind: SocketAddr) -> anyhow::Result<()> {
    let settings = Settings::from_file(&config)?;
    let store = Store::connect(&settings.database.url).await?;

    let state = AppState::new(store.clone(), settings);
    let result = server::serve(state, bind).await;

    store.close().await;
    result
}

async fn run_reindex(config: PathBuf) -> anyhow::Result<()> {
    let settings = Settings::from_file(&config)?;
    let store = Store::connect(&settings.database.url).await?;

    // The catalog connection is released no matter how the sweep ends.
    let result = reindex(&store, &settings).await;
    store.close().await;

    Ok(result?)
}

/// Run the CLI, returning the process exit code.
pub async fn run_cli() -> i32 {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve { config, bind } => match run_serve(config, bind).await {
            Ok(()) => 0,
            Err(e) => {
                error!("server failed: {:#}", e);
                1
            }
        },
        Command::Reindex { config: None } => {
            error!("at least the config file is needed");
            2
        }
        Command::Reindex {
            config: Some(config),
        } => match run_reindex(config).await {
            Ok(()) => 0,
            Err(e) => {
                error!("reindex failed: {:#}", e);
                1
            }
        },
    }
}
