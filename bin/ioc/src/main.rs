/* This file is part of DarkFi (https://dark.fi)
 *
 * Copyright (C) 2020-2026 Dyne.org foundation
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as
 * published by the Free Software Foundation, either version 3 of the
 * License, or (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use std::process::exit;

use clap::{Parser, Subcommand};
use log::error;
use simplelog::{ColorChoice, TermLogger, TerminalMode};
use url::Url;

use darkioc::{
    client::{local_dataset_dir, Client},
    mirror::{Mirror, QueryResult},
    util::path::expand_path,
    Result,
};

#[derive(Parser)]
#[command(name = "ioc", about = "Command-line client for iocd")]
struct Args {
    #[arg(short, action = clap::ArgAction::Count)]
    /// Increase verbosity (-vvv supported)
    verbose: u8,

    #[arg(short, long, default_value = "tcp://127.0.0.1:25570")]
    /// iocd JSON-RPC endpoint
    endpoint: Url,

    #[arg(long, default_value = "~/.ioc")]
    /// Local state directory
    datastore: String,

    #[command(subcommand)]
    command: Subcmd,
}

#[derive(Subcommand)]
enum Subcmd {
    /// Send a ping request to the iocd RPC endpoint
    Ping,

    /// Sync the local mirror of a dataset's change log
    Sync {
        /// Dataset name
        name: String,
    },

    /// Query an IOC against a dataset
    Query {
        /// Dataset name
        name: String,
        /// The indicator to look up
        ioc: String,
    },

    /// Discard local state for a dataset and sync from scratch
    Reset {
        /// Dataset name
        name: String,
    },

    /// Delete local state for a dataset without contacting the server
    Purge {
        /// Dataset name
        name: String,
    },

    /// Show the server's cipher-suite identifiers for a dataset
    Info {
        /// Dataset name
        name: String,
    },
}

async fn realmain(args: Args) -> Result<()> {
    let base_dir = expand_path(&args.datastore)?;

    // Purge never talks to the server
    if let Subcmd::Purge { name } = &args.command {
        Mirror::purge(&local_dataset_dir(&args.endpoint, &base_dir, name))?;
        println!("Purged local state for {}", name);
        return Ok(())
    }

    let client = Client::new(args.endpoint.clone(), base_dir).await?;

    match &args.command {
        Subcmd::Ping => {
            client.ping().await?;
            println!("Server replied: pong");
        }

        Subcmd::Sync { name } => {
            let applied = client.sync(name).await?;
            println!("Synced {}: {} events applied", name, applied);
        }

        Subcmd::Query { name, ioc } => {
            let result = client.query(name, ioc).await?;

            match result {
                QueryResult::Match(metadata) => {
                    println!("{}", String::from_utf8_lossy(&metadata));
                }
                QueryResult::NoMatch => {
                    println!("No match");
                    exit(1);
                }
                QueryResult::DecryptFailed => {
                    error!("Entry found but decryption failed; resync and retry");
                    exit(2);
                }
            }
        }

        Subcmd::Reset { name } => {
            let applied = client.reset(name).await?;
            println!("Reset {}: {} events applied", name, applied);
        }

        Subcmd::Purge { .. } => unreachable!(),

        Subcmd::Info { name } => {
            let (suite, encryption) = client.encryption_type(name).await?;
            println!("suite: {}", suite);
            println!("encryption: {}", encryption);
        }
    }

    client.close().await?;
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = match args.verbose {
        0 => simplelog::LevelFilter::Warn,
        1 => simplelog::LevelFilter::Info,
        2 => simplelog::LevelFilter::Debug,
        _ => simplelog::LevelFilter::Trace,
    };
    TermLogger::init(
        log_level,
        simplelog::Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )?;

    smol::block_on(realmain(args))
}
