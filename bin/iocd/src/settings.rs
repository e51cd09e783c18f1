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

use serde::Deserialize;
use structopt::StructOpt;
use structopt_toml::StructOptToml;
use url::Url;

pub const CONFIG_FILE: &str = "iocd_config.toml";
pub const CONFIG_FILE_CONTENTS: &str = include_str!("../iocd_config.toml");

/// iocd cli
#[derive(Clone, Debug, Deserialize, StructOpt, StructOptToml)]
#[serde(default)]
#[structopt(name = "iocd")]
pub struct Args {
    /// Sets a custom config file
    #[structopt(long)]
    pub config: Option<String>,

    /// JSON-RPC listen URL
    #[structopt(long = "rpc", default_value = "tcp://127.0.0.1:25570")]
    pub rpc_listen: Url,

    /// Sets datastore path
    #[structopt(long, default_value = "~/.iocd")]
    pub datastore: String,

    /// Create a dataset and exit
    #[structopt(long)]
    pub create: Option<String>,

    /// Algorithm tag recorded at dataset creation
    #[structopt(long, default_value = "classic")]
    pub algorithm: String,

    /// Remove a dataset's schema and key and exit (data files stay)
    #[structopt(long)]
    pub remove: Option<String>,

    /// Delete a dataset directory entirely and exit
    #[structopt(long)]
    pub purge: Option<String>,

    /// Sync a dataset from a source file, NAME:FILE, and exit
    #[structopt(long)]
    pub sync: Option<String>,

    /// Rekey a dataset from a source file, NAME:FILE, and exit
    #[structopt(long)]
    pub rekey: Option<String>,

    /// List datasets and exit
    #[structopt(long)]
    pub list: bool,

    /// Rekey interval in days recorded at dataset creation
    #[structopt(long, default_value = "30")]
    pub rekey_interval: u64,

    /// Increase verbosity (-vvv supported)
    #[structopt(short, parse(from_occurrences))]
    pub verbose: u8,

    /// Set log file to ouput into
    #[structopt(short, long)]
    pub log: Option<String>,
}
