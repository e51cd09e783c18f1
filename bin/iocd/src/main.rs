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

use std::{fs, path::PathBuf, str::FromStr, sync::Arc};

use log::{error, info, warn};
use simplelog::{ColorChoice, TermLogger, TerminalMode, WriteLogger};
use structopt::StructOpt;
use structopt_toml::StructOptToml;

use darkioc::{
    rpc::server::listen_and_serve,
    store::{Algorithm, Store},
    util::path::expand_path,
    Error, Result,
};

mod settings;

use iocd::{rpc::JsonRpcInterface, source::read_source_file};
use settings::{Args, CONFIG_FILE, CONFIG_FILE_CONTENTS};

/// Run the dataset administration flags. Returns true if one ran and
/// the process should exit instead of serving.
fn handle_admin(args: &Args, store: &Store) -> Result<bool> {
    if args.list {
        for name in store.list_datasets()? {
            println!("{}", name);
        }
        return Ok(true)
    }

    if let Some(name) = &args.create {
        let algorithm = Algorithm::from_str(&args.algorithm)?;
        store.create_dataset(name, algorithm, args.rekey_interval)?;
        println!("Created dataset {}", name);
        return Ok(true)
    }

    if let Some(name) = &args.remove {
        store.remove_dataset(name)?;
        println!("Removed dataset {} (data files left in place)", name);
        return Ok(true)
    }

    if let Some(name) = &args.purge {
        store.purge_dataset(name)?;
        println!("Purged dataset {}", name);
        return Ok(true)
    }

    if let Some(pair) = &args.sync {
        let (name, file) = split_name_file(pair)?;
        let delta = store.sync_from_source(name, read_source_file(&PathBuf::from(file))?)?;
        println!("Synced {}: {} added, {} removed", name, delta.added, delta.removed);
        return Ok(true)
    }

    if let Some(pair) = &args.rekey {
        let (name, file) = split_name_file(pair)?;
        let delta = store.rekey(name, read_source_file(&PathBuf::from(file))?)?;
        println!("Rekeyed {}: {} entries resealed", name, delta.added);
        return Ok(true)
    }

    Ok(false)
}

fn split_name_file(pair: &str) -> Result<(&str, &str)> {
    pair.split_once(':').ok_or(Error::ParseFailed("expected NAME:FILE"))
}

async fn realmain(args: Args, executor: Arc<smol::Executor<'static>>) -> Result<()> {
    let datastore = expand_path(&args.datastore)?;
    let store = Store::open(datastore)?;

    if handle_admin(&args, &store)? {
        return Ok(())
    }

    let rpc_interface = Arc::new(JsonRpcInterface::new(store));
    let ex = executor.clone();
    executor.spawn(listen_and_serve(args.rpc_listen.clone(), rpc_interface, ex)).detach();

    // Wait for the exit signal
    let (signal, shutdown) = smol::channel::bounded::<()>(1);
    ctrlc::set_handler(move || {
        warn!(target: "iocd", "Caught exit signal");
        if signal.try_send(()).is_err() {
            error!(target: "iocd", "Error on sending exit signal");
        }
    })
    .expect("setting the signal handler");

    shutdown.recv().await?;
    info!(target: "iocd", "Cleaning up and exiting...");

    Ok(())
}

fn main() -> Result<()> {
    let args = Args::from_args();

    let config_path = match &args.config {
        Some(path) => expand_path(path)?,
        None => expand_path(&format!("~/.config/darkioc/{}", CONFIG_FILE))?,
    };

    // Spawn the default config if it's not in place already
    if !config_path.exists() {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&config_path, CONFIG_FILE_CONTENTS)?;
    }

    let args = Args::from_args_with_toml(&fs::read_to_string(&config_path)?)
        .map_err(|e| Error::TomlDeserialize(e.to_string()))?;

    let log_level = match args.verbose {
        0 => simplelog::LevelFilter::Info,
        1 => simplelog::LevelFilter::Debug,
        _ => simplelog::LevelFilter::Trace,
    };
    let log_config = simplelog::Config::default();

    match &args.log {
        Some(path) => {
            let file = fs::File::create(expand_path(path)?)?;
            WriteLogger::init(log_level, log_config, file)?;
        }
        None => {
            TermLogger::init(log_level, log_config, TerminalMode::Mixed, ColorChoice::Auto)?;
        }
    }

    let n_threads = std::thread::available_parallelism().unwrap().get();
    let ex = Arc::new(smol::Executor::new());
    let (signal, shutdown) = smol::channel::unbounded::<()>();

    let (_, result) = easy_parallel::Parallel::new()
        .each(0..n_threads, |_| smol::future::block_on(ex.run(shutdown.recv())))
        .finish(|| {
            smol::future::block_on(async {
                realmain(args, ex.clone()).await?;
                drop(signal);
                Ok::<(), Error>(())
            })
        });

    result
}
