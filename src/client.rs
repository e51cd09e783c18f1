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

//! Client orchestration: one RPC connection plus the per-dataset
//! mirrors below a local state directory. Drives sync, the OPRF round
//! and the query flow.

use std::path::PathBuf;

use log::{debug, warn};
use serde_json::json;
use url::Url;

use crate::{
    crypto::oprf,
    mirror::{Mirror, QueryResult},
    rpc::{client::RpcClient, jsonrpc::JsonRequest},
    store::{changelog::ChangeEvent, SyncMode},
    Error, Result,
};

/// Where the local mirror of `(server, dataset)` lives. Usable without
/// a connection; `purge` never contacts the server.
pub fn local_dataset_dir(endpoint: &Url, base_dir: &std::path::Path, name: &str) -> PathBuf {
    let host = endpoint.host_str().unwrap_or("unknown");
    let label = match endpoint.port() {
        Some(port) => format!("{}_{}", host, port),
        None => host.to_string(),
    };
    base_dir.join(label).join(name)
}

pub struct Client {
    endpoint: Url,
    rpc: RpcClient,
    base_dir: PathBuf,
}

impl Client {
    pub async fn new(endpoint: Url, base_dir: PathBuf) -> Result<Self> {
        let rpc = RpcClient::new(endpoint.clone()).await?;
        Ok(Self { endpoint, rpc, base_dir })
    }

    /// Local state directory for one dataset on this server.
    fn dataset_dir(&self, name: &str) -> PathBuf {
        local_dataset_dir(&self.endpoint, &self.base_dir, name)
    }

    /// Open the mirror for a dataset. A corrupted local log is wiped
    /// and replaced by an empty mirror; the next sync refills it.
    fn open_mirror(&self, name: &str) -> Result<Mirror> {
        let dir = self.dataset_dir(name);
        match Mirror::open(&dir, name) {
            Ok(mirror) => Ok(mirror),
            Err(Error::Inconsistent(e)) => {
                warn!(target: "client", "Local log for {} is corrupt ({}), resetting", name, e);
                Mirror::purge(&dir)?;
                Mirror::open(&dir, name)
            }
            Err(e) => Err(e),
        }
    }

    /// Fetch and apply changes. Falls back to a full resync when the
    /// server no longer knows our tip or the delta does not chain.
    pub async fn sync(&self, name: &str) -> Result<usize> {
        let mut mirror = self.open_mirror(name)?;
        self.sync_mirror(&mut mirror, name).await
    }

    async fn sync_mirror(&self, mirror: &mut Mirror, name: &str) -> Result<usize> {
        let since = mirror.tip().map(hex::encode);
        let (mode, events) = self.fetch_changes(name, since).await?;

        // A full response means the server truncated (or never saw our
        // tip); the mirror discards local state before applying.
        match mirror.apply(mode, &events) {
            Ok(()) => Ok(events.len()),
            Err(Error::Inconsistent(e)) => {
                warn!(target: "client", "Delta for {} did not chain ({}), full resync", name, e);
                let (_, events) = self.fetch_changes(name, None).await?;
                mirror.apply(SyncMode::Full, &events)?;
                Ok(events.len())
            }
            Err(e) => Err(e),
        }
    }

    async fn fetch_changes(
        &self,
        name: &str,
        since: Option<String>,
    ) -> Result<(SyncMode, Vec<ChangeEvent>)> {
        let req = JsonRequest::new("sync_data", json!([name, since]));
        let rep = self.rpc.request(req).await?;

        let mode = SyncMode::from_str(
            rep["mode"].as_str().ok_or(Error::ParseFailed("sync_data reply without mode"))?,
        )?;

        let lines = rep["events"]
            .as_array()
            .ok_or(Error::ParseFailed("sync_data reply without events"))?;

        let mut events = Vec::with_capacity(lines.len());
        for line in lines {
            let line =
                line.as_str().ok_or(Error::ParseFailed("sync_data event is not a string"))?;
            events.push(ChangeEvent::from_line(line)?);
        }

        debug!(target: "client", "Fetched {} {} events for {}", events.len(), mode.as_str(), name);
        Ok((mode, events))
    }

    /// The full query flow. Sync is best-effort: with a populated local
    /// mirror the query proceeds even if the sync leg fails.
    pub async fn query(&self, name: &str, ioc: &str) -> Result<QueryResult> {
        let mut mirror = self.open_mirror(name)?;

        if let Err(e) = self.sync_mirror(&mut mirror, name).await {
            if mirror.is_empty() {
                return Err(e)
            }
            warn!(target: "client", "Sync failed ({}), querying cached state", e);
        }

        let blinded = oprf::blind(ioc.as_bytes());
        let req =
            JsonRequest::new("oprf_evaluate", json!([name, hex::encode(blinded.element)]));
        let rep = self.rpc.request(req).await?;

        let evaluated_hex = rep["evaluated"]
            .as_str()
            .ok_or(Error::ParseFailed("oprf_evaluate reply without element"))?;
        let evaluated = hex::decode(evaluated_hex)?;
        let q = oprf::unblind(&blinded.factor, &evaluated)?;

        let result = mirror.finish_query(ioc.as_bytes(), &q);
        mirror.record_history(ioc, &result)?;
        Ok(result)
    }

    /// Discard local state and sync from scratch.
    pub async fn reset(&self, name: &str) -> Result<usize> {
        Mirror::purge(&self.dataset_dir(name))?;
        self.sync(name).await
    }

    /// Discard local state without contacting the server.
    pub fn purge(&self, name: &str) -> Result<()> {
        Mirror::purge(&self.dataset_dir(name))
    }

    pub async fn encryption_type(&self, name: &str) -> Result<(String, String)> {
        let req = JsonRequest::new("encryption_type", json!([name]));
        let rep = self.rpc.request(req).await?;

        let suite = rep["suite"]
            .as_str()
            .ok_or(Error::ParseFailed("encryption_type reply without suite"))?;
        let encryption = rep["encryption"]
            .as_str()
            .ok_or(Error::ParseFailed("encryption_type reply without encryption"))?;

        Ok((suite.to_string(), encryption.to_string()))
    }

    pub async fn ping(&self) -> Result<()> {
        let rep = self.rpc.request(JsonRequest::new("ping", json!([]))).await?;
        if rep != json!("pong") {
            return Err(Error::UnexpectedRpcReply(rep.to_string()))
        }
        Ok(())
    }

    pub async fn close(&self) -> Result<()> {
        self.rpc.close().await
    }
}
