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

use std::{sync::Arc, time::Duration};

use serde_json::json;
use smol::{Executor, Timer};
use url::Url;

use darkioc::{
    client::Client,
    mirror::QueryResult,
    rpc::{client::RpcClient, jsonrpc::JsonRequest, server::listen_and_serve},
    store::{Algorithm, Store},
    Error, Result,
};
use iocd::rpc::JsonRpcInterface;

async fn connect(endpoint: &Url) -> Result<RpcClient> {
    // The server task may still be binding
    for _ in 0..50 {
        if let Ok(client) = RpcClient::new(endpoint.clone()).await {
            return Ok(client)
        }
        Timer::after(Duration::from_millis(10)).await;
    }
    RpcClient::new(endpoint.clone()).await
}

#[test]
fn rpc_reqrep() -> Result<()> {
    let dir = tempdir::TempDir::new("iocd_rpc").unwrap();

    let store = Store::open(dir.path().join("server"))?;
    store.create_dataset("ds1", Algorithm::Classic, 30)?;
    store.sync_from_source(
        "ds1",
        vec![Ok(("evil.com".to_string(), b"{\"desc\":\"known bad domain\"}".to_vec()))],
    )?;

    // Find an available port
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    let endpoint = Url::parse(&format!("tcp://127.0.0.1:{}", listener.local_addr()?.port()))?;
    drop(listener);

    let handler = Arc::new(JsonRpcInterface::new(store));

    let ex = Arc::new(Executor::new());
    let ex2 = ex.clone();

    smol::block_on(ex.run(async move {
        let _ex = ex2.clone();
        ex2.spawn(listen_and_serve(endpoint.clone(), handler, _ex)).detach();

        let rpc = connect(&endpoint).await?;

        // ping
        let rep = rpc.request(JsonRequest::new("ping", json!([]))).await?;
        assert_eq!(rep, json!("pong"));

        // encryption_type
        let rep = rpc.request(JsonRequest::new("encryption_type", json!(["ds1"]))).await?;
        assert_eq!(rep["suite"], json!("oprf-ristretto255-sha512"));
        assert_eq!(rep["encryption"], json!("xchacha20poly1305-ietf"));

        // Unknown dataset
        let rep = rpc.request(JsonRequest::new("encryption_type", json!(["nope"]))).await;
        assert!(matches!(rep, Err(Error::JsonRpc(-32011, _))));

        // Malformed blinded element surfaces the invalid-encoding code
        let short = hex::encode([0u8; 31]);
        let rep =
            rpc.request(JsonRequest::new("oprf_evaluate", json!(["ds1", short]))).await;
        assert!(matches!(rep, Err(Error::JsonRpc(-32010, _))));

        rpc.close().await?;

        // Full query flow over the wire
        let client = Client::new(endpoint.clone(), dir.path().join("client")).await?;

        let result = client.query("ds1", "evil.com").await?;
        assert_eq!(result, QueryResult::Match(b"{\"desc\":\"known bad domain\"}".to_vec()));

        let result = client.query("ds1", "benign.com").await?;
        assert_eq!(result, QueryResult::NoMatch);

        client.close().await?;
        Ok(())
    }))
}
