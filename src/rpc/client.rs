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

use log::debug;
use serde_json::Value;
use smol::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    lock::Mutex,
    net::TcpStream,
};
use url::Url;

use super::jsonrpc::JsonRequest;
use crate::{Error, Result};

/// A JSON-RPC client over one TCP connection. Requests are serialized
/// behind a lock; the protocol is strictly request/reply.
pub struct RpcClient {
    endpoint: Url,
    stream: Mutex<TcpStream>,
}

impl RpcClient {
    pub async fn new(endpoint: Url) -> Result<Self> {
        if endpoint.scheme() != "tcp" {
            return Err(Error::UnsupportedTransport(endpoint.scheme().to_string()))
        }

        let host =
            endpoint.host_str().ok_or(Error::ParseFailed("missing host in RPC endpoint"))?;
        let port = endpoint.port().ok_or(Error::ParseFailed("missing port in RPC endpoint"))?;

        let stream = TcpStream::connect((host, port))
            .await
            .map_err(|e| Error::ConnectFailed(format!("{}: {}", endpoint, e)))?;

        debug!(target: "rpc::client", "Connected to {}", endpoint);
        Ok(Self { endpoint, stream: Mutex::new(stream) })
    }

    /// Send a request and wait for its reply. A JSON-RPC error reply
    /// becomes `Error::JsonRpc`.
    pub async fn request(&self, req: JsonRequest) -> Result<Value> {
        let stream = self.stream.lock().await;

        let mut text = req.to_json().to_string();
        text.push('\n');

        let mut writer = stream.clone();
        writer.write_all(text.as_bytes()).await?;

        let mut reader = BufReader::new(stream.clone());

        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            return Err(Error::NetworkOperationFailed(format!(
                "{} closed the connection",
                self.endpoint
            )))
        }

        let reply: Value = serde_json::from_str(&line)?;

        if reply["id"] != req.id {
            return Err(Error::UnexpectedRpcReply("reply id does not match request".to_string()))
        }

        if let Some(err) = reply.get("error") {
            let code = err["code"].as_i64().unwrap_or(0);
            let message = err["message"].as_str().unwrap_or("").to_string();
            return Err(Error::JsonRpc(code, message))
        }

        match reply.get("result") {
            Some(result) => Ok(result.clone()),
            None => Err(Error::UnexpectedRpcReply("reply has no result".to_string())),
        }
    }

    pub async fn close(&self) -> Result<()> {
        let stream = self.stream.lock().await;
        stream.shutdown(std::net::Shutdown::Both)?;
        Ok(())
    }
}
