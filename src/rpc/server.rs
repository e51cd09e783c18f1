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

use std::{net::SocketAddr, sync::Arc};

use async_trait::async_trait;
use log::{debug, error, info};
use serde_json::Value;
use smol::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    Executor,
};
use url::Url;

use super::jsonrpc::{ErrorCode, JsonError, JsonRequest, JsonResult};
use crate::{Error, Result};

/// Implemented by anything that answers JSON-RPC requests.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle_request(&self, req: JsonRequest) -> JsonResult;
}

/// Bind the endpoint and serve requests until the listener dies.
/// Each connection runs detached on the executor.
pub async fn listen_and_serve(
    endpoint: Url,
    handler: Arc<dyn RequestHandler>,
    ex: Arc<Executor<'static>>,
) -> Result<()> {
    if endpoint.scheme() != "tcp" {
        return Err(Error::UnsupportedTransport(endpoint.scheme().to_string()))
    }

    let host = endpoint.host_str().ok_or(Error::ParseFailed("missing host in RPC endpoint"))?;
    let port = endpoint.port().ok_or(Error::ParseFailed("missing port in RPC endpoint"))?;

    let listener = TcpListener::bind((host, port)).await?;
    info!(target: "rpc::server", "JSON-RPC server listening on {}", endpoint);

    loop {
        let (stream, peer_addr) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                error!(target: "rpc::server", "Failed accepting connection: {}", e);
                continue
            }
        };

        let handler = handler.clone();
        ex.spawn(async move {
            if let Err(e) = accept(stream, peer_addr, handler).await {
                debug!(target: "rpc::server", "Connection {} closed: {}", peer_addr, e);
            }
        })
        .detach();
    }
}

/// Serve one connection: read a request line, dispatch, write the
/// reply line, repeat until EOF.
pub async fn accept(
    stream: TcpStream,
    peer_addr: SocketAddr,
    handler: Arc<dyn RequestHandler>,
) -> Result<()> {
    debug!(target: "rpc::server", "Accepted connection from {}", peer_addr);

    let mut reader = BufReader::new(stream.clone());
    let mut writer = stream;
    let mut line = String::new();

    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            break
        }

        let reply = match serde_json::from_str::<Value>(&line) {
            Ok(value) => match JsonRequest::from_json(&value) {
                Ok(req) => {
                    debug!(target: "rpc::server", "{} --> {}", peer_addr, req.method);
                    handler.handle_request(req).await
                }
                Err(_) => {
                    JsonError::new(ErrorCode::InvalidRequest, None, Value::Null).into()
                }
            },
            Err(_) => JsonError::new(ErrorCode::ParseError, None, Value::Null).into(),
        };

        let mut text = reply.to_json().to_string();
        text.push('\n');
        writer.write_all(text.as_bytes()).await?;
    }

    Ok(())
}
