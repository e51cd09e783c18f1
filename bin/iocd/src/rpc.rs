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

use async_trait::async_trait;
use log::debug;
use serde_json::{json, Value};

use darkioc::{
    crypto::CHAIN_HASH_LEN,
    rpc::{
        jsonrpc::{ErrorCode, JsonError, JsonRequest, JsonResponse, JsonResult},
        server::RequestHandler,
    },
    store::{Store, ENCRYPTION, SUITE},
    Error, Result,
};

// Server error codes carried in JSON-RPC error replies
const ERR_INVALID_ENCODING: i64 = -32010;
const ERR_UNKNOWN_DATASET: i64 = -32011;
const ERR_INTERNAL: i64 = -32012;

pub struct JsonRpcInterface {
    store: Store,
}

#[async_trait]
impl RequestHandler for JsonRpcInterface {
    async fn handle_request(&self, req: JsonRequest) -> JsonResult {
        if !req.params.is_array() {
            return JsonError::new(ErrorCode::InvalidParams, None, req.id).into()
        }

        debug!(target: "iocd", "--> {}", req.method);

        let rep = match req.method.as_str() {
            "ping" => return JsonResponse::new(json!("pong"), req.id).into(),
            "sync_data" => self.sync_data(req.params).await,
            "encryption_type" => self.encryption_type(req.params).await,
            "oprf_evaluate" => self.oprf_evaluate(req.params).await,
            _ => return JsonError::new(ErrorCode::MethodNotFound, None, req.id).into(),
        };

        to_json_result(rep, req.id)
    }
}

fn to_json_result(rep: Result<Value>, id: Value) -> JsonResult {
    match rep {
        Ok(value) => JsonResponse::new(value, id).into(),
        Err(e) => {
            let code = match &e {
                Error::InvalidEncoding(_) |
                Error::HexDecode(_) |
                Error::InvalidDatasetName(_) |
                Error::ParseFailed(_) => ErrorCode::ServerError(ERR_INVALID_ENCODING),
                Error::UnknownDataset(_) => ErrorCode::ServerError(ERR_UNKNOWN_DATASET),
                _ => ErrorCode::ServerError(ERR_INTERNAL),
            };
            JsonError::new(code, Some(e.to_string()), id).into()
        }
    }
}

impl JsonRpcInterface {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    // RPCAPI:
    // Read change events for a dataset, either the full log or the delta
    // past a known chain hash. `mode` tells the client which it got.
    // --> {"jsonrpc": "2.0", "method": "sync_data", "params": ["ds1", "ab..ef"], "id": 1}
    // <-- {"jsonrpc": "2.0", "result": {"mode": "delta", "events": ["ADDED .."]}, "id": 1}
    async fn sync_data(&self, params: Value) -> Result<Value> {
        let params = params.as_array().unwrap();
        if params.len() != 2 || !params[0].is_string() {
            return Err(Error::ParseFailed("sync_data expects [name, since_hash?]"))
        }

        let name = params[0].as_str().unwrap();

        let since = match &params[1] {
            Value::Null => None,
            Value::String(hash_hex) => {
                let hash: [u8; CHAIN_HASH_LEN] = hex::decode(hash_hex)?
                    .try_into()
                    .map_err(|_| Error::InvalidEncoding("chain hash is not 64 bytes"))?;
                Some(hash)
            }
            _ => return Err(Error::ParseFailed("sync_data expects [name, since_hash?]")),
        };

        let (mode, events) = self.store.read_changes(name, since)?;
        let lines: Vec<Value> = events.iter().map(|e| json!(e.to_line())).collect();

        Ok(json!({ "mode": mode.as_str(), "events": lines }))
    }

    // RPCAPI:
    // Report the dataset's cipher suite.
    // --> {"jsonrpc": "2.0", "method": "encryption_type", "params": ["ds1"], "id": 1}
    // <-- {"jsonrpc": "2.0", "result": {"suite": "..", "encryption": ".."}, "id": 1}
    async fn encryption_type(&self, params: Value) -> Result<Value> {
        let params = params.as_array().unwrap();
        if params.len() != 1 || !params[0].is_string() {
            return Err(Error::ParseFailed("encryption_type expects [name]"))
        }

        let name = params[0].as_str().unwrap();
        self.store.dataset_algorithm(name)?;

        Ok(json!({ "suite": SUITE, "encryption": ENCRYPTION }))
    }

    // RPCAPI:
    // Evaluate the OPRF on a blinded element.
    // --> {"jsonrpc": "2.0", "method": "oprf_evaluate", "params": ["ds1", HEX32], "id": 1}
    // <-- {"jsonrpc": "2.0", "result": {"evaluated": HEX32}, "id": 1}
    async fn oprf_evaluate(&self, params: Value) -> Result<Value> {
        let params = params.as_array().unwrap();
        if params.len() != 2 || !params[0].is_string() || !params[1].is_string() {
            return Err(Error::ParseFailed("oprf_evaluate expects [name, blinded]"))
        }

        let name = params[0].as_str().unwrap();
        let blinded = hex::decode(params[1].as_str().unwrap())?;

        let evaluated = self.store.evaluate_oprf(name, &blinded)?;
        Ok(json!({ "evaluated": hex::encode(evaluated) }))
    }
}
