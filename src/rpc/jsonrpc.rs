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

//! JSON-RPC 2.0 request/response primitives, line-delimited on the wire.

use serde_json::{json, Value};

use crate::{Error, Result};

#[derive(Clone, Copy, Debug)]
pub enum ErrorCode {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    ServerError(i64),
}

impl ErrorCode {
    pub fn code(&self) -> i64 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
            Self::ServerError(c) => *c,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::ParseError => "Parse error",
            Self::InvalidRequest => "Invalid request",
            Self::MethodNotFound => "Method not found",
            Self::InvalidParams => "Invalid params",
            Self::InternalError => "Internal error",
            Self::ServerError(_) => "Server error",
        }
    }
}

#[derive(Clone, Debug)]
pub struct JsonRequest {
    pub id: Value,
    pub method: String,
    pub params: Value,
}

impl JsonRequest {
    pub fn new(method: &str, params: Value) -> Self {
        Self { id: json!(rand::random::<u32>()), method: method.to_string(), params }
    }

    pub fn to_json(&self) -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": self.id,
            "method": self.method,
            "params": self.params,
        })
    }

    pub fn from_json(value: &Value) -> Result<Self> {
        if value["jsonrpc"] != json!("2.0") {
            return Err(Error::ParseFailed("not a JSON-RPC 2.0 request"))
        }

        let method = value["method"]
            .as_str()
            .ok_or(Error::ParseFailed("request method is not a string"))?
            .to_string();

        Ok(Self { id: value["id"].clone(), method, params: value["params"].clone() })
    }
}

#[derive(Clone, Debug)]
pub struct JsonResponse {
    pub result: Value,
    pub id: Value,
}

impl JsonResponse {
    pub fn new(result: Value, id: Value) -> Self {
        Self { result, id }
    }

    pub fn to_json(&self) -> Value {
        json!({
            "jsonrpc": "2.0",
            "result": self.result,
            "id": self.id,
        })
    }
}

#[derive(Clone, Debug)]
pub struct JsonError {
    pub code: i64,
    pub message: String,
    pub id: Value,
}

impl JsonError {
    pub fn new(code: ErrorCode, message: Option<String>, id: Value) -> Self {
        let message = message.unwrap_or_else(|| code.description().to_string());
        Self { code: code.code(), message, id }
    }

    pub fn to_json(&self) -> Value {
        json!({
            "jsonrpc": "2.0",
            "error": {
                "code": self.code,
                "message": self.message,
            },
            "id": self.id,
        })
    }
}

#[derive(Clone, Debug)]
pub enum JsonResult {
    Resp(JsonResponse),
    Err(JsonError),
}

impl From<JsonResponse> for JsonResult {
    fn from(resp: JsonResponse) -> Self {
        Self::Resp(resp)
    }
}

impl From<JsonError> for JsonResult {
    fn from(err: JsonError) -> Self {
        Self::Err(err)
    }
}

impl JsonResult {
    pub fn to_json(&self) -> Value {
        match self {
            Self::Resp(resp) => resp.to_json(),
            Self::Err(err) => err.to_json(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_roundtrip() {
        let req = JsonRequest::new("ping", json!([]));
        let parsed = JsonRequest::from_json(&req.to_json()).unwrap();
        assert_eq!(parsed.method, "ping");
        assert_eq!(parsed.id, req.id);
    }

    #[test]
    fn non_jsonrpc_values_are_rejected() {
        assert!(JsonRequest::from_json(&json!({"method": "x"})).is_err());
        assert!(JsonRequest::from_json(&json!({"jsonrpc": "2.0", "method": 3})).is_err());
    }
}
