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

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // Encoding errors
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(&'static str),

    #[error("Hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("Toml error: {0}")]
    TomlDeserialize(String),

    #[error("Parse failed: {0}")]
    ParseFailed(&'static str),

    #[error("Malformed line in {0}: {1}")]
    MalformedLine(&'static str, String),

    // Dataset lifecycle
    #[error("Unknown dataset: {0}")]
    UnknownDataset(String),

    #[error("Dataset already exists: {0}")]
    DatasetExists(String),

    #[error("Invalid dataset name: {0}")]
    InvalidDatasetName(String),

    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    // State consistency
    #[error("Inconsistent state: {0}")]
    Inconsistent(String),

    // Fatal crypto-stack failure
    #[error("Crypto operation failed: {0}")]
    CryptoFailed(&'static str),

    // Transient
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connect failed: {0}")]
    ConnectFailed(String),

    #[error("Network operation failed: {0}")]
    NetworkOperationFailed(String),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Unsupported transport: {0}")]
    UnsupportedTransport(String),

    // RPC
    #[error("JSON-RPC error {0}: {1}")]
    JsonRpc(i64, String),

    #[error("Unexpected JSON-RPC reply: {0}")]
    UnexpectedRpcReply(String),

    #[error("Channel closed: {0}")]
    ChannelClosed(String),

    #[error("Logger setup failed: {0}")]
    SetLogger(String),
}

impl From<log::SetLoggerError> for Error {
    fn from(err: log::SetLoggerError) -> Self {
        Self::SetLogger(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::TomlDeserialize(err.to_string())
    }
}

impl<T> From<smol::channel::SendError<T>> for Error {
    fn from(err: smol::channel::SendError<T>) -> Self {
        Self::ChannelClosed(err.to_string())
    }
}

impl From<smol::channel::RecvError> for Error {
    fn from(err: smol::channel::RecvError) -> Self {
        Self::ChannelClosed(err.to_string())
    }
}
