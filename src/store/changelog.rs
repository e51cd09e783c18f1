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

//! The append-only change log. Each event extends a SHA-512 hash chain
//! over the textual event fields; the chain is the only synchronization
//! artifact clients ever see, so its construction has to be bit-exact
//! on both sides.

use std::{fs, path::Path};

use crate::{
    crypto::{sha512, CHAIN_HASH_LEN, NONCE_LEN, PRF_LEN},
    Error, Result,
};

/// Chain seed: `SHA512("")`. Fixed for all datasets; rekey restarts
/// the chain from here.
pub fn chain_seed() -> [u8; CHAIN_HASH_LEN] {
    sha512(&[])
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    Added,
    Removed,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "ADDED",
            Self::Removed => "REMOVED",
        }
    }

    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "ADDED" => Ok(Self::Added),
            "REMOVED" => Ok(Self::Removed),
            _ => Err(Error::ParseFailed("unknown change event kind")),
        }
    }
}

/// Encrypted metadata as it appears on the wire: nonce and ciphertext,
/// hex-encoded and colon-separated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncMeta {
    pub nonce: [u8; NONCE_LEN],
    pub ciphertext: Vec<u8>,
}

impl EncMeta {
    pub fn to_field(&self) -> String {
        format!("{}:{}", hex::encode(self.nonce), hex::encode(&self.ciphertext))
    }

    pub fn from_field(field: &str) -> Result<Self> {
        let (nonce_hex, ct_hex) =
            field.split_once(':').ok_or(Error::ParseFailed("missing nonce:ciphertext colon"))?;

        let nonce: [u8; NONCE_LEN] = hex::decode(nonce_hex)?
            .try_into()
            .map_err(|_| Error::InvalidEncoding("nonce is not 24 bytes"))?;

        Ok(Self { nonce, ciphertext: hex::decode(ct_hex)? })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: EventKind,
    /// `None` encodes the `-` placeholder on REMOVED events from logs
    /// we did not produce. Our own server always fills it in.
    pub prf: Option<[u8; PRF_LEN]>,
    pub enc_meta: Option<EncMeta>,
    pub chain_hash: [u8; CHAIN_HASH_LEN],
}

impl ChangeEvent {
    /// Build an event on top of `prev`, computing its chain hash.
    pub fn new(
        kind: EventKind,
        prf: Option<[u8; PRF_LEN]>,
        enc_meta: Option<EncMeta>,
        prev: &[u8; CHAIN_HASH_LEN],
    ) -> Self {
        let chain_hash =
            compute_chain(prev, kind, &prf_field(&prf), &meta_field(&enc_meta));
        Self { kind, prf, enc_meta, chain_hash }
    }

    /// `EVENT SP PRF_HEX SP ENC_META SP CHAIN_HASH_HEX`
    pub fn to_line(&self) -> String {
        format!(
            "{} {} {} {}",
            self.kind.as_str(),
            prf_field(&self.prf),
            meta_field(&self.enc_meta),
            hex::encode(self.chain_hash),
        )
    }

    pub fn from_line(line: &str) -> Result<Self> {
        let mut parts = line.split(' ');
        let (kind, prf, meta, chain) =
            match (parts.next(), parts.next(), parts.next(), parts.next(), parts.next()) {
                (Some(a), Some(b), Some(c), Some(d), None) => (a, b, c, d),
                _ => return Err(Error::MalformedLine("changes.log", line.to_string())),
            };

        let kind = EventKind::from_str(kind)?;

        let prf = if prf == "-" {
            None
        } else {
            let bytes: [u8; PRF_LEN] = hex::decode(prf)?
                .try_into()
                .map_err(|_| Error::InvalidEncoding("PRF is not 64 bytes"))?;
            Some(bytes)
        };

        let enc_meta = if meta == "-" { None } else { Some(EncMeta::from_field(meta)?) };

        let chain_hash: [u8; CHAIN_HASH_LEN] = hex::decode(chain)?
            .try_into()
            .map_err(|_| Error::InvalidEncoding("chain hash is not 64 bytes"))?;

        Ok(Self { kind, prf, enc_meta, chain_hash })
    }

    /// Recompute this event's chain hash on top of `prev`.
    pub fn expected_chain(&self, prev: &[u8; CHAIN_HASH_LEN]) -> [u8; CHAIN_HASH_LEN] {
        compute_chain(prev, self.kind, &prf_field(&self.prf), &meta_field(&self.enc_meta))
    }
}

fn prf_field(prf: &Option<[u8; PRF_LEN]>) -> String {
    match prf {
        Some(prf) => hex::encode(prf),
        None => "-".to_string(),
    }
}

fn meta_field(enc_meta: &Option<EncMeta>) -> String {
    match enc_meta {
        Some(meta) => meta.to_field(),
        None => "-".to_string(),
    }
}

/// `chain_i = SHA512(chain_{i-1} || event || prf_field || meta_field)`
/// over the textual field forms, with the previous hash as raw bytes.
fn compute_chain(
    prev: &[u8; CHAIN_HASH_LEN],
    kind: EventKind,
    prf_field: &str,
    meta_field: &str,
) -> [u8; CHAIN_HASH_LEN] {
    let mut input =
        Vec::with_capacity(CHAIN_HASH_LEN + 7 + prf_field.len() + meta_field.len());
    input.extend_from_slice(prev);
    input.extend_from_slice(kind.as_str().as_bytes());
    input.extend_from_slice(prf_field.as_bytes());
    input.extend_from_slice(meta_field.as_bytes());
    sha512(&input)
}

#[derive(Clone, Debug, Default)]
pub struct ChangeLog {
    pub events: Vec<ChangeEvent>,
}

impl ChangeLog {
    pub fn new() -> Self {
        Self { events: vec![] }
    }

    /// The chain hash a new event would extend: the last event's hash,
    /// or the seed for an empty log.
    pub fn tip(&self) -> [u8; CHAIN_HASH_LEN] {
        match self.events.last() {
            Some(event) => event.chain_hash,
            None => chain_seed(),
        }
    }

    /// Append a freshly chained event.
    pub fn append(&mut self, kind: EventKind, prf: [u8; PRF_LEN], enc_meta: EncMeta) {
        let event = ChangeEvent::new(kind, Some(prf), Some(enc_meta), &self.tip());
        self.events.push(event);
    }

    /// Extend with events received from elsewhere, verifying each link.
    pub fn extend_verified(&mut self, events: &[ChangeEvent]) -> Result<()> {
        for event in events {
            if event.expected_chain(&self.tip()) != event.chain_hash {
                return Err(Error::Inconsistent("chain hash mismatch".to_string()))
            }
            self.events.push(event.clone());
        }
        Ok(())
    }

    /// Replay the whole chain from the seed and check every stored hash.
    pub fn verify(&self) -> Result<()> {
        let mut replay = Self::new();
        replay.extend_verified(&self.events)
    }

    /// Index of the event carrying `hash`, if any.
    pub fn position(&self, hash: &[u8; CHAIN_HASH_LEN]) -> Option<usize> {
        self.events.iter().position(|e| &e.chain_hash == hash)
    }

    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for event in &self.events {
            out.push_str(&event.to_line());
            out.push('\n');
        }
        out
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut events = vec![];
        for line in text.lines() {
            if line.is_empty() {
                continue
            }
            events.push(ChangeEvent::from_line(line)?);
        }
        Ok(Self { events })
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new())
        }
        Self::parse(&fs::read_to_string(path)?)
    }
}
