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

//! The canonical server-side index: IOC -> (PRF, nonce, ciphertext).
//! Only the server ever sees this file; the raw IOC column is what the
//! whole protocol exists to keep off the wire.

use std::{collections::BTreeMap, fs, path::Path};

use crate::{
    crypto::{NONCE_LEN, PRF_LEN},
    util::csv,
    Error, Result,
};

use super::changelog::EncMeta;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexEntry {
    pub prf: [u8; PRF_LEN],
    pub nonce: [u8; NONCE_LEN],
    pub ciphertext: Vec<u8>,
}

impl IndexEntry {
    pub fn enc_meta(&self) -> EncMeta {
        EncMeta { nonce: self.nonce, ciphertext: self.ciphertext.clone() }
    }
}

/// BTreeMap keyed by IOC so serialization and diffing iterate in a
/// stable order; two syncs of the same source produce identical files
/// and identical chains.
#[derive(Clone, Debug, Default)]
pub struct Index {
    pub entries: BTreeMap<String, IndexEntry>,
}

impl Index {
    pub fn new() -> Self {
        Self { entries: BTreeMap::new() }
    }

    /// `IOC,PRF_HEX,NONCE_HEX,CT_HEX` with the IOC field quoted when
    /// it contains separators.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for (ioc, entry) in &self.entries {
            out.push_str(&format!(
                "{},{},{},{}\n",
                csv::quote(ioc),
                hex::encode(entry.prf),
                hex::encode(entry.nonce),
                hex::encode(&entry.ciphertext),
            ));
        }
        out
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut entries = BTreeMap::new();

        for line in text.lines() {
            if line.is_empty() {
                continue
            }

            let (ioc, rest) = csv::next_field(line)?;
            let rest = rest.ok_or(Error::MalformedLine("index.csv", line.to_string()))?;

            let mut fields = rest.split(',');
            let (prf, nonce, ct) = match (fields.next(), fields.next(), fields.next(), fields.next())
            {
                (Some(a), Some(b), Some(c), None) => (a, b, c),
                _ => return Err(Error::MalformedLine("index.csv", line.to_string())),
            };

            let prf: [u8; PRF_LEN] = hex::decode(prf)?
                .try_into()
                .map_err(|_| Error::InvalidEncoding("PRF is not 64 bytes"))?;
            let nonce: [u8; NONCE_LEN] = hex::decode(nonce)?
                .try_into()
                .map_err(|_| Error::InvalidEncoding("nonce is not 24 bytes"))?;

            entries.insert(ioc, IndexEntry { prf, nonce, ciphertext: hex::decode(ct)? });
        }

        Ok(Self { entries })
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new())
        }
        Self::parse(&fs::read_to_string(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(tag: u8) -> IndexEntry {
        IndexEntry { prf: [tag; PRF_LEN], nonce: [tag; NONCE_LEN], ciphertext: vec![tag; 30] }
    }

    #[test]
    fn serialize_parse_roundtrip() {
        let mut index = Index::new();
        index.entries.insert("evil.com".to_string(), entry(1));
        index.entries.insert("http://x/?a=1,b=2".to_string(), entry(2));
        index.entries.insert("say \"hi\"".to_string(), entry(3));

        let parsed = Index::parse(&index.serialize()).unwrap();
        assert_eq!(parsed.entries, index.entries);
    }

    #[test]
    fn stable_serialization_order() {
        let mut a = Index::new();
        a.entries.insert("b".to_string(), entry(1));
        a.entries.insert("a".to_string(), entry(2));

        let mut b = Index::new();
        b.entries.insert("a".to_string(), entry(2));
        b.entries.insert("b".to_string(), entry(1));

        assert_eq!(a.serialize(), b.serialize());
    }

    #[test]
    fn truncated_lines_are_rejected() {
        assert!(Index::parse("evil.com,aabb\n").is_err());
        assert!(Index::parse("evil.com\n").is_err());
    }
}
