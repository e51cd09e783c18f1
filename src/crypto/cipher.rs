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

//! Per-entry metadata encryption. The IOC rides along as AAD, so a
//! ciphertext lifted from one entry cannot be replayed under another.

use super::{aead_open, aead_seal, random_nonce, KEY_LEN, NONCE_LEN};
use crate::Result;

/// Encrypt a metadata blob under a derived key with a fresh random nonce.
pub fn seal_metadata(
    key: &[u8; KEY_LEN],
    ioc: &[u8],
    metadata: &[u8],
) -> Result<([u8; NONCE_LEN], Vec<u8>)> {
    let nonce = random_nonce();
    let ciphertext = aead_seal(key, &nonce, ioc, metadata)?;
    Ok((nonce, ciphertext))
}

/// Decrypt a metadata blob. `None` means the key or the AAD did not
/// match; callers surface this as a negative query result.
pub fn open_metadata(
    key: &[u8; KEY_LEN],
    ioc: &[u8],
    nonce: &[u8; NONCE_LEN],
    ciphertext: &[u8],
) -> Option<Vec<u8>> {
    aead_open(key, nonce, ioc, ciphertext)
}
