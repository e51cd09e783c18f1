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

//! Thin typed surface over the vetted crypto crates. Everything outside
//! this module handles fixed-size byte arrays and `RistrettoPoint`/`Scalar`
//! values; hex and wire formats are a boundary concern elsewhere.

use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit, Payload},
    XChaCha20Poly1305, XNonce,
};
use curve25519_dalek::ristretto::CompressedRistretto;
use hkdf::Hkdf;
use rand::rngs::OsRng;
use sha2::{Digest, Sha512};

use crate::{Error, Result};

/// Metadata AEAD, keyed per index entry
pub mod cipher;

/// OPRF blind/evaluate/unblind/finalize and key derivation
pub mod oprf;

pub use curve25519_dalek::{ristretto::RistrettoPoint, scalar::Scalar};

/// Encoded Ristretto255 group element
pub const POINT_LEN: usize = 32;
/// PRF output and chain hash (SHA-512)
pub const PRF_LEN: usize = 64;
pub const CHAIN_HASH_LEN: usize = 64;
/// XChaCha20-Poly1305-IETF nonce
pub const NONCE_LEN: usize = 24;
/// Derived AEAD key
pub const KEY_LEN: usize = 32;

/// Hash arbitrary bytes onto the Ristretto255 group (SHA-512 based,
/// domain-separated by the underlying library).
pub fn hash_to_group(input: &[u8]) -> RistrettoPoint {
    RistrettoPoint::hash_from_bytes::<Sha512>(input)
}

/// Sample a uniformly random nonzero scalar from the CSPRNG.
pub fn random_scalar() -> Scalar {
    loop {
        let scalar = Scalar::random(&mut OsRng);
        if scalar != Scalar::ZERO {
            break scalar
        }
    }
}

pub fn encode_point(point: &RistrettoPoint) -> [u8; POINT_LEN] {
    point.compress().to_bytes()
}

/// Decode a compressed group element. Rejects wrong lengths and
/// non-canonical encodings.
pub fn decode_point(bytes: &[u8]) -> Result<RistrettoPoint> {
    let compressed = CompressedRistretto::from_slice(bytes)
        .map_err(|_| Error::InvalidEncoding("group element is not 32 bytes"))?;

    compressed.decompress().ok_or(Error::InvalidEncoding("invalid group element"))
}

pub fn encode_scalar(scalar: &Scalar) -> [u8; 32] {
    scalar.to_bytes()
}

/// Decode a scalar, enforcing the canonical (reduced) representation.
pub fn decode_scalar(bytes: &[u8]) -> Result<Scalar> {
    let bytes: [u8; 32] =
        bytes.try_into().map_err(|_| Error::InvalidEncoding("scalar is not 32 bytes"))?;

    Option::from(Scalar::from_canonical_bytes(bytes))
        .ok_or(Error::InvalidEncoding("non-canonical scalar"))
}

pub fn sha512(input: &[u8]) -> [u8; 64] {
    let mut hasher = Sha512::new();
    hasher.update(input);

    let mut out = [0u8; 64];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// HKDF-SHA512 with an empty salt, expanded to a 32-byte key.
pub fn hkdf_sha512(ikm: &[u8], info: &[u8]) -> [u8; KEY_LEN] {
    let hk = Hkdf::<Sha512>::new(None, ikm);
    let mut okm = [0u8; KEY_LEN];
    // Only fails if the output length is too large for the hash, and
    // KEY_LEN is far below that bound.
    hk.expand(info, &mut okm).expect("HKDF expand with fixed-size output");
    okm
}

pub fn random_nonce() -> [u8; NONCE_LEN] {
    XChaCha20Poly1305::generate_nonce(&mut OsRng).into()
}

pub fn aead_seal(
    key: &[u8; KEY_LEN],
    nonce: &[u8; NONCE_LEN],
    aad: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>> {
    let aead = XChaCha20Poly1305::new(key.into());
    aead.encrypt(XNonce::from_slice(nonce), Payload { msg: plaintext, aad })
        .map_err(|_| Error::CryptoFailed("AEAD seal"))
}

/// Open an AEAD ciphertext. Authentication failure is a normal negative
/// outcome, never an error.
pub fn aead_open(
    key: &[u8; KEY_LEN],
    nonce: &[u8; NONCE_LEN],
    aad: &[u8],
    ciphertext: &[u8],
) -> Option<Vec<u8>> {
    let aead = XChaCha20Poly1305::new(key.into());
    aead.decrypt(XNonce::from_slice(nonce), Payload { msg: ciphertext, aad }).ok()
}
