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

//! Two-party OPRF over Ristretto255. The client blinds its IOC, the
//! server multiplies by its secret key, the client unblinds and hashes
//! down to the 64-byte PRF. All operations are stateless.

use super::{
    decode_point, encode_point, hash_to_group, random_scalar, sha512, RistrettoPoint, Scalar,
    KEY_LEN, POINT_LEN, PRF_LEN,
};
use crate::Result;

/// Domain separator for the per-entry key derivation
const KDF_INFO_PREFIX: &[u8] = b"meta|";

/// Client-held output of [`blind`]: the secret blinding factor and the
/// encoded element to send to the server.
pub struct Blinded {
    pub factor: Scalar,
    pub element: [u8; POINT_LEN],
}

/// Blind an IOC: `B = r * H1(ioc)` for a random nonzero `r`.
pub fn blind(ioc: &[u8]) -> Blinded {
    let factor = random_scalar();
    let element = hash_to_group(ioc) * factor;
    Blinded { factor, element: encode_point(&element) }
}

/// Server side: `E = k * B`. Rejects non-canonical input encodings.
pub fn evaluate(key: &Scalar, blinded: &[u8]) -> Result<[u8; POINT_LEN]> {
    let element = decode_point(blinded)?;
    Ok(encode_point(&(element * key)))
}

/// Client side: strip the blinding factor, `Q = r^-1 * E = k * H1(ioc)`.
pub fn unblind(factor: &Scalar, evaluated: &[u8]) -> Result<RistrettoPoint> {
    let element = decode_point(evaluated)?;
    Ok(element * factor.invert())
}

/// `PRF = SHA512(ioc || encode(Q))`
pub fn finalize(ioc: &[u8], q: &RistrettoPoint) -> [u8; PRF_LEN] {
    let mut input = Vec::with_capacity(ioc.len() + POINT_LEN);
    input.extend_from_slice(ioc);
    input.extend_from_slice(&encode_point(q));
    sha512(&input)
}

/// Per-entry AEAD key. Binding both the PRF and `Q` into the IKM means
/// the PRF alone (visible in the change log) cannot decrypt an entry;
/// the holder must have run the OPRF for that exact IOC.
pub fn derive_key(prf: &[u8; PRF_LEN], q: &RistrettoPoint, dataset: &str) -> [u8; KEY_LEN] {
    let mut ikm = Vec::with_capacity(PRF_LEN + POINT_LEN);
    ikm.extend_from_slice(prf);
    ikm.extend_from_slice(&encode_point(q));

    let mut info = Vec::with_capacity(KDF_INFO_PREFIX.len() + dataset.len());
    info.extend_from_slice(KDF_INFO_PREFIX);
    info.extend_from_slice(dataset.as_bytes());

    super::hkdf_sha512(&ikm, &info)
}

/// Server-side shortcut used while building the index: the server holds
/// both `k` and the raw IOC, so `Q = k * H1(ioc)` needs no blinding round.
pub fn evaluate_direct(key: &Scalar, ioc: &[u8]) -> RistrettoPoint {
    hash_to_group(ioc) * key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oprf_roundtrip_matches_direct_evaluation() {
        let key = random_scalar();

        for ioc in [b"evil.com".as_slice(), b"1.2.3.4", b"", &[0xde, 0xad, 0xbe, 0xef]] {
            let blinded = blind(ioc);
            let evaluated = evaluate(&key, &blinded.element).unwrap();
            let q = unblind(&blinded.factor, &evaluated).unwrap();

            let q_direct = evaluate_direct(&key, ioc);
            assert_eq!(q, q_direct);
            assert_eq!(finalize(ioc, &q), finalize(ioc, &q_direct));
        }
    }

    #[test]
    fn blinding_is_randomized() {
        let a = blind(b"evil.com");
        let b = blind(b"evil.com");
        assert_ne!(a.element, b.element);
    }

    #[test]
    fn evaluate_rejects_malformed_elements() {
        let key = random_scalar();
        assert!(evaluate(&key, &[0u8; 31]).is_err());
        assert!(evaluate(&key, &[0xff; 32]).is_err());
    }

    #[test]
    fn derived_keys_differ_per_input() {
        let key = random_scalar();
        let q = evaluate_direct(&key, b"evil.com");
        let prf = finalize(b"evil.com", &q);

        let k1 = derive_key(&prf, &q, "ds1");
        assert_eq!(k1, derive_key(&prf, &q, "ds1"));
        assert_ne!(k1, derive_key(&prf, &q, "ds2"));

        let q2 = evaluate_direct(&key, b"other.com");
        assert_ne!(k1, derive_key(&prf, &q2, "ds1"));

        let mut prf2 = prf;
        prf2[0] ^= 1;
        assert_ne!(k1, derive_key(&prf2, &q, "ds1"));
    }
}
