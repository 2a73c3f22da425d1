// Copyright 2023 Kestrel Foundation. All rights reserved.
// Kestrel is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use crate::H256;
use sha2::{Digest, Sha256};

/// SHA-256 of raw bytes. All ledger identifiers (token hashes, channel ids,
/// bridge ticket hashes) are built from this digest.
pub fn sha256(input: &[u8]) -> H256 {
    H256::from_slice(Sha256::digest(input).as_slice())
}

/// SHA-256 of a string's UTF-8 bytes, rendered as lowercase hex. The bridge
/// ticket hash concatenates digests in this form.
pub fn sha256_str(input: &str) -> String {
    format!("{:x}", sha256(input.as_bytes()))
}
