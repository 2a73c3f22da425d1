// Copyright 2023 Kestrel Foundation. All rights reserved.
// Kestrel is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! Signature verification seam. The executor never parses curve points
//! itself; the embedding node supplies the scheme through this trait so
//! consensus and execution agree on one implementation.

use kes_types::{Address, H256};

pub trait ChainCrypto: Send + Sync {
    /// Verifies `signature` (lowercase hex, optional `0x` prefix) over the
    /// 32-byte `message` against the compressed key `signer`.
    fn verify(&self, message: &H256, signature: &str, signer: &Address) -> bool;
}
