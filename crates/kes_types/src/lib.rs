// Copyright 2023 Kestrel Foundation. All rights reserved.
// Kestrel is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

extern crate ethereum_types;

pub use ethereum_types::{BigEndianHash, H128, H160, H256, H512, H520, U128, U256, U512};

use fixed_hash::construct_fixed_hash;

construct_fixed_hash! {
    /// A 33-byte fixed hash: a compressed secp256k1 public key, which doubles
    /// as an account address on this chain.
    pub struct H264(33);
}

/// Account addresses are compressed public keys rendered as 66 hex chars.
pub type Address = H264;

/// Tokens are identified by the 32-byte hash assigned at creation.
pub type TokenHash = H256;

pub mod hash;
mod serde_hex;

pub use hash::{sha256, sha256_str};

pub mod address_util {
    use super::{Address, H256};
    use std::str::FromStr;

    /// Parses a 66-char hex string into an address. No `0x` prefix.
    pub fn parse_address(s: &str) -> Option<Address> {
        Address::from_str(s).ok()
    }

    /// Parses a 64-char hex string into a token hash. No `0x` prefix.
    pub fn parse_token_hash(s: &str) -> Option<H256> {
        H256::from_str(s).ok()
    }
}
