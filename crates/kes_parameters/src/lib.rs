// Copyright 2023 Kestrel Foundation. All rights reserved.
// Kestrel is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

#[macro_use]
extern crate lazy_static;

use kes_types::{sha256, Address, H256, U256};
use std::str::FromStr;

pub mod chain {
    use super::*;

    /// Ticker of the native token. Contract fees are payable only in this.
    pub const NATIVE_TICKER: &str = "KES";

    /// Hard cap on any token supply, and therefore on any single amount.
    /// 20 decimal digits at most, which the numeric-string validator relies
    /// on.
    pub fn supply_cap() -> U256 {
        U256::from(u64::MAX)
    }

    lazy_static! {
        /// The native token is addressed by the digest of its ticker.
        pub static ref NATIVE_TOKEN_HASH: H256 = sha256(NATIVE_TICKER.as_bytes());
    }
}

pub mod well_known_addresses {
    use super::*;

    lazy_static! {
        /// Recipient of every contract transaction. A transaction carrying a
        /// contract payload but addressed elsewhere is rejected.
        pub static ref CONTRACT_PROCESSING: Address = addr(
            "030000000000000000000000000000000000000000000000000000000000000001"
        );
        /// Custody account for bridge escrow and wrapped-token issuance.
        pub static ref BRIDGE_CUSTODY: Address = addr(
            "030000000000000000000000000000000000000000000000000000000000000002"
        );
        /// Receives protocol fee shares that cannot reach the treasury.
        /// Nothing can spend from it.
        pub static ref BURN: Address = addr(
            "030000000000000000000000000000000000000000000000000000000000000003"
        );
        /// DEX treasury. Accumulated protocol fees are parked here until
        /// distribution.
        pub static ref TREASURY: Address = addr(
            "030000000000000000000000000000000000000000000000000000000000000004"
        );
    }

    fn addr(hex: &str) -> Address {
        Address::from_str(hex).expect("well-known address literals are valid hex")
    }
}

pub mod dex {
    use super::*;

    /// Pool fees are expressed in basis points of this denominator.
    pub const FEE_DENOM: u64 = 10_000;

    /// Protocol share of pool growth: minting
    /// `lp * (sqrt(k') - sqrt(k)) / (FEE_DIVISOR * sqrt(k') + sqrt(k))`
    /// LP tokens skims 1/(FEE_DIVISOR + 1) of the fee-driven growth.
    pub const PROTOCOL_FEE_DIVISOR: u64 = 5;

    lazy_static! {
        /// Reference asset for fee routing. A pool's protocol fee reaches the
        /// treasury only if its LP token trades against this asset.
        pub static ref REFERENCE_TOKEN_HASH: H256 = sha256(b"KEX");
    }
}

pub mod bridge {
    /// Network id of this chain inside the bridge's known-network registry.
    pub const LOCAL_NETWORK_ID: u32 = 1;

    /// Wrapped tokens are created with at most this many decimals.
    pub const MAX_WRAPPED_DECIMALS: u8 = 10;
}

pub mod forks {
    /// Height activating the DEX operation family.
    pub const DEX_HEIGHT: u64 = 1_000_000;

    /// Height activating the cross-chain bridge family.
    pub const BRIDGE_HEIGHT: u64 = 2_500_000;

    /// Height switching claim tickets from the `transfer_id` schema to the
    /// `ticket_hash` schema. Both must remain replayable forever.
    pub const BRIDGE_V2_HEIGHT: u64 = 3_200_000;
}

pub mod prices {
    /// Base prices in native-token units, per operation family. Per-version
    /// pricelists in the executor are assembled from these.
    pub const CREATE_TOKEN: u64 = 100_000_000_000;
    pub const TOKEN_OP: u64 = 10_000_000;
    pub const POOL_CREATE: u64 = 1_000_000_000;
    pub const POOL_OP: u64 = 10_000_000;
    pub const BRIDGE_OP: u64 = 10_000_000;
    pub const BRIDGE_ADMIN_OP: u64 = 0;
}
