// Copyright 2023 Kestrel Foundation. All rights reserved.
// Kestrel is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! Contract-visible ledger state. Contracts only ever touch storage through
//! the [`Substate`] trait; execution wraps the backend in an
//! [`OverlaySubstate`] so a failing contract leaves no writes behind.

mod memory;
mod overlay;

pub use memory::MemorySubstate;
pub use overlay::OverlaySubstate;

use kes_types::{Address, H256, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("storage backend failure: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, StateError>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub hash: H256,
    pub owner: Address,
    pub name: String,
    pub ticker: String,
    pub decimals: u8,
    pub total_supply: U256,
    pub max_supply: U256,
    pub reissuable: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PoolState {
    pub pair_id: H256,
    /// Token pair in canonical (sorted) order.
    pub token_1: H256,
    pub token_2: H256,
    pub volume_1: U256,
    pub volume_2: U256,
    /// Swap fee in basis points.
    pub pool_fee: u32,
    pub lp_token_hash: H256,
    /// `sqrt(volume_1 * volume_2)` as of the last liquidity event; the
    /// baseline the protocol fee accrues against.
    pub root_k_last: U256,
}

impl PoolState {
    /// Reserves oriented as (input side, output side) for a swap that pays
    /// in `token_in`.
    pub fn oriented(&self, token_in: &H256) -> (U256, U256) {
        if *token_in == self.token_1 {
            (self.volume_1, self.volume_2)
        } else {
            (self.volume_2, self.volume_1)
        }
    }
}

/// A cross-chain transfer awaiting validator confirmations. Field order
/// here mirrors the order they are folded into the ticket hash.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BridgeTicket {
    pub ticket_hash: H256,
    pub dst_address: String,
    pub dst_network: u32,
    pub amount: U256,
    pub src_hash: String,
    pub src_address: String,
    pub src_network: u32,
    pub origin_network: u32,
    pub origin_hash: String,
    pub origin_decimals: u8,
    pub nonce: u64,
    pub ticker: String,
    pub name: String,
    pub claimed: bool,
}

/// A foreign chain the bridge may send to. The decimal width drives the
/// precision-loss check on outbound locks.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct KnownNetwork {
    pub id: u32,
    pub decimals: u8,
}

/// Bridge governance knobs plus the registered validator and network sets.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BridgeSettings {
    pub owner: Address,
    pub threshold: u32,
    pub validators: Vec<Address>,
    pub networks: Vec<KnownNetwork>,
}

impl BridgeSettings {
    pub fn is_validator(&self, key: &Address) -> bool {
        self.validators.contains(key)
    }

    pub fn network(&self, id: u32) -> Option<KnownNetwork> {
        self.networks.iter().find(|n| n.id == id).copied()
    }
}

/// Links a wrapped token minted here to its origin-chain identity, so
/// repeat claims reuse the same token and outbound locks can unwrap it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MintedTokenRecord {
    pub origin_network: u32,
    pub origin_hash: String,
    pub origin_decimals: u8,
    pub wrapped_hash: H256,
}

pub trait Substate {
    fn balance(&mut self, address: &Address, token: &H256) -> Result<U256>;
    fn add_balance(&mut self, address: &Address, token: &H256, amount: U256) -> Result<()>;
    /// Callers check the balance first; underflow here is a backend fault.
    fn sub_balance(&mut self, address: &Address, token: &H256, amount: U256) -> Result<()>;

    fn token(&mut self, hash: &H256) -> Result<Option<TokenInfo>>;
    fn register_token(&mut self, info: TokenInfo) -> Result<()>;
    fn set_total_supply(&mut self, hash: &H256, supply: U256) -> Result<()>;

    fn pool(&mut self, pair_id: &H256) -> Result<Option<PoolState>>;
    fn insert_pool(&mut self, pool: PoolState) -> Result<()>;

    fn channel_nonce(&mut self, channel: &H256) -> Result<u64>;
    fn bump_channel(&mut self, channel: &H256) -> Result<()>;

    fn ticket(&mut self, hash: &H256) -> Result<Option<BridgeTicket>>;
    fn insert_ticket(&mut self, ticket: BridgeTicket) -> Result<()>;
    fn mark_ticket_claimed(&mut self, hash: &H256) -> Result<()>;

    fn has_confirmed(&mut self, ticket: &H256, validator: &Address) -> Result<bool>;
    /// Records a confirmation. Returns the new total, or `None` when this
    /// validator already confirmed this ticket.
    fn add_confirmation(&mut self, ticket: &H256, validator: &Address) -> Result<Option<u32>>;

    fn bridge_settings(&mut self) -> Result<BridgeSettings>;
    fn set_bridge_owner(&mut self, owner: Address) -> Result<()>;
    fn set_bridge_threshold(&mut self, threshold: u32) -> Result<()>;
    /// Returns false when the validator was already registered.
    fn add_validator(&mut self, key: Address) -> Result<bool>;
    fn remove_validator(&mut self, key: &Address) -> Result<bool>;
    fn add_network(&mut self, network: KnownNetwork) -> Result<bool>;
    fn remove_network(&mut self, id: u32) -> Result<bool>;

    fn minted_token(&mut self, origin_network: u32, origin_hash: &str)
        -> Result<Option<MintedTokenRecord>>;
    fn minted_token_by_wrapped(&mut self, wrapped: &H256)
        -> Result<Option<MintedTokenRecord>>;
    fn insert_minted_token(&mut self, record: MintedTokenRecord) -> Result<()>;
}
