// Copyright 2023 Kestrel Foundation. All rights reserved.
// Kestrel is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use super::{
    BridgeSettings, BridgeTicket, KnownNetwork, MintedTokenRecord, PoolState, Result,
    StateError, Substate, TokenInfo,
};
use kes_parameters::bridge::LOCAL_NETWORK_ID;
use kes_types::{Address, H256, U256};
use std::collections::{HashMap, HashSet};

/// Hash-map backed ledger. The reference backend for tests and light
/// tooling; a node embeds its own persistent implementation.
#[derive(Debug, Default)]
pub struct MemorySubstate {
    balances: HashMap<(Address, H256), U256>,
    tokens: HashMap<H256, TokenInfo>,
    pools: HashMap<H256, PoolState>,
    channels: HashMap<H256, u64>,
    tickets: HashMap<H256, BridgeTicket>,
    confirmations: HashMap<H256, HashSet<Address>>,
    settings: Option<BridgeSettings>,
    minted_by_origin: HashMap<(u32, String), MintedTokenRecord>,
    minted_by_wrapped: HashMap<H256, MintedTokenRecord>,
}

impl MemorySubstate {
    pub fn new() -> Self {
        Self::default()
    }

    fn settings_mut(&mut self) -> &mut BridgeSettings {
        self.settings.get_or_insert_with(default_settings)
    }
}

fn default_settings() -> BridgeSettings {
    BridgeSettings {
        owner: Address::zero(),
        threshold: 1,
        validators: Vec::new(),
        networks: vec![KnownNetwork { id: LOCAL_NETWORK_ID, decimals: 10 }],
    }
}

impl Substate for MemorySubstate {
    fn balance(&mut self, address: &Address, token: &H256) -> Result<U256> {
        Ok(self.balances.get(&(*address, *token)).copied().unwrap_or_default())
    }

    fn add_balance(&mut self, address: &Address, token: &H256, amount: U256) -> Result<()> {
        let entry = self.balances.entry((*address, *token)).or_default();
        *entry = entry
            .checked_add(amount)
            .ok_or_else(|| StateError::Backend("balance overflow".to_string()))?;
        Ok(())
    }

    fn sub_balance(&mut self, address: &Address, token: &H256, amount: U256) -> Result<()> {
        let entry = self.balances.entry((*address, *token)).or_default();
        *entry = entry
            .checked_sub(amount)
            .ok_or_else(|| StateError::Backend("balance underflow".to_string()))?;
        Ok(())
    }

    fn token(&mut self, hash: &H256) -> Result<Option<TokenInfo>> {
        Ok(self.tokens.get(hash).cloned())
    }

    fn register_token(&mut self, info: TokenInfo) -> Result<()> {
        self.tokens.insert(info.hash, info);
        Ok(())
    }

    fn set_total_supply(&mut self, hash: &H256, supply: U256) -> Result<()> {
        match self.tokens.get_mut(hash) {
            Some(info) => {
                info.total_supply = supply;
                Ok(())
            }
            None => Err(StateError::Backend(format!("no token {hash:x}"))),
        }
    }

    fn pool(&mut self, pair_id: &H256) -> Result<Option<PoolState>> {
        Ok(self.pools.get(pair_id).cloned())
    }

    fn insert_pool(&mut self, pool: PoolState) -> Result<()> {
        self.pools.insert(pool.pair_id, pool);
        Ok(())
    }

    fn channel_nonce(&mut self, channel: &H256) -> Result<u64> {
        Ok(self.channels.get(channel).copied().unwrap_or(0))
    }

    fn bump_channel(&mut self, channel: &H256) -> Result<()> {
        *self.channels.entry(*channel).or_insert(0) += 1;
        Ok(())
    }

    fn ticket(&mut self, hash: &H256) -> Result<Option<BridgeTicket>> {
        Ok(self.tickets.get(hash).cloned())
    }

    fn insert_ticket(&mut self, ticket: BridgeTicket) -> Result<()> {
        self.tickets.insert(ticket.ticket_hash, ticket);
        Ok(())
    }

    fn mark_ticket_claimed(&mut self, hash: &H256) -> Result<()> {
        match self.tickets.get_mut(hash) {
            Some(ticket) => {
                ticket.claimed = true;
                Ok(())
            }
            None => Err(StateError::Backend(format!("no ticket {hash:x}"))),
        }
    }

    fn has_confirmed(&mut self, ticket: &H256, validator: &Address) -> Result<bool> {
        Ok(self
            .confirmations
            .get(ticket)
            .map_or(false, |set| set.contains(validator)))
    }

    fn add_confirmation(&mut self, ticket: &H256, validator: &Address) -> Result<Option<u32>> {
        let set = self.confirmations.entry(*ticket).or_default();
        if set.insert(*validator) {
            Ok(Some(set.len() as u32))
        } else {
            Ok(None)
        }
    }

    fn bridge_settings(&mut self) -> Result<BridgeSettings> {
        Ok(self.settings.clone().unwrap_or_else(default_settings))
    }

    fn set_bridge_owner(&mut self, owner: Address) -> Result<()> {
        self.settings_mut().owner = owner;
        Ok(())
    }

    fn set_bridge_threshold(&mut self, threshold: u32) -> Result<()> {
        self.settings_mut().threshold = threshold;
        Ok(())
    }

    fn add_validator(&mut self, key: Address) -> Result<bool> {
        let settings = self.settings_mut();
        if settings.validators.contains(&key) {
            return Ok(false);
        }
        settings.validators.push(key);
        Ok(true)
    }

    fn remove_validator(&mut self, key: &Address) -> Result<bool> {
        let settings = self.settings_mut();
        let before = settings.validators.len();
        settings.validators.retain(|v| v != key);
        Ok(settings.validators.len() != before)
    }

    fn add_network(&mut self, network: KnownNetwork) -> Result<bool> {
        let settings = self.settings_mut();
        if settings.network(network.id).is_some() {
            return Ok(false);
        }
        settings.networks.push(network);
        Ok(true)
    }

    fn remove_network(&mut self, id: u32) -> Result<bool> {
        let settings = self.settings_mut();
        let before = settings.networks.len();
        settings.networks.retain(|n| n.id != id);
        Ok(settings.networks.len() != before)
    }

    fn minted_token(
        &mut self, origin_network: u32, origin_hash: &str,
    ) -> Result<Option<MintedTokenRecord>> {
        Ok(self
            .minted_by_origin
            .get(&(origin_network, origin_hash.to_string()))
            .cloned())
    }

    fn minted_token_by_wrapped(&mut self, wrapped: &H256) -> Result<Option<MintedTokenRecord>> {
        Ok(self.minted_by_wrapped.get(wrapped).cloned())
    }

    fn insert_minted_token(&mut self, record: MintedTokenRecord) -> Result<()> {
        self.minted_by_origin
            .insert((record.origin_network, record.origin_hash.clone()), record.clone());
        self.minted_by_wrapped.insert(record.wrapped_hash, record);
        Ok(())
    }
}
