// Copyright 2023 Kestrel Foundation. All rights reserved.
// Kestrel is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use super::{
    BridgeSettings, BridgeTicket, KnownNetwork, MintedTokenRecord, PoolState, Result,
    StateError, Substate, TokenInfo,
};
use kes_types::{Address, H256, U256};
use std::collections::{HashMap, HashSet};

/// A write recorded against the overlay, in application order. Commit
/// replays the journal onto the base through the same trait surface, so
/// nested overlays compose.
#[derive(Clone, Debug)]
enum WriteOp {
    AddBalance(Address, H256, U256),
    SubBalance(Address, H256, U256),
    RegisterToken(TokenInfo),
    SetTotalSupply(H256, U256),
    InsertPool(PoolState),
    BumpChannel(H256),
    InsertTicket(BridgeTicket),
    MarkTicketClaimed(H256),
    AddConfirmation(H256, Address),
    SetBridgeOwner(Address),
    SetBridgeThreshold(u32),
    AddValidator(Address),
    RemoveValidator(Address),
    AddNetwork(KnownNetwork),
    RemoveNetwork(u32),
    InsertMintedToken(MintedTokenRecord),
}

/// Buffers every write of one contract execution. Reads see the buffered
/// writes; dropping the overlay discards them; [`commit`](Self::commit)
/// applies them to the base atomically from the contract's point of view.
pub struct OverlaySubstate<'a> {
    base: &'a mut dyn Substate,
    journal: Vec<WriteOp>,

    balances: HashMap<(Address, H256), U256>,
    tokens: HashMap<H256, TokenInfo>,
    pools: HashMap<H256, PoolState>,
    channels: HashMap<H256, u64>,
    tickets: HashMap<H256, BridgeTicket>,
    confirmations: HashMap<H256, HashSet<Address>>,
    confirmation_counts: HashMap<H256, u32>,
    settings: Option<BridgeSettings>,
    minted_by_origin: HashMap<(u32, String), MintedTokenRecord>,
    minted_by_wrapped: HashMap<H256, MintedTokenRecord>,
}

impl<'a> OverlaySubstate<'a> {
    pub fn new(base: &'a mut dyn Substate) -> Self {
        OverlaySubstate {
            base,
            journal: Vec::new(),
            balances: HashMap::new(),
            tokens: HashMap::new(),
            pools: HashMap::new(),
            channels: HashMap::new(),
            tickets: HashMap::new(),
            confirmations: HashMap::new(),
            confirmation_counts: HashMap::new(),
            settings: None,
            minted_by_origin: HashMap::new(),
            minted_by_wrapped: HashMap::new(),
        }
    }

    pub fn commit(self) -> Result<()> {
        let OverlaySubstate { base, journal, .. } = self;
        for op in journal {
            match op {
                WriteOp::AddBalance(a, t, v) => base.add_balance(&a, &t, v)?,
                WriteOp::SubBalance(a, t, v) => base.sub_balance(&a, &t, v)?,
                WriteOp::RegisterToken(info) => base.register_token(info)?,
                WriteOp::SetTotalSupply(h, v) => base.set_total_supply(&h, v)?,
                WriteOp::InsertPool(pool) => base.insert_pool(pool)?,
                WriteOp::BumpChannel(c) => base.bump_channel(&c)?,
                WriteOp::InsertTicket(t) => base.insert_ticket(t)?,
                WriteOp::MarkTicketClaimed(h) => base.mark_ticket_claimed(&h)?,
                WriteOp::AddConfirmation(t, v) => {
                    base.add_confirmation(&t, &v)?;
                }
                WriteOp::SetBridgeOwner(o) => base.set_bridge_owner(o)?,
                WriteOp::SetBridgeThreshold(t) => base.set_bridge_threshold(t)?,
                WriteOp::AddValidator(v) => {
                    base.add_validator(v)?;
                }
                WriteOp::RemoveValidator(v) => {
                    base.remove_validator(&v)?;
                }
                WriteOp::AddNetwork(n) => {
                    base.add_network(n)?;
                }
                WriteOp::RemoveNetwork(n) => {
                    base.remove_network(n)?;
                }
                WriteOp::InsertMintedToken(r) => base.insert_minted_token(r)?,
            }
        }
        Ok(())
    }

    fn settings_cached(&mut self) -> Result<&mut BridgeSettings> {
        if self.settings.is_none() {
            self.settings = Some(self.base.bridge_settings()?);
        }
        Ok(self.settings.as_mut().unwrap())
    }
}

impl Substate for OverlaySubstate<'_> {
    fn balance(&mut self, address: &Address, token: &H256) -> Result<U256> {
        let key = (*address, *token);
        if let Some(v) = self.balances.get(&key) {
            return Ok(*v);
        }
        let v = self.base.balance(address, token)?;
        self.balances.insert(key, v);
        Ok(v)
    }

    fn add_balance(&mut self, address: &Address, token: &H256, amount: U256) -> Result<()> {
        let current = self.balance(address, token)?;
        let next = current
            .checked_add(amount)
            .ok_or_else(|| StateError::Backend("balance overflow".to_string()))?;
        self.balances.insert((*address, *token), next);
        self.journal.push(WriteOp::AddBalance(*address, *token, amount));
        Ok(())
    }

    fn sub_balance(&mut self, address: &Address, token: &H256, amount: U256) -> Result<()> {
        let current = self.balance(address, token)?;
        let next = current
            .checked_sub(amount)
            .ok_or_else(|| StateError::Backend("balance underflow".to_string()))?;
        self.balances.insert((*address, *token), next);
        self.journal.push(WriteOp::SubBalance(*address, *token, amount));
        Ok(())
    }

    fn token(&mut self, hash: &H256) -> Result<Option<TokenInfo>> {
        if let Some(info) = self.tokens.get(hash) {
            return Ok(Some(info.clone()));
        }
        self.base.token(hash)
    }

    fn register_token(&mut self, info: TokenInfo) -> Result<()> {
        self.tokens.insert(info.hash, info.clone());
        self.journal.push(WriteOp::RegisterToken(info));
        Ok(())
    }

    fn set_total_supply(&mut self, hash: &H256, supply: U256) -> Result<()> {
        let mut info = self
            .token(hash)?
            .ok_or_else(|| StateError::Backend(format!("no token {hash:x}")))?;
        info.total_supply = supply;
        self.tokens.insert(*hash, info);
        self.journal.push(WriteOp::SetTotalSupply(*hash, supply));
        Ok(())
    }

    fn pool(&mut self, pair_id: &H256) -> Result<Option<PoolState>> {
        if let Some(pool) = self.pools.get(pair_id) {
            return Ok(Some(pool.clone()));
        }
        self.base.pool(pair_id)
    }

    fn insert_pool(&mut self, pool: PoolState) -> Result<()> {
        self.pools.insert(pool.pair_id, pool.clone());
        self.journal.push(WriteOp::InsertPool(pool));
        Ok(())
    }

    fn channel_nonce(&mut self, channel: &H256) -> Result<u64> {
        if let Some(nonce) = self.channels.get(channel) {
            return Ok(*nonce);
        }
        let nonce = self.base.channel_nonce(channel)?;
        self.channels.insert(*channel, nonce);
        Ok(nonce)
    }

    fn bump_channel(&mut self, channel: &H256) -> Result<()> {
        let nonce = self.channel_nonce(channel)?;
        self.channels.insert(*channel, nonce + 1);
        self.journal.push(WriteOp::BumpChannel(*channel));
        Ok(())
    }

    fn ticket(&mut self, hash: &H256) -> Result<Option<BridgeTicket>> {
        if let Some(ticket) = self.tickets.get(hash) {
            return Ok(Some(ticket.clone()));
        }
        self.base.ticket(hash)
    }

    fn insert_ticket(&mut self, ticket: BridgeTicket) -> Result<()> {
        self.tickets.insert(ticket.ticket_hash, ticket.clone());
        self.journal.push(WriteOp::InsertTicket(ticket));
        Ok(())
    }

    fn mark_ticket_claimed(&mut self, hash: &H256) -> Result<()> {
        let mut ticket = self
            .ticket(hash)?
            .ok_or_else(|| StateError::Backend(format!("no ticket {hash:x}")))?;
        ticket.claimed = true;
        self.tickets.insert(*hash, ticket);
        self.journal.push(WriteOp::MarkTicketClaimed(*hash));
        Ok(())
    }

    fn has_confirmed(&mut self, ticket: &H256, validator: &Address) -> Result<bool> {
        if self
            .confirmations
            .get(ticket)
            .map_or(false, |set| set.contains(validator))
        {
            return Ok(true);
        }
        self.base.has_confirmed(ticket, validator)
    }

    fn add_confirmation(&mut self, ticket: &H256, validator: &Address) -> Result<Option<u32>> {
        if self.has_confirmed(ticket, validator)? {
            return Ok(None);
        }
        let count = match self.confirmation_counts.get(ticket) {
            Some(c) => *c,
            None => {
                // First touch of this ticket in the overlay: seed the count
                // from however many confirmations the base already holds.
                let seeded = self.base_confirmation_count(ticket)?;
                self.confirmation_counts.insert(*ticket, seeded);
                seeded
            }
        };
        self.confirmations.entry(*ticket).or_default().insert(*validator);
        let next = count + 1;
        self.confirmation_counts.insert(*ticket, next);
        self.journal.push(WriteOp::AddConfirmation(*ticket, *validator));
        Ok(Some(next))
    }

    fn bridge_settings(&mut self) -> Result<BridgeSettings> {
        Ok(self.settings_cached()?.clone())
    }

    fn set_bridge_owner(&mut self, owner: Address) -> Result<()> {
        self.settings_cached()?.owner = owner;
        self.journal.push(WriteOp::SetBridgeOwner(owner));
        Ok(())
    }

    fn set_bridge_threshold(&mut self, threshold: u32) -> Result<()> {
        self.settings_cached()?.threshold = threshold;
        self.journal.push(WriteOp::SetBridgeThreshold(threshold));
        Ok(())
    }

    fn add_validator(&mut self, key: Address) -> Result<bool> {
        let settings = self.settings_cached()?;
        if settings.validators.contains(&key) {
            return Ok(false);
        }
        settings.validators.push(key);
        self.journal.push(WriteOp::AddValidator(key));
        Ok(true)
    }

    fn remove_validator(&mut self, key: &Address) -> Result<bool> {
        let settings = self.settings_cached()?;
        let before = settings.validators.len();
        settings.validators.retain(|v| v != key);
        if settings.validators.len() == before {
            return Ok(false);
        }
        self.journal.push(WriteOp::RemoveValidator(*key));
        Ok(true)
    }

    fn add_network(&mut self, network: KnownNetwork) -> Result<bool> {
        let settings = self.settings_cached()?;
        if settings.network(network.id).is_some() {
            return Ok(false);
        }
        settings.networks.push(network);
        self.journal.push(WriteOp::AddNetwork(network));
        Ok(true)
    }

    fn remove_network(&mut self, id: u32) -> Result<bool> {
        let settings = self.settings_cached()?;
        let before = settings.networks.len();
        settings.networks.retain(|n| n.id != id);
        if settings.networks.len() == before {
            return Ok(false);
        }
        self.journal.push(WriteOp::RemoveNetwork(id));
        Ok(true)
    }

    fn minted_token(
        &mut self, origin_network: u32, origin_hash: &str,
    ) -> Result<Option<MintedTokenRecord>> {
        let key = (origin_network, origin_hash.to_string());
        if let Some(record) = self.minted_by_origin.get(&key) {
            return Ok(Some(record.clone()));
        }
        self.base.minted_token(origin_network, origin_hash)
    }

    fn minted_token_by_wrapped(&mut self, wrapped: &H256) -> Result<Option<MintedTokenRecord>> {
        if let Some(record) = self.minted_by_wrapped.get(wrapped) {
            return Ok(Some(record.clone()));
        }
        self.base.minted_token_by_wrapped(wrapped)
    }

    fn insert_minted_token(&mut self, record: MintedTokenRecord) -> Result<()> {
        self.minted_by_origin
            .insert((record.origin_network, record.origin_hash.clone()), record.clone());
        self.minted_by_wrapped.insert(record.wrapped_hash, record.clone());
        self.journal.push(WriteOp::InsertMintedToken(record));
        Ok(())
    }
}

impl OverlaySubstate<'_> {
    /// The base exposes membership, not a count; reconstruct the count by
    /// asking it per known validator. Settings are consulted through the
    /// overlay so in-flight validator changes are seen.
    fn base_confirmation_count(&mut self, ticket: &H256) -> Result<u32> {
        let validators = self.settings_cached()?.validators.clone();
        let mut count = 0;
        for v in &validators {
            if self.base.has_confirmed(ticket, v)? {
                count += 1;
            }
        }
        Ok(count)
    }
}
