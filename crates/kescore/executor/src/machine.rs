// Copyright 2023 Kestrel Foundation. All rights reserved.
// Kestrel is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! The contract machine: decides whether a transaction is a contract at
//! all, applies the economic gates, and builds the typed contract.

use crate::{
    contracts::Contract,
    crypto::ChainCrypto,
    error::{ContractError, ContractResult},
    spec::{CommonParams, Spec},
};
use kes_parameters::{chain::NATIVE_TICKER, well_known_addresses::CONTRACT_PROCESSING};
use kes_primitives::Transaction;
use std::sync::Arc;
use tlv_abi::TlvTag;

pub struct Machine {
    params: CommonParams,
    crypto: Arc<dyn ChainCrypto>,
}

impl Machine {
    pub fn new(params: CommonParams, crypto: Arc<dyn ChainCrypto>) -> Self {
        Machine { params, crypto }
    }

    pub fn params(&self) -> &CommonParams {
        &self.params
    }

    pub fn crypto(&self) -> &dyn ChainCrypto {
        &*self.crypto
    }

    pub fn spec(&self, block_height: u64) -> Spec {
        Spec::new(&self.params, block_height)
    }

    /// Whether `data` is contract input under the rules active in `spec`.
    /// Anything else, including operation tags from a later fork, is an
    /// ordinary data payload.
    pub fn sniff(&self, data: &[u8], spec: &Spec) -> Option<TlvTag> {
        let tag = tlv_abi::sniff_operation(data)?;
        if spec.version.supports(tag) && spec.prices.price_of(tag).is_some() {
            Some(tag)
        } else {
            None
        }
    }

    /// Builds the contract for a sniffed transaction, enforcing the fee,
    /// recipient and currency gates before decoding the full envelope.
    pub fn create_contract(&self, tx: &Transaction, spec: &Spec) -> ContractResult<Contract> {
        let tag = self
            .sniff(&tx.data, spec)
            .ok_or(ContractError::Decode(tlv_abi::DecodeError::NotAnOperation))?;
        if tx.to != *CONTRACT_PROCESSING {
            return Err(ContractError::WrongRecipient);
        }
        if tx.ticker != NATIVE_TICKER {
            return Err(ContractError::WrongCurrency(tx.ticker.clone()));
        }
        let price = spec
            .prices
            .price_of(tag)
            .ok_or(ContractError::Decode(tlv_abi::DecodeError::NotAnOperation))?;
        if tx.amount < price {
            return Err(ContractError::NotEnoughFee { required: price, got: tx.amount });
        }
        let envelope = tlv_abi::decode_envelope(&tx.data)?;
        Contract::from_envelope(envelope, spec)
    }
}
