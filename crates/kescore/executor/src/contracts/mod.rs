// Copyright 2023 Kestrel Foundation. All rights reserved.
// Kestrel is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! The contract variants and their dispatch. Contracts are a closed set:
//! construction validates parameters, so an existing [`Contract`] value is
//! structurally sound and `execute` only deals in ledger semantics.

pub mod bridge;
pub mod bridge_admin;
pub mod distribute;
pub(crate) mod payload;
pub mod pool;
pub mod token;

use crate::{
    crypto::ChainCrypto,
    error::{ContractError, ContractResult},
    spec::{CommonParams, Spec},
    state::Substate,
};
use kes_primitives::{BlockInfo, Transaction};
use kes_types::{Address, H256, U256};
use tlv_abi::{ContractEnvelope, TlvTag};

/// Everything a contract may see while executing. `sender` starts as the
/// transaction author and is swapped when a contract runs a nested
/// operation on behalf of another account.
pub struct ExecutionContext<'a> {
    pub tx: &'a Transaction,
    pub block: &'a BlockInfo,
    pub spec: &'a Spec,
    pub params: &'a CommonParams,
    pub crypto: &'a dyn ChainCrypto,
    pub sender: Address,
    pub state: &'a mut dyn Substate,
}

impl ExecutionContext<'_> {
    /// Reborrows the context with a different acting account, for nested
    /// operations executed by a system address.
    pub fn with_sender(&mut self, sender: Address) -> ExecutionContext<'_> {
        ExecutionContext {
            tx: self.tx,
            block: self.block,
            spec: self.spec,
            params: self.params,
            crypto: self.crypto,
            sender,
            state: &mut *self.state,
        }
    }
}

/// What a finished contract reports back to the block producer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExecutionReceipt {
    pub amount_in: U256,
    pub amount_out: U256,
    pub protocol_fee_minted: U256,
    pub token_created: Option<H256>,
    pub ticket_settled: Option<H256>,
}

#[derive(Clone, Debug)]
pub enum Contract {
    CreateToken(token::CreateToken),
    Transfer(token::Transfer),
    Mint(token::Mint),
    Burn(token::Burn),
    PoolCreate(pool::PoolCreate),
    PoolAddLiquidity(pool::PoolAddLiquidity),
    PoolRemoveLiquidity(pool::PoolRemoveLiquidity),
    PoolSellExact(pool::PoolSellExact),
    PoolBuyExact(pool::PoolBuyExact),
    DexCmdDistribute(distribute::DexCmdDistribute),
    Lock(bridge::Lock),
    ClaimInit(bridge::ClaimInit),
    ClaimConfirm(bridge::ClaimConfirm),
    Claim(bridge::Claim),
    BridgeAdmin(bridge_admin::BridgeAdmin),
}

impl Contract {
    pub fn from_envelope(envelope: ContractEnvelope, spec: &Spec) -> ContractResult<Contract> {
        use TlvTag::*;
        let params = &envelope.parameters;
        let contract = match envelope.operation {
            CreateToken => Contract::CreateToken(token::CreateToken::from_params(params)?),
            Transfer => Contract::Transfer(token::Transfer::from_params(params)?),
            Mint => Contract::Mint(token::Mint::from_params(params)?),
            Burn => Contract::Burn(token::Burn::from_params(params)?),
            PoolCreate => Contract::PoolCreate(pool::PoolCreate::from_params(params)?),
            PoolAddLiquidity => {
                Contract::PoolAddLiquidity(pool::PoolAddLiquidity::from_params(params)?)
            }
            PoolRemoveLiquidity => {
                Contract::PoolRemoveLiquidity(pool::PoolRemoveLiquidity::from_params(params)?)
            }
            PoolSellExact => Contract::PoolSellExact(pool::PoolSellExact::from_params(params)?),
            PoolBuyExact => Contract::PoolBuyExact(pool::PoolBuyExact::from_params(params)?),
            DexCmdDistribute => {
                Contract::DexCmdDistribute(distribute::DexCmdDistribute::from_params(params)?)
            }
            TokenSendOverBridge => Contract::Lock(bridge::Lock::from_params(params)?),
            ClaimInit => Contract::ClaimInit(bridge::ClaimInit::from_params(params, spec)?),
            ClaimConfirm => {
                Contract::ClaimConfirm(bridge::ClaimConfirm::from_params(params, spec)?)
            }
            Claim => Contract::Claim(bridge::Claim::from_params(params, spec)?),
            SetOwner | SetThreshold | AddValidator | RemoveValidator | AddNetwork
            | RemoveNetwork => Contract::BridgeAdmin(bridge_admin::BridgeAdmin::from_params(
                envelope.operation,
                params,
            )?),
            _ => return Err(ContractError::Decode(tlv_abi::DecodeError::NotAnOperation)),
        };
        Ok(contract)
    }

    pub fn execute(&self, ctx: &mut ExecutionContext) -> ContractResult<ExecutionReceipt> {
        match self {
            Contract::CreateToken(c) => c.execute(ctx),
            Contract::Transfer(c) => c.execute(ctx),
            Contract::Mint(c) => c.execute(ctx),
            Contract::Burn(c) => c.execute(ctx),
            Contract::PoolCreate(c) => c.execute(ctx),
            Contract::PoolAddLiquidity(c) => c.execute(ctx),
            Contract::PoolRemoveLiquidity(c) => c.execute(ctx),
            Contract::PoolSellExact(c) => c.execute(ctx),
            Contract::PoolBuyExact(c) => c.execute(ctx),
            Contract::DexCmdDistribute(c) => c.execute(ctx),
            Contract::Lock(c) => c.execute(ctx),
            Contract::ClaimInit(c) => c.execute(ctx),
            Contract::ClaimConfirm(c) => c.execute(ctx),
            Contract::Claim(c) => c.execute(ctx),
            Contract::BridgeAdmin(c) => c.execute(ctx),
        }
    }
}
