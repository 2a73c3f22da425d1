// Copyright 2023 Kestrel Foundation. All rights reserved.
// Kestrel is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! Token family: issuance, transfer, mint and burn. The hash of a token is
//! the hash of the transaction that created it.

use super::{ExecutionContext, ExecutionReceipt};
use crate::{
    error::{ContractError, ContractResult},
    state::TokenInfo,
    validate::{self, ParamKind, Schema},
};
use kes_types::{H256, U256};
use tlv_abi::ParameterMap;

/// Widest decimal precision a token may declare.
pub const MAX_TOKEN_DECIMALS: u8 = 10;

const CREATE_TOKEN_SCHEMA: Schema = &[
    ("name", ParamKind::Str40),
    ("ticker", ParamKind::Str40),
    ("decimals", ParamKind::Byte),
    ("total_supply", ParamKind::Amount { allow_zero: true }),
    ("max_supply", ParamKind::Amount { allow_zero: false }),
    ("reissuable", ParamKind::Byte),
];

#[derive(Clone, Debug)]
pub struct CreateToken {
    pub name: String,
    pub ticker: String,
    pub decimals: u8,
    pub total_supply: U256,
    pub max_supply: U256,
    pub reissuable: bool,
}

impl CreateToken {
    pub fn from_params(params: &ParameterMap) -> ContractResult<Self> {
        validate::validate(params, CREATE_TOKEN_SCHEMA)?;
        let decimals = validate::expect_byte(params, "decimals")?;
        if decimals > MAX_TOKEN_DECIMALS {
            return Err(ContractError::InvalidAmount("decimals".to_string()));
        }
        let total_supply = validate::expect_amount(params, "total_supply")?;
        let max_supply = validate::expect_amount(params, "max_supply")?;
        if total_supply > max_supply {
            return Err(ContractError::InvalidAmount("total_supply".to_string()));
        }
        Ok(CreateToken {
            name: validate::expect_str(params, "name")?.to_string(),
            ticker: validate::expect_str(params, "ticker")?.to_uppercase(),
            decimals,
            total_supply,
            max_supply,
            reissuable: validate::expect_byte(params, "reissuable")? != 0,
        })
    }

    pub fn execute(&self, ctx: &mut ExecutionContext) -> ContractResult<ExecutionReceipt> {
        let hash = ctx.tx.hash;
        if ctx.state.token(&hash)?.is_some() {
            return Err(ContractError::AlreadyExists(format!("token {hash:x}")));
        }
        ctx.state.register_token(TokenInfo {
            hash,
            owner: ctx.sender,
            name: self.name.clone(),
            ticker: self.ticker.clone(),
            decimals: self.decimals,
            total_supply: self.total_supply,
            max_supply: self.max_supply,
            reissuable: self.reissuable,
        })?;
        if !self.total_supply.is_zero() {
            ctx.state.add_balance(&ctx.sender, &hash, self.total_supply)?;
        }
        Ok(ExecutionReceipt { token_created: Some(hash), ..Default::default() })
    }
}

const TRANSFER_SCHEMA: Schema = &[
    ("to", ParamKind::Hash33),
    ("token_hash", ParamKind::Hash32),
    ("amount", ParamKind::Amount { allow_zero: false }),
];

#[derive(Clone, Debug)]
pub struct Transfer {
    pub to: kes_types::Address,
    pub token_hash: H256,
    pub amount: U256,
}

impl Transfer {
    pub fn from_params(params: &ParameterMap) -> ContractResult<Self> {
        validate::validate(params, TRANSFER_SCHEMA)?;
        Ok(Transfer {
            to: validate::expect_address(params, "to")?,
            token_hash: validate::expect_hash32(params, "token_hash")?,
            amount: validate::expect_amount(params, "amount")?,
        })
    }

    pub fn execute(&self, ctx: &mut ExecutionContext) -> ContractResult<ExecutionReceipt> {
        if ctx.state.token(&self.token_hash)?.is_none() {
            return Err(ContractError::TokenNotFound(self.token_hash));
        }
        let from = ctx.sender;
        move_tokens(ctx, &from, &self.to, &self.token_hash, self.amount)?;
        Ok(ExecutionReceipt { amount_out: self.amount, ..Default::default() })
    }
}

const MINT_SCHEMA: Schema = &[
    ("token_hash", ParamKind::Hash32),
    ("amount", ParamKind::Amount { allow_zero: false }),
];

#[derive(Clone, Debug)]
pub struct Mint {
    pub token_hash: H256,
    pub amount: U256,
}

impl Mint {
    pub fn from_params(params: &ParameterMap) -> ContractResult<Self> {
        validate::validate(params, MINT_SCHEMA)?;
        Ok(Mint {
            token_hash: validate::expect_hash32(params, "token_hash")?,
            amount: validate::expect_amount(params, "amount")?,
        })
    }

    pub fn execute(&self, ctx: &mut ExecutionContext) -> ContractResult<ExecutionReceipt> {
        let info = ctx
            .state
            .token(&self.token_hash)?
            .ok_or(ContractError::TokenNotFound(self.token_hash))?;
        if info.owner != ctx.sender {
            return Err(ContractError::Unauthorized);
        }
        if !info.reissuable {
            return Err(ContractError::InvalidAmount("token is not reissuable".to_string()));
        }
        let next = info
            .total_supply
            .checked_add(self.amount)
            .filter(|v| *v <= info.max_supply)
            .ok_or(ContractError::SupplyOverflow)?;
        ctx.state.set_total_supply(&self.token_hash, next)?;
        ctx.state.add_balance(&ctx.sender, &self.token_hash, self.amount)?;
        Ok(ExecutionReceipt { amount_out: self.amount, ..Default::default() })
    }
}

const BURN_SCHEMA: Schema = &[
    ("token_hash", ParamKind::Hash32),
    ("amount", ParamKind::Amount { allow_zero: false }),
];

#[derive(Clone, Debug)]
pub struct Burn {
    pub token_hash: H256,
    pub amount: U256,
}

impl Burn {
    pub fn from_params(params: &ParameterMap) -> ContractResult<Self> {
        validate::validate(params, BURN_SCHEMA)?;
        Ok(Burn {
            token_hash: validate::expect_hash32(params, "token_hash")?,
            amount: validate::expect_amount(params, "amount")?,
        })
    }

    pub fn execute(&self, ctx: &mut ExecutionContext) -> ContractResult<ExecutionReceipt> {
        let info = ctx
            .state
            .token(&self.token_hash)?
            .ok_or(ContractError::TokenNotFound(self.token_hash))?;
        if info.owner != ctx.sender {
            return Err(ContractError::Unauthorized);
        }
        let sender = ctx.sender;
        debit_checked(ctx, &sender, &self.token_hash, self.amount)?;
        let next = info
            .total_supply
            .checked_sub(self.amount)
            .ok_or(ContractError::SupplyOverflow)?;
        ctx.state.set_total_supply(&self.token_hash, next)?;
        Ok(ExecutionReceipt { amount_in: self.amount, ..Default::default() })
    }
}

/// Debits `from` after an explicit balance check, so a short account fails
/// with the contract-level error rather than a backend fault.
pub(crate) fn debit_checked(
    ctx: &mut ExecutionContext, from: &kes_types::Address, token: &H256, amount: U256,
) -> ContractResult<()> {
    let balance = ctx.state.balance(from, token)?;
    if balance < amount {
        return Err(ContractError::InsufficientBalance {
            token: *token,
            required: amount,
            got: balance,
        });
    }
    ctx.state.sub_balance(from, token, amount)?;
    Ok(())
}

pub(crate) fn move_tokens(
    ctx: &mut ExecutionContext, from: &kes_types::Address, to: &kes_types::Address,
    token: &H256, amount: U256,
) -> ContractResult<()> {
    debit_checked(ctx, from, token, amount)?;
    ctx.state.add_balance(to, token, amount)?;
    Ok(())
}
