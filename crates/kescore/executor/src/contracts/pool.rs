// Copyright 2023 Kestrel Foundation. All rights reserved.
// Kestrel is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! Constant-product pool family. All amount arithmetic is exact integer
//! math over full-width products; division truncates toward zero.

use super::{ExecutionContext, ExecutionReceipt, token};
use crate::{
    error::{ContractError, ContractResult},
    state::{PoolState, TokenInfo},
    validate::{self, ParamKind, Schema},
};
use kes_math::{sqrt, u512_to_u256};
use kes_parameters::{
    dex::{FEE_DENOM, PROTOCOL_FEE_DIVISOR, REFERENCE_TOKEN_HASH},
    well_known_addresses::{BURN, TREASURY},
};
use kes_types::{hash::sha256, Address, H256, U256, U512};
use tlv_abi::ParameterMap;

/// Canonical pool key: the pair hex strings in ascending order, hashed.
/// Returns the id together with the sorted pair.
pub fn pair_id(a: &H256, b: &H256) -> (H256, H256, H256) {
    let (lo, hi) = if a < b { (*a, *b) } else { (*b, *a) };
    let id = sha256(format!("{lo:x}{hi:x}").as_bytes());
    (id, lo, hi)
}

fn div_ceil(numerator: U512, denominator: U512) -> U512 {
    let quotient = numerator / denominator;
    if quotient * denominator < numerator {
        quotient + U512::one()
    } else {
        quotient
    }
}

/// Output of a sell-exact swap:
/// `v_out - k / (v_in + amount_in * (FEE_DENOM - fee) / FEE_DENOM)`.
///
/// The inner division rounds up so the output rounds in the pool's favor;
/// otherwise a zero-fee round trip could shrink `k`.
pub fn sell_exact_out(v_in: U256, v_out: U256, amount_in: U256, fee_bps: u32) -> U256 {
    let k = U256::full_mul(v_in, v_out);
    let in_after_fee = U256::full_mul(amount_in, U256::from(FEE_DENOM - u64::from(fee_bps)))
        / U512::from(FEE_DENOM);
    let new_in = U512::from(v_in) + in_after_fee;
    u512_to_u256(U512::from(v_out) - div_ceil(k, new_in))
}

/// Input required by a buy-exact swap:
/// `v_in * amount_out * FEE_DENOM / ((v_out - amount_out) * (FEE_DENOM - fee))`,
/// rounded up, again in the pool's favor.
pub fn buy_exact_in(
    v_in: U256, v_out: U256, amount_out: U256, fee_bps: u32,
) -> ContractResult<U256> {
    if amount_out >= v_out {
        return Err(ContractError::InvalidAmount("amount_out exceeds reserves".to_string()));
    }
    let numerator = U256::full_mul(v_in, amount_out) * U512::from(FEE_DENOM);
    let denominator =
        U256::full_mul(v_out - amount_out, U256::from(FEE_DENOM - u64::from(fee_bps)));
    Ok(u512_to_u256(div_ceil(numerator, denominator)))
}

const POOL_CREATE_SCHEMA: Schema = &[
    ("asset_1", ParamKind::Hash32),
    ("asset_2", ParamKind::Hash32),
    ("amount_1", ParamKind::Amount { allow_zero: false }),
    ("amount_2", ParamKind::Amount { allow_zero: false }),
    ("pool_fee", ParamKind::Int),
];

#[derive(Clone, Debug)]
pub struct PoolCreate {
    pub asset_1: H256,
    pub asset_2: H256,
    pub amount_1: U256,
    pub amount_2: U256,
    pub pool_fee: u32,
}

impl PoolCreate {
    pub fn from_params(params: &ParameterMap) -> ContractResult<Self> {
        validate::validate(params, POOL_CREATE_SCHEMA)?;
        let fee = validate::expect_u64(params, "pool_fee")?;
        if fee >= FEE_DENOM {
            return Err(ContractError::InvalidAmount("pool_fee".to_string()));
        }
        let asset_1 = validate::expect_hash32(params, "asset_1")?;
        let asset_2 = validate::expect_hash32(params, "asset_2")?;
        if asset_1 == asset_2 {
            return Err(ContractError::InvalidAmount("identical assets".to_string()));
        }
        Ok(PoolCreate {
            asset_1,
            asset_2,
            amount_1: validate::expect_amount(params, "amount_1")?,
            amount_2: validate::expect_amount(params, "amount_2")?,
            pool_fee: fee as u32,
        })
    }

    pub fn execute(&self, ctx: &mut ExecutionContext) -> ContractResult<ExecutionReceipt> {
        let (pair, lo, hi) = pair_id(&self.asset_1, &self.asset_2);
        if ctx.state.pool(&pair)?.is_some() {
            return Err(ContractError::PoolAlreadyExists(format!("{pair:x}")));
        }
        for asset in [&self.asset_1, &self.asset_2] {
            if ctx.state.token(asset)?.is_none() {
                return Err(ContractError::TokenNotFound(*asset));
            }
        }
        // Orient deposits to the canonical pair order.
        let (volume_1, volume_2) = if self.asset_1 == lo {
            (self.amount_1, self.amount_2)
        } else {
            (self.amount_2, self.amount_1)
        };

        let sender = ctx.sender;
        token::debit_checked(ctx, &sender, &self.asset_1, self.amount_1)?;
        token::debit_checked(ctx, &sender, &self.asset_2, self.amount_2)?;

        let liquidity = sqrt(U256::full_mul(volume_1, volume_2));
        if liquidity.is_zero() {
            return Err(ContractError::InvalidAmount("liquidity".to_string()));
        }

        // The LP token is an ordinary token owned by the pool creator's
        // transaction, minted and burned only through the pool itself.
        let lp_token_hash = ctx.tx.hash;
        if ctx.state.token(&lp_token_hash)?.is_some() {
            return Err(ContractError::AlreadyExists(format!("token {lp_token_hash:x}")));
        }
        ctx.state.register_token(TokenInfo {
            hash: lp_token_hash,
            owner: *TREASURY,
            name: "Kestrel LP Share".to_string(),
            ticker: "KLP".to_string(),
            decimals: 10,
            total_supply: liquidity,
            max_supply: U256::MAX,
            reissuable: true,
        })?;
        ctx.state.add_balance(&sender, &lp_token_hash, liquidity)?;

        ctx.state.insert_pool(PoolState {
            pair_id: pair,
            token_1: lo,
            token_2: hi,
            volume_1,
            volume_2,
            pool_fee: self.pool_fee,
            lp_token_hash,
            root_k_last: liquidity,
        })?;
        Ok(ExecutionReceipt { amount_out: liquidity, ..Default::default() })
    }
}

/// Mints the protocol's share of fee growth since the last liquidity event
/// and returns the amount minted. The share goes to the treasury when the
/// LP token trades against the reference token, otherwise it is burned by
/// sending it to the burn address.
fn mint_protocol_fee(ctx: &mut ExecutionContext, pool: &PoolState) -> ContractResult<U256> {
    let root_k = sqrt(U256::full_mul(pool.volume_1, pool.volume_2));
    if root_k <= pool.root_k_last || pool.root_k_last.is_zero() {
        return Ok(U256::zero());
    }
    let lp_supply = ctx
        .state
        .token(&pool.lp_token_hash)?
        .ok_or(ContractError::TokenNotFound(pool.lp_token_hash))?
        .total_supply;
    let numerator = U256::full_mul(lp_supply, root_k - pool.root_k_last);
    let denominator = U256::full_mul(root_k, U256::from(PROTOCOL_FEE_DIVISOR))
        + U512::from(pool.root_k_last);
    let fee_lp = u512_to_u256(numerator / denominator);
    if fee_lp.is_zero() {
        return Ok(U256::zero());
    }
    let (routing_pair, _, _) = pair_id(&pool.lp_token_hash, &REFERENCE_TOKEN_HASH);
    let beneficiary: Address =
        if ctx.state.pool(&routing_pair)?.is_some() { *TREASURY } else { *BURN };
    ctx.state.add_balance(&beneficiary, &pool.lp_token_hash, fee_lp)?;
    ctx.state.set_total_supply(&pool.lp_token_hash, lp_supply + fee_lp)?;
    Ok(fee_lp)
}

fn load_pool(ctx: &mut ExecutionContext, a: &H256, b: &H256) -> ContractResult<PoolState> {
    let (pair, _, _) = pair_id(a, b);
    ctx.state
        .pool(&pair)?
        .ok_or_else(|| ContractError::PoolNotFound(format!("{pair:x}")))
}

const LIQUIDITY_ADD_SCHEMA: Schema = &[
    ("asset_1", ParamKind::Hash32),
    ("asset_2", ParamKind::Hash32),
    ("amount_1", ParamKind::Amount { allow_zero: false }),
    ("amount_2", ParamKind::Amount { allow_zero: false }),
];

#[derive(Clone, Debug)]
pub struct PoolAddLiquidity {
    pub asset_1: H256,
    pub asset_2: H256,
    pub amount_1: U256,
    pub amount_2: U256,
}

impl PoolAddLiquidity {
    pub fn from_params(params: &ParameterMap) -> ContractResult<Self> {
        validate::validate(params, LIQUIDITY_ADD_SCHEMA)?;
        Ok(PoolAddLiquidity {
            asset_1: validate::expect_hash32(params, "asset_1")?,
            asset_2: validate::expect_hash32(params, "asset_2")?,
            amount_1: validate::expect_amount(params, "amount_1")?,
            amount_2: validate::expect_amount(params, "amount_2")?,
        })
    }

    pub fn execute(&self, ctx: &mut ExecutionContext) -> ContractResult<ExecutionReceipt> {
        let mut pool = load_pool(ctx, &self.asset_1, &self.asset_2)?;
        let protocol_fee = mint_protocol_fee(ctx, &pool)?;

        let (offer_1, offer_2) = if self.asset_1 == pool.token_1 {
            (self.amount_1, self.amount_2)
        } else {
            (self.amount_2, self.amount_1)
        };
        // Deposit at the current price: scale the second leg off the first,
        // falling back to the other orientation when the offer is short.
        let fit_2 = u512_to_u256(U256::full_mul(offer_1, pool.volume_2) / U512::from(pool.volume_1));
        let (used_1, used_2) = if fit_2 <= offer_2 {
            (offer_1, fit_2)
        } else {
            let fit_1 =
                u512_to_u256(U256::full_mul(offer_2, pool.volume_1) / U512::from(pool.volume_2));
            (fit_1, offer_2)
        };
        if used_1.is_zero() || used_2.is_zero() {
            return Err(ContractError::InvalidAmount("deposit too small".to_string()));
        }

        let lp_supply = ctx
            .state
            .token(&pool.lp_token_hash)?
            .ok_or(ContractError::TokenNotFound(pool.lp_token_hash))?
            .total_supply;
        let share_1 = U256::full_mul(used_1, lp_supply) / U512::from(pool.volume_1);
        let share_2 = U256::full_mul(used_2, lp_supply) / U512::from(pool.volume_2);
        let minted = u512_to_u256(share_1.min(share_2));
        if minted.is_zero() {
            return Err(ContractError::InvalidAmount("deposit too small".to_string()));
        }

        let sender = ctx.sender;
        token::debit_checked(ctx, &sender, &pool.token_1, used_1)?;
        token::debit_checked(ctx, &sender, &pool.token_2, used_2)?;
        ctx.state.add_balance(&sender, &pool.lp_token_hash, minted)?;
        ctx.state.set_total_supply(&pool.lp_token_hash, lp_supply + minted)?;

        pool.volume_1 = pool.volume_1 + used_1;
        pool.volume_2 = pool.volume_2 + used_2;
        pool.root_k_last = sqrt(U256::full_mul(pool.volume_1, pool.volume_2));
        ctx.state.insert_pool(pool)?;
        Ok(ExecutionReceipt {
            amount_out: minted,
            protocol_fee_minted: protocol_fee,
            ..Default::default()
        })
    }
}

const LIQUIDITY_REMOVE_SCHEMA: Schema = &[
    ("asset_1", ParamKind::Hash32),
    ("asset_2", ParamKind::Hash32),
    ("amount", ParamKind::Amount { allow_zero: false }),
];

#[derive(Clone, Debug)]
pub struct PoolRemoveLiquidity {
    pub asset_1: H256,
    pub asset_2: H256,
    /// LP tokens to redeem.
    pub amount: U256,
}

impl PoolRemoveLiquidity {
    pub fn from_params(params: &ParameterMap) -> ContractResult<Self> {
        validate::validate(params, LIQUIDITY_REMOVE_SCHEMA)?;
        Ok(PoolRemoveLiquidity {
            asset_1: validate::expect_hash32(params, "asset_1")?,
            asset_2: validate::expect_hash32(params, "asset_2")?,
            amount: validate::expect_amount(params, "amount")?,
        })
    }

    pub fn execute(&self, ctx: &mut ExecutionContext) -> ContractResult<ExecutionReceipt> {
        let mut pool = load_pool(ctx, &self.asset_1, &self.asset_2)?;
        let protocol_fee = mint_protocol_fee(ctx, &pool)?;

        let lp_supply = ctx
            .state
            .token(&pool.lp_token_hash)?
            .ok_or(ContractError::TokenNotFound(pool.lp_token_hash))?
            .total_supply;
        let out_1 = u512_to_u256(U256::full_mul(self.amount, pool.volume_1) / U512::from(lp_supply));
        let out_2 = u512_to_u256(U256::full_mul(self.amount, pool.volume_2) / U512::from(lp_supply));
        if out_1.is_zero() || out_2.is_zero() {
            return Err(ContractError::InvalidAmount("redemption too small".to_string()));
        }

        let sender = ctx.sender;
        token::debit_checked(ctx, &sender, &pool.lp_token_hash, self.amount)?;
        ctx.state.set_total_supply(&pool.lp_token_hash, lp_supply - self.amount)?;
        ctx.state.add_balance(&sender, &pool.token_1, out_1)?;
        ctx.state.add_balance(&sender, &pool.token_2, out_2)?;

        pool.volume_1 = pool.volume_1 - out_1;
        pool.volume_2 = pool.volume_2 - out_2;
        pool.root_k_last = sqrt(U256::full_mul(pool.volume_1, pool.volume_2));
        ctx.state.insert_pool(pool)?;
        Ok(ExecutionReceipt {
            amount_in: self.amount,
            protocol_fee_minted: protocol_fee,
            ..Default::default()
        })
    }
}

const SELL_EXACT_SCHEMA: Schema = &[
    ("asset_in", ParamKind::Hash32),
    ("asset_out", ParamKind::Hash32),
    ("amount_in", ParamKind::Amount { allow_zero: false }),
    ("amount_out_min", ParamKind::Amount { allow_zero: true }),
];

#[derive(Clone, Debug)]
pub struct PoolSellExact {
    pub asset_in: H256,
    pub asset_out: H256,
    pub amount_in: U256,
    pub amount_out_min: U256,
}

impl PoolSellExact {
    pub fn from_params(params: &ParameterMap) -> ContractResult<Self> {
        validate::validate(params, SELL_EXACT_SCHEMA)?;
        Ok(PoolSellExact {
            asset_in: validate::expect_hash32(params, "asset_in")?,
            asset_out: validate::expect_hash32(params, "asset_out")?,
            amount_in: validate::expect_amount(params, "amount_in")?,
            amount_out_min: validate::expect_amount(params, "amount_out_min")?,
        })
    }

    pub fn execute(&self, ctx: &mut ExecutionContext) -> ContractResult<ExecutionReceipt> {
        let pool = load_pool(ctx, &self.asset_in, &self.asset_out)?;
        let (v_in, v_out) = pool.oriented(&self.asset_in);
        let amount_out = sell_exact_out(v_in, v_out, self.amount_in, pool.pool_fee);
        if amount_out < self.amount_out_min || amount_out.is_zero() {
            return Err(ContractError::SlippageExceeded);
        }
        let protocol_fee = settle_swap(ctx, &pool, &self.asset_in, self.amount_in, amount_out)?;
        Ok(ExecutionReceipt {
            amount_in: self.amount_in,
            amount_out,
            protocol_fee_minted: protocol_fee,
            ..Default::default()
        })
    }
}

const BUY_EXACT_SCHEMA: Schema = &[
    ("asset_in", ParamKind::Hash32),
    ("asset_out", ParamKind::Hash32),
    ("amount_out", ParamKind::Amount { allow_zero: false }),
    ("amount_in_max", ParamKind::Amount { allow_zero: false }),
];

#[derive(Clone, Debug)]
pub struct PoolBuyExact {
    pub asset_in: H256,
    pub asset_out: H256,
    pub amount_out: U256,
    pub amount_in_max: U256,
}

impl PoolBuyExact {
    pub fn from_params(params: &ParameterMap) -> ContractResult<Self> {
        validate::validate(params, BUY_EXACT_SCHEMA)?;
        Ok(PoolBuyExact {
            asset_in: validate::expect_hash32(params, "asset_in")?,
            asset_out: validate::expect_hash32(params, "asset_out")?,
            amount_out: validate::expect_amount(params, "amount_out")?,
            amount_in_max: validate::expect_amount(params, "amount_in_max")?,
        })
    }

    pub fn execute(&self, ctx: &mut ExecutionContext) -> ContractResult<ExecutionReceipt> {
        let pool = load_pool(ctx, &self.asset_in, &self.asset_out)?;
        let (v_in, v_out) = pool.oriented(&self.asset_in);
        let amount_in = buy_exact_in(v_in, v_out, self.amount_out, pool.pool_fee)?;
        if amount_in > self.amount_in_max || amount_in.is_zero() {
            return Err(ContractError::SlippageExceeded);
        }
        let protocol_fee = settle_swap(ctx, &pool, &self.asset_in, amount_in, self.amount_out)?;
        Ok(ExecutionReceipt {
            amount_in,
            amount_out: self.amount_out,
            protocol_fee_minted: protocol_fee,
            ..Default::default()
        })
    }
}

/// Moves the traded balances, mints the protocol's share of the fee growth
/// this trade produced and persists the pool with a fresh `root_k_last`
/// baseline. Returns the LP amount minted for the protocol.
fn settle_swap(
    ctx: &mut ExecutionContext, pool: &PoolState, asset_in: &H256, amount_in: U256,
    amount_out: U256,
) -> ContractResult<U256> {
    let sender = ctx.sender;
    let asset_out = if *asset_in == pool.token_1 { pool.token_2 } else { pool.token_1 };
    token::debit_checked(ctx, &sender, asset_in, amount_in)?;
    ctx.state.add_balance(&sender, &asset_out, amount_out)?;
    let mut updated = pool.clone();
    if *asset_in == pool.token_1 {
        updated.volume_1 = pool.volume_1 + amount_in;
        updated.volume_2 = pool.volume_2 - amount_out;
    } else {
        updated.volume_1 = pool.volume_1 - amount_out;
        updated.volume_2 = pool.volume_2 + amount_in;
    }
    let protocol_fee = mint_protocol_fee(ctx, &updated)?;
    updated.root_k_last = sqrt(U256::full_mul(updated.volume_1, updated.volume_2));
    ctx.state.insert_pool(updated)?;
    Ok(protocol_fee)
}
