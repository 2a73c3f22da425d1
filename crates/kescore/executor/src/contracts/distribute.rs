// Copyright 2023 Kestrel Foundation. All rights reserved.
// Kestrel is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! Treasury fee distribution. Converts accumulated protocol-fee tokens into
//! the reference token through the matching pool. The swap is best effort:
//! it runs in its own overlay and a failure (no pool, dust balance) is
//! logged and discarded without failing the outer transaction.

use super::{pool, ExecutionContext, ExecutionReceipt};
use crate::{
    error::{ContractError, ContractResult},
    state::OverlaySubstate,
    validate::{self, ParamKind, Schema},
};
use kes_parameters::{dex::REFERENCE_TOKEN_HASH, well_known_addresses::TREASURY};
use kes_types::{H256, U256};
use log::debug;
use tlv_abi::ParameterMap;

const DISTRIBUTE_SCHEMA: Schema = &[("token_hash", ParamKind::Hash32)];

#[derive(Clone, Debug)]
pub struct DexCmdDistribute {
    pub token_hash: H256,
}

impl DexCmdDistribute {
    pub fn from_params(params: &ParameterMap) -> ContractResult<Self> {
        validate::validate(params, DISTRIBUTE_SCHEMA)?;
        Ok(DexCmdDistribute { token_hash: validate::expect_hash32(params, "token_hash")? })
    }

    pub fn execute(&self, ctx: &mut ExecutionContext) -> ContractResult<ExecutionReceipt> {
        let balance = ctx.state.balance(&TREASURY, &self.token_hash)?;
        if balance.is_zero() {
            return Err(ContractError::InsufficientBalance {
                token: self.token_hash,
                required: U256::one(),
                got: balance,
            });
        }
        let swap = pool::PoolSellExact {
            asset_in: self.token_hash,
            asset_out: *REFERENCE_TOKEN_HASH,
            amount_in: balance,
            amount_out_min: U256::zero(),
        };

        let mut overlay = OverlaySubstate::new(&mut *ctx.state);
        let mut nested = ExecutionContext {
            tx: ctx.tx,
            block: ctx.block,
            spec: ctx.spec,
            params: ctx.params,
            crypto: ctx.crypto,
            sender: *TREASURY,
            state: &mut overlay,
        };
        match swap.execute(&mut nested) {
            Ok(receipt) => {
                overlay.commit()?;
                Ok(ExecutionReceipt {
                    amount_in: receipt.amount_in,
                    amount_out: receipt.amount_out,
                    ..Default::default()
                })
            }
            Err(reason) => {
                debug!(
                    "fee distribution swap for token {:x} skipped: {}",
                    self.token_hash, reason
                );
                Ok(ExecutionReceipt::default())
            }
        }
    }
}
