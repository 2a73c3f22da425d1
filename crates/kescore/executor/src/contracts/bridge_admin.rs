// Copyright 2023 Kestrel Foundation. All rights reserved.
// Kestrel is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! Bridge governance, restricted to the configured bridge owner.

use super::{ExecutionContext, ExecutionReceipt};
use crate::{
    error::{ContractError, ContractResult},
    state::KnownNetwork,
    validate::{self, ParamKind},
};
use kes_types::Address;
use tlv_abi::{ParameterMap, TlvTag};

#[derive(Clone, Debug)]
pub enum BridgeAdmin {
    SetOwner { pubkey: Address },
    SetThreshold { threshold: u32 },
    AddValidator { pubkey: Address },
    RemoveValidator { pubkey: Address },
    AddNetwork { id: u32, decimals: u8 },
    RemoveNetwork { id: u32 },
}

impl BridgeAdmin {
    pub fn from_params(operation: TlvTag, params: &ParameterMap) -> ContractResult<Self> {
        let admin = match operation {
            TlvTag::SetOwner => {
                validate::validate(params, &[("pubkey", ParamKind::Hash33)])?;
                BridgeAdmin::SetOwner { pubkey: validate::expect_address(params, "pubkey")? }
            }
            TlvTag::SetThreshold => {
                validate::validate(params, &[("threshold", ParamKind::Int)])?;
                let threshold = validate::expect_u32(params, "threshold")?;
                if threshold == 0 {
                    return Err(ContractError::InvalidAmount("threshold".to_string()));
                }
                BridgeAdmin::SetThreshold { threshold }
            }
            TlvTag::AddValidator => {
                validate::validate(params, &[("pubkey", ParamKind::Hash33)])?;
                BridgeAdmin::AddValidator { pubkey: validate::expect_address(params, "pubkey")? }
            }
            TlvTag::RemoveValidator => {
                validate::validate(params, &[("pubkey", ParamKind::Hash33)])?;
                BridgeAdmin::RemoveValidator {
                    pubkey: validate::expect_address(params, "pubkey")?,
                }
            }
            TlvTag::AddNetwork => {
                validate::validate(
                    params,
                    &[("id", ParamKind::Int), ("decimals", ParamKind::Byte)],
                )?;
                BridgeAdmin::AddNetwork {
                    id: validate::expect_u32(params, "id")?,
                    decimals: validate::expect_byte(params, "decimals")?,
                }
            }
            TlvTag::RemoveNetwork => {
                validate::validate(params, &[("id", ParamKind::Int)])?;
                BridgeAdmin::RemoveNetwork { id: validate::expect_u32(params, "id")? }
            }
            _ => return Err(ContractError::Decode(tlv_abi::DecodeError::NotAnOperation)),
        };
        Ok(admin)
    }

    pub fn execute(&self, ctx: &mut ExecutionContext) -> ContractResult<ExecutionReceipt> {
        let settings = ctx.state.bridge_settings()?;
        if settings.owner != ctx.sender {
            return Err(ContractError::Unauthorized);
        }
        match self {
            BridgeAdmin::SetOwner { pubkey } => {
                ctx.state.set_bridge_owner(*pubkey)?;
            }
            BridgeAdmin::SetThreshold { threshold } => {
                ctx.state.set_bridge_threshold(*threshold)?;
            }
            BridgeAdmin::AddValidator { pubkey } => {
                if !ctx.state.add_validator(*pubkey)? {
                    return Err(ContractError::AlreadyExists(format!("validator {pubkey:x}")));
                }
            }
            BridgeAdmin::RemoveValidator { pubkey } => {
                if !ctx.state.remove_validator(pubkey)? {
                    return Err(ContractError::NotFound(format!("validator {pubkey:x}")));
                }
            }
            BridgeAdmin::AddNetwork { id, decimals } => {
                let network = KnownNetwork { id: *id, decimals: *decimals };
                if !ctx.state.add_network(network)? {
                    return Err(ContractError::AlreadyExists(format!("network {id}")));
                }
            }
            BridgeAdmin::RemoveNetwork { id } => {
                if !ctx.state.remove_network(*id)? {
                    return Err(ContractError::NotFound(format!("network {id}")));
                }
            }
        }
        Ok(ExecutionReceipt::default())
    }
}
