// Copyright 2023 Kestrel Foundation. All rights reserved.
// Kestrel is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! Cross-chain bridge: outbound locks, inbound claim tickets, validator
//! confirmations and final settlement. Wrapped assets are owned by the
//! bridge custody address, which mints them on claims and burns them when
//! they travel back toward their origin chain.

use super::{payload, token, ExecutionContext, ExecutionReceipt};
use crate::{
    error::{ContractError, ContractResult},
    spec::Spec,
    state::{BridgeTicket, TokenInfo},
    validate::{self, ParamKind, Schema},
};
use kes_parameters::{
    bridge::{LOCAL_NETWORK_ID, MAX_WRAPPED_DECIMALS},
    well_known_addresses::BRIDGE_CUSTODY,
};
use kes_types::{
    hash::{sha256, sha256_str},
    Address, H256, U256,
};
use std::str::FromStr;
use tlv_abi::ParameterMap;

/// Ticket fields folded into the ticket hash, in protocol order. The token
/// name joined the list at the second bridge fork.
const TICKET_HASH_FIELDS: &[&str] = &[
    "dst_address",
    "dst_network",
    "amount",
    "src_hash",
    "src_address",
    "src_network",
    "origin_hash",
    "origin_network",
    "nonce",
    "ticker",
    "origin_decimals",
];

/// Name of the ticket identifier field, which also changed at that fork.
fn ticket_id_field(spec: &Spec) -> &'static str {
    if spec.version.ticket_includes_token_name() {
        "ticket_hash"
    } else {
        "transfer_id"
    }
}

/// Per-field digest fold: each field is rendered, lowercased and hashed,
/// the digests are concatenated and hashed again.
pub fn compute_ticket_hash(params: &ParameterMap, spec: &Spec) -> ContractResult<H256> {
    let mut joined = String::with_capacity(64 * (TICKET_HASH_FIELDS.len() + 1));
    let with_name = spec.version.ticket_includes_token_name();
    let fields = TICKET_HASH_FIELDS
        .iter()
        .copied()
        .chain(with_name.then_some("name"));
    for field in fields {
        let rendered = params
            .get(field)
            .and_then(|v| v.render())
            .ok_or_else(|| crate::validate::ValidationError::MissingField(field.to_string()))?;
        joined.push_str(&sha256_str(&rendered.to_lowercase()));
    }
    Ok(sha256(joined.as_bytes()))
}

/// Channel key for an outbound lane: the four coordinates are rendered,
/// sorted lexicographically and hashed, so the key is stable regardless of
/// who derives it.
pub fn lock_channel_key(
    src_address: &Address, src_token: &H256, dst_network: u32, dst_address: &str,
) -> H256 {
    let mut parts = [
        format!("{src_address:x}"),
        format!("{src_token:x}"),
        dst_network.to_string(),
        dst_address.to_lowercase(),
    ];
    parts.sort();
    sha256(parts.concat().as_bytes())
}

/// Channel key for an inbound lane, keyed the same way over the ticket's
/// source coordinates.
pub fn claim_channel_key(
    src_address: &str, dst_address: &str, src_network: u32, src_hash: &str,
) -> H256 {
    let mut parts = [
        src_address.to_lowercase(),
        dst_address.to_lowercase(),
        src_network.to_string(),
        src_hash.to_lowercase(),
    ];
    parts.sort();
    sha256(parts.concat().as_bytes())
}

fn parse_local_address(hex: &str) -> ContractResult<Address> {
    Address::from_str(hex.trim_start_matches("0x"))
        .map_err(|_| ContractError::Payload(format!("bad local address {hex}")))
}

fn parse_local_token(hex: &str) -> ContractResult<H256> {
    H256::from_str(hex.trim_start_matches("0x"))
        .map_err(|_| ContractError::Payload(format!("bad local token hash {hex}")))
}

const LOCK_SCHEMA: Schema = &[
    ("dst_address", ParamKind::HexStr1_66),
    ("dst_network", ParamKind::Int),
    ("amount", ParamKind::BigIntStr),
    ("hash", ParamKind::Hash32),
    ("nonce", ParamKind::Int),
];

/// Outbound transfer: escrows (or burns, for returning wrapped assets) the
/// token on this side and advances the channel nonce the far side will
/// verify against.
#[derive(Clone, Debug)]
pub struct Lock {
    pub dst_address: String,
    pub dst_network: u32,
    pub amount: U256,
    pub token_hash: H256,
    pub nonce: u64,
}

impl Lock {
    pub fn from_params(params: &ParameterMap) -> ContractResult<Self> {
        let params = payload::decompress_params(params)?;
        validate::validate(&params, LOCK_SCHEMA)?;
        Ok(Lock {
            dst_address: validate::expect_hex(&params, "dst_address")?,
            dst_network: validate::expect_u32(&params, "dst_network")?,
            amount: validate::expect_amount_str(&params, "amount")?,
            token_hash: validate::expect_hash32(&params, "hash")?,
            nonce: validate::expect_u64(&params, "nonce")?,
        })
    }

    pub fn execute(&self, ctx: &mut ExecutionContext) -> ContractResult<ExecutionReceipt> {
        let settings = ctx.state.bridge_settings()?;
        let network = settings
            .network(self.dst_network)
            .ok_or(ContractError::UnknownNetwork(self.dst_network))?;

        let sender = ctx.sender;
        let channel =
            lock_channel_key(&sender, &self.token_hash, self.dst_network, &self.dst_address);
        let current = ctx.state.channel_nonce(&channel)?;
        if self.nonce != current + 1 {
            return Err(ContractError::NonceMismatch { expected: current + 1, got: self.nonce });
        }
        ctx.state.bump_channel(&channel)?;

        let info = ctx
            .state
            .token(&self.token_hash)?
            .ok_or(ContractError::TokenNotFound(self.token_hash))?;
        let wrapped = ctx.state.minted_token_by_wrapped(&self.token_hash)?;

        // A wrapped asset travelling home is rescaled to its origin
        // precision, anything else to the destination network's.
        let dst_decimals = match &wrapped {
            Some(record) if record.origin_network == self.dst_network => record.origin_decimals,
            _ => network.decimals,
        };
        if dst_decimals < info.decimals {
            let dropped = info.decimals - dst_decimals;
            let scale = U256::from(10u64).pow(U256::from(dropped));
            if !(self.amount % scale).is_zero() {
                return Err(ContractError::PrecisionLoss(dst_decimals));
            }
        }

        token::move_tokens(ctx, &sender, &BRIDGE_CUSTODY, &self.token_hash, self.amount)?;
        if wrapped.is_some() {
            // Returning wrapped units are destroyed, mirroring the mint
            // performed when they first arrived.
            let burn = token::Burn { token_hash: self.token_hash, amount: self.amount };
            burn.execute(&mut ctx.with_sender(*BRIDGE_CUSTODY))?;
        }
        Ok(ExecutionReceipt { amount_in: self.amount, ..Default::default() })
    }
}

/// Registers an inbound transfer as a pending ticket after re-deriving and
/// checking its hash and its lane nonce.
#[derive(Clone, Debug)]
pub struct ClaimInit {
    pub ticket: BridgeTicket,
}

impl ClaimInit {
    pub fn from_params(params: &ParameterMap, spec: &Spec) -> ContractResult<Self> {
        let params = payload::decompress_params(params)?;
        let id_field = ticket_id_field(spec);
        let mut schema = vec![
            ("dst_address", ParamKind::Hash33),
            ("dst_network", ParamKind::Int),
            ("amount", ParamKind::BigIntStr),
            ("src_hash", ParamKind::HexStr1_64),
            ("src_address", ParamKind::HexStr1_66),
            ("src_network", ParamKind::Int),
            ("origin_hash", ParamKind::HexStr1_64),
            ("origin_network", ParamKind::Int),
            ("nonce", ParamKind::Int),
            (id_field, ParamKind::Hash32),
            ("ticker", ParamKind::Str),
            ("origin_decimals", ParamKind::Byte),
        ];
        if spec.version.ticket_includes_token_name() {
            schema.push(("name", ParamKind::Str40));
        }
        validate::validate(&params, &schema)?;

        let dst_network = validate::expect_u32(&params, "dst_network")?;
        if dst_network != LOCAL_NETWORK_ID {
            return Err(ContractError::WrongNetwork(dst_network, LOCAL_NETWORK_ID));
        }
        let supplied = validate::expect_hash32(&params, id_field)?;
        let computed = compute_ticket_hash(&params, spec)?;
        if computed != supplied {
            return Err(ContractError::TicketHashMismatch { computed, supplied });
        }

        let name = if spec.version.ticket_includes_token_name() {
            validate::expect_str(&params, "name")?.to_string()
        } else {
            String::new()
        };
        Ok(ClaimInit {
            ticket: BridgeTicket {
                ticket_hash: supplied,
                dst_address: validate::expect_hex(&params, "dst_address")?,
                dst_network,
                amount: validate::expect_amount_str(&params, "amount")?,
                src_hash: validate::expect_hex(&params, "src_hash")?,
                src_address: validate::expect_hex(&params, "src_address")?,
                src_network: validate::expect_u32(&params, "src_network")?,
                origin_network: validate::expect_u32(&params, "origin_network")?,
                origin_hash: validate::expect_hex(&params, "origin_hash")?,
                origin_decimals: validate::expect_byte(&params, "origin_decimals")?,
                nonce: validate::expect_u64(&params, "nonce")?,
                ticker: validate::expect_str(&params, "ticker")?.to_string(),
                name,
                claimed: false,
            },
        })
    }

    pub fn execute(&self, ctx: &mut ExecutionContext) -> ContractResult<ExecutionReceipt> {
        let ticket = &self.ticket;
        let channel = claim_channel_key(
            &ticket.src_address,
            &ticket.dst_address,
            ticket.src_network,
            &ticket.src_hash,
        );
        let current = ctx.state.channel_nonce(&channel)?;
        if ticket.nonce != current + 1 {
            return Err(ContractError::NonceMismatch { expected: current + 1, got: ticket.nonce });
        }
        if ctx.state.ticket(&ticket.ticket_hash)?.is_some() {
            return Err(ContractError::AlreadyExists(format!(
                "ticket {:x}",
                ticket.ticket_hash
            )));
        }
        ctx.state.bump_channel(&channel)?;
        ctx.state.insert_ticket(ticket.clone())?;
        Ok(ExecutionReceipt::default())
    }
}

/// One validator's vote for a pending ticket. The vote that reaches the
/// confirmation threshold settles the ticket in the same execution.
#[derive(Clone, Debug)]
pub struct ClaimConfirm {
    pub validator: Address,
    pub signature: String,
    pub ticket_hash: H256,
}

impl ClaimConfirm {
    pub fn from_params(params: &ParameterMap, spec: &Spec) -> ContractResult<Self> {
        let params = payload::decompress_params(params)?;
        let id_field = ticket_id_field(spec);
        let schema = [
            ("validator_id", ParamKind::Hash33),
            ("validator_sign", ParamKind::HexStr1_150),
            (id_field, ParamKind::Hash32),
        ];
        validate::validate(&params, &schema)?;
        Ok(ClaimConfirm {
            validator: validate::expect_address(&params, "validator_id")?,
            signature: validate::expect_hex(&params, "validator_sign")?,
            ticket_hash: validate::expect_hash32(&params, id_field)?,
        })
    }

    pub fn execute(&self, ctx: &mut ExecutionContext) -> ContractResult<ExecutionReceipt> {
        let settings = ctx.state.bridge_settings()?;
        if !settings.is_validator(&self.validator) {
            return Err(ContractError::UnknownValidator(format!("{:x}", self.validator)));
        }
        if !ctx.crypto.verify(&self.ticket_hash, &self.signature, &self.validator) {
            return Err(ContractError::BadSignature(self.ticket_hash));
        }
        // Repeat votes are accepted and ignored, so retried confirmation
        // transactions stay harmless.
        let Some(count) = ctx.state.add_confirmation(&self.ticket_hash, &self.validator)? else {
            return Ok(ExecutionReceipt::default());
        };
        // An owner can lower the threshold below an already-reached count,
        // so settlement triggers at-or-past it; the claimed flag keeps it
        // exactly-once.
        if count >= settings.threshold {
            let claimed = ctx
                .state
                .ticket(&self.ticket_hash)?
                .map_or(false, |ticket| ticket.claimed);
            if !claimed {
                let claim = Claim { ticket_hash: self.ticket_hash };
                return claim.execute(ctx);
            }
        }
        Ok(ExecutionReceipt::default())
    }
}

/// Final settlement: pays the ticket out on this side. Runs nested from the
/// threshold-reaching confirmation, or directly for operator tooling.
#[derive(Clone, Debug)]
pub struct Claim {
    pub ticket_hash: H256,
}

impl Claim {
    pub fn from_params(params: &ParameterMap, spec: &Spec) -> ContractResult<Self> {
        let id_field = ticket_id_field(spec);
        let schema = [(id_field, ParamKind::Hash32)];
        validate::validate(params, &schema)?;
        Ok(Claim { ticket_hash: validate::expect_hash32(params, id_field)? })
    }

    pub fn execute(&self, ctx: &mut ExecutionContext) -> ContractResult<ExecutionReceipt> {
        let ticket = ctx
            .state
            .ticket(&self.ticket_hash)?
            .ok_or(ContractError::TicketNotFound(self.ticket_hash))?;
        if ticket.claimed {
            return Err(ContractError::AlreadyClaimed(self.ticket_hash));
        }
        let beneficiary = parse_local_address(&ticket.dst_address)?;

        let mut token_created = None;
        if ticket.origin_network == LOCAL_NETWORK_ID {
            // A native token coming home: release it from escrow.
            let hash = parse_local_token(&ticket.origin_hash)?;
            token::move_tokens(ctx, &BRIDGE_CUSTODY, &beneficiary, &hash, ticket.amount)?;
        } else {
            let wrapped_hash = match ctx
                .state
                .minted_token(ticket.origin_network, &ticket.origin_hash)?
            {
                Some(record) => record.wrapped_hash,
                None => {
                    let hash = self.register_wrapped_token(ctx, &ticket)?;
                    token_created = Some(hash);
                    hash
                }
            };
            let mint = token::Mint { token_hash: wrapped_hash, amount: ticket.amount };
            mint.execute(&mut ctx.with_sender(*BRIDGE_CUSTODY))?;
            token::move_tokens(ctx, &BRIDGE_CUSTODY, &beneficiary, &wrapped_hash, ticket.amount)?;
        }
        ctx.state.mark_ticket_claimed(&self.ticket_hash)?;
        Ok(ExecutionReceipt {
            amount_out: ticket.amount,
            token_created,
            ticket_settled: Some(self.ticket_hash),
            ..Default::default()
        })
    }

    /// First arrival of a foreign asset: registers an empty wrapped token
    /// under custody ownership and records the origin mapping before any
    /// unit is minted.
    fn register_wrapped_token(
        &self, ctx: &mut ExecutionContext, ticket: &BridgeTicket,
    ) -> ContractResult<H256> {
        let hash = ctx.tx.hash;
        if ctx.state.token(&hash)?.is_some() {
            return Err(ContractError::AlreadyExists(format!("token {hash:x}")));
        }
        ctx.state.register_token(TokenInfo {
            hash,
            owner: *BRIDGE_CUSTODY,
            name: ticket.name.clone(),
            ticker: ticket.ticker.to_uppercase(),
            decimals: ticket.origin_decimals.min(MAX_WRAPPED_DECIMALS),
            total_supply: U256::zero(),
            max_supply: U256::MAX,
            reissuable: true,
        })?;
        ctx.state.insert_minted_token(crate::state::MintedTokenRecord {
            origin_network: ticket.origin_network,
            origin_hash: ticket.origin_hash.clone(),
            origin_decimals: ticket.origin_decimals,
            wrapped_hash: hash,
        })?;
        Ok(hash)
    }
}
