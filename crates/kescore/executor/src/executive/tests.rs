// Copyright 2023 Kestrel Foundation. All rights reserved.
// Kestrel is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use super::*;
use crate::{
    contracts::bridge::compute_ticket_hash,
    crypto::mock::{sign, MockCrypto},
    spec::CommonParams,
    state::{KnownNetwork, MemorySubstate, TokenInfo},
    validate::ValidationError,
};
use kes_parameters::{
    chain::NATIVE_TICKER,
    dex::REFERENCE_TOKEN_HASH,
    forks, prices,
    well_known_addresses::{BRIDGE_CUSTODY, BURN, CONTRACT_PROCESSING, TREASURY},
};
use kes_types::{Address, H256, U256};
use serde_json::json;
use std::sync::Arc;
use tlv_abi::{ContractEnvelope, ParameterMap, ParameterValue, TlvTag};

fn machine() -> Machine {
    Machine::new(CommonParams::default(), Arc::new(MockCrypto))
}

fn addr(b: u8) -> Address {
    Address::from([b; 33])
}

fn h(b: u8) -> H256 {
    H256::from([b; 32])
}

fn block(height: u64) -> BlockInfo {
    BlockInfo { height, hash: h(0xbb) }
}

fn envelope(operation: TlvTag, entries: Vec<(&str, ParameterValue)>) -> ContractEnvelope {
    ContractEnvelope {
        operation,
        parameters: entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
    }
}

fn contract_tx(hash_byte: u8, from: Address, fee: u64, env: &ContractEnvelope) -> Transaction {
    Transaction {
        hash: h(hash_byte),
        from,
        to: *CONTRACT_PROCESSING,
        amount: U256::from(fee),
        ticker: NATIVE_TICKER.to_string(),
        data: tlv_abi::encode_envelope(env).unwrap(),
    }
}

fn compressed_envelope(operation: TlvTag, payload: &serde_json::Value) -> ContractEnvelope {
    envelope(
        operation,
        vec![(
            "compressed_data",
            ParameterValue::Str(crate::contracts::payload::compress_params(payload)),
        )],
    )
}

fn seed_token(
    state: &mut MemorySubstate, hash: H256, owner: Address, supply: u64, decimals: u8,
) {
    state
        .register_token(TokenInfo {
            hash,
            owner,
            name: format!("Token {:x}", hash),
            ticker: "TOK".to_string(),
            decimals,
            total_supply: U256::from(supply),
            max_supply: U256::from(supply) * U256::from(4u64),
            reissuable: true,
        })
        .unwrap();
    state.add_balance(&owner, &hash, U256::from(supply)).unwrap();
}

fn finish(outcome: ExecutionOutcome) -> ExecutionReceipt {
    match outcome {
        ExecutionOutcome::Finished(receipt) => receipt,
        other => panic!("expected Finished, got {other:?}"),
    }
}

fn rejection(outcome: ExecutionOutcome) -> ContractError {
    match outcome {
        ExecutionOutcome::Rejected(reason) => reason,
        other => panic!("expected Rejected, got {other:?}"),
    }
}

#[test]
fn plain_data_is_not_a_contract() {
    let machine = machine();
    let mut state = MemorySubstate::new();
    let tx = Transaction {
        hash: h(1),
        from: addr(1),
        to: addr(2),
        amount: U256::from(5u64),
        ticker: NATIVE_TICKER.to_string(),
        data: b"just a memo".to_vec(),
    };
    let outcome = execute_transaction(&machine, &tx, &block(forks::BRIDGE_V2_HEIGHT), &mut state);
    assert!(matches!(outcome, ExecutionOutcome::NotAContract));
}

#[test]
fn operations_from_a_later_fork_are_plain_data() {
    let machine = machine();
    let mut state = MemorySubstate::new();
    let env = envelope(
        TlvTag::PoolSellExact,
        vec![
            ("asset_in", ParameterValue::Hash(h(1).as_bytes().to_vec())),
            ("asset_out", ParameterValue::Hash(h(2).as_bytes().to_vec())),
            ("amount_in", ParameterValue::BigInt(U256::from(10u64))),
            ("amount_out_min", ParameterValue::BigInt(U256::zero())),
        ],
    );
    let tx = contract_tx(1, addr(1), prices::POOL_OP, &env);
    let outcome = execute_transaction(&machine, &tx, &block(0), &mut state);
    assert!(matches!(outcome, ExecutionOutcome::NotAContract));
    // Same payload after the fork is a real contract (and fails on merit).
    let outcome = execute_transaction(&machine, &tx, &block(forks::DEX_HEIGHT), &mut state);
    assert!(matches!(rejection(outcome), ContractError::PoolNotFound(_)));
}

fn create_token_envelope() -> ContractEnvelope {
    envelope(
        TlvTag::CreateToken,
        vec![
            ("name", ParameterValue::Str("Kestrel Gold".to_string())),
            ("ticker", ParameterValue::Str("KGLD".to_string())),
            ("decimals", ParameterValue::Int(8)),
            ("total_supply", ParameterValue::BigInt(U256::from(1_000u64))),
            ("max_supply", ParameterValue::BigInt(U256::from(2_000u64))),
            ("reissuable", ParameterValue::Int(1)),
        ],
    )
}

#[test]
fn machine_gates_fee_recipient_and_currency() {
    let machine = machine();
    let mut state = MemorySubstate::new();
    let env = create_token_envelope();
    let height = block(forks::BRIDGE_V2_HEIGHT);

    let mut tx = contract_tx(1, addr(1), prices::CREATE_TOKEN, &env);
    tx.to = addr(9);
    assert!(matches!(
        rejection(execute_transaction(&machine, &tx, &height, &mut state)),
        ContractError::WrongRecipient
    ));

    let mut tx = contract_tx(1, addr(1), prices::CREATE_TOKEN, &env);
    tx.ticker = "KGLD".to_string();
    assert!(matches!(
        rejection(execute_transaction(&machine, &tx, &height, &mut state)),
        ContractError::WrongCurrency(_)
    ));

    let tx = contract_tx(1, addr(1), prices::CREATE_TOKEN - 1, &env);
    assert!(matches!(
        rejection(execute_transaction(&machine, &tx, &height, &mut state)),
        ContractError::NotEnoughFee { .. }
    ));
}

#[test]
fn create_token_end_to_end() {
    let machine = machine();
    let mut state = MemorySubstate::new();
    let alice = addr(1);
    let tx = contract_tx(7, alice, prices::CREATE_TOKEN, &create_token_envelope());
    let receipt =
        finish(execute_transaction(&machine, &tx, &block(forks::BRIDGE_V2_HEIGHT), &mut state));
    assert_eq!(receipt.token_created, Some(tx.hash));

    let info = state.token(&tx.hash).unwrap().unwrap();
    assert_eq!(info.ticker, "KGLD");
    assert_eq!(info.owner, alice);
    assert_eq!(info.total_supply, U256::from(1_000u64));
    assert_eq!(state.balance(&alice, &tx.hash).unwrap(), U256::from(1_000u64));
}

#[test]
fn transfer_moves_or_fails_without_trace() {
    let machine = machine();
    let mut state = MemorySubstate::new();
    let (alice, bob, token) = (addr(1), addr(2), h(0x0a));
    seed_token(&mut state, token, alice, 1_000, 8);

    let env = envelope(
        TlvTag::Transfer,
        vec![
            ("to", ParameterValue::Hash(bob.as_bytes().to_vec())),
            ("token_hash", ParameterValue::Hash(token.as_bytes().to_vec())),
            ("amount", ParameterValue::BigInt(U256::from(400u64))),
        ],
    );
    let tx = contract_tx(3, alice, prices::TOKEN_OP, &env);
    finish(execute_transaction(&machine, &tx, &block(0), &mut state));
    assert_eq!(state.balance(&alice, &token).unwrap(), U256::from(600u64));
    assert_eq!(state.balance(&bob, &token).unwrap(), U256::from(400u64));

    // Overdraw rejects and leaves both balances exactly as they were.
    let env = envelope(
        TlvTag::Transfer,
        vec![
            ("to", ParameterValue::Hash(bob.as_bytes().to_vec())),
            ("token_hash", ParameterValue::Hash(token.as_bytes().to_vec())),
            ("amount", ParameterValue::BigInt(U256::from(601u64))),
        ],
    );
    let tx = contract_tx(4, alice, prices::TOKEN_OP, &env);
    let reason = rejection(execute_transaction(&machine, &tx, &block(0), &mut state));
    assert!(matches!(reason, ContractError::InsufficientBalance { .. }));
    assert_eq!(state.balance(&alice, &token).unwrap(), U256::from(600u64));
    assert_eq!(state.balance(&bob, &token).unwrap(), U256::from(400u64));
}

#[test]
fn mint_enforces_owner_and_supply_cap() {
    let machine = machine();
    let mut state = MemorySubstate::new();
    let (alice, mallory, token) = (addr(1), addr(3), h(0x0a));
    seed_token(&mut state, token, alice, 1_000, 8);

    let mint_env = |amount: u64| {
        envelope(
            TlvTag::Mint,
            vec![
                ("token_hash", ParameterValue::Hash(token.as_bytes().to_vec())),
                ("amount", ParameterValue::BigInt(U256::from(amount))),
            ],
        )
    };
    let tx = contract_tx(5, mallory, prices::TOKEN_OP, &mint_env(1));
    assert!(matches!(
        rejection(execute_transaction(&machine, &tx, &block(0), &mut state)),
        ContractError::Unauthorized
    ));

    // max_supply is seeded as 4x the initial supply.
    let tx = contract_tx(6, alice, prices::TOKEN_OP, &mint_env(3_001));
    assert!(matches!(
        rejection(execute_transaction(&machine, &tx, &block(0), &mut state)),
        ContractError::SupplyOverflow
    ));

    let tx = contract_tx(7, alice, prices::TOKEN_OP, &mint_env(500));
    finish(execute_transaction(&machine, &tx, &block(0), &mut state));
    assert_eq!(state.token(&token).unwrap().unwrap().total_supply, U256::from(1_500u64));
}

fn hash_param(hash: &H256) -> ParameterValue {
    ParameterValue::Hash(hash.as_bytes().to_vec())
}

/// Seeds two tokens and a 1_000_000 / 1_000_000 pool at 30 bps, owned by
/// alice. Returns (token_a, token_b, lp_token_hash).
fn seed_pool(machine: &Machine, state: &mut MemorySubstate, alice: Address) -> (H256, H256, H256) {
    let (token_a, token_b) = (h(0x0a), h(0x0b));
    seed_token(state, token_a, alice, 100_000_000, 8);
    seed_token(state, token_b, alice, 100_000_000, 8);
    let env = envelope(
        TlvTag::PoolCreate,
        vec![
            ("asset_1", hash_param(&token_a)),
            ("asset_2", hash_param(&token_b)),
            ("amount_1", ParameterValue::BigInt(U256::from(1_000_000u64))),
            ("amount_2", ParameterValue::BigInt(U256::from(1_000_000u64))),
            ("pool_fee", ParameterValue::Int(30)),
        ],
    );
    let tx = contract_tx(0x20, alice, prices::POOL_CREATE, &env);
    let receipt = finish(execute_transaction(machine, &tx, &block(forks::DEX_HEIGHT), state));
    assert_eq!(receipt.amount_out, U256::from(1_000_000u64));
    (token_a, token_b, tx.hash)
}

#[test]
fn pool_create_and_swap_round_trip() {
    let machine = machine();
    let mut state = MemorySubstate::new();
    let alice = addr(1);
    let (token_a, token_b, lp) = seed_pool(&machine, &mut state, alice);
    assert_eq!(state.balance(&alice, &lp).unwrap(), U256::from(1_000_000u64));

    // The reference scenario: 1000 in at 30 bps on a balanced pool.
    let env = envelope(
        TlvTag::PoolSellExact,
        vec![
            ("asset_in", hash_param(&token_a)),
            ("asset_out", hash_param(&token_b)),
            ("amount_in", ParameterValue::BigInt(U256::from(1_000u64))),
            ("amount_out_min", ParameterValue::BigInt(U256::from(996u64))),
        ],
    );
    let tx = contract_tx(0x21, alice, prices::POOL_OP, &env);
    let receipt = finish(execute_transaction(&machine, &tx, &block(forks::DEX_HEIGHT), &mut state));
    assert_eq!(receipt.amount_out, U256::from(996u64));

    let (pair, _, _) = crate::contracts::pool::pair_id(&token_a, &token_b);
    let pool = state.pool(&pair).unwrap().unwrap();
    assert_eq!(pool.volume_1, U256::from(1_001_000u64));
    assert_eq!(pool.volume_2, U256::from(999_004u64));
    // k never shrinks across a swap.
    assert!(
        U256::full_mul(pool.volume_1, pool.volume_2)
            >= U256::full_mul(U256::from(1_000_000u64), U256::from(1_000_000u64))
    );

    // Tighter bound than the computed output: rejected, nothing moves.
    let env = envelope(
        TlvTag::PoolSellExact,
        vec![
            ("asset_in", hash_param(&token_a)),
            ("asset_out", hash_param(&token_b)),
            ("amount_in", ParameterValue::BigInt(U256::from(1_000u64))),
            ("amount_out_min", ParameterValue::BigInt(U256::from(10_000u64))),
        ],
    );
    let tx = contract_tx(0x22, alice, prices::POOL_OP, &env);
    let before_a = state.balance(&alice, &token_a).unwrap();
    assert!(matches!(
        rejection(execute_transaction(&machine, &tx, &block(forks::DEX_HEIGHT), &mut state)),
        ContractError::SlippageExceeded
    ));
    assert_eq!(state.balance(&alice, &token_a).unwrap(), before_a);

    // Buy-exact asks for a concrete output and bounds the input.
    let env = envelope(
        TlvTag::PoolBuyExact,
        vec![
            ("asset_in", hash_param(&token_b)),
            ("asset_out", hash_param(&token_a)),
            ("amount_out", ParameterValue::BigInt(U256::from(1_000u64))),
            ("amount_in_max", ParameterValue::BigInt(U256::from(1_100u64))),
        ],
    );
    let tx = contract_tx(0x23, alice, prices::POOL_OP, &env);
    let receipt = finish(execute_transaction(&machine, &tx, &block(forks::DEX_HEIGHT), &mut state));
    assert_eq!(receipt.amount_out, U256::from(1_000u64));
    assert!(receipt.amount_in <= U256::from(1_100u64));
}

#[test]
fn liquidity_add_and_remove_preserve_pro_rata_shares() {
    let machine = machine();
    let mut state = MemorySubstate::new();
    let alice = addr(1);
    let (token_a, token_b, lp) = seed_pool(&machine, &mut state, alice);

    let env = envelope(
        TlvTag::PoolAddLiquidity,
        vec![
            ("asset_1", hash_param(&token_a)),
            ("asset_2", hash_param(&token_b)),
            ("amount_1", ParameterValue::BigInt(U256::from(500_000u64))),
            ("amount_2", ParameterValue::BigInt(U256::from(600_000u64))),
        ],
    );
    let tx = contract_tx(0x30, alice, prices::POOL_OP, &env);
    let receipt = finish(execute_transaction(&machine, &tx, &block(forks::DEX_HEIGHT), &mut state));
    // Balanced pool: the 500k leg binds, the 600k offer is used at 500k.
    assert_eq!(receipt.amount_out, U256::from(500_000u64));
    assert_eq!(state.balance(&alice, &lp).unwrap(), U256::from(1_500_000u64));
    assert_eq!(
        state.token(&lp).unwrap().unwrap().total_supply,
        U256::from(1_500_000u64)
    );

    let env = envelope(
        TlvTag::PoolRemoveLiquidity,
        vec![
            ("asset_1", hash_param(&token_a)),
            ("asset_2", hash_param(&token_b)),
            ("amount", ParameterValue::BigInt(U256::from(750_000u64))),
        ],
    );
    let tx = contract_tx(0x31, alice, prices::POOL_OP, &env);
    let receipt = finish(execute_transaction(&machine, &tx, &block(forks::DEX_HEIGHT), &mut state));
    assert_eq!(receipt.amount_in, U256::from(750_000u64));
    // Half the shares redeem exactly half of both reserves.
    let (pair, _, _) = crate::contracts::pool::pair_id(&token_a, &token_b);
    let pool = state.pool(&pair).unwrap().unwrap();
    assert_eq!(pool.volume_1, U256::from(750_000u64));
    assert_eq!(pool.volume_2, U256::from(750_000u64));
    assert_eq!(state.token(&lp).unwrap().unwrap().total_supply, U256::from(750_000u64));
}

#[test]
fn swap_fee_growth_is_burned_without_a_routing_pool() {
    let machine = machine();
    let mut state = MemorySubstate::new();
    let alice = addr(1);
    let (token_a, token_b, lp) = seed_pool(&machine, &mut state, alice);

    // A large trade grows k well past the creation baseline.
    let env = envelope(
        TlvTag::PoolSellExact,
        vec![
            ("asset_in", hash_param(&token_a)),
            ("asset_out", hash_param(&token_b)),
            ("amount_in", ParameterValue::BigInt(U256::from(500_000u64))),
            ("amount_out_min", ParameterValue::BigInt(U256::zero())),
        ],
    );
    let tx = contract_tx(0x25, alice, prices::POOL_OP, &env);
    let receipt = finish(execute_transaction(&machine, &tx, &block(forks::DEX_HEIGHT), &mut state));
    assert_eq!(receipt.amount_out, U256::from(332_665u64));
    assert_eq!(receipt.protocol_fee_minted, U256::from(83u64));
    // The LP token trades against nothing, so the share is burned.
    assert_eq!(state.balance(&BURN, &lp).unwrap(), U256::from(83u64));
    assert_eq!(state.balance(&TREASURY, &lp).unwrap(), U256::zero());
    assert_eq!(
        state.token(&lp).unwrap().unwrap().total_supply,
        U256::from(1_000_083u64)
    );

    // The baseline advances with the trade, so a following liquidity event
    // does not mint the same growth again.
    let (pair, _, _) = crate::contracts::pool::pair_id(&token_a, &token_b);
    let pool = state.pool(&pair).unwrap().unwrap();
    assert_eq!(pool.root_k_last, U256::from(1_000_501u64));
}

#[test]
fn swap_fee_growth_routes_to_the_treasury_when_the_lp_token_trades() {
    let machine = machine();
    let mut state = MemorySubstate::new();
    let alice = addr(1);
    let (token_a, token_b, lp) = seed_pool(&machine, &mut state, alice);

    // Open a routing pool between the LP token and the reference token.
    seed_token(&mut state, *REFERENCE_TOKEN_HASH, alice, 1_000_000, 8);
    let env = envelope(
        TlvTag::PoolCreate,
        vec![
            ("asset_1", hash_param(&lp)),
            ("asset_2", hash_param(&REFERENCE_TOKEN_HASH)),
            ("amount_1", ParameterValue::BigInt(U256::from(10_000u64))),
            ("amount_2", ParameterValue::BigInt(U256::from(10_000u64))),
            ("pool_fee", ParameterValue::Int(30)),
        ],
    );
    let tx = contract_tx(0x26, alice, prices::POOL_CREATE, &env);
    finish(execute_transaction(&machine, &tx, &block(forks::DEX_HEIGHT), &mut state));

    let env = envelope(
        TlvTag::PoolSellExact,
        vec![
            ("asset_in", hash_param(&token_a)),
            ("asset_out", hash_param(&token_b)),
            ("amount_in", ParameterValue::BigInt(U256::from(500_000u64))),
            ("amount_out_min", ParameterValue::BigInt(U256::zero())),
        ],
    );
    let tx = contract_tx(0x27, alice, prices::POOL_OP, &env);
    let receipt = finish(execute_transaction(&machine, &tx, &block(forks::DEX_HEIGHT), &mut state));
    assert_eq!(receipt.protocol_fee_minted, U256::from(83u64));
    assert_eq!(state.balance(&TREASURY, &lp).unwrap(), U256::from(83u64));
    assert_eq!(state.balance(&BURN, &lp).unwrap(), U256::zero());
}

fn seed_bridge(state: &mut MemorySubstate, owner: Address, validators: &[Address], threshold: u32) {
    state.set_bridge_owner(owner).unwrap();
    state.set_bridge_threshold(threshold).unwrap();
    for v in validators {
        state.add_validator(*v).unwrap();
    }
    state.add_network(KnownNetwork { id: 3, decimals: 8 }).unwrap();
    state.add_network(KnownNetwork { id: 5, decimals: 8 }).unwrap();
}

#[test]
fn lock_sequences_the_channel_and_escrows() {
    let machine = machine();
    let mut state = MemorySubstate::new();
    let alice = addr(1);
    seed_bridge(&mut state, addr(0x40), &[], 1);
    let token = h(0x0a);
    seed_token(&mut state, token, alice, 1_000_000, 8);

    let lock_payload = |amount: &str, nonce: u64| {
        json!({
            "dst_address": "0xfeedface",
            "dst_network": 3,
            "amount": amount,
            "hash": format!("{token:x}"),
            "nonce": nonce,
        })
    };
    let height = block(forks::BRIDGE_V2_HEIGHT);

    let env = compressed_envelope(TlvTag::TokenSendOverBridge, &lock_payload("250000", 1));
    let tx = contract_tx(0x50, alice, prices::BRIDGE_OP, &env);
    finish(execute_transaction(&machine, &tx, &height, &mut state));
    assert_eq!(state.balance(&BRIDGE_CUSTODY, &token).unwrap(), U256::from(250_000u64));
    assert_eq!(state.balance(&alice, &token).unwrap(), U256::from(750_000u64));

    // Replaying nonce 1 is rejected; nonce 2 continues the lane.
    let env = compressed_envelope(TlvTag::TokenSendOverBridge, &lock_payload("1", 1));
    let tx = contract_tx(0x51, alice, prices::BRIDGE_OP, &env);
    assert!(matches!(
        rejection(execute_transaction(&machine, &tx, &height, &mut state)),
        ContractError::NonceMismatch { expected: 2, got: 1 }
    ));

    let env = compressed_envelope(TlvTag::TokenSendOverBridge, &lock_payload("1", 2));
    let tx = contract_tx(0x52, alice, prices::BRIDGE_OP, &env);
    finish(execute_transaction(&machine, &tx, &height, &mut state));

    // Unknown destination networks never open a lane.
    let env = compressed_envelope(
        TlvTag::TokenSendOverBridge,
        &json!({
            "dst_address": "0xfeedface",
            "dst_network": 77,
            "amount": "1",
            "hash": format!("{token:x}"),
            "nonce": 1,
        }),
    );
    let tx = contract_tx(0x53, alice, prices::BRIDGE_OP, &env);
    assert!(matches!(
        rejection(execute_transaction(&machine, &tx, &height, &mut state)),
        ContractError::UnknownNetwork(77)
    ));
}

#[test]
fn lock_rejects_amounts_that_lose_precision() {
    let machine = machine();
    let mut state = MemorySubstate::new();
    let alice = addr(1);
    seed_bridge(&mut state, addr(0x40), &[], 1);
    // Token is finer-grained (10 decimals) than destination network 3 (8).
    let token = h(0x0a);
    seed_token(&mut state, token, alice, 1_000_000, 10);

    let env = compressed_envelope(
        TlvTag::TokenSendOverBridge,
        &json!({
            "dst_address": "0xfeedface",
            "dst_network": 3,
            "amount": "12345",
            "hash": format!("{token:x}"),
            "nonce": 1,
        }),
    );
    let tx = contract_tx(0x54, alice, prices::BRIDGE_OP, &env);
    assert!(matches!(
        rejection(execute_transaction(&machine, &tx, &block(forks::BRIDGE_V2_HEIGHT), &mut state)),
        ContractError::PrecisionLoss(8)
    ));

    // A multiple of 100 survives the rescale.
    let env = compressed_envelope(
        TlvTag::TokenSendOverBridge,
        &json!({
            "dst_address": "0xfeedface",
            "dst_network": 3,
            "amount": "12300",
            "hash": format!("{token:x}"),
            "nonce": 1,
        }),
    );
    let tx = contract_tx(0x55, alice, prices::BRIDGE_OP, &env);
    finish(execute_transaction(&machine, &tx, &block(forks::BRIDGE_V2_HEIGHT), &mut state));
}

#[test]
fn network_ids_wider_than_32_bits_are_rejected() {
    let machine = machine();
    let mut state = MemorySubstate::new();
    let alice = addr(1);
    seed_bridge(&mut state, addr(0x40), &[], 1);
    let token = h(0x0a);
    seed_token(&mut state, token, alice, 1_000, 8);

    // 2^32 + 3 must not alias network 3.
    let env = compressed_envelope(
        TlvTag::TokenSendOverBridge,
        &json!({
            "dst_address": "0xfeedface",
            "dst_network": 4_294_967_299u64,
            "amount": "100",
            "hash": format!("{token:x}"),
            "nonce": 1,
        }),
    );
    let tx = contract_tx(0xc0, alice, prices::BRIDGE_OP, &env);
    let height = block(forks::BRIDGE_V2_HEIGHT);
    assert!(matches!(
        rejection(execute_transaction(&machine, &tx, &height, &mut state)),
        ContractError::Validation(ValidationError::BadFormat { .. })
    ));
    assert_eq!(state.balance(&alice, &token).unwrap(), U256::from(1_000u64));
}

/// Builds a v2 inbound ticket payload for `amount` units of a foreign
/// asset, wired to `beneficiary`, and returns (payload, ticket_hash).
fn inbound_ticket(
    machine: &Machine, beneficiary: Address, amount: &str, nonce: u64,
) -> (serde_json::Value, H256) {
    let spec = machine.spec(forks::BRIDGE_V2_HEIGHT);
    let mut params = ParameterMap::new();
    params.insert("dst_address", ParameterValue::Str(format!("{beneficiary:x}")));
    params.insert("dst_network", ParameterValue::Int(1));
    params.insert("amount", ParameterValue::Str(amount.to_string()));
    params.insert("src_hash", ParameterValue::Str("aa11".to_string()));
    params.insert("src_address", ParameterValue::Str("0xbbcc".to_string()));
    params.insert("src_network", ParameterValue::Int(5));
    params.insert("origin_hash", ParameterValue::Str("dd22".to_string()));
    params.insert("origin_network", ParameterValue::Int(5));
    params.insert("nonce", ParameterValue::Int(nonce as i64));
    params.insert("ticker", ParameterValue::Str("wfor".to_string()));
    params.insert("origin_decimals", ParameterValue::Int(8));
    params.insert("name", ParameterValue::Str("Wrapped Foreign".to_string()));
    let ticket_hash = compute_ticket_hash(&params, &spec).unwrap();
    let payload = json!({
        "dst_address": format!("{beneficiary:x}"),
        "dst_network": 1,
        "amount": amount,
        "src_hash": "aa11",
        "src_address": "0xbbcc",
        "src_network": 5,
        "origin_hash": "dd22",
        "origin_network": 5,
        "nonce": nonce,
        "ticket_hash": format!("{ticket_hash:x}"),
        "ticker": "wfor",
        "origin_decimals": 8,
        "name": "Wrapped Foreign",
    });
    (payload, ticket_hash)
}

fn confirm_envelope(ticket_hash: &H256, validator: &Address) -> ContractEnvelope {
    compressed_envelope(
        TlvTag::ClaimConfirm,
        &json!({
            "validator_id": format!("{validator:x}"),
            "validator_sign": sign(ticket_hash, validator),
            "ticket_hash": format!("{ticket_hash:x}"),
        }),
    )
}

#[test]
fn claim_lifecycle_mints_a_wrapped_token_exactly_once() {
    let machine = machine();
    let mut state = MemorySubstate::new();
    let bob = addr(2);
    let (v1, v2) = (addr(0x51), addr(0x52));
    seed_bridge(&mut state, addr(0x40), &[v1, v2], 2);
    let height = block(forks::BRIDGE_V2_HEIGHT);

    let (payload, ticket_hash) = inbound_ticket(&machine, bob, "777", 1);
    let env = compressed_envelope(TlvTag::ClaimInit, &payload);
    let tx = contract_tx(0x60, addr(9), prices::BRIDGE_OP, &env);
    finish(execute_transaction(&machine, &tx, &height, &mut state));
    let ticket = state.ticket(&ticket_hash).unwrap().unwrap();
    assert!(!ticket.claimed);

    // Re-registering the same ticket is rejected.
    let tx = contract_tx(0x61, addr(9), prices::BRIDGE_OP, &env);
    assert!(matches!(
        rejection(execute_transaction(&machine, &tx, &height, &mut state)),
        ContractError::NonceMismatch { .. }
    ));

    // First confirmation: counted, nothing settles.
    let tx = contract_tx(0x62, addr(9), prices::BRIDGE_OP, &confirm_envelope(&ticket_hash, &v1));
    let receipt = finish(execute_transaction(&machine, &tx, &height, &mut state));
    assert_eq!(receipt.ticket_settled, None);
    assert!(!state.ticket(&ticket_hash).unwrap().unwrap().claimed);

    // Second confirmation reaches the threshold and settles: a wrapped
    // token appears under custody ownership and the beneficiary is paid.
    let tx = contract_tx(0x63, addr(9), prices::BRIDGE_OP, &confirm_envelope(&ticket_hash, &v2));
    let receipt = finish(execute_transaction(&machine, &tx, &height, &mut state));
    assert_eq!(receipt.ticket_settled, Some(ticket_hash));
    let wrapped = receipt.token_created.expect("first claim creates the wrapped token");
    assert_eq!(wrapped, tx.hash);

    let info = state.token(&wrapped).unwrap().unwrap();
    assert_eq!(info.owner, *BRIDGE_CUSTODY);
    assert_eq!(info.ticker, "WFOR");
    assert_eq!(info.total_supply, U256::from(777u64));
    assert_eq!(state.balance(&bob, &wrapped).unwrap(), U256::from(777u64));
    assert!(state.ticket(&ticket_hash).unwrap().unwrap().claimed);
    let record = state.minted_token(5, "dd22").unwrap().unwrap();
    assert_eq!(record.wrapped_hash, wrapped);

    // A repeat vote is a harmless no-op, not a second settlement.
    let tx = contract_tx(0x64, addr(9), prices::BRIDGE_OP, &confirm_envelope(&ticket_hash, &v2));
    let receipt = finish(execute_transaction(&machine, &tx, &height, &mut state));
    assert_eq!(receipt.ticket_settled, None);
    assert_eq!(state.balance(&bob, &wrapped).unwrap(), U256::from(777u64));

    // A second transfer of the same origin asset reuses the wrapped token.
    let (payload, ticket_hash_2) = inbound_ticket(&machine, bob, "23", 2);
    let env = compressed_envelope(TlvTag::ClaimInit, &payload);
    let tx = contract_tx(0x65, addr(9), prices::BRIDGE_OP, &env);
    finish(execute_transaction(&machine, &tx, &height, &mut state));
    let tx = contract_tx(0x66, addr(9), prices::BRIDGE_OP, &confirm_envelope(&ticket_hash_2, &v1));
    finish(execute_transaction(&machine, &tx, &height, &mut state));
    let tx = contract_tx(0x67, addr(9), prices::BRIDGE_OP, &confirm_envelope(&ticket_hash_2, &v2));
    let receipt = finish(execute_transaction(&machine, &tx, &height, &mut state));
    assert_eq!(receipt.token_created, None);
    assert_eq!(state.balance(&bob, &wrapped).unwrap(), U256::from(800u64));
    assert_eq!(state.token(&wrapped).unwrap().unwrap().total_supply, U256::from(800u64));

    // Sending wrapped units home burns them instead of escrowing.
    let env = compressed_envelope(
        TlvTag::TokenSendOverBridge,
        &json!({
            "dst_address": "0xbbcc",
            "dst_network": 5,
            "amount": "300",
            "hash": format!("{wrapped:x}"),
            "nonce": 1,
        }),
    );
    let tx = contract_tx(0x68, bob, prices::BRIDGE_OP, &env);
    finish(execute_transaction(&machine, &tx, &height, &mut state));
    assert_eq!(state.balance(&bob, &wrapped).unwrap(), U256::from(500u64));
    assert_eq!(state.balance(&BRIDGE_CUSTODY, &wrapped).unwrap(), U256::zero());
    assert_eq!(state.token(&wrapped).unwrap().unwrap().total_supply, U256::from(500u64));
}

#[test]
fn settlement_catches_up_with_a_lowered_threshold() {
    let machine = machine();
    let mut state = MemorySubstate::new();
    let bob = addr(2);
    let owner = addr(0x40);
    let (v1, v2, v3, v4) = (addr(0x51), addr(0x52), addr(0x53), addr(0x54));
    seed_bridge(&mut state, owner, &[v1, v2, v3, v4], 3);
    let height = block(forks::BRIDGE_V2_HEIGHT);

    let (payload, ticket_hash) = inbound_ticket(&machine, bob, "90", 1);
    let env = compressed_envelope(TlvTag::ClaimInit, &payload);
    let tx = contract_tx(0xb0, addr(9), prices::BRIDGE_OP, &env);
    finish(execute_transaction(&machine, &tx, &height, &mut state));

    // Two of three votes: still pending.
    let tx = contract_tx(0xb1, addr(9), prices::BRIDGE_OP, &confirm_envelope(&ticket_hash, &v1));
    finish(execute_transaction(&machine, &tx, &height, &mut state));
    let tx = contract_tx(0xb2, addr(9), prices::BRIDGE_OP, &confirm_envelope(&ticket_hash, &v2));
    let receipt = finish(execute_transaction(&machine, &tx, &height, &mut state));
    assert_eq!(receipt.ticket_settled, None);

    // The owner drops the threshold below the accumulated count; the next
    // vote lands past it and settles.
    let env = envelope(TlvTag::SetThreshold, vec![("threshold", ParameterValue::Int(1))]);
    let tx = contract_tx(0xb3, owner, prices::BRIDGE_ADMIN_OP, &env);
    finish(execute_transaction(&machine, &tx, &height, &mut state));

    let tx = contract_tx(0xb4, addr(9), prices::BRIDGE_OP, &confirm_envelope(&ticket_hash, &v3));
    let receipt = finish(execute_transaction(&machine, &tx, &height, &mut state));
    assert_eq!(receipt.ticket_settled, Some(ticket_hash));
    let wrapped = receipt.token_created.expect("settlement creates the wrapped token");
    assert_eq!(state.balance(&bob, &wrapped).unwrap(), U256::from(90u64));

    // Votes arriving after settlement change nothing.
    let tx = contract_tx(0xb5, addr(9), prices::BRIDGE_OP, &confirm_envelope(&ticket_hash, &v4));
    let receipt = finish(execute_transaction(&machine, &tx, &height, &mut state));
    assert_eq!(receipt.ticket_settled, None);
    assert_eq!(state.balance(&bob, &wrapped).unwrap(), U256::from(90u64));
}

#[test]
fn pre_v2_tickets_use_the_transfer_id_schema() {
    let machine = machine();
    let mut state = MemorySubstate::new();
    let bob = addr(2);
    let v1 = addr(0x51);
    seed_bridge(&mut state, addr(0x40), &[v1], 1);
    // Before the second bridge fork: the id field is "transfer_id" and the
    // token name is not part of the folded fields.
    let height = block(forks::BRIDGE_HEIGHT);
    let spec = machine.spec(forks::BRIDGE_HEIGHT);

    let mut params = ParameterMap::new();
    params.insert("dst_address", ParameterValue::Str(format!("{bob:x}")));
    params.insert("dst_network", ParameterValue::Int(1));
    params.insert("amount", ParameterValue::Str("55".to_string()));
    params.insert("src_hash", ParameterValue::Str("aa11".to_string()));
    params.insert("src_address", ParameterValue::Str("0xbbcc".to_string()));
    params.insert("src_network", ParameterValue::Int(5));
    params.insert("origin_hash", ParameterValue::Str("dd22".to_string()));
    params.insert("origin_network", ParameterValue::Int(5));
    params.insert("nonce", ParameterValue::Int(1));
    params.insert("ticker", ParameterValue::Str("wfor".to_string()));
    params.insert("origin_decimals", ParameterValue::Int(8));
    let ticket_hash = compute_ticket_hash(&params, &spec).unwrap();

    let payload = json!({
        "dst_address": format!("{bob:x}"),
        "dst_network": 1,
        "amount": "55",
        "src_hash": "aa11",
        "src_address": "0xbbcc",
        "src_network": 5,
        "origin_hash": "dd22",
        "origin_network": 5,
        "nonce": 1,
        "transfer_id": format!("{ticket_hash:x}"),
        "ticker": "wfor",
        "origin_decimals": 8,
    });
    let env = compressed_envelope(TlvTag::ClaimInit, &payload);
    let tx = contract_tx(0x75, addr(9), prices::BRIDGE_OP, &env);
    finish(execute_transaction(&machine, &tx, &height, &mut state));

    let env = compressed_envelope(
        TlvTag::ClaimConfirm,
        &json!({
            "validator_id": format!("{v1:x}"),
            "validator_sign": sign(&ticket_hash, &v1),
            "transfer_id": format!("{ticket_hash:x}"),
        }),
    );
    let tx = contract_tx(0x76, addr(9), prices::BRIDGE_OP, &env);
    let receipt = finish(execute_transaction(&machine, &tx, &height, &mut state));
    assert_eq!(receipt.ticket_settled, Some(ticket_hash));
    assert_eq!(state.balance(&bob, &tx.hash).unwrap(), U256::from(55u64));
}

#[test]
fn claim_confirm_rejects_outsiders_and_bad_signatures() {
    let machine = machine();
    let mut state = MemorySubstate::new();
    let (v1, outsider) = (addr(0x51), addr(0x53));
    seed_bridge(&mut state, addr(0x40), &[v1], 1);
    let height = block(forks::BRIDGE_V2_HEIGHT);

    let (payload, ticket_hash) = inbound_ticket(&machine, addr(2), "10", 1);
    let env = compressed_envelope(TlvTag::ClaimInit, &payload);
    let tx = contract_tx(0x70, addr(9), prices::BRIDGE_OP, &env);
    finish(execute_transaction(&machine, &tx, &height, &mut state));

    let tx = contract_tx(0x71, addr(9), prices::BRIDGE_OP, &confirm_envelope(&ticket_hash, &outsider));
    assert!(matches!(
        rejection(execute_transaction(&machine, &tx, &height, &mut state)),
        ContractError::UnknownValidator(_)
    ));

    // A registered validator with a signature over the wrong message.
    let env = compressed_envelope(
        TlvTag::ClaimConfirm,
        &json!({
            "validator_id": format!("{v1:x}"),
            "validator_sign": sign(&h(0xee), &v1),
            "ticket_hash": format!("{ticket_hash:x}"),
        }),
    );
    let tx = contract_tx(0x72, addr(9), prices::BRIDGE_OP, &env);
    assert!(matches!(
        rejection(execute_transaction(&machine, &tx, &height, &mut state)),
        ContractError::BadSignature(_)
    ));
}

#[test]
fn claim_init_rejects_tampered_tickets() {
    let machine = machine();
    let mut state = MemorySubstate::new();
    seed_bridge(&mut state, addr(0x40), &[], 1);
    let height = block(forks::BRIDGE_V2_HEIGHT);

    let (mut payload, _) = inbound_ticket(&machine, addr(2), "10", 1);
    payload["amount"] = json!("9999999");
    let env = compressed_envelope(TlvTag::ClaimInit, &payload);
    let tx = contract_tx(0x80, addr(9), prices::BRIDGE_OP, &env);
    assert!(matches!(
        rejection(execute_transaction(&machine, &tx, &height, &mut state)),
        ContractError::TicketHashMismatch { .. }
    ));

    let (mut payload, _) = inbound_ticket(&machine, addr(2), "10", 1);
    payload["dst_network"] = json!(9);
    let env = compressed_envelope(TlvTag::ClaimInit, &payload);
    let tx = contract_tx(0x81, addr(9), prices::BRIDGE_OP, &env);
    assert!(matches!(
        rejection(execute_transaction(&machine, &tx, &height, &mut state)),
        ContractError::WrongNetwork(9, 1)
    ));
}

#[test]
fn bridge_admin_requires_the_owner() {
    let machine = machine();
    let mut state = MemorySubstate::new();
    let owner = addr(0x40);
    seed_bridge(&mut state, owner, &[], 1);
    let height = block(forks::BRIDGE_V2_HEIGHT);

    let env = envelope(
        TlvTag::SetThreshold,
        vec![("threshold", ParameterValue::Int(3))],
    );
    let tx = contract_tx(0x90, addr(9), prices::BRIDGE_ADMIN_OP, &env);
    assert!(matches!(
        rejection(execute_transaction(&machine, &tx, &height, &mut state)),
        ContractError::Unauthorized
    ));

    let tx = contract_tx(0x91, owner, prices::BRIDGE_ADMIN_OP, &env);
    finish(execute_transaction(&machine, &tx, &height, &mut state));
    assert_eq!(state.bridge_settings().unwrap().threshold, 3);

    let env = envelope(
        TlvTag::AddValidator,
        vec![("pubkey", ParameterValue::Hash(addr(0x51).as_bytes().to_vec()))],
    );
    let tx = contract_tx(0x92, owner, prices::BRIDGE_ADMIN_OP, &env);
    finish(execute_transaction(&machine, &tx, &height, &mut state));
    let tx = contract_tx(0x93, owner, prices::BRIDGE_ADMIN_OP, &env);
    assert!(matches!(
        rejection(execute_transaction(&machine, &tx, &height, &mut state)),
        ContractError::AlreadyExists(_)
    ));
}

#[test]
fn distribution_is_best_effort() {
    let machine = machine();
    let mut state = MemorySubstate::new();
    let token = h(0x0a);
    seed_token(&mut state, token, *TREASURY, 5_000, 8);

    // No pool against the reference token: the swap is skipped, the
    // transaction still finishes, the treasury balance is untouched.
    let env = envelope(TlvTag::DexCmdDistribute, vec![("token_hash", hash_param(&token))]);
    let tx = contract_tx(0xa0, addr(9), prices::TOKEN_OP, &env);
    let receipt = finish(execute_transaction(&machine, &tx, &block(forks::DEX_HEIGHT), &mut state));
    assert_eq!(receipt.amount_out, U256::zero());
    assert_eq!(state.balance(&TREASURY, &token).unwrap(), U256::from(5_000u64));
}
