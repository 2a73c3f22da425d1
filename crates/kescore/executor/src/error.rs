// Copyright 2023 Kestrel Foundation. All rights reserved.
// Kestrel is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use crate::validate::ValidationError;
use kes_types::{H256, U256};
use thiserror::Error;
use tlv_abi::DecodeError;

/// Business-rule failures of contract construction or execution. Any of these
/// rejects the enclosing transaction; none of them may leave a partial write
/// behind.
#[derive(Debug, Error, PartialEq)]
pub enum ContractError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("attached amount {got} is below the operation price {required}")]
    NotEnoughFee { required: U256, got: U256 },

    #[error("contract transactions must pay the contract-processing address")]
    WrongRecipient,

    #[error("contract fees are payable in the native token only, got '{0}'")]
    WrongCurrency(String),

    #[error("no pool for pair {0}")]
    PoolNotFound(String),

    #[error("pool for pair {0} already exists")]
    PoolAlreadyExists(String),

    #[error("token {0:?} does not exist")]
    TokenNotFound(H256),

    #[error("computed terms violate the submitted slippage bound")]
    SlippageExceeded,

    #[error("wrong transfer nonce: expected {expected}, got {got}")]
    NonceMismatch { expected: u64, got: u64 },

    #[error("destination network {0} is not registered with the bridge")]
    UnknownNetwork(u32),

    #[error("ticket addressed to network {0}, this bridge serves network {1}")]
    WrongNetwork(u32, u32),

    #[error("validator {0} is not registered with the bridge")]
    UnknownValidator(String),

    #[error("validator signature over ticket {0:?} does not verify")]
    BadSignature(H256),

    #[error("recomputed ticket hash {computed:?} does not match supplied {supplied:?}")]
    TicketHashMismatch { computed: H256, supplied: H256 },

    #[error("no pending ticket {0:?}")]
    TicketNotFound(H256),

    #[error("ticket {0:?} is already settled")]
    AlreadyClaimed(H256),

    #[error("amount fraction would be truncated when rescaling to {0} decimals")]
    PrecisionLoss(u8),

    #[error("sender is not authorized for this operation")]
    Unauthorized,

    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("insufficient balance of token {token:?}: need {required}, have {got}")]
    InsufficientBalance { token: H256, required: U256, got: U256 },

    #[error("amount out of range: {0}")]
    InvalidAmount(String),

    #[error("malformed compressed payload: {0}")]
    Payload(String),

    #[error("token supply cap would be exceeded")]
    SupplyOverflow,

    #[error("substate access failed: {0}")]
    State(String),
}

impl From<crate::state::StateError> for ContractError {
    fn from(e: crate::state::StateError) -> Self {
        ContractError::State(e.to_string())
    }
}

pub type ContractResult<T> = Result<T, ContractError>;
