// Copyright 2023 Kestrel Foundation. All rights reserved.
// Kestrel is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! The deterministic contract-execution core. Raw transaction data is sniffed
//! and decoded by `tlv-abi`, the fork dispatcher picks the protocol version
//! for the block height, the machine constructs a self-validated contract
//! variant and checks payment terms, and the executive runs it against a
//! buffered view of the substate, committing all-or-nothing.

#[macro_use]
extern crate lazy_static;

pub mod contracts;
pub mod crypto;
mod error;
pub mod executive;
pub mod machine;
pub mod spec;
pub mod state;
pub mod validate;

pub use contracts::{Contract, ExecutionReceipt};
pub use crypto::ChainCrypto;
pub use error::{ContractError, ContractResult};
pub use executive::{execute_transaction, ExecutionOutcome};
pub use machine::Machine;
pub use spec::{CommonParams, ForkTable, PriceTable, Pricelist, ProtocolVersion, Spec};
pub use state::{MemorySubstate, OverlaySubstate, Substate};
pub use validate::ValidationError;
