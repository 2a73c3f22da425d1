// Copyright 2023 Kestrel Foundation. All rights reserved.
// Kestrel is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! Transaction-level driver: sniff, build, execute inside an overlay, and
//! commit only on success.

#[cfg(test)]
mod tests;

use crate::{
    contracts::{ExecutionContext, ExecutionReceipt},
    error::ContractError,
    machine::Machine,
    state::{OverlaySubstate, Substate},
};
use kes_primitives::{BlockInfo, Transaction};
use log::{debug, trace};

#[derive(Debug)]
pub enum ExecutionOutcome {
    /// The payload is not contract input; the transaction is an ordinary
    /// transfer and the executor has nothing to do.
    NotAContract,
    /// A contract, but it failed; no state was modified.
    Rejected(ContractError),
    /// Executed and committed.
    Finished(ExecutionReceipt),
}

pub fn execute_transaction(
    machine: &Machine, tx: &Transaction, block: &BlockInfo, state: &mut dyn Substate,
) -> ExecutionOutcome {
    let spec = machine.spec(block.height);
    let Some(tag) = machine.sniff(&tx.data, &spec) else {
        return ExecutionOutcome::NotAContract;
    };
    trace!("tx {:x} carries contract operation {:?}", tx.hash, tag);

    let contract = match machine.create_contract(tx, &spec) {
        Ok(contract) => contract,
        Err(reason) => {
            debug!("tx {:x} rejected during construction: {}", tx.hash, reason);
            return ExecutionOutcome::Rejected(reason);
        }
    };

    let mut overlay = OverlaySubstate::new(state);
    let mut ctx = ExecutionContext {
        tx,
        block,
        spec: &spec,
        params: machine.params(),
        crypto: machine.crypto(),
        sender: tx.from,
        state: &mut overlay,
    };
    match contract.execute(&mut ctx) {
        Ok(receipt) => match overlay.commit() {
            Ok(()) => ExecutionOutcome::Finished(receipt),
            Err(fault) => ExecutionOutcome::Rejected(fault.into()),
        },
        Err(reason) => {
            debug!("tx {:x} rejected during execution: {}", tx.hash, reason);
            ExecutionOutcome::Rejected(reason)
        }
    }
}
