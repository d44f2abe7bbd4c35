use crate::{MachineError, PreimageError};
use std::sync::Arc;

use alloy_primitives::{Bytes, B256};
use rollup_validator_primitives::GlobalState;

/// An instance of the trait resolves the preimage of a keccak hash.
#[auto_impl::auto_impl(&, Arc, Box)]
pub trait PreimageResolver: Send + Sync {
    /// Returns the preimage of the hash.
    fn resolve(&self, hash: B256) -> Result<Bytes, PreimageError>;
}

/// A deterministic execution backend for the state-transition function.
///
/// The machine is configured with a starting global state, the sequencer batches and delayed
/// messages it may read and a preimage resolver, then stepped until it stops running. A machine
/// which stopped without erroring exposes the reached global state.
pub trait ExecutionMachine: Send + std::fmt::Debug {
    /// Sets the global state the execution starts from.
    fn set_global_state(&mut self, state: GlobalState) -> Result<(), MachineError>;

    /// Makes the sequencer message of the batch readable by the machine.
    fn add_sequencer_inbox_message(
        &mut self,
        batch_number: u64,
        data: Bytes,
    ) -> Result<(), MachineError>;

    /// Makes the delayed message readable by the machine.
    fn add_delayed_inbox_message(&mut self, index: u64, data: Bytes) -> Result<(), MachineError>;

    /// Installs the resolver used for every preimage read by the machine.
    fn set_preimage_resolver(
        &mut self,
        resolver: Arc<dyn PreimageResolver>,
    ) -> Result<(), MachineError>;

    /// Executes up to `count` steps.
    fn step(&mut self, count: u64) -> Result<(), MachineError>;

    /// Returns true while the machine has steps left to execute.
    fn is_running(&self) -> bool;

    /// Returns true if the machine stopped in an errored state.
    fn is_errored(&self) -> bool;

    /// Returns the current global state of the machine.
    fn global_state(&self) -> GlobalState;

    /// Returns a copy of the machine in its current state.
    fn clone_machine(&self) -> Box<dyn ExecutionMachine>;
}
