use crate::ValidationEntryStage;

use alloy_primitives::B256;
use rollup_validator_machine::{MachineError, PreimageError};
use rollup_validator_primitives::{GlobalState, HeaderInfoError, SequencerMessageError};
use rollup_validator_providers::{ProviderError, StateTransitionError};

/// A mismatch between the local configuration and the validated chain.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FatalError {
    /// The chain id stored in the state differs from the configured one.
    #[error("unexpected chain id {actual} in system state, expected {expected}")]
    ChainIdMismatch {
        /// The configured chain id.
        expected: u64,
        /// The chain id read from the state.
        actual: u64,
    },
    /// The genesis block number stored in the state differs from the configured one.
    #[error("unexpected genesis block number {actual} in system state, expected {expected}")]
    GenesisBlockMismatch {
        /// The configured genesis block number.
        expected: u64,
        /// The genesis block number read from the state.
        actual: u64,
    },
}

/// An error occurring during the validation of a block.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// The header of the block is unknown.
    #[error("header not found for block {0}")]
    MissingHeader(u64),
    /// The header of the parent block is unknown.
    #[error("prev header not found for block {0}")]
    MissingPrevHeader(u64),
    /// The provided parent header is not the parent of the header.
    #[error("prev header {actual} does not match parent hash {expected} of block {block_number}")]
    PrevHeaderMismatch {
        /// The number of the validated block.
        block_number: u64,
        /// The parent hash of the header.
        expected: B256,
        /// The hash of the provided parent header.
        actual: B256,
    },
    /// The block precedes the genesis block or has no representable message index.
    #[error("block {block_number} has no message index above genesis block {genesis_block_number}")]
    InvalidBlockNumber {
        /// The number of the block.
        block_number: u64,
        /// The genesis block number.
        genesis_block_number: u64,
    },
    /// The message is not covered by the posted batches.
    #[error("message {message_index} is not covered by the {batch_count} posted batches")]
    MessageNotInBatches {
        /// The index of the message.
        message_index: u64,
        /// The count of posted batches.
        batch_count: u64,
    },
    /// The message was posted after the batch.
    #[error("message {message_index} is after batch {batch_number} ending at {message_count}")]
    MessageAfterBatch {
        /// The index of the message.
        message_index: u64,
        /// The number of the batch.
        batch_number: u64,
        /// The cumulative message count of the batch.
        message_count: u64,
    },
    /// The message was posted before the batch.
    #[error("message {message_index} is before batch {batch_number} starting at {first_message}")]
    MessageBeforeBatch {
        /// The index of the message.
        message_index: u64,
        /// The number of the batch.
        batch_number: u64,
        /// The index of the first message of the batch.
        first_message: u64,
    },
    /// The validation entry is not at the stage the operation requires.
    #[error("validation entry should be {expected}, is {actual}")]
    UnexpectedStage {
        /// The stage required by the operation.
        expected: ValidationEntryStage,
        /// The stage of the entry.
        actual: ValidationEntryStage,
    },
    /// The validator configuration is invalid.
    #[error("invalid validator config: {0}")]
    InvalidConfig(String),
    /// The configured module root is invalid.
    #[error("invalid module root {0:?}")]
    InvalidModuleRoot(String),
    /// The recorded block hash differs from the hash of the header.
    #[error("recording failed for block {block_number}: expected hash {expected}, got {actual:?}")]
    BlockHashMismatch {
        /// The number of the block.
        block_number: u64,
        /// The hash of the header.
        expected: B256,
        /// The hash of the recorded block.
        actual: Option<B256>,
    },
    /// The execution backends reached different global states.
    #[error("execution backends disagree: interpreter {interpreter:?}, jit {jit:?}")]
    BackendMismatch {
        /// The global state reached by the interpreter.
        interpreter: GlobalState,
        /// The global state reached by the JIT.
        jit: GlobalState,
    },
    /// The local configuration does not match the validated chain.
    #[error(transparent)]
    Fatal(#[from] FatalError),
    /// A sequencer message carries a data availability certificate but no reader is configured.
    #[error("processing data availability chain without a data availability reader")]
    MissingDataAvailabilityReader,
    /// A payload returned by the data availability reader does not hash to its key.
    #[error("data availability payload hash mismatch: expected {expected}, got {actual}")]
    DasHashMismatch {
        /// The requested hash.
        expected: B256,
        /// The hash of the returned payload.
        actual: B256,
    },
    /// The data availability reader does not hold the payload.
    #[error("data availability payload {0} not found")]
    MissingDasPreimage(B256),
    /// The machine stopped in an errored state.
    #[error("machine entered errored state during validation of block {block_number}")]
    MachineErrored {
        /// The number of the block.
        block_number: u64,
    },
    /// An error at the execution machine.
    #[error(transparent)]
    Machine(#[from] MachineError),
    /// An error resolving a preimage.
    #[error(transparent)]
    Preimage(#[from] PreimageError),
    /// An error at one of the providers.
    #[error(transparent)]
    Provider(#[from] ProviderError),
    /// An error returned by the state-transition function.
    #[error(transparent)]
    StateTransition(#[from] StateTransitionError),
    /// A header holds malformed rollup information.
    #[error(transparent)]
    HeaderInfo(#[from] HeaderInfoError),
    /// A malformed sequencer message.
    #[error(transparent)]
    SequencerMessage(#[from] SequencerMessageError),
}

impl ValidationError {
    /// Returns true if the error is caused by a misconfiguration of the node.
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}
