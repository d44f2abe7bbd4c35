//! A stateless block validator for a layer-2 rollup.
//!
//! A block is validated by recording the inputs its creation read, locating the batch that
//! carried its message and replaying it in an execution backend which reads every other input
//! through preimages. The block is valid if the backend reaches the global state committed to by
//! the block header.

pub use config::{PendingModuleRoot, StatelessValidatorArgs, DEFAULT_STEP_BATCH_SIZE};
mod config;

pub use das::{
    preimages_from_batches, recover_payload_from_das_batch, MIN_LIFETIME_SECONDS_FOR_DAS_CERT,
};
mod das;

pub use entry::{
    BlockContext, ReadyEntry, ReadyForRecordEntry, RecordedEntry, ValidationEntry,
    ValidationEntryStage,
};
mod entry;

pub use error::{FatalError, ValidationError};
mod error;

pub use locator::{find_batch_containing_message_index, global_state_positions_for};
mod locator;

pub use metrics::StatelessValidatorMetrics;
mod metrics;

pub use preimage::LayeredPreimageResolver;
mod preimage;

pub use recorder::{BlockRecorder, BlockValidationData, RecordedBlock, RecordingState};
mod recorder;

pub use validator::{StatelessBlockValidator, ValidatorProviders};
mod validator;

/// Test utilities for the stateless block validator.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
