//! In-memory implementations of the providers along with a deterministic state-transition
//! function.

pub use batch::{decode_batch_messages, encode_batch, encode_das_batch, encode_das_payload};
mod batch;

pub use memory::{MemoryBlockchain, MemoryDataAvailability, MemoryInbox, MemoryStateDatabase};
mod memory;

pub use transition::{
    TestStateNode, TestStateTransition, TEST_ARBOS_FORMAT_VERSION, TEST_BASE_FEE,
};
mod transition;
