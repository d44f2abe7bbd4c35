//! Primitive types for the stateless block validator.

pub use batch::BatchInfo;
mod batch;

pub use chain::{ChainConfig, SystemState};
mod chain;

pub use header::{delayed_messages_read, HeaderInfo, HeaderInfoError};
mod header;

pub use message::{
    block_number_to_message_count, message_count_to_block_number, L1IncomingMessage,
    L1IncomingMessageHeader, MessageIndex, MessageWithMetadata,
};
pub mod message;

pub use position::GlobalStatePosition;
mod position;

pub use sequencer::{
    DataAvailabilityCertificate, SequencerMessageError, SequencerMessageHeader,
    DAS_MESSAGE_HEADER_FLAG, SEQUENCER_MESSAGE_HEADER_LEN,
};
pub mod sequencer;

pub use state::GlobalState;
mod state;
