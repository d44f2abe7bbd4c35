use crate::{das::preimages_from_batches, BlockRecorder, BlockValidationData, ValidationError};
use std::collections::HashMap;

use alloy_consensus::Header;
use alloy_primitives::{Bytes, B256};
use rollup_validator_primitives::{
    delayed_messages_read, BatchInfo, GlobalState, GlobalStatePosition, HeaderInfo,
    HeaderInfoError, MessageWithMetadata,
};
use rollup_validator_providers::DataAvailabilityReader;

/// The stage of a [`ValidationEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum ValidationEntryStage {
    /// The entry holds no block.
    Empty,
    /// The entry holds the block and its message.
    ReadyForRecord,
    /// The block creation has been recorded.
    Recorded,
    /// The entry holds everything required to execute the block.
    Ready,
}

/// The identity of the validated block and of its parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockContext {
    /// The number of the block.
    pub block_number: u64,
    /// The hash of the parent block.
    pub prev_block_hash: B256,
    /// The header of the parent block, `None` for the genesis block.
    pub prev_block_header: Option<Header>,
    /// The hash of the block.
    pub block_hash: B256,
    /// The header of the block.
    pub block_header: Header,
    /// Whether the block consumed a delayed message.
    pub has_delayed_message: bool,
    /// The index of the consumed delayed message.
    pub delayed_message_number: u64,
}

impl BlockContext {
    /// Returns the [`BlockContext`] of the header, detecting the consumption of a delayed
    /// message from the header nonces.
    pub fn new(prev_header: Option<Header>, header: Header) -> Self {
        let delayed_message = Self::delayed_message(prev_header.as_ref(), &header);
        Self::with_delayed_message(prev_header, header, delayed_message)
    }

    /// Returns whether the block consumed a delayed message along with the index of that
    /// message. The genesis block consumes the delayed message 0.
    pub fn delayed_message(prev_header: Option<&Header>, header: &Header) -> (bool, u64) {
        match prev_header {
            Some(prev) if delayed_messages_read(prev) == delayed_messages_read(header) => (false, 0),
            Some(prev) => (true, delayed_messages_read(prev)),
            None => (true, 0),
        }
    }

    fn with_delayed_message(
        prev_header: Option<Header>,
        header: Header,
        (has_delayed_message, delayed_message_number): (bool, u64),
    ) -> Self {
        Self {
            block_number: header.number,
            prev_block_hash: prev_header.as_ref().map(Header::hash_slow).unwrap_or_default(),
            prev_block_header: prev_header,
            block_hash: header.hash_slow(),
            block_header: header,
            has_delayed_message,
            delayed_message_number,
        }
    }
}

/// A [`ValidationEntry`] waiting for its block creation to be recorded.
#[derive(Debug, Clone)]
pub struct ReadyForRecordEntry {
    /// The block context.
    pub context: BlockContext,
    /// The message producing the block.
    pub message: Option<MessageWithMetadata>,
}

/// A [`ValidationEntry`] whose block creation has been recorded.
#[derive(Debug, Clone)]
pub struct RecordedEntry {
    /// The block context.
    pub context: BlockContext,
    /// The preimages recorded during the block creation.
    pub preimages: HashMap<B256, Bytes>,
    /// The batches read during the block creation.
    pub batch_info: Vec<BatchInfo>,
}

/// A [`ValidationEntry`] ready to be executed.
#[derive(Debug, Clone)]
pub struct ReadyEntry {
    /// The block context.
    pub context: BlockContext,
    /// The preimages available to the execution.
    pub preimages: HashMap<B256, Bytes>,
    /// The batches fed to the execution, the sequencer message of the start batch last.
    pub batch_info: Vec<BatchInfo>,
    /// The position of the message producing the block.
    pub start_position: GlobalStatePosition,
    /// The position following the message.
    pub end_position: GlobalStatePosition,
}

impl ReadyEntry {
    /// Returns the global state the execution starts from.
    pub fn start(&self) -> Result<GlobalState, HeaderInfoError> {
        let send_root = match &self.context.prev_block_header {
            Some(header) => HeaderInfo::from_header(header)?.send_root,
            None => B256::ZERO,
        };
        Ok(GlobalState::new(self.start_position, self.context.prev_block_hash, send_root))
    }

    /// Returns the global state the execution is expected to reach.
    pub fn expected_end(&self) -> Result<GlobalState, HeaderInfoError> {
        let send_root = HeaderInfo::from_header(&self.context.block_header)?.send_root;
        Ok(GlobalState::new(self.end_position, self.context.block_hash, send_root))
    }
}

/// The validation context of a block, moving forward through its stages.
///
/// Every operation requires the entry to be at a given stage and leaves the entry untouched if
/// it fails.
#[derive(Debug, Default, Clone)]
pub enum ValidationEntry {
    /// No block.
    #[default]
    Empty,
    /// See [`ReadyForRecordEntry`].
    ReadyForRecord(ReadyForRecordEntry),
    /// See [`RecordedEntry`].
    Recorded(RecordedEntry),
    /// See [`ReadyEntry`].
    Ready(ReadyEntry),
}

impl ValidationEntry {
    /// Returns a new entry for the header, ready for its creation to be recorded.
    pub fn new(
        prev_header: Option<Header>,
        header: Header,
        message: Option<MessageWithMetadata>,
    ) -> Self {
        Self::ReadyForRecord(ReadyForRecordEntry {
            context: BlockContext::new(prev_header, header),
            message,
        })
    }

    /// Returns a new entry for the header from a recording done out of band.
    pub fn new_recorded(
        prev_header: Option<Header>,
        header: Header,
        preimages: HashMap<B256, Bytes>,
        batch_info: Vec<BatchInfo>,
    ) -> Self {
        Self::Recorded(RecordedEntry {
            context: BlockContext::new(prev_header, header),
            preimages,
            batch_info,
        })
    }

    /// Returns a new recorded entry for the header from the data gathered by
    /// [`BlockRecorder::block_data_for_validation`], keeping its delayed message.
    pub fn from_validation_data(
        prev_header: Option<Header>,
        header: Header,
        data: BlockValidationData,
    ) -> Self {
        let context = BlockContext::with_delayed_message(
            prev_header,
            header,
            (data.has_delayed_message, data.delayed_message_number),
        );
        Self::Recorded(RecordedEntry {
            context,
            preimages: data.preimages,
            batch_info: data.batch_info,
        })
    }

    /// Returns the stage of the entry.
    pub const fn stage(&self) -> ValidationEntryStage {
        match self {
            Self::Empty => ValidationEntryStage::Empty,
            Self::ReadyForRecord(_) => ValidationEntryStage::ReadyForRecord,
            Self::Recorded(_) => ValidationEntryStage::Recorded,
            Self::Ready(_) => ValidationEntryStage::Ready,
        }
    }

    /// Returns the block context of the entry.
    pub const fn context(&self) -> Option<&BlockContext> {
        match self {
            Self::Empty => None,
            Self::ReadyForRecord(entry) => Some(&entry.context),
            Self::Recorded(entry) => Some(&entry.context),
            Self::Ready(entry) => Some(&entry.context),
        }
    }

    /// Records the block creation, moving the entry to [`ValidationEntryStage::Recorded`].
    ///
    /// The message is dropped once recorded.
    pub async fn record(
        &mut self,
        recorder: &BlockRecorder,
        produce_preimages: bool,
    ) -> Result<(), ValidationError> {
        let Self::ReadyForRecord(entry) = &*self else {
            return Err(self.unexpected_stage(ValidationEntryStage::ReadyForRecord))
        };

        let (preimages, batch_info) = match &entry.context.prev_block_header {
            Some(prev) => {
                let recorded = recorder
                    .record_block_creation(Some(prev), entry.message.as_ref(), produce_preimages)
                    .await?;
                if recorded.block_hash != Some(entry.context.block_hash) {
                    return Err(ValidationError::BlockHashMismatch {
                        block_number: entry.context.block_number,
                        expected: entry.context.block_hash,
                        actual: recorded.block_hash,
                    })
                }
                (recorded.preimages.unwrap_or_default(), recorded.batch_info)
            }
            None => Default::default(),
        };

        if let Self::ReadyForRecord(entry) = std::mem::take(self) {
            *self = Self::Recorded(RecordedEntry { context: entry.context, preimages, batch_info });
        }
        Ok(())
    }

    /// Adds the sequencer message of the start batch and the preimages of the certified
    /// payloads, moving the entry to [`ValidationEntryStage::Ready`].
    pub async fn add_sequencer_message(
        &mut self,
        start: GlobalStatePosition,
        end: GlobalStatePosition,
        sequencer_message: Bytes,
        das: Option<&dyn DataAvailabilityReader>,
        requires_committee: bool,
    ) -> Result<(), ValidationError> {
        let Self::Recorded(entry) = &*self else {
            return Err(self.unexpected_stage(ValidationEntryStage::Recorded))
        };

        let mut batch_info = entry.batch_info.clone();
        batch_info.push(BatchInfo::new(start.batch_number, sequencer_message));
        let recovered = preimages_from_batches(&batch_info, das, requires_committee).await?;

        if let Self::Recorded(entry) = std::mem::take(self) {
            let mut preimages = entry.preimages;
            preimages.extend(recovered);
            *self = Self::Ready(ReadyEntry {
                context: entry.context,
                preimages,
                batch_info,
                start_position: start,
                end_position: end,
            });
        }
        Ok(())
    }

    /// Returns the entry if it is ready to be executed.
    pub fn into_ready(self) -> Result<ReadyEntry, ValidationError> {
        match self {
            Self::Ready(entry) => Ok(entry),
            other => Err(other.unexpected_stage(ValidationEntryStage::Ready)),
        }
    }

    const fn unexpected_stage(&self, expected: ValidationEntryStage) -> ValidationError {
        ValidationError::UnexpectedStage { expected, actual: self.stage() }
    }
}
