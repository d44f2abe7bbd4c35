use crate::{BlockContext, FatalError, ValidationError};
use std::{collections::HashMap, sync::Arc};

use alloy_consensus::Header;
use alloy_primitives::{keccak256, Bytes, B256};
use parking_lot::Mutex;
use rollup_validator_primitives::{BatchInfo, MessageWithMetadata};
use rollup_validator_providers::{
    code_key, BatchFetcher, Blockchain, ChainContext, InboxReader, PinnedState, ProviderError,
    StateDatabase, StateTransition, StateView,
};
use tokio::sync::mpsc::UnboundedSender;

/// The outcome of recording the creation of a block.
#[derive(Debug, Default)]
pub struct RecordedBlock {
    /// The hash of the produced block, `None` if no message was provided.
    pub block_hash: Option<B256>,
    /// The preimages read during the block creation, if requested.
    pub preimages: Option<HashMap<B256, Bytes>>,
    /// The batches read during the block creation.
    pub batch_info: Vec<BatchInfo>,
}

/// The data required to validate a block.
#[derive(Debug, Default)]
pub struct BlockValidationData {
    /// The preimages read during the block creation, empty if not requested.
    pub preimages: HashMap<B256, Bytes>,
    /// The batches read during the block creation.
    pub batch_info: Vec<BatchInfo>,
    /// Whether the block consumed a delayed message.
    pub has_delayed_message: bool,
    /// The index of the consumed delayed message.
    pub delayed_message_number: u64,
}

/// A read-only view over the state database and the blockchain.
struct DatabaseState<'a> {
    database: &'a dyn StateDatabase,
    blockchain: &'a dyn Blockchain,
}

impl StateView for DatabaseState<'_> {
    fn node(&self, hash: B256) -> Result<Option<Bytes>, ProviderError> {
        self.database.node(hash)
    }

    fn code(&self, hash: B256) -> Result<Option<Bytes>, ProviderError> {
        self.database.get(&code_key(hash))
    }
}

impl ChainContext for DatabaseState<'_> {
    fn header_by_hash(&self, hash: B256) -> Result<Option<Header>, ProviderError> {
        self.blockchain.header_by_hash(hash)
    }
}

/// A view over the state database and the blockchain recording every trie node, code and
/// header read.
pub struct RecordingState<'a> {
    inner: DatabaseState<'a>,
    preimages: Mutex<HashMap<B256, Bytes>>,
}

impl<'a> RecordingState<'a> {
    /// Returns a new [`RecordingState`] over the database and the blockchain.
    pub fn new(database: &'a dyn StateDatabase, blockchain: &'a dyn Blockchain) -> Self {
        Self { inner: DatabaseState { database, blockchain }, preimages: Default::default() }
    }

    /// Consumes the view, returning the recorded preimages.
    pub fn into_preimages(self) -> HashMap<B256, Bytes> {
        self.preimages.into_inner()
    }

    fn record(&self, hash: B256, preimage: Option<Bytes>) -> Option<Bytes> {
        if let Some(preimage) = &preimage {
            self.preimages.lock().insert(hash, preimage.clone());
        }
        preimage
    }
}

impl StateView for RecordingState<'_> {
    fn node(&self, hash: B256) -> Result<Option<Bytes>, ProviderError> {
        Ok(self.record(hash, self.inner.node(hash)?))
    }

    fn code(&self, hash: B256) -> Result<Option<Bytes>, ProviderError> {
        Ok(self.record(hash, self.inner.code(hash)?))
    }
}

impl ChainContext for RecordingState<'_> {
    fn header_by_hash(&self, hash: B256) -> Result<Option<Header>, ProviderError> {
        let header = self.inner.header_by_hash(hash)?;
        if let Some(header) = &header {
            self.record(hash, Some(alloy_rlp::encode(header).into()));
        }
        Ok(header)
    }
}

impl std::fmt::Debug for RecordingState<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingState")
            .field("preimages", &self.preimages.lock().len())
            .finish_non_exhaustive()
    }
}

/// A [`BatchFetcher`] reading from the inbox and keeping every batch it returned.
struct RecordingBatchFetcher<'a> {
    inbox_reader: &'a dyn InboxReader,
    batches: Mutex<Vec<BatchInfo>>,
}

#[async_trait::async_trait]
impl BatchFetcher for RecordingBatchFetcher<'_> {
    async fn fetch_batch(&self, batch_number: u64) -> Result<Bytes, ProviderError> {
        let data = self.inbox_reader.sequencer_message_bytes(batch_number).await?;
        self.batches.lock().push(BatchInfo::new(batch_number, data.clone()));
        Ok(data)
    }
}

/// Records the creation of blocks by the state-transition function.
pub struct BlockRecorder {
    state_database: Arc<dyn StateDatabase>,
    blockchain: Arc<dyn Blockchain>,
    inbox_reader: Arc<dyn InboxReader>,
    state_transition: Arc<dyn StateTransition>,
    fatal_errors: Option<UnboundedSender<FatalError>>,
}

impl BlockRecorder {
    /// Returns a new [`BlockRecorder`].
    pub fn new(
        state_database: Arc<dyn StateDatabase>,
        blockchain: Arc<dyn Blockchain>,
        inbox_reader: Arc<dyn InboxReader>,
        state_transition: Arc<dyn StateTransition>,
    ) -> Self {
        Self { state_database, blockchain, inbox_reader, state_transition, fatal_errors: None }
    }

    /// Sets the channel on which configuration mismatches are reported.
    pub fn with_fatal_errors(mut self, fatal_errors: UnboundedSender<FatalError>) -> Self {
        self.fatal_errors = Some(fatal_errors);
        self
    }

    /// Records the creation of the block produced by the message on top of the parent header.
    ///
    /// The state of the parent is pinned for the duration of the call. Without a message, the
    /// recording stops once the parent state is checked and no block hash is returned.
    pub async fn record_block_creation(
        &self,
        prev_header: Option<&Header>,
        message: Option<&MessageWithMetadata>,
        produce_preimages: bool,
    ) -> Result<RecordedBlock, ValidationError> {
        let _pin = prev_header
            .map(|header| PinnedState::new(&*self.state_database, header.state_root))
            .transpose()?;

        let database = DatabaseState {
            database: &*self.state_database,
            blockchain: &*self.blockchain,
        };
        let recording = RecordingState::new(&*self.state_database, &*self.blockchain);
        let view: &dyn StateView = if produce_preimages { &recording } else { &database };
        let chain_context: &dyn ChainContext =
            if produce_preimages { &recording } else { &database };

        if let Some(header) = prev_header {
            self.check_system_state(view, header)?;
        }

        let fetcher =
            RecordingBatchFetcher { inbox_reader: &*self.inbox_reader, batches: Default::default() };
        let block_hash = match message {
            Some(message) => {
                let header = self
                    .state_transition
                    .produce_block(
                        &message.message,
                        message.delayed_messages_read,
                        prev_header,
                        view,
                        chain_context,
                        self.blockchain.config(),
                        &fetcher,
                    )
                    .await?;
                Some(header.hash_slow())
            }
            None => None,
        };

        let preimages = produce_preimages.then(|| {
            let mut preimages = recording.into_preimages();
            if let Some(header) = prev_header {
                let encoded = Bytes::from(alloy_rlp::encode(header));
                preimages.insert(keccak256(&encoded), encoded);
            }
            preimages
        });
        Ok(RecordedBlock { block_hash, preimages, batch_info: fetcher.batches.into_inner() })
    }

    /// Records the block and checks it against the header, returning the data required to
    /// validate it.
    pub async fn block_data_for_validation(
        &self,
        header: &Header,
        prev_header: Option<&Header>,
        message: &MessageWithMetadata,
        produce_preimages: bool,
    ) -> Result<BlockValidationData, ValidationError> {
        let prev_hash = prev_header.map(Header::hash_slow).unwrap_or_default();
        if header.parent_hash != prev_hash {
            return Err(ValidationError::PrevHeaderMismatch {
                block_number: header.number,
                expected: header.parent_hash,
                actual: prev_hash,
            })
        }

        let mut data = BlockValidationData::default();
        if let Some(prev) = prev_header {
            let recorded =
                self.record_block_creation(Some(prev), Some(message), produce_preimages).await?;
            let expected = header.hash_slow();
            if recorded.block_hash != Some(expected) {
                return Err(ValidationError::BlockHashMismatch {
                    block_number: header.number,
                    expected,
                    actual: recorded.block_hash,
                })
            }
            data.preimages = recorded.preimages.unwrap_or_default();
            data.batch_info = recorded.batch_info;
        }

        (data.has_delayed_message, data.delayed_message_number) =
            BlockContext::delayed_message(prev_header, header);
        Ok(data)
    }

    fn check_system_state(
        &self,
        view: &dyn StateView,
        prev_header: &Header,
    ) -> Result<(), ValidationError> {
        let system_state = self.state_transition.system_state(view, prev_header.state_root)?;
        let config = self.blockchain.config();

        let err = if system_state.chain_id != config.chain_id {
            FatalError::ChainIdMismatch { expected: config.chain_id, actual: system_state.chain_id }
        } else if system_state.genesis_block_number != config.genesis_block_number {
            FatalError::GenesisBlockMismatch {
                expected: config.genesis_block_number,
                actual: system_state.genesis_block_number,
            }
        } else {
            return Ok(())
        };

        tracing::error!(target: "scroll::validator::recorder", ?err, block_number = prev_header.number, "system state does not match the chain config");
        if let Some(fatal_errors) = &self.fatal_errors {
            let _ = fatal_errors.send(err.clone());
        }
        Err(err.into())
    }
}

impl std::fmt::Debug for BlockRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockRecorder")
            .field("chain_config", self.blockchain.config())
            .field("fatal_errors", &self.fatal_errors.is_some())
            .finish_non_exhaustive()
    }
}
