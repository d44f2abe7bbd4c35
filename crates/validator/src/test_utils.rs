//! A test chain producing blocks with the test state-transition function and posting them in
//! batches.

use crate::{
    BlockRecorder, FatalError, StatelessBlockValidator, StatelessValidatorArgs, ValidationError,
    ValidatorProviders, MIN_LIFETIME_SECONDS_FOR_DAS_CERT,
};
use std::sync::Arc;

use alloy_consensus::Header;
use alloy_primitives::{address, Address, Bytes};
use rollup_validator_machine::test_utils::TestMachineFactory;
use rollup_validator_primitives::{
    delayed_messages_read,
    message::{
        L1_MESSAGE_TYPE_BATCH_POSTING_REPORT, L1_MESSAGE_TYPE_INITIALIZE, L1_MESSAGE_TYPE_INVALID,
        L1_MESSAGE_TYPE_L2_MESSAGE,
    },
    ChainConfig, DataAvailabilityCertificate, L1IncomingMessage, L1IncomingMessageHeader,
    MessageIndex, MessageWithMetadata, SequencerMessageHeader, DAS_MESSAGE_HEADER_FLAG,
};
use rollup_validator_providers::{
    test_utils::{
        encode_batch, encode_das_batch, encode_das_payload, MemoryBlockchain,
        MemoryDataAvailability, MemoryInbox, MemoryStateDatabase, TestStateNode,
        TestStateTransition, TEST_BASE_FEE,
    },
    InboxReader, ProviderError, StateTransitionError, TransactionStreamer,
};
use tokio::sync::mpsc::UnboundedSender;

/// The chain id of the [`TestChain`].
pub const TEST_CHAIN_ID: u64 = 412_346;

/// The code executed by the test state-transition function.
pub const TEST_CODE: &[u8] = b"test state transition code";

/// The keyset of the test data availability committee.
pub const TEST_KEYSET: &[u8] = b"test data availability keyset";

/// The poster of the test messages.
pub const TEST_POSTER: Address = address!("0xa4b000000000000000000073657175656e636572");

/// The timestamp of the genesis block of the [`TestChain`].
pub const TEST_GENESIS_TIMESTAMP: u64 = 1_700_000_000;

const TEST_GAS_LIMIT: u64 = 32_000_000;

/// A chain producing blocks with the [`TestStateTransition`] into in-memory providers.
///
/// Produced messages are pending until a batch is posted.
#[derive(Debug)]
pub struct TestChain {
    config: ChainConfig,
    state_database: Arc<MemoryStateDatabase>,
    blockchain: Arc<MemoryBlockchain>,
    inbox: Arc<MemoryInbox>,
    data_availability: Arc<MemoryDataAvailability>,
    head: Header,
    pending: Vec<MessageWithMetadata>,
}

impl TestChain {
    /// Returns a new [`TestChain`] holding the genesis block and its initialization message.
    pub fn new(config: ChainConfig) -> Self {
        Self::with_genesis_chain_id(config, config.chain_id)
    }

    /// Returns a new [`TestChain`] whose genesis state holds the provided chain id.
    pub fn with_genesis_chain_id(config: ChainConfig, chain_id: u64) -> Self {
        let state_database = Arc::new(MemoryStateDatabase::default());
        let blockchain = Arc::new(MemoryBlockchain::new(config));
        let inbox = Arc::new(MemoryInbox::new(config.genesis_block_number));

        let code_hash = state_database.insert_code(Bytes::from_static(TEST_CODE));
        let genesis = TestStateNode::genesis(chain_id, config.genesis_block_number, code_hash);
        let head = Header {
            number: config.genesis_block_number,
            state_root: state_database.insert_node(genesis.encode()),
            gas_limit: TEST_GAS_LIMIT,
            timestamp: TEST_GENESIS_TIMESTAMP,
            base_fee_per_gas: Some(TEST_BASE_FEE),
            ..Default::default()
        };
        blockchain.insert_header(head.clone());

        let init = Self::incoming_message(
            L1_MESSAGE_TYPE_INITIALIZE,
            TEST_GENESIS_TIMESTAMP,
            chain_id.to_be_bytes().to_vec(),
        );
        let init = MessageWithMetadata::new(init, 0);
        inbox.push_message(init.clone());

        Self {
            config,
            state_database,
            blockchain,
            inbox,
            data_availability: Default::default(),
            head,
            pending: vec![init],
        }
    }

    /// Returns a message of the kind posted by the test poster.
    pub fn incoming_message(
        kind: u8,
        timestamp: u64,
        l2_msg: impl Into<Bytes>,
    ) -> L1IncomingMessage {
        L1IncomingMessage {
            header: L1IncomingMessageHeader {
                kind,
                poster: TEST_POSTER,
                timestamp,
                ..Default::default()
            },
            l2_msg: l2_msg.into(),
        }
    }

    /// Returns the chain config.
    pub const fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// Returns the head of the chain.
    pub const fn head(&self) -> &Header {
        &self.head
    }

    /// Returns the state database.
    pub fn state_database(&self) -> Arc<MemoryStateDatabase> {
        self.state_database.clone()
    }

    /// Returns the blockchain.
    pub fn blockchain(&self) -> Arc<MemoryBlockchain> {
        self.blockchain.clone()
    }

    /// Returns the inbox.
    pub fn inbox(&self) -> Arc<MemoryInbox> {
        self.inbox.clone()
    }

    /// Returns the data availability committee storage.
    pub fn data_availability(&self) -> Arc<MemoryDataAvailability> {
        self.data_availability.clone()
    }

    /// Returns the streamed message at the index.
    pub async fn message(
        &self,
        index: MessageIndex,
    ) -> Result<MessageWithMetadata, ProviderError> {
        self.inbox.message(index).await
    }

    /// Returns the sequencer message of the batch.
    pub async fn sequencer_message(&self, batch_number: u64) -> Result<Bytes, ProviderError> {
        self.inbox.sequencer_message_bytes(batch_number).await
    }

    /// Produces a block from an L2 message.
    pub fn produce_block(&mut self, l2_msg: Bytes) -> Result<Header, StateTransitionError> {
        let message =
            Self::incoming_message(L1_MESSAGE_TYPE_L2_MESSAGE, self.head.timestamp + 1, l2_msg);
        self.produce_message_block(message)
    }

    /// Produces a block from a batch posting report of the posted batch.
    pub fn produce_report_block(
        &mut self,
        batch_number: u64,
    ) -> Result<Header, StateTransitionError> {
        let message = Self::incoming_message(
            L1_MESSAGE_TYPE_BATCH_POSTING_REPORT,
            self.head.timestamp + 1,
            batch_number.to_be_bytes().to_vec(),
        );
        self.produce_message_block(message)
    }

    /// Produces a block from a sequenced message.
    pub fn produce_message_block(
        &mut self,
        message: L1IncomingMessage,
    ) -> Result<Header, StateTransitionError> {
        let delayed_messages_read = delayed_messages_read(&self.head);
        let batched = MessageWithMetadata::new(message.clone(), delayed_messages_read);
        self.produce(message, delayed_messages_read, batched)
    }

    /// Posts the message to the delayed inbox and produces the block consuming it.
    ///
    /// The batch carries a placeholder in place of the delayed message.
    pub fn produce_delayed_block(
        &mut self,
        message: L1IncomingMessage,
    ) -> Result<Header, StateTransitionError> {
        let index = self.inbox.push_delayed_message(&message);
        let delayed_messages_read = index + 1;
        let placeholder =
            Self::incoming_message(L1_MESSAGE_TYPE_INVALID, message.header.timestamp, Bytes::new());
        let placeholder = MessageWithMetadata::new(placeholder, delayed_messages_read);
        self.produce(message, delayed_messages_read, placeholder)
    }

    fn produce(
        &mut self,
        message: L1IncomingMessage,
        delayed_messages_read: u64,
        batched: MessageWithMetadata,
    ) -> Result<Header, StateTransitionError> {
        let batch = match TestStateTransition::reported_batch(&message) {
            Some(batch_number) => Some(self.inbox.batch(batch_number).ok_or(
                StateTransitionError::BatchFetch {
                    batch_number,
                    source: ProviderError::MissingBatch(batch_number),
                },
            )?),
            None => None,
        };

        let (header, node) = TestStateTransition.apply(
            &message,
            delayed_messages_read,
            Some(&self.head),
            &*self.state_database,
            &*self.blockchain,
            batch.as_ref(),
        )?;

        self.state_database.insert_node(node);
        self.blockchain.insert_header(header.clone());
        self.inbox.push_message(MessageWithMetadata::new(message, delayed_messages_read));
        self.pending.push(batched);
        self.head = header.clone();
        Ok(header)
    }

    fn pending_batch_header(&self) -> SequencerMessageHeader {
        SequencerMessageHeader {
            min_timestamp: self
                .pending
                .first()
                .map(|message| message.message.header.timestamp)
                .unwrap_or_default(),
            max_timestamp: self.head.timestamp,
            after_delayed_messages: delayed_messages_read(&self.head),
            ..Default::default()
        }
    }

    /// Posts the pending messages in a batch, returning the batch number.
    pub fn post_batch(&mut self) -> u64 {
        let data = encode_batch(&self.pending_batch_header(), &self.pending);
        self.pending.clear();
        self.inbox.push_batch(data, self.inbox.message_count())
    }

    /// Stores the pending messages with the data availability committee and posts the
    /// certificate in a batch, returning the batch number.
    pub fn post_das_batch(&mut self) -> u64 {
        let header = self.pending_batch_header();
        let certificate = DataAvailabilityCertificate {
            header: DAS_MESSAGE_HEADER_FLAG,
            keyset_hash: self.data_availability.insert(Bytes::from_static(TEST_KEYSET)),
            data_hash: self.data_availability.insert(encode_das_payload(&self.pending)),
            timeout: header.max_timestamp + 2 * MIN_LIFETIME_SECONDS_FOR_DAS_CERT,
            signers_mask: 1,
            signature: Bytes::new(),
        };
        let data = encode_das_batch(&header, &certificate);
        self.pending.clear();
        self.inbox.push_batch(data, self.inbox.message_count())
    }

    /// Returns the providers of a validator over the chain.
    pub fn providers(&self) -> ValidatorProviders {
        ValidatorProviders {
            inbox_tracker: self.inbox.clone(),
            inbox_reader: self.inbox.clone(),
            streamer: self.inbox.clone(),
            state_database: self.state_database.clone(),
            blockchain: self.blockchain.clone(),
            state_transition: Arc::new(TestStateTransition),
            data_availability: Some(self.data_availability.clone()),
        }
    }

    /// Returns a recorder over the chain.
    pub fn recorder(&self) -> BlockRecorder {
        BlockRecorder::new(
            self.state_database.clone(),
            self.blockchain.clone(),
            self.inbox.clone(),
            Arc::new(TestStateTransition),
        )
    }

    /// Returns a validator over the chain running the test backends.
    pub async fn validator(
        &self,
        args: &StatelessValidatorArgs,
    ) -> Result<StatelessBlockValidator, ValidationError> {
        self.validator_with(self.providers(), TestMachineFactory::default(), args, None).await
    }

    /// Returns a validator over the providers running the backends of the factory.
    pub async fn validator_with(
        &self,
        providers: ValidatorProviders,
        factory: TestMachineFactory,
        args: &StatelessValidatorArgs,
        fatal_errors: Option<UnboundedSender<FatalError>>,
    ) -> Result<StatelessBlockValidator, ValidationError> {
        let loader = Arc::new(args.machine_loader(factory));
        StatelessBlockValidator::new(providers, loader, args, fatal_errors).await
    }
}
