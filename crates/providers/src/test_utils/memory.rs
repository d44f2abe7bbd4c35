use crate::{
    code_key, Blockchain, ChainContext, DataAvailabilityReader, InboxReader, InboxTracker,
    ProviderError, StateDatabase, StateView, TransactionStreamer,
};
use std::collections::{BTreeMap, HashMap};

use alloy_consensus::Header;
use alloy_primitives::{keccak256, Bytes, B256};
use parking_lot::{Mutex, RwLock};
use rollup_validator_primitives::{
    ChainConfig, L1IncomingMessage, MessageIndex, MessageWithMetadata,
};

/// An in-memory [`StateDatabase`] tracking the reference counts of the pinned roots.
#[derive(Debug, Default)]
pub struct MemoryStateDatabase {
    nodes: RwLock<HashMap<B256, Bytes>>,
    values: RwLock<HashMap<Vec<u8>, Bytes>>,
    references: Mutex<HashMap<B256, usize>>,
}

impl MemoryStateDatabase {
    /// Inserts the trie node, returning its hash.
    pub fn insert_node(&self, node: Bytes) -> B256 {
        let hash = keccak256(&node);
        self.nodes.write().insert(hash, node);
        hash
    }

    /// Inserts the code under its prefixed key, returning its hash.
    pub fn insert_code(&self, code: Bytes) -> B256 {
        let hash = keccak256(&code);
        self.values.write().insert(code_key(hash), code);
        hash
    }

    /// Removes the trie node with the provided hash.
    pub fn remove_node(&self, hash: B256) -> Option<Bytes> {
        self.nodes.write().remove(&hash)
    }

    /// Returns the current reference count of the root.
    pub fn reference_count(&self, root: B256) -> usize {
        self.references.lock().get(&root).copied().unwrap_or_default()
    }

    /// Returns the sum of the reference counts of all roots.
    pub fn total_references(&self) -> usize {
        self.references.lock().values().sum()
    }
}

impl StateDatabase for MemoryStateDatabase {
    fn node(&self, hash: B256) -> Result<Option<Bytes>, ProviderError> {
        Ok(self.nodes.read().get(&hash).cloned())
    }

    fn get(&self, key: &[u8]) -> Result<Option<Bytes>, ProviderError> {
        Ok(self.values.read().get(key).cloned())
    }

    fn reference(&self, root: B256) -> Result<(), ProviderError> {
        if !self.nodes.read().contains_key(&root) {
            return Err(ProviderError::MissingState(root))
        }
        *self.references.lock().entry(root).or_default() += 1;
        Ok(())
    }

    fn dereference(&self, root: B256) {
        let mut references = self.references.lock();
        if let Some(count) = references.get_mut(&root) {
            *count -= 1;
            if *count == 0 {
                references.remove(&root);
            }
        }
    }
}

impl StateView for MemoryStateDatabase {
    fn node(&self, hash: B256) -> Result<Option<Bytes>, ProviderError> {
        StateDatabase::node(self, hash)
    }

    fn code(&self, hash: B256) -> Result<Option<Bytes>, ProviderError> {
        self.get(&code_key(hash))
    }
}

/// An in-memory [`Blockchain`].
#[derive(Debug, Default)]
pub struct MemoryBlockchain {
    config: ChainConfig,
    headers: RwLock<HashMap<B256, Header>>,
    canonical: RwLock<BTreeMap<u64, B256>>,
}

impl MemoryBlockchain {
    /// Returns a new instance of the [`MemoryBlockchain`] for the chain config.
    pub fn new(config: ChainConfig) -> Self {
        Self { config, ..Default::default() }
    }

    /// Inserts the header as the canonical header at its number, returning its hash.
    pub fn insert_header(&self, header: Header) -> B256 {
        let hash = header.hash_slow();
        self.canonical.write().insert(header.number, hash);
        self.headers.write().insert(hash, header);
        hash
    }
}

impl ChainContext for MemoryBlockchain {
    fn header_by_hash(&self, hash: B256) -> Result<Option<Header>, ProviderError> {
        Ok(self.headers.read().get(&hash).cloned())
    }
}

impl Blockchain for MemoryBlockchain {
    fn header_by_number(&self, number: u64) -> Result<Option<Header>, ProviderError> {
        let Some(hash) = self.canonical.read().get(&number).copied() else { return Ok(None) };
        self.header_by_hash(hash)
    }

    fn config(&self) -> &ChainConfig {
        &self.config
    }
}

#[derive(Debug, Default)]
struct PostedBatch {
    data: Bytes,
    message_count: MessageIndex,
    acc: B256,
}

#[derive(Debug, Default)]
struct MemoryInboxInner {
    batches: Vec<PostedBatch>,
    delayed_messages: Vec<Bytes>,
    messages: Vec<MessageWithMetadata>,
}

/// An in-memory inbox acting as the [`InboxTracker`], the [`InboxReader`] and the
/// [`TransactionStreamer`].
#[derive(Debug, Default)]
pub struct MemoryInbox {
    genesis_block_number: u64,
    inner: RwLock<MemoryInboxInner>,
}

impl MemoryInbox {
    /// Returns a new instance of the [`MemoryInbox`] for the genesis block number.
    pub fn new(genesis_block_number: u64) -> Self {
        Self { genesis_block_number, ..Default::default() }
    }

    /// Posts a batch covering the messages up to the cumulative message count, returning the
    /// batch number.
    pub fn push_batch(&self, data: Bytes, message_count: MessageIndex) -> u64 {
        let mut inner = self.inner.write();
        let prev_acc = inner.batches.last().map(|batch| batch.acc).unwrap_or_default();
        let mut preimage = prev_acc.to_vec();
        preimage.extend_from_slice(keccak256(&data).as_slice());
        inner.batches.push(PostedBatch { data, message_count, acc: keccak256(preimage) });
        inner.batches.len() as u64 - 1
    }

    /// Posts a delayed message, returning its index.
    pub fn push_delayed_message(&self, message: &L1IncomingMessage) -> u64 {
        let mut inner = self.inner.write();
        inner.delayed_messages.push(alloy_rlp::encode(message).into());
        inner.delayed_messages.len() as u64 - 1
    }

    /// Appends a message to the stream, returning its index.
    pub fn push_message(&self, message: MessageWithMetadata) -> MessageIndex {
        let mut inner = self.inner.write();
        inner.messages.push(message);
        inner.messages.len() as u64 - 1
    }

    /// Returns the sequencer message of the batch.
    pub fn batch(&self, batch_number: u64) -> Option<Bytes> {
        self.inner.read().batches.get(batch_number as usize).map(|batch| batch.data.clone())
    }

    /// Returns the count of messages in the stream.
    pub fn message_count(&self) -> MessageIndex {
        self.inner.read().messages.len() as u64
    }

    /// Returns the count of delayed messages posted.
    pub fn delayed_message_count(&self) -> u64 {
        self.inner.read().delayed_messages.len() as u64
    }
}

#[async_trait::async_trait]
impl InboxTracker for MemoryInbox {
    async fn delayed_message_bytes(&self, index: u64) -> Result<Bytes, ProviderError> {
        self.inner
            .read()
            .delayed_messages
            .get(index as usize)
            .cloned()
            .ok_or(ProviderError::MissingDelayedMessage(index))
    }

    async fn batch_message_count(&self, batch_number: u64) -> Result<MessageIndex, ProviderError> {
        self.inner
            .read()
            .batches
            .get(batch_number as usize)
            .map(|batch| batch.message_count)
            .ok_or(ProviderError::MissingBatch(batch_number))
    }

    async fn batch_acc(&self, batch_number: u64) -> Result<B256, ProviderError> {
        self.inner
            .read()
            .batches
            .get(batch_number as usize)
            .map(|batch| batch.acc)
            .ok_or(ProviderError::MissingBatch(batch_number))
    }

    async fn batch_count(&self) -> Result<u64, ProviderError> {
        Ok(self.inner.read().batches.len() as u64)
    }
}

#[async_trait::async_trait]
impl InboxReader for MemoryInbox {
    async fn sequencer_message_bytes(&self, batch_number: u64) -> Result<Bytes, ProviderError> {
        self.inner
            .read()
            .batches
            .get(batch_number as usize)
            .map(|batch| batch.data.clone())
            .ok_or(ProviderError::MissingBatch(batch_number))
    }
}

#[async_trait::async_trait]
impl TransactionStreamer for MemoryInbox {
    async fn message(&self, index: MessageIndex) -> Result<MessageWithMetadata, ProviderError> {
        self.inner
            .read()
            .messages
            .get(index as usize)
            .cloned()
            .ok_or(ProviderError::MissingMessage(index))
    }

    async fn genesis_block_number(&self) -> Result<u64, ProviderError> {
        Ok(self.genesis_block_number)
    }
}

/// An in-memory [`DataAvailabilityReader`].
#[derive(Debug, Default)]
pub struct MemoryDataAvailability {
    payloads: RwLock<HashMap<B256, Bytes>>,
}

impl MemoryDataAvailability {
    /// Stores the payload, returning its hash.
    pub fn insert(&self, payload: Bytes) -> B256 {
        let hash = keccak256(&payload);
        self.payloads.write().insert(hash, payload);
        hash
    }

    /// Overwrites the payload stored under the hash.
    pub fn insert_unchecked(&self, hash: B256, payload: Bytes) {
        self.payloads.write().insert(hash, payload);
    }
}

#[async_trait::async_trait]
impl DataAvailabilityReader for MemoryDataAvailability {
    async fn get_by_hash(&self, hash: B256) -> Result<Option<Bytes>, ProviderError> {
        Ok(self.payloads.read().get(&hash).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_should_track_batches() -> eyre::Result<()> {
        let inbox = MemoryInbox::new(0);
        assert_eq!(inbox.batch_count().await?, 0);

        let first = inbox.push_batch(Bytes::from_static(b"first"), 5);
        let second = inbox.push_batch(Bytes::from_static(b"second"), 5);
        assert_eq!((first, second), (0, 1));

        assert_eq!(inbox.batch_count().await?, 2);
        assert_eq!(inbox.batch_message_count(1).await?, 5);
        assert_ne!(inbox.batch_acc(0).await?, inbox.batch_acc(1).await?);
        assert_eq!(inbox.sequencer_message_bytes(1).await?, Bytes::from_static(b"second"));
        assert_eq!(inbox.batch_message_count(2).await, Err(ProviderError::MissingBatch(2)));
        Ok(())
    }

    #[tokio::test]
    async fn test_should_return_delayed_message_bytes() -> eyre::Result<()> {
        let inbox = MemoryInbox::new(0);
        let message = L1IncomingMessage::default();
        assert_eq!(inbox.push_delayed_message(&message), 0);

        let bytes = inbox.delayed_message_bytes(0).await?;
        assert_eq!(alloy_rlp::decode_exact::<L1IncomingMessage>(&bytes)?, message);
        assert_eq!(
            inbox.delayed_message_bytes(1).await,
            Err(ProviderError::MissingDelayedMessage(1))
        );
        Ok(())
    }

    #[test]
    fn test_should_serve_canonical_headers() -> eyre::Result<()> {
        let chain = MemoryBlockchain::new(ChainConfig::new(412_346, 0));
        let header = Header { number: 3, ..Default::default() };
        let hash = chain.insert_header(header.clone());

        assert_eq!(chain.header_by_number(3)?, Some(header.clone()));
        assert_eq!(chain.header_by_hash(hash)?, Some(header));
        assert_eq!(chain.header_by_number(4)?, None);
        assert_eq!(chain.config().chain_id, 412_346);
        Ok(())
    }
}
