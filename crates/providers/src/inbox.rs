use crate::ProviderError;

use alloy_primitives::{Bytes, B256};
use rollup_validator_primitives::{MessageIndex, MessageWithMetadata};

/// An instance of the trait tracks the batches and delayed messages posted to the inbox.
#[async_trait::async_trait]
#[auto_impl::auto_impl(Arc)]
pub trait InboxTracker: Send + Sync {
    /// Returns the serialized delayed message at the provided index.
    async fn delayed_message_bytes(&self, index: u64) -> Result<Bytes, ProviderError>;

    /// Returns the cumulative count of messages posted up to and including the batch.
    async fn batch_message_count(&self, batch_number: u64) -> Result<MessageIndex, ProviderError>;

    /// Returns the accumulator of the batch.
    async fn batch_acc(&self, batch_number: u64) -> Result<B256, ProviderError>;

    /// Returns the count of batches posted to the inbox.
    async fn batch_count(&self) -> Result<u64, ProviderError>;
}

/// An instance of the trait reads the raw sequencer messages posted to the inbox.
#[async_trait::async_trait]
#[auto_impl::auto_impl(Arc)]
pub trait InboxReader: Send + Sync {
    /// Returns the sequencer message posted for the batch.
    async fn sequencer_message_bytes(&self, batch_number: u64) -> Result<Bytes, ProviderError>;
}

/// An instance of the trait streams the messages executed by the node.
#[async_trait::async_trait]
#[auto_impl::auto_impl(Arc)]
pub trait TransactionStreamer: Send + Sync {
    /// Returns the message at the provided index.
    async fn message(&self, index: MessageIndex) -> Result<MessageWithMetadata, ProviderError>;

    /// Returns the number of the block produced by the first message.
    async fn genesis_block_number(&self) -> Result<u64, ProviderError>;
}
