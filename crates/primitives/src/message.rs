//! Inbox message types consumed by the state-transition function.

use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_rlp::{RlpDecodable, RlpEncodable};

/// The index of a message in the rollup inbox.
pub type MessageIndex = u64;

/// A message carrying L2 transactions.
pub const L1_MESSAGE_TYPE_L2_MESSAGE: u8 = 3;
/// A message ending the current block.
pub const L1_MESSAGE_TYPE_END_OF_BLOCK: u8 = 6;
/// A message carrying L2 transactions funded by L1.
pub const L1_MESSAGE_TYPE_L2_FUNDED_BY_L1: u8 = 7;
/// A rollup event message.
pub const L1_MESSAGE_TYPE_ROLLUP_EVENT: u8 = 8;
/// A retryable ticket submission.
pub const L1_MESSAGE_TYPE_SUBMIT_RETRYABLE: u8 = 9;
/// A batch used for gas estimation.
pub const L1_MESSAGE_TYPE_BATCH_FOR_GAS_ESTIMATION: u8 = 10;
/// The chain initialization message.
pub const L1_MESSAGE_TYPE_INITIALIZE: u8 = 11;
/// An eth deposit from L1.
pub const L1_MESSAGE_TYPE_ETH_DEPOSIT: u8 = 12;
/// A report of a posted batch, referencing the batch by its sequence number.
pub const L1_MESSAGE_TYPE_BATCH_POSTING_REPORT: u8 = 13;
/// An invalid message.
pub const L1_MESSAGE_TYPE_INVALID: u8 = 0xFF;

/// The header of a message delivered to the rollup inbox.
#[derive(Debug, Default, Clone, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct L1IncomingMessageHeader {
    /// The kind of message.
    pub kind: u8,
    /// The poster of the message.
    pub poster: Address,
    /// The L1 block number at which the message was posted.
    pub block_number: u64,
    /// The L1 timestamp at which the message was posted.
    pub timestamp: u64,
    /// The request id of delayed messages, zero otherwise.
    pub request_id: B256,
    /// The L1 base fee at the time of posting.
    pub l1_base_fee: U256,
}

/// A message delivered to the rollup inbox.
#[derive(Debug, Default, Clone, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct L1IncomingMessage {
    /// The message header.
    pub header: L1IncomingMessageHeader,
    /// The message payload.
    pub l2_msg: Bytes,
}

impl L1IncomingMessage {
    /// Returns the hash of the RLP encoded message.
    pub fn hash(&self) -> B256 {
        keccak256(alloy_rlp::encode(self))
    }
}

/// An inbox message along with the count of delayed messages read after its execution.
#[derive(Debug, Default, Clone, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct MessageWithMetadata {
    /// The message.
    pub message: L1IncomingMessage,
    /// The total count of delayed messages read once this message is executed.
    pub delayed_messages_read: u64,
}

impl MessageWithMetadata {
    /// Returns a new instance of [`MessageWithMetadata`].
    pub const fn new(message: L1IncomingMessage, delayed_messages_read: u64) -> Self {
        Self { message, delayed_messages_read }
    }
}

/// Returns the count of messages required to produce the provided block, or `None` if the block
/// precedes the genesis block or the count overflows.
pub const fn block_number_to_message_count(
    block_number: u64,
    genesis_block_number: u64,
) -> Option<u64> {
    match block_number.checked_add(1) {
        Some(count) => count.checked_sub(genesis_block_number),
        None => None,
    }
}

/// Returns the number of the block produced by the message count, or `None` for a zero count on
/// a chain starting at block 0 or on overflow.
pub const fn message_count_to_block_number(
    message_count: u64,
    genesis_block_number: u64,
) -> Option<u64> {
    match message_count.checked_add(genesis_block_number) {
        Some(number) => number.checked_sub(1),
        None => None,
    }
}
