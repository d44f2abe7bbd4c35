use crate::{
    BatchFetcher, ChainContext, ProviderError, StateTransition, StateTransitionError, StateView,
};

use alloy_consensus::Header;
use alloy_primitives::{keccak256, Bytes, B256, B64};
use alloy_rlp::{RlpDecodable, RlpEncodable};
use rollup_validator_primitives::{
    message::{L1_MESSAGE_TYPE_BATCH_POSTING_REPORT, L1_MESSAGE_TYPE_L2_MESSAGE},
    ChainConfig, HeaderInfo, L1IncomingMessage, SystemState,
};

/// The base fee of the blocks produced by the [`TestStateTransition`].
pub const TEST_BASE_FEE: u64 = 100_000_000;

/// The format version written in the headers produced by the [`TestStateTransition`].
pub const TEST_ARBOS_FORMAT_VERSION: u64 = 31;

/// The single state node of the [`TestStateTransition`], stored under the state root.
#[derive(Debug, Default, Clone, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct TestStateNode {
    /// The chain id.
    pub chain_id: u64,
    /// The genesis block number.
    pub genesis_block_number: u64,
    /// The count of messages applied.
    pub message_count: u64,
    /// The accumulator over the applied messages.
    pub accumulator: B256,
    /// The hash of the code executed for every message.
    pub code_hash: B256,
}

impl TestStateNode {
    /// Returns the genesis node.
    pub const fn genesis(chain_id: u64, genesis_block_number: u64, code_hash: B256) -> Self {
        Self { chain_id, genesis_block_number, message_count: 0, accumulator: B256::ZERO, code_hash }
    }

    /// Returns the encoded node.
    pub fn encode(&self) -> Bytes {
        alloy_rlp::encode(self).into()
    }

    /// Returns the state root of the node.
    pub fn root(&self) -> B256 {
        keccak256(self.encode())
    }
}

/// A deterministic state-transition function over a single state node.
///
/// Every transition reads the state node and the code through the state view, checking both
/// against their hashes, reads the grandparent header through the chain context and, for batch
/// posting reports, the reported batch through the batch fetcher. L2 messages extend the send
/// root.
#[derive(Debug, Default, Clone, Copy)]
pub struct TestStateTransition;

impl TestStateTransition {
    /// Loads and verifies the state node stored under the root.
    pub fn load_node(
        view: &dyn StateView,
        root: B256,
    ) -> Result<TestStateNode, StateTransitionError> {
        let node = view.node(root)?.ok_or(StateTransitionError::MissingNode(root))?;
        if keccak256(&node) != root {
            return Err(StateTransitionError::InvalidNode(root))
        }
        Ok(alloy_rlp::decode_exact(&node)?)
    }

    /// Returns the number of the batch reported by the message, if any.
    pub fn reported_batch(message: &L1IncomingMessage) -> Option<u64> {
        if message.header.kind != L1_MESSAGE_TYPE_BATCH_POSTING_REPORT {
            return None
        }
        let bytes: [u8; 8] = message.l2_msg.get(..8)?.try_into().ok()?;
        Some(u64::from_be_bytes(bytes))
    }

    /// Applies the message on top of the parent header, returning the produced header and the
    /// new state node.
    ///
    /// The batch must be provided when the message reports one.
    pub fn apply(
        &self,
        message: &L1IncomingMessage,
        delayed_messages_read: u64,
        prev_header: Option<&Header>,
        view: &dyn StateView,
        chain_context: &dyn ChainContext,
        batch: Option<&Bytes>,
    ) -> Result<(Header, Bytes), StateTransitionError> {
        let prev = prev_header.ok_or(StateTransitionError::MissingParentHeader)?;
        let node = Self::load_node(view, prev.state_root)?;

        let code = view
            .code(node.code_hash)?
            .ok_or(StateTransitionError::MissingCode(node.code_hash))?;
        if keccak256(&code) != node.code_hash {
            return Err(StateTransitionError::InvalidCode(node.code_hash))
        }

        let mut preimage = node.accumulator.to_vec();
        preimage.extend_from_slice(message.hash().as_slice());

        if prev.number > node.genesis_block_number {
            let ancestor = chain_context
                .header_by_hash(prev.parent_hash)?
                .ok_or(StateTransitionError::MissingHeader(prev.parent_hash))?;
            preimage.extend_from_slice(ancestor.hash_slow().as_slice());
        }

        if let Some(batch_number) = Self::reported_batch(message) {
            let batch = batch.ok_or(StateTransitionError::BatchFetch {
                batch_number,
                source: ProviderError::MissingBatch(batch_number),
            })?;
            preimage.extend_from_slice(keccak256(batch).as_slice());
        }

        let next = TestStateNode {
            message_count: node.message_count + 1,
            accumulator: keccak256(preimage),
            ..node
        };

        let mut info = HeaderInfo::from_header(prev)?;
        if message.header.kind == L1_MESSAGE_TYPE_L2_MESSAGE {
            let mut preimage = info.send_root.to_vec();
            preimage.extend_from_slice(message.hash().as_slice());
            info.send_root = keccak256(preimage);
            info.send_count += 1;
        }
        info.l1_block_number = message.header.block_number;
        info.arbos_format_version = TEST_ARBOS_FORMAT_VERSION;

        let mut header = Header {
            parent_hash: prev.hash_slow(),
            beneficiary: message.header.poster,
            state_root: next.root(),
            number: prev.number + 1,
            gas_limit: prev.gas_limit,
            timestamp: prev.timestamp.max(message.header.timestamp),
            nonce: B64::from(delayed_messages_read.to_be_bytes()),
            base_fee_per_gas: Some(TEST_BASE_FEE),
            ..Default::default()
        };
        info.apply_to(&mut header);

        Ok((header, next.encode()))
    }
}

#[async_trait::async_trait]
impl StateTransition for TestStateTransition {
    fn system_state(
        &self,
        view: &dyn StateView,
        state_root: B256,
    ) -> Result<SystemState, StateTransitionError> {
        let node = Self::load_node(view, state_root)?;
        Ok(SystemState {
            chain_id: node.chain_id,
            genesis_block_number: node.genesis_block_number,
        })
    }

    async fn produce_block(
        &self,
        message: &L1IncomingMessage,
        delayed_messages_read: u64,
        prev_header: Option<&Header>,
        view: &dyn StateView,
        chain_context: &dyn ChainContext,
        _chain_config: &ChainConfig,
        batch_fetcher: &dyn BatchFetcher,
    ) -> Result<Header, StateTransitionError> {
        let batch = match Self::reported_batch(message) {
            Some(batch_number) => Some(
                batch_fetcher
                    .fetch_batch(batch_number)
                    .await
                    .map_err(|source| StateTransitionError::BatchFetch { batch_number, source })?,
            ),
            None => None,
        };
        let (header, _) = self.apply(
            message,
            delayed_messages_read,
            prev_header,
            view,
            chain_context,
            batch.as_ref(),
        )?;
        Ok(header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        test_utils::{MemoryBlockchain, MemoryStateDatabase},
        Blockchain,
    };
    use parking_lot::Mutex;

    #[derive(Debug, Default)]
    struct TestBatchFetcher {
        fetched: Mutex<Vec<u64>>,
    }

    #[async_trait::async_trait]
    impl BatchFetcher for TestBatchFetcher {
        async fn fetch_batch(&self, batch_number: u64) -> Result<Bytes, ProviderError> {
            self.fetched.lock().push(batch_number);
            if batch_number == 0 {
                Ok(Bytes::from_static(b"batch 0"))
            } else {
                Err(ProviderError::MissingBatch(batch_number))
            }
        }
    }

    fn genesis(database: &MemoryStateDatabase) -> Header {
        let code_hash = database.insert_code(Bytes::from_static(b"code"));
        let root = database.insert_node(TestStateNode::genesis(1, 0, code_hash).encode());
        Header { state_root: root, base_fee_per_gas: Some(TEST_BASE_FEE), ..Default::default() }
    }

    fn l2_message(timestamp: u64) -> L1IncomingMessage {
        let mut message = L1IncomingMessage::default();
        message.header.kind = L1_MESSAGE_TYPE_L2_MESSAGE;
        message.header.timestamp = timestamp;
        message.l2_msg = Bytes::from_static(&[0xde, 0xad]);
        message
    }

    #[tokio::test]
    async fn test_should_produce_deterministic_blocks() -> eyre::Result<()> {
        let database = MemoryStateDatabase::default();
        let chain = MemoryBlockchain::default();
        let genesis = genesis(&database);
        let fetcher = TestBatchFetcher::default();
        let message = l2_message(10);

        let header = TestStateTransition
            .produce_block(
                &message,
                0,
                Some(&genesis),
                &database,
                &chain,
                chain.config(),
                &fetcher,
            )
            .await?;
        let (again, node) =
            TestStateTransition.apply(&message, 0, Some(&genesis), &database, &chain, None)?;

        assert_eq!(header, again);
        assert_eq!(header.number, 1);
        assert_eq!(header.parent_hash, genesis.hash_slow());
        assert_eq!(header.state_root, keccak256(&node));

        let info = HeaderInfo::from_header(&header)?;
        assert_eq!(info.send_count, 1);
        assert_ne!(info.send_root, B256::ZERO);
        assert!(fetcher.fetched.lock().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_should_fetch_reported_batch() -> eyre::Result<()> {
        let database = MemoryStateDatabase::default();
        let chain = MemoryBlockchain::default();
        let genesis = genesis(&database);
        let fetcher = TestBatchFetcher::default();

        let mut report = L1IncomingMessage::default();
        report.header.kind = L1_MESSAGE_TYPE_BATCH_POSTING_REPORT;
        report.l2_msg = Bytes::from(0u64.to_be_bytes().to_vec());
        TestStateTransition
            .produce_block(&report, 0, Some(&genesis), &database, &chain, chain.config(), &fetcher)
            .await?;

        report.l2_msg = Bytes::from(3u64.to_be_bytes().to_vec());
        let err = TestStateTransition
            .produce_block(&report, 0, Some(&genesis), &database, &chain, chain.config(), &fetcher)
            .await
            .unwrap_err();

        assert_eq!(
            err,
            StateTransitionError::BatchFetch {
                batch_number: 3,
                source: ProviderError::MissingBatch(3)
            }
        );
        assert_eq!(*fetcher.fetched.lock(), vec![0, 3]);
        Ok(())
    }

    #[test]
    fn test_should_reject_missing_or_corrupted_state() {
        let database = MemoryStateDatabase::default();
        let chain = MemoryBlockchain::default();
        let genesis = genesis(&database);
        let message = l2_message(10);

        let corrupted = MemoryStateDatabase::default();
        let mut node = TestStateNode::genesis(1, 0, B256::ZERO).encode().to_vec();
        node[1] ^= 0xff;
        let corrupted_root = corrupted.insert_node(node.into());
        let header = Header { state_root: corrupted_root, ..genesis.clone() };
        assert!(matches!(
            TestStateTransition.apply(&message, 0, Some(&header), &corrupted, &chain, None),
            Err(StateTransitionError::Decode(_))
        ));

        database.remove_node(genesis.state_root);
        assert_eq!(
            TestStateTransition.apply(&message, 0, Some(&genesis), &database, &chain, None),
            Err(StateTransitionError::MissingNode(genesis.state_root))
        );
        assert_eq!(
            TestStateTransition.apply(&message, 0, None, &database, &chain, None),
            Err(StateTransitionError::MissingParentHeader)
        );
    }
}
