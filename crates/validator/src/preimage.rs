use std::{collections::HashMap, sync::Arc};

use alloy_primitives::{Bytes, B256};
use parking_lot::RwLock;
use rollup_validator_machine::{PreimageError, PreimageResolver};
use rollup_validator_providers::{code_key, Blockchain, StateDatabase};

/// A [`PreimageResolver`] looking up preimages in order in:
/// 1. the explicit preimage map,
/// 2. the state trie nodes,
/// 3. the code store,
/// 4. the historical headers, returned RLP encoded.
///
/// When constructed with a preimage map, the resolver records every preimage found in the
/// other sources into the map, making it sufficient for an offline replay.
pub struct LayeredPreimageResolver {
    preimages: RwLock<HashMap<B256, Bytes>>,
    record: bool,
    state_database: Arc<dyn StateDatabase>,
    blockchain: Arc<dyn Blockchain>,
}

impl LayeredPreimageResolver {
    /// Returns a new [`LayeredPreimageResolver`], recording new preimages if a map is provided.
    pub fn new(
        preimages: Option<HashMap<B256, Bytes>>,
        state_database: Arc<dyn StateDatabase>,
        blockchain: Arc<dyn Blockchain>,
    ) -> Self {
        let record = preimages.is_some();
        Self {
            preimages: RwLock::new(preimages.unwrap_or_default()),
            record,
            state_database,
            blockchain,
        }
    }

    /// Returns true if the resolver records the preimages found outside of its map.
    pub const fn is_recording(&self) -> bool {
        self.record
    }

    /// Consumes the resolver, returning its preimage map.
    pub fn into_preimages(self) -> HashMap<B256, Bytes> {
        self.preimages.into_inner()
    }

    fn lookup(&self, hash: B256) -> Result<Option<Bytes>, PreimageError> {
        if let Some(node) = self.state_database.node(hash)? {
            return Ok(Some(node))
        }
        if let Some(code) = self.state_database.get(&code_key(hash))? {
            return Ok(Some(code))
        }
        Ok(self.blockchain.header_by_hash(hash)?.map(|header| alloy_rlp::encode(&header).into()))
    }
}

impl PreimageResolver for LayeredPreimageResolver {
    fn resolve(&self, hash: B256) -> Result<Bytes, PreimageError> {
        if let Some(preimage) = self.preimages.read().get(&hash) {
            return Ok(preimage.clone())
        }

        let preimage = self.lookup(hash)?.ok_or(PreimageError::NotFound(hash))?;
        tracing::trace!(target: "scroll::validator::preimage", %hash, len = preimage.len(), "resolved preimage");
        if self.record {
            self.preimages.write().insert(hash, preimage.clone());
        }
        Ok(preimage)
    }
}

impl std::fmt::Debug for LayeredPreimageResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayeredPreimageResolver")
            .field("preimages", &self.preimages.read().len())
            .field("record", &self.record)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_consensus::Header;
    use alloy_primitives::keccak256;
    use rollup_validator_primitives::ChainConfig;
    use rollup_validator_providers::test_utils::{MemoryBlockchain, MemoryStateDatabase};

    struct Sources {
        database: Arc<MemoryStateDatabase>,
        chain: Arc<MemoryBlockchain>,
        node: B256,
        code: B256,
        header: B256,
    }

    fn sources() -> Sources {
        let database = Arc::new(MemoryStateDatabase::default());
        let chain = Arc::new(MemoryBlockchain::new(ChainConfig::new(1, 0)));
        let node = database.insert_node(Bytes::from_static(b"node"));
        let code = database.insert_code(Bytes::from_static(b"code"));
        let header = chain.insert_header(Header { number: 1, ..Default::default() });
        Sources { database, chain, node, code, header }
    }

    #[test]
    fn test_should_resolve_every_layer() -> eyre::Result<()> {
        let Sources { database, chain, node, code, header } = sources();
        let explicit = Bytes::from_static(b"explicit");
        let explicit_hash = keccak256(&explicit);

        let resolver = LayeredPreimageResolver::new(
            Some(HashMap::from([(explicit_hash, explicit.clone()), (node, explicit.clone())])),
            database,
            chain,
        );

        assert_eq!(resolver.resolve(explicit_hash)?, explicit);
        // the explicit map shadows the other sources.
        assert_eq!(resolver.resolve(node)?, explicit);
        assert_eq!(resolver.resolve(code)?, Bytes::from_static(b"code"));

        let encoded = resolver.resolve(header)?;
        assert_eq!(keccak256(&encoded), header);

        let missing = B256::repeat_byte(9);
        assert_eq!(resolver.resolve(missing), Err(PreimageError::NotFound(missing)));
        Ok(())
    }

    #[test]
    fn test_should_record_only_with_map() -> eyre::Result<()> {
        let Sources { database, chain, node, code, header } = sources();

        let recording =
            LayeredPreimageResolver::new(Some(HashMap::new()), database.clone(), chain.clone());
        assert!(recording.is_recording());
        for hash in [node, code, header] {
            recording.resolve(hash)?;
        }
        let preimages = recording.into_preimages();
        assert_eq!(preimages.len(), 3);
        assert!(preimages.iter().all(|(hash, preimage)| keccak256(preimage) == *hash));

        let plain = LayeredPreimageResolver::new(None, database, chain);
        assert!(!plain.is_recording());
        plain.resolve(node)?;
        assert!(plain.into_preimages().is_empty());
        Ok(())
    }
}
