use crate::{PreimageError, PreimageResolver};

use alloy_consensus::Header;
use alloy_primitives::{Bytes, B256};
use rollup_validator_providers::{ChainContext, ProviderError, StateView};

/// A [`StateView`] and [`ChainContext`] served purely from preimages.
///
/// This is the view the state-transition function runs against inside an execution machine:
/// trie nodes and code are resolved by hash, headers are decoded from their RLP encoding and only
/// accepted when they hash to the requested hash.
#[derive(Debug)]
pub struct PreimageStateView<R> {
    resolver: R,
}

impl<R: PreimageResolver> PreimageStateView<R> {
    /// Returns a new [`PreimageStateView`] over the resolver.
    pub const fn new(resolver: R) -> Self {
        Self { resolver }
    }

    fn preimage(&self, hash: B256) -> Result<Option<Bytes>, ProviderError> {
        match self.resolver.resolve(hash) {
            Ok(preimage) => Ok(Some(preimage)),
            Err(PreimageError::NotFound(_)) => Ok(None),
            Err(PreimageError::Provider(err)) => Err(err),
        }
    }
}

impl<R: PreimageResolver> StateView for PreimageStateView<R> {
    fn node(&self, hash: B256) -> Result<Option<Bytes>, ProviderError> {
        self.preimage(hash)
    }

    fn code(&self, hash: B256) -> Result<Option<Bytes>, ProviderError> {
        self.preimage(hash)
    }
}

impl<R: PreimageResolver> ChainContext for PreimageStateView<R> {
    fn header_by_hash(&self, hash: B256) -> Result<Option<Header>, ProviderError> {
        let Some(encoded) = self.preimage(hash)? else { return Ok(None) };
        let header: Header = alloy_rlp::decode_exact(&encoded)?;
        if header.hash_slow() != hash {
            return Err(ProviderError::InvalidPreimage(hash))
        }
        Ok(Some(header))
    }
}
