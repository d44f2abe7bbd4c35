use crate::ProviderError;

use alloy_primitives::{Bytes, B256};

/// An instance of the trait can read payloads stored with a data availability committee.
#[async_trait::async_trait]
#[auto_impl::auto_impl(Arc)]
pub trait DataAvailabilityReader: Send + Sync {
    /// Returns the payload stored under the provided keccak hash.
    async fn get_by_hash(&self, hash: B256) -> Result<Option<Bytes>, ProviderError>;
}
