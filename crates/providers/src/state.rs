use crate::ProviderError;

use alloy_consensus::Header;
use alloy_primitives::{Bytes, B256};
use rollup_validator_primitives::ChainConfig;

/// The prefix of the keys under which contract code is stored.
pub const CODE_PREFIX: &[u8] = b"c";

/// Returns the key under which the code with the provided hash is stored.
pub fn code_key(hash: B256) -> Vec<u8> {
    let mut key = Vec::with_capacity(CODE_PREFIX.len() + 32);
    key.extend_from_slice(CODE_PREFIX);
    key.extend_from_slice(hash.as_slice());
    key
}

/// A read-only view over the state trie and the code store, as seen by the state-transition
/// function.
#[auto_impl::auto_impl(&, Arc)]
pub trait StateView: Send + Sync {
    /// Returns the trie node with the provided hash.
    fn node(&self, hash: B256) -> Result<Option<Bytes>, ProviderError>;

    /// Returns the code with the provided hash.
    fn code(&self, hash: B256) -> Result<Option<Bytes>, ProviderError>;
}

/// The historical headers visible to the state-transition function.
#[auto_impl::auto_impl(&, Arc)]
pub trait ChainContext: Send + Sync {
    /// Returns the header with the provided hash.
    fn header_by_hash(&self, hash: B256) -> Result<Option<Header>, ProviderError>;
}

/// The local chain.
#[auto_impl::auto_impl(&, Arc)]
pub trait Blockchain: ChainContext {
    /// Returns the canonical header at the provided number.
    fn header_by_number(&self, number: u64) -> Result<Option<Header>, ProviderError>;

    /// Returns the locally configured chain config.
    fn config(&self) -> &ChainConfig;
}

/// The trie node and key-value store backing the state.
#[auto_impl::auto_impl(&, Arc)]
pub trait StateDatabase: Send + Sync {
    /// Returns the trie node with the provided hash.
    fn node(&self, hash: B256) -> Result<Option<Bytes>, ProviderError>;

    /// Returns the value stored under the provided key.
    fn get(&self, key: &[u8]) -> Result<Option<Bytes>, ProviderError>;

    /// Increments the reference count of the state root, preventing its collection.
    fn reference(&self, root: B256) -> Result<(), ProviderError>;

    /// Decrements the reference count of the state root.
    fn dereference(&self, root: B256);
}

/// A reference on a state root held for the lifetime of the guard.
pub struct PinnedState<'a> {
    database: &'a dyn StateDatabase,
    root: B256,
}

impl<'a> PinnedState<'a> {
    /// Pins the state root in the database until the returned guard is dropped.
    pub fn new(database: &'a dyn StateDatabase, root: B256) -> Result<Self, ProviderError> {
        database.reference(root)?;
        Ok(Self { database, root })
    }

    /// Returns the pinned state root.
    pub const fn root(&self) -> B256 {
        self.root
    }
}

impl Drop for PinnedState<'_> {
    fn drop(&mut self) {
        self.database.dereference(self.root);
    }
}

impl std::fmt::Debug for PinnedState<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PinnedState").field("root", &self.root).finish()
    }
}
