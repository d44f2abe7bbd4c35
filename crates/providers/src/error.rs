use alloy_primitives::B256;
use rollup_validator_primitives::HeaderInfoError;

/// An error occurring at one of the providers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// The batch is unknown to the inbox.
    #[error("missing batch {0}")]
    MissingBatch(u64),
    /// The delayed message is unknown to the inbox.
    #[error("missing delayed message {0}")]
    MissingDelayedMessage(u64),
    /// The message is unknown to the transaction streamer.
    #[error("missing message {0}")]
    MissingMessage(u64),
    /// The state for the root is not available.
    #[error("missing state for root {0}")]
    MissingState(B256),
    /// The preimage found for the hash does not hash to it.
    #[error("invalid preimage for hash {0}")]
    InvalidPreimage(B256),
    /// An RLP decoding error.
    #[error(transparent)]
    Decode(#[from] alloy_rlp::Error),
    /// Other error.
    #[error("{0}")]
    Other(String),
}

/// An error returned by the state-transition function.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateTransitionError {
    /// A trie node required by the transition is missing from the state view.
    #[error("missing state node {0}")]
    MissingNode(B256),
    /// A code blob required by the transition is missing from the state view.
    #[error("missing code {0}")]
    MissingCode(B256),
    /// A header required by the transition is missing from the chain context.
    #[error("missing header {0}")]
    MissingHeader(B256),
    /// The transition was invoked without a parent header.
    #[error("missing parent header")]
    MissingParentHeader,
    /// The state node does not hash to its key.
    #[error("invalid state node {0}")]
    InvalidNode(B256),
    /// The code blob does not hash to its key.
    #[error("invalid code {0}")]
    InvalidCode(B256),
    /// An RLP decoding error.
    #[error(transparent)]
    Decode(#[from] alloy_rlp::Error),
    /// The batch referenced by a message could not be fetched.
    #[error("failed to fetch batch {batch_number}: {source}")]
    BatchFetch {
        /// The number of the batch.
        batch_number: u64,
        /// The error returned by the fetcher.
        source: ProviderError,
    },
    /// The parent header holds malformed rollup information.
    #[error(transparent)]
    HeaderInfo(#[from] HeaderInfoError),
    /// An error at the state view or chain context.
    #[error(transparent)]
    Provider(#[from] ProviderError),
    /// Other error.
    #[error("{0}")]
    Other(String),
}
