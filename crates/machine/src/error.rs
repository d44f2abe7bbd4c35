use alloy_primitives::B256;
use rollup_validator_providers::ProviderError;

/// An error occurring when resolving a preimage.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PreimageError {
    /// No source holds the preimage.
    #[error("preimage not found for hash {0}")]
    NotFound(B256),
    /// An error at one of the preimage sources.
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// An error occurring at an execution machine or its loader.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MachineError {
    /// No machine can be built for the module root.
    #[error("unknown module root {0}")]
    UnknownModuleRoot(B256),
    /// The machine was stepped before a preimage resolver was installed.
    #[error("preimage resolver not set")]
    ResolverNotSet,
    /// The machine was configured after it started running.
    #[error("machine is not in its initial state")]
    NotRunning,
    /// Other error.
    #[error("{0}")]
    Other(String),
}
