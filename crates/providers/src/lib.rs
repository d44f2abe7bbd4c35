//! The crate exposes the collaborators consumed by the stateless block validator: the inbox, the
//! state database, the blockchain and the state-transition function.

pub use da::DataAvailabilityReader;
mod da;

pub use error::{ProviderError, StateTransitionError};
mod error;

pub use inbox::{InboxReader, InboxTracker, TransactionStreamer};
mod inbox;

pub use state::{
    code_key, Blockchain, ChainContext, PinnedState, StateDatabase, StateView, CODE_PREFIX,
};
mod state;

pub use transition::{BatchFetcher, StateTransition};
mod transition;

/// Test utilities for the providers.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
