use crate::{ChainContext, ProviderError, StateTransitionError, StateView};

use alloy_consensus::Header;
use alloy_primitives::{Bytes, B256};
use rollup_validator_primitives::{ChainConfig, L1IncomingMessage, SystemState};

/// An instance of the trait fetches the sequencer batches read by the state-transition function.
#[async_trait::async_trait]
pub trait BatchFetcher: Send + Sync {
    /// Returns the sequencer message of the batch.
    async fn fetch_batch(&self, batch_number: u64) -> Result<Bytes, ProviderError>;
}

/// The state-transition function of the rollup.
///
/// Implementations must be deterministic: the produced header only depends on the provided
/// arguments and on the data read through the state view, the chain context and the batch
/// fetcher.
#[async_trait::async_trait]
#[auto_impl::auto_impl(Arc)]
pub trait StateTransition: Send + Sync {
    /// Opens the system state at the provided state root.
    fn system_state(
        &self,
        view: &dyn StateView,
        state_root: B256,
    ) -> Result<SystemState, StateTransitionError>;

    /// Produces the block resulting from applying the message on top of the parent header.
    #[allow(clippy::too_many_arguments)]
    async fn produce_block(
        &self,
        message: &L1IncomingMessage,
        delayed_messages_read: u64,
        prev_header: Option<&Header>,
        view: &dyn StateView,
        chain_context: &dyn ChainContext,
        chain_config: &ChainConfig,
        batch_fetcher: &dyn BatchFetcher,
    ) -> Result<Header, StateTransitionError>;
}
