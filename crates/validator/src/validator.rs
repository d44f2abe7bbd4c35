use crate::{
    find_batch_containing_message_index, global_state_positions_for, BlockRecorder, FatalError,
    LayeredPreimageResolver, PendingModuleRoot, ReadyEntry, StatelessValidatorArgs,
    StatelessValidatorMetrics, ValidationEntry, ValidationError,
};
use std::{sync::Arc, time::Instant};

use alloy_consensus::Header;
use alloy_primitives::{Bytes, B256};
use parking_lot::Mutex;
use rollup_validator_machine::{MachineKind, MachineLoader};
use rollup_validator_primitives::{block_number_to_message_count, GlobalState};
use rollup_validator_providers::{
    Blockchain, DataAvailabilityReader, InboxReader, InboxTracker, StateDatabase, StateTransition,
    TransactionStreamer,
};
use tokio::sync::mpsc::UnboundedSender;
use tracing::instrument;

/// The collaborators of the [`StatelessBlockValidator`].
#[derive(Clone)]
pub struct ValidatorProviders {
    /// The tracker of the posted batches and delayed messages.
    pub inbox_tracker: Arc<dyn InboxTracker>,
    /// The reader of the sequencer messages.
    pub inbox_reader: Arc<dyn InboxReader>,
    /// The stream of messages producing the blocks.
    pub streamer: Arc<dyn TransactionStreamer>,
    /// The state trie nodes and the code.
    pub state_database: Arc<dyn StateDatabase>,
    /// The canonical chain.
    pub blockchain: Arc<dyn Blockchain>,
    /// The state-transition function.
    pub state_transition: Arc<dyn StateTransition>,
    /// The data availability reader, if the chain posts certificates.
    pub data_availability: Option<Arc<dyn DataAvailabilityReader>>,
}

impl std::fmt::Debug for ValidatorProviders {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatorProviders")
            .field("chain_config", self.blockchain.config())
            .field("data_availability", &self.data_availability.is_some())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy)]
struct ModuleRoots {
    current: B256,
    pending: B256,
}

/// Validates blocks by replaying them in an execution backend from their inputs and the
/// preimages they read, and comparing the reached global state with the one committed to by the
/// block header.
pub struct StatelessBlockValidator {
    providers: ValidatorProviders,
    machine_loader: Arc<dyn MachineLoader>,
    recorder: BlockRecorder,
    genesis_block_number: u64,
    module_roots: Mutex<ModuleRoots>,
    step_batch_size: u64,
    metrics: StatelessValidatorMetrics,
}

impl StatelessBlockValidator {
    /// Returns a new [`StatelessBlockValidator`].
    ///
    /// The current module root is the latest one of the loader. The machines of every module
    /// root to validate are created for the enabled backends.
    pub async fn new(
        providers: ValidatorProviders,
        machine_loader: Arc<dyn MachineLoader>,
        args: &StatelessValidatorArgs,
        fatal_errors: Option<UnboundedSender<FatalError>>,
    ) -> Result<Self, ValidationError> {
        args.validate().map_err(ValidationError::InvalidConfig)?;

        let genesis_block_number = providers.streamer.genesis_block_number().await?;
        let current = machine_loader.latest_module_root()?;
        let pending = match args.pending_upgrade_module_root {
            None => B256::ZERO,
            Some(PendingModuleRoot::Latest) => machine_loader.latest_module_root()?,
            Some(PendingModuleRoot::Root(root)) if root.is_zero() => {
                return Err(ValidationError::InvalidModuleRoot(root.to_string()))
            }
            Some(PendingModuleRoot::Root(root)) => root,
        };

        let mut recorder = BlockRecorder::new(
            providers.state_database.clone(),
            providers.blockchain.clone(),
            providers.inbox_reader.clone(),
            providers.state_transition.clone(),
        );
        if let Some(fatal_errors) = fatal_errors {
            recorder = recorder.with_fatal_errors(fatal_errors);
        }

        let validator = Self {
            providers,
            machine_loader,
            recorder,
            genesis_block_number,
            module_roots: Mutex::new(ModuleRoots { current, pending }),
            step_batch_size: args.step_batch_size,
            metrics: StatelessValidatorMetrics::default(),
        };

        for module_root in validator.module_roots_to_validate() {
            for kind in args.enabled_kinds() {
                validator.machine_loader.create_machine(module_root, kind)?;
            }
        }
        tracing::info!(target: "scroll::validator", %current, %pending, genesis_block_number, "stateless block validator started");

        Ok(validator)
    }

    /// Returns the block recorder of the validator.
    pub const fn recorder(&self) -> &BlockRecorder {
        &self.recorder
    }

    /// Returns the genesis block number of the validated chain.
    pub const fn genesis_block_number(&self) -> u64 {
        self.genesis_block_number
    }

    /// Returns the module roots blocks should be validated against: the current one, and the
    /// pending one if set and distinct.
    pub fn module_roots_to_validate(&self) -> Vec<B256> {
        let roots = *self.module_roots.lock();
        let mut module_roots = vec![roots.current];
        if !roots.pending.is_zero() && roots.pending != roots.current {
            module_roots.push(roots.pending);
        }
        module_roots
    }

    /// Sets the current module root, following an upgrade of the chain.
    pub fn set_current_module_root(&self, module_root: B256) {
        tracing::info!(target: "scroll::validator", %module_root, "updating current module root");
        self.module_roots.lock().current = module_root;
    }

    /// Executes the entry with the backend for the module root, returning the reached global
    /// state and the consumed delayed message, if any.
    pub async fn execute_block(
        &self,
        entry: &ReadyEntry,
        module_root: B256,
        kind: MachineKind,
    ) -> Result<(GlobalState, Option<Bytes>), ValidationError> {
        let started = Instant::now();
        let block_number = entry.context.block_number;

        let mut machine = self.machine_loader.machine(module_root, kind)?;
        let resolver = LayeredPreimageResolver::new(
            Some(entry.preimages.clone()),
            self.providers.state_database.clone(),
            self.providers.blockchain.clone(),
        );
        machine.set_preimage_resolver(Arc::new(resolver))?;
        machine.set_global_state(entry.start()?)?;

        for batch in &entry.batch_info {
            machine.add_sequencer_inbox_message(batch.number, batch.data.clone())?;
        }

        let delayed_message = if entry.context.has_delayed_message {
            let index = entry.context.delayed_message_number;
            let bytes = self.providers.inbox_tracker.delayed_message_bytes(index).await?;
            machine.add_delayed_inbox_message(index, bytes.clone())?;
            Some(bytes)
        } else {
            None
        };

        let mut steps = 0u64;
        while machine.is_running() {
            if let Err(err) = machine.step(self.step_batch_size) {
                tracing::error!(target: "scroll::validator", block_number, %kind, %module_root, %err, "failed to step machine during validation");
                return Err(err.into())
            }
            steps = steps.saturating_add(self.step_batch_size);
            tracing::debug!(target: "scroll::validator", block_number, %kind, steps, "stepped machine");
            tokio::task::yield_now().await;
        }

        if machine.is_errored() {
            tracing::error!(target: "scroll::validator", block_number, %kind, %module_root, "machine entered errored state during validation");
            return Err(ValidationError::MachineErrored { block_number })
        }

        self.metrics.execution_duration.record(started.elapsed().as_secs_f64());
        Ok((machine.global_state(), delayed_message))
    }

    /// Validates the header with the backend for the module root.
    ///
    /// Returns `Ok(false)` if the execution reached a global state different from the one
    /// committed to by the header.
    #[instrument(skip_all, fields(block_number = header.number, %kind, %module_root))]
    pub async fn validate_block(
        &self,
        header: &Header,
        kind: MachineKind,
        module_root: B256,
    ) -> Result<bool, ValidationError> {
        let result = self.try_validate_block(header, kind, module_root).await;
        match &result {
            Ok(true) => self.metrics.validated_blocks.increment(1),
            Ok(false) => self.metrics.invalid_blocks.increment(1),
            Err(err) => {
                tracing::debug!(target: "scroll::validator", ?err, "block validation failed");
                self.metrics.failed_validations.increment(1);
            }
        }
        result
    }

    /// Validates the canonical block with the provided number.
    pub async fn validate_block_by_number(
        &self,
        block_number: u64,
        kind: MachineKind,
        module_root: B256,
    ) -> Result<bool, ValidationError> {
        let header = self
            .providers
            .blockchain
            .header_by_number(block_number)?
            .ok_or(ValidationError::MissingHeader(block_number))?;
        self.validate_block(&header, kind, module_root).await
    }

    /// Validates the header with both backends for the module root, failing if they disagree.
    #[instrument(skip_all, fields(block_number = header.number, %module_root))]
    pub async fn cross_validate_block(
        &self,
        header: &Header,
        module_root: B256,
    ) -> Result<bool, ValidationError> {
        let entry = self.ready_entry_for(header).await?;
        let expected = entry.expected_end()?;

        let (interpreter, _) =
            self.execute_block(&entry, module_root, MachineKind::Interpreter).await?;
        let (jit, _) = self.execute_block(&entry, module_root, MachineKind::Jit).await?;
        if interpreter != jit {
            tracing::error!(target: "scroll::validator", ?interpreter, ?jit, "execution backends disagree");
            return Err(ValidationError::BackendMismatch { interpreter, jit })
        }
        Ok(jit == expected)
    }

    async fn try_validate_block(
        &self,
        header: &Header,
        kind: MachineKind,
        module_root: B256,
    ) -> Result<bool, ValidationError> {
        let entry = self.ready_entry_for(header).await?;
        let expected = entry.expected_end()?;

        let (end, _) = self.execute_block(&entry, module_root, kind).await?;
        if end != expected {
            tracing::warn!(target: "scroll::validator", ?expected, ?end, "block validation failed");
            return Ok(false)
        }
        Ok(true)
    }

    async fn ready_entry_for(&self, header: &Header) -> Result<ReadyEntry, ValidationError> {
        let started = Instant::now();
        let block_number = header.number;
        let message_index = block_number_to_message_count(block_number, self.genesis_block_number)
            .and_then(|count| count.checked_sub(1))
            .ok_or(ValidationError::InvalidBlockNumber {
                block_number,
                genesis_block_number: self.genesis_block_number,
            })?;

        let prev_header = match block_number.checked_sub(1) {
            Some(prev_number) => Some(
                self.providers
                    .blockchain
                    .header_by_number(prev_number)?
                    .ok_or(ValidationError::MissingPrevHeader(block_number))?,
            ),
            None => None,
        };

        let message = self.providers.streamer.message(message_index).await?;
        let data = self
            .recorder
            .block_data_for_validation(header, prev_header.as_ref(), &message, false)
            .await?;

        let tracker = &*self.providers.inbox_tracker;
        let batch_count = tracker.batch_count().await?;
        let batch_number =
            find_batch_containing_message_index(tracker, message_index, batch_count).await?;
        let (start, end) = global_state_positions_for(tracker, message_index, batch_number).await?;

        let mut entry = ValidationEntry::from_validation_data(prev_header, header.clone(), data);
        let sequencer_message =
            self.providers.inbox_reader.sequencer_message_bytes(start.batch_number).await?;
        entry
            .add_sequencer_message(
                start,
                end,
                sequencer_message,
                self.providers.data_availability.as_deref(),
                self.providers.blockchain.config().data_availability_committee,
            )
            .await?;

        self.metrics.record_duration.record(started.elapsed().as_secs_f64());
        entry.into_ready()
    }
}

impl std::fmt::Debug for StatelessBlockValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatelessBlockValidator")
            .field("providers", &self.providers)
            .field("recorder", &self.recorder)
            .field("genesis_block_number", &self.genesis_block_number)
            .field("module_roots", &*self.module_roots.lock())
            .field("step_batch_size", &self.step_batch_size)
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}
