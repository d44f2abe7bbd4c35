use crate::{
    ExecutionMachine, MachineError, MachineFactory, MachineKind, PreimageError, PreimageResolver,
    PreimageStateView,
};
use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use alloy_primitives::{b256, Bytes, B256};
use rollup_validator_primitives::{
    delayed_messages_read,
    sequencer::{header_byte, is_das_message_header_byte},
    DataAvailabilityCertificate, GlobalState, HeaderInfo, HeaderInfoError, L1IncomingMessage,
    MessageWithMetadata, SequencerMessageError, SequencerMessageHeader,
    SEQUENCER_MESSAGE_HEADER_LEN,
};
use rollup_validator_providers::{
    test_utils::{decode_batch_messages, TestStateTransition},
    ChainContext, ProviderError, StateTransitionError,
};

/// The module root of the current test build.
pub const TEST_MODULE_ROOT: B256 =
    b256!("0x1111111111111111111111111111111111111111111111111111111111111111");

/// The module root of the pending test build.
pub const TEST_PENDING_MODULE_ROOT: B256 =
    b256!("0x2222222222222222222222222222222222222222222222222222222222222222");

/// The count of steps the interpreter takes to replay a block.
pub const INTERPRETER_STEPS_PER_BLOCK: u64 = 3;

#[derive(Debug, thiserror::Error)]
enum ReplayError {
    #[error("missing sequencer message for batch {0}")]
    MissingBatch(u64),
    #[error("missing message {position} in batch {batch}")]
    MissingMessage { batch: u64, position: u64 },
    #[error("missing delayed message {0}")]
    MissingDelayedMessage(u64),
    #[error("missing header {0}")]
    MissingHeader(B256),
    #[error(transparent)]
    Sequencer(#[from] SequencerMessageError),
    #[error(transparent)]
    Preimage(#[from] PreimageError),
    #[error(transparent)]
    Decode(#[from] alloy_rlp::Error),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Transition(#[from] StateTransitionError),
    #[error(transparent)]
    HeaderInfo(#[from] HeaderInfoError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MachineStatus {
    Running,
    Finished,
    Errored,
}

/// A machine replaying a single message of a batch with the [`TestStateTransition`].
///
/// The interpreter needs [`INTERPRETER_STEPS_PER_BLOCK`] steps to finish while the JIT finishes
/// on its first step. A faulty machine corrupts the block hash it reaches.
#[derive(Clone)]
pub struct ReplayMachine {
    kind: MachineKind,
    faulty: bool,
    failing: bool,
    status: MachineStatus,
    steps: u64,
    global_state: GlobalState,
    sequencer_messages: BTreeMap<u64, Bytes>,
    delayed_messages: BTreeMap<u64, Bytes>,
    resolver: Option<Arc<dyn PreimageResolver>>,
}

impl std::fmt::Debug for ReplayMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplayMachine")
            .field("kind", &self.kind)
            .field("faulty", &self.faulty)
            .field("failing", &self.failing)
            .field("status", &self.status)
            .field("steps", &self.steps)
            .field("global_state", &self.global_state)
            .field("sequencer_messages", &self.sequencer_messages.keys())
            .field("delayed_messages", &self.delayed_messages.keys())
            .finish_non_exhaustive()
    }
}

impl ReplayMachine {
    /// Returns a new [`ReplayMachine`] in its initial state.
    pub fn new(kind: MachineKind, faulty: bool) -> Self {
        Self {
            kind,
            faulty,
            failing: false,
            status: MachineStatus::Running,
            steps: 0,
            global_state: GlobalState::default(),
            sequencer_messages: BTreeMap::new(),
            delayed_messages: BTreeMap::new(),
            resolver: None,
        }
    }

    /// Makes every step of the machine fail.
    pub const fn with_failing_steps(mut self) -> Self {
        self.failing = true;
        self
    }

    const fn ensure_not_started(&self) -> Result<(), MachineError> {
        if self.steps > 0 {
            return Err(MachineError::NotRunning)
        }
        Ok(())
    }

    fn batch_messages(
        batch: &Bytes,
        resolver: &dyn PreimageResolver,
    ) -> Result<Vec<MessageWithMetadata>, ReplayError> {
        SequencerMessageHeader::decode(batch)?;
        let payload = match header_byte(batch) {
            Some(byte) if is_das_message_header_byte(byte) => {
                let certificate =
                    DataAvailabilityCertificate::decode(&batch[SEQUENCER_MESSAGE_HEADER_LEN..])?;
                resolver.resolve(certificate.data_hash)?
            }
            Some(_) => batch.slice(SEQUENCER_MESSAGE_HEADER_LEN + 1..),
            None => return Ok(Vec::new()),
        };
        Ok(decode_batch_messages(&payload)?)
    }

    fn execute(&self, resolver: Arc<dyn PreimageResolver>) -> Result<GlobalState, ReplayError> {
        let state = self.global_state;
        let batch = self
            .sequencer_messages
            .get(&state.batch)
            .ok_or(ReplayError::MissingBatch(state.batch))?;
        let messages = Self::batch_messages(batch, &*resolver)?;
        let entry = messages.get(state.position_in_batch as usize).ok_or(
            ReplayError::MissingMessage { batch: state.batch, position: state.position_in_batch },
        )?;

        let view = PreimageStateView::new(resolver);
        let prev = view
            .header_by_hash(state.block_hash)?
            .ok_or(ReplayError::MissingHeader(state.block_hash))?;

        let read = delayed_messages_read(&prev);
        let message = if entry.delayed_messages_read > read {
            let bytes = self
                .delayed_messages
                .get(&read)
                .ok_or(ReplayError::MissingDelayedMessage(read))?;
            alloy_rlp::decode_exact::<L1IncomingMessage>(bytes)?
        } else {
            entry.message.clone()
        };

        let reported_batch = TestStateTransition::reported_batch(&message)
            .and_then(|batch_number| self.sequencer_messages.get(&batch_number));
        let (header, _) = TestStateTransition.apply(
            &message,
            entry.delayed_messages_read,
            Some(&prev),
            &view,
            &view,
            reported_batch,
        )?;

        let mut block_hash = header.hash_slow();
        if self.faulty {
            block_hash.0[0] ^= 0xff;
        }
        let last_in_batch = state.position_in_batch + 1 == messages.len() as u64;
        Ok(GlobalState::new(
            state.position().next(last_in_batch),
            block_hash,
            HeaderInfo::from_header(&header)?.send_root,
        ))
    }
}

impl ExecutionMachine for ReplayMachine {
    fn set_global_state(&mut self, state: GlobalState) -> Result<(), MachineError> {
        self.ensure_not_started()?;
        self.global_state = state;
        Ok(())
    }

    fn add_sequencer_inbox_message(
        &mut self,
        batch_number: u64,
        data: Bytes,
    ) -> Result<(), MachineError> {
        self.ensure_not_started()?;
        self.sequencer_messages.insert(batch_number, data);
        Ok(())
    }

    fn add_delayed_inbox_message(&mut self, index: u64, data: Bytes) -> Result<(), MachineError> {
        self.ensure_not_started()?;
        self.delayed_messages.insert(index, data);
        Ok(())
    }

    fn set_preimage_resolver(
        &mut self,
        resolver: Arc<dyn PreimageResolver>,
    ) -> Result<(), MachineError> {
        self.ensure_not_started()?;
        self.resolver = Some(resolver);
        Ok(())
    }

    fn step(&mut self, count: u64) -> Result<(), MachineError> {
        if self.status != MachineStatus::Running {
            return Ok(())
        }
        let resolver = self.resolver.clone().ok_or(MachineError::ResolverNotSet)?;
        if self.failing {
            return Err(MachineError::Other(format!("{} machine failed to step", self.kind)))
        }

        let required = match self.kind {
            MachineKind::Interpreter => INTERPRETER_STEPS_PER_BLOCK,
            MachineKind::Jit => 1,
        };
        self.steps = self.steps.saturating_add(count);
        if self.steps < required {
            return Ok(())
        }

        match self.execute(resolver) {
            Ok(state) => {
                self.global_state = state;
                self.status = MachineStatus::Finished;
            }
            Err(err) => {
                tracing::debug!(target: "scroll::validator::machine", kind = %self.kind, %err, "replay failed");
                self.status = MachineStatus::Errored;
            }
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.status == MachineStatus::Running
    }

    fn is_errored(&self) -> bool {
        self.status == MachineStatus::Errored
    }

    fn global_state(&self) -> GlobalState {
        self.global_state
    }

    fn clone_machine(&self) -> Box<dyn ExecutionMachine> {
        Box::new(self.clone())
    }
}

/// A [`MachineFactory`] building [`ReplayMachine`]s for the test module roots.
#[derive(Debug, Default)]
pub struct TestMachineFactory {
    faulty: Option<MachineKind>,
    failing: Option<MachineKind>,
    builds: AtomicUsize,
}

impl TestMachineFactory {
    /// Returns a factory whose machines of the provided kind are faulty.
    pub fn faulty(kind: MachineKind) -> Self {
        Self { faulty: Some(kind), ..Default::default() }
    }

    /// Returns a factory whose machines of the provided kind fail to step.
    pub fn failing(kind: MachineKind) -> Self {
        Self { failing: Some(kind), ..Default::default() }
    }

    /// Returns the count of machines built.
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::Relaxed)
    }
}

impl MachineFactory for TestMachineFactory {
    fn build(
        &self,
        module_root: B256,
        kind: MachineKind,
    ) -> Result<Box<dyn ExecutionMachine>, MachineError> {
        if module_root != TEST_MODULE_ROOT && module_root != TEST_PENDING_MODULE_ROOT {
            return Err(MachineError::UnknownModuleRoot(module_root))
        }
        self.builds.fetch_add(1, Ordering::Relaxed);
        let machine = ReplayMachine::new(kind, self.faulty == Some(kind));
        if self.failing == Some(kind) {
            return Ok(Box::new(machine.with_failing_steps()))
        }
        Ok(Box::new(machine))
    }

    fn latest_module_root(&self) -> Result<B256, MachineError> {
        Ok(TEST_MODULE_ROOT)
    }
}
