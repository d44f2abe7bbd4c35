//! End-to-end tests of the stateless block validator over a test chain.

use std::sync::Arc;

use alloy_primitives::{Bytes, B256};
use rollup_validator::{
    test_utils::{TestChain, TEST_CHAIN_ID},
    FatalError, PendingModuleRoot, StatelessValidatorArgs, ValidationEntry, ValidationError,
};
use rollup_validator_machine::{
    test_utils::{TestMachineFactory, TEST_MODULE_ROOT, TEST_PENDING_MODULE_ROOT},
    MachineError, MachineKind,
};
use rollup_validator_primitives::{
    message::L1_MESSAGE_TYPE_ETH_DEPOSIT, ChainConfig, GlobalStatePosition,
};
use rollup_validator_providers::test_utils::{MemoryBlockchain, MemoryStateDatabase};

const UNKNOWN_MODULE_ROOT: B256 = B256::repeat_byte(0x33);

fn chain() -> TestChain {
    TestChain::new(ChainConfig::new(TEST_CHAIN_ID, 0))
}

fn both_backends() -> StatelessValidatorArgs {
    StatelessValidatorArgs { interpreter: true, ..Default::default() }
}

#[tokio::test]
async fn test_should_validate_blocks_with_both_backends() -> eyre::Result<()> {
    let mut chain = chain();
    let first = chain.produce_block(Bytes::from_static(b"first"))?;
    let second = chain.produce_block(Bytes::from_static(b"second"))?;
    chain.post_batch();
    let third = chain.produce_block(Bytes::from_static(b"third"))?;
    chain.post_batch();

    let validator = chain.validator(&both_backends()).await?;
    for header in [&first, &second, &third] {
        for kind in MachineKind::ALL {
            assert!(validator.validate_block(header, kind, TEST_MODULE_ROOT).await?);
        }
        assert!(validator.cross_validate_block(header, TEST_MODULE_ROOT).await?);
    }
    assert!(validator.validate_block_by_number(2, MachineKind::Jit, TEST_MODULE_ROOT).await?);
    Ok(())
}

#[tokio::test]
async fn test_interpreter_should_yield_between_step_batches() -> eyre::Result<()> {
    let mut chain = chain();
    let header = chain.produce_block(Bytes::from_static(b"tx"))?;
    chain.post_batch();

    let args =
        StatelessValidatorArgs { interpreter: true, step_batch_size: 1, ..Default::default() };
    let validator = chain.validator(&args).await?;
    assert!(validator.validate_block(&header, MachineKind::Interpreter, TEST_MODULE_ROOT).await?);
    Ok(())
}

#[tokio::test]
async fn test_should_validate_delayed_message_blocks() -> eyre::Result<()> {
    let mut chain = chain();
    let deposit = TestChain::incoming_message(
        L1_MESSAGE_TYPE_ETH_DEPOSIT,
        chain.head().timestamp + 1,
        Bytes::from_static(b"deposit"),
    );
    let delayed = chain.produce_delayed_block(deposit)?;
    let next = chain.produce_block(Bytes::from_static(b"tx"))?;
    chain.post_batch();

    let validator = chain.validator(&both_backends()).await?;
    assert!(validator.cross_validate_block(&delayed, TEST_MODULE_ROOT).await?);
    assert!(validator.cross_validate_block(&next, TEST_MODULE_ROOT).await?);
    Ok(())
}

#[tokio::test]
async fn test_should_validate_batch_posting_reports() -> eyre::Result<()> {
    let mut chain = chain();
    chain.produce_block(Bytes::from_static(b"tx"))?;
    let reported = chain.post_batch();
    let report = chain.produce_report_block(reported)?;
    chain.post_batch();

    let validator = chain.validator(&StatelessValidatorArgs::default()).await?;
    assert!(validator.validate_block(&report, MachineKind::Jit, TEST_MODULE_ROOT).await?);
    Ok(())
}

#[tokio::test]
async fn test_should_skip_empty_batches() -> eyre::Result<()> {
    let mut chain = chain();
    chain.post_batch();
    chain.post_batch();
    let header = chain.produce_block(Bytes::from_static(b"tx"))?;
    chain.post_batch();

    let validator = chain.validator(&StatelessValidatorArgs::default()).await?;
    assert!(validator.validate_block(&header, MachineKind::Jit, TEST_MODULE_ROOT).await?);
    Ok(())
}

#[tokio::test]
async fn test_should_validate_data_availability_batches() -> eyre::Result<()> {
    let mut chain =
        TestChain::new(ChainConfig::new(TEST_CHAIN_ID, 0).with_data_availability_committee(true));
    let header = chain.produce_block(Bytes::from_static(b"tx"))?;
    chain.post_das_batch();

    let validator = chain.validator(&both_backends()).await?;
    assert!(validator.cross_validate_block(&header, TEST_MODULE_ROOT).await?);
    Ok(())
}

#[tokio::test]
async fn test_should_require_data_availability_reader_on_committee_chain() -> eyre::Result<()> {
    let mut chain =
        TestChain::new(ChainConfig::new(TEST_CHAIN_ID, 0).with_data_availability_committee(true));
    let header = chain.produce_block(Bytes::from_static(b"tx"))?;
    chain.post_das_batch();

    let mut providers = chain.providers();
    providers.data_availability = None;
    let validator = chain
        .validator_with(providers, TestMachineFactory::default(), &Default::default(), None)
        .await?;

    let err = validator.validate_block(&header, MachineKind::Jit, TEST_MODULE_ROOT).await;
    assert!(matches!(err, Err(ValidationError::MissingDataAvailabilityReader)));
    Ok(())
}

#[tokio::test]
async fn test_should_not_validate_without_data_availability_payload() -> eyre::Result<()> {
    let mut chain = chain();
    let header = chain.produce_block(Bytes::from_static(b"tx"))?;
    chain.post_das_batch();

    let mut providers = chain.providers();
    providers.data_availability = None;
    let validator = chain
        .validator_with(providers, TestMachineFactory::default(), &Default::default(), None)
        .await?;

    let result = validator.validate_block(&header, MachineKind::Jit, TEST_MODULE_ROOT).await;
    assert!(matches!(result, Err(ValidationError::MachineErrored { block_number: 1 })));
    Ok(())
}

#[tokio::test]
async fn test_corrupted_preimage_should_never_validate() -> eyre::Result<()> {
    let mut chain = chain();
    let prev = chain.head().clone();
    let header = chain.produce_block(Bytes::from_static(b"tx"))?;
    chain.post_batch();
    let validator = chain.validator(&StatelessValidatorArgs::default()).await?;

    let message = chain.message(1).await?;
    let mut entry = ValidationEntry::new(Some(prev), header, Some(message));
    entry.record(validator.recorder(), true).await?;
    let start = GlobalStatePosition::new(0, 1);
    let batch = chain.sequencer_message(0).await?;
    entry.add_sequencer_message(start, start.next(true), batch, None, false).await?;
    let ready = entry.into_ready()?;

    let (end, _) = validator.execute_block(&ready, TEST_MODULE_ROOT, MachineKind::Jit).await?;
    assert_eq!(end, ready.expected_end()?);

    for hash in ready.preimages.keys().copied().collect::<Vec<_>>() {
        let mut corrupted = ready.clone();
        let preimage = corrupted.preimages.get_mut(&hash).expect("preimage exists");
        let mut bytes = preimage.to_vec();
        bytes[0] ^= 0xff;
        *preimage = bytes.into();

        match validator.execute_block(&corrupted, TEST_MODULE_ROOT, MachineKind::Jit).await {
            Ok((end, _)) => assert_ne!(end, corrupted.expected_end()?),
            Err(err) => assert!(matches!(err, ValidationError::MachineErrored { .. })),
        }
    }
    Ok(())
}

#[tokio::test]
async fn test_should_replay_offline_from_recorded_preimages() -> eyre::Result<()> {
    let mut chain = chain();
    chain.produce_block(Bytes::from_static(b"first"))?;
    let prev = chain.head().clone();
    let header = chain.produce_block(Bytes::from_static(b"second"))?;
    chain.post_batch();

    let validator = chain.validator(&StatelessValidatorArgs::default()).await?;
    let message = chain.message(2).await?;
    let mut entry = ValidationEntry::new(Some(prev), header.clone(), Some(message));
    entry.record(validator.recorder(), true).await?;
    let start = GlobalStatePosition::new(0, 2);
    let batch = chain.sequencer_message(0).await?;
    entry.add_sequencer_message(start, start.next(true), batch, None, false).await?;
    let ready = entry.into_ready()?;

    let mut offline = chain.providers();
    offline.state_database = Arc::new(MemoryStateDatabase::default());
    offline.blockchain = Arc::new(MemoryBlockchain::new(*chain.config()));
    let offline = chain
        .validator_with(offline, TestMachineFactory::default(), &Default::default(), None)
        .await?;

    let (end, _) = offline.execute_block(&ready, TEST_MODULE_ROOT, MachineKind::Jit).await?;
    assert_eq!(end.block_hash, header.hash_slow());
    assert_eq!(end, ready.expected_end()?);
    Ok(())
}

#[tokio::test]
async fn test_chain_id_mismatch_should_be_fatal() -> eyre::Result<()> {
    let mut chain = TestChain::with_genesis_chain_id(ChainConfig::new(TEST_CHAIN_ID, 0), 1);
    let header = chain.produce_block(Bytes::from_static(b"tx"))?;
    chain.post_batch();

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let validator = chain
        .validator_with(
            chain.providers(),
            TestMachineFactory::default(),
            &Default::default(),
            Some(tx),
        )
        .await?;

    let err =
        validator.validate_block(&header, MachineKind::Jit, TEST_MODULE_ROOT).await.unwrap_err();
    assert!(err.is_fatal());
    let expected = FatalError::ChainIdMismatch { expected: TEST_CHAIN_ID, actual: 1 };
    assert!(matches!(&err, ValidationError::Fatal(fatal) if *fatal == expected));
    assert_eq!(rx.try_recv()?, expected);
    assert_eq!(chain.state_database().total_references(), 0);
    Ok(())
}

#[tokio::test]
async fn test_should_release_pins() -> eyre::Result<()> {
    let mut chain = chain();
    let header = chain.produce_block(Bytes::from_static(b"tx"))?;
    chain.post_batch();
    let validator = chain.validator(&StatelessValidatorArgs::default()).await?;

    assert!(validator.validate_block(&header, MachineKind::Jit, TEST_MODULE_ROOT).await?);
    assert_eq!(chain.state_database().total_references(), 0);

    let mut tampered = header.clone();
    tampered.gas_used += 1;
    let err = validator.validate_block(&tampered, MachineKind::Jit, TEST_MODULE_ROOT).await;
    assert!(matches!(err, Err(ValidationError::BlockHashMismatch { block_number: 1, .. })));
    assert_eq!(chain.state_database().total_references(), 0);
    Ok(())
}

#[tokio::test]
async fn test_should_report_backend_mismatch() -> eyre::Result<()> {
    let mut chain = chain();
    let header = chain.produce_block(Bytes::from_static(b"tx"))?;
    chain.post_batch();

    let validator = chain
        .validator_with(
            chain.providers(),
            TestMachineFactory::faulty(MachineKind::Interpreter),
            &both_backends(),
            None,
        )
        .await?;

    assert!(validator.validate_block(&header, MachineKind::Jit, TEST_MODULE_ROOT).await?);
    assert!(!validator.validate_block(&header, MachineKind::Interpreter, TEST_MODULE_ROOT).await?);
    let err = validator.cross_validate_block(&header, TEST_MODULE_ROOT).await;
    assert!(matches!(err, Err(ValidationError::BackendMismatch { .. })));
    Ok(())
}

#[tokio::test]
async fn test_should_propagate_machine_step_errors() -> eyre::Result<()> {
    let mut chain = chain();
    let header = chain.produce_block(Bytes::from_static(b"tx"))?;
    chain.post_batch();

    let validator = chain
        .validator_with(
            chain.providers(),
            TestMachineFactory::failing(MachineKind::Jit),
            &both_backends(),
            None,
        )
        .await?;

    assert!(validator.validate_block(&header, MachineKind::Interpreter, TEST_MODULE_ROOT).await?);
    let err = validator.validate_block(&header, MachineKind::Jit, TEST_MODULE_ROOT).await;
    assert!(matches!(err, Err(ValidationError::Machine(MachineError::Other(_)))));
    let err = validator.cross_validate_block(&header, TEST_MODULE_ROOT).await;
    assert!(matches!(err, Err(ValidationError::Machine(MachineError::Other(_)))));
    Ok(())
}

#[tokio::test]
async fn test_should_reject_unposted_and_unknown_blocks() -> eyre::Result<()> {
    let mut chain = chain();
    let header = chain.produce_block(Bytes::from_static(b"tx"))?;
    let validator = chain.validator(&StatelessValidatorArgs::default()).await?;

    let err = validator.validate_block(&header, MachineKind::Jit, TEST_MODULE_ROOT).await;
    assert!(matches!(
        err,
        Err(ValidationError::MessageNotInBatches { message_index: 1, batch_count: 0 })
    ));

    let err = validator.validate_block_by_number(7, MachineKind::Jit, TEST_MODULE_ROOT).await;
    assert!(matches!(err, Err(ValidationError::MissingHeader(7))));

    chain.post_batch();
    let err = validator.validate_block(&header, MachineKind::Jit, UNKNOWN_MODULE_ROOT).await;
    assert!(matches!(err, Err(ValidationError::Machine(_))));
    Ok(())
}

#[tokio::test]
async fn test_should_reject_block_numbers_without_message_index() -> eyre::Result<()> {
    let mut chain = TestChain::new(ChainConfig::new(TEST_CHAIN_ID, 5));
    let header = chain.produce_block(Bytes::from_static(b"tx"))?;
    chain.post_batch();
    let validator = chain.validator(&StatelessValidatorArgs::default()).await?;
    assert!(validator.validate_block(&header, MachineKind::Jit, TEST_MODULE_ROOT).await?);

    let mut last = header.clone();
    last.number = u64::MAX;
    let err = validator.validate_block(&last, MachineKind::Jit, TEST_MODULE_ROOT).await;
    assert!(matches!(
        err,
        Err(ValidationError::InvalidBlockNumber { block_number: u64::MAX, genesis_block_number: 5 })
    ));

    let mut early = header;
    early.number = 2;
    let err = validator.validate_block(&early, MachineKind::Jit, TEST_MODULE_ROOT).await;
    assert!(matches!(
        err,
        Err(ValidationError::InvalidBlockNumber { block_number: 2, genesis_block_number: 5 })
    ));
    Ok(())
}

#[tokio::test]
async fn test_should_track_module_roots() -> eyre::Result<()> {
    let mut chain = chain();
    let header = chain.produce_block(Bytes::from_static(b"tx"))?;
    chain.post_batch();

    let validator = chain.validator(&StatelessValidatorArgs::default()).await?;
    assert_eq!(validator.module_roots_to_validate(), vec![TEST_MODULE_ROOT]);

    let args = StatelessValidatorArgs {
        pending_upgrade_module_root: Some(PendingModuleRoot::Latest),
        ..Default::default()
    };
    let validator = chain.validator(&args).await?;
    assert_eq!(validator.module_roots_to_validate(), vec![TEST_MODULE_ROOT]);

    let args = StatelessValidatorArgs {
        pending_upgrade_module_root: Some(PendingModuleRoot::Root(TEST_PENDING_MODULE_ROOT)),
        ..both_backends()
    };
    let validator = chain.validator(&args).await?;
    assert_eq!(
        validator.module_roots_to_validate(),
        vec![TEST_MODULE_ROOT, TEST_PENDING_MODULE_ROOT]
    );
    for module_root in validator.module_roots_to_validate() {
        assert!(validator.validate_block(&header, MachineKind::Jit, module_root).await?);
    }

    validator.set_current_module_root(TEST_PENDING_MODULE_ROOT);
    assert_eq!(validator.module_roots_to_validate(), vec![TEST_PENDING_MODULE_ROOT]);

    let args = StatelessValidatorArgs {
        pending_upgrade_module_root: Some(PendingModuleRoot::Root(UNKNOWN_MODULE_ROOT)),
        ..Default::default()
    };
    let err = chain.validator(&args).await;
    assert!(matches!(err, Err(ValidationError::Machine(_))));
    Ok(())
}

#[tokio::test]
async fn test_should_build_machines_once() -> eyre::Result<()> {
    let mut chain = chain();
    let header = chain.produce_block(Bytes::from_static(b"tx"))?;
    chain.post_batch();

    let factory = Arc::new(TestMachineFactory::default());
    let args = both_backends();
    let loader = Arc::new(args.machine_loader(factory.clone()));
    let validator =
        rollup_validator::StatelessBlockValidator::new(chain.providers(), loader, &args, None)
            .await?;
    assert_eq!(factory.builds(), 2);

    for _ in 0..3 {
        assert!(validator.cross_validate_block(&header, TEST_MODULE_ROOT).await?);
    }
    assert_eq!(factory.builds(), 2);
    Ok(())
}
