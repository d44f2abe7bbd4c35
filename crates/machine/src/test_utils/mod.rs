//! Replay backends running the test state-transition function.

pub use replay::{
    ReplayMachine, TestMachineFactory, INTERPRETER_STEPS_PER_BLOCK, TEST_MODULE_ROOT,
    TEST_PENDING_MODULE_ROOT,
};
mod replay;
