//! The execution backends of the stateless block validator.
//!
//! A backend replays the state-transition function from a starting [`GlobalState`], reading the
//! batches and delayed messages it was fed and resolving every other input through a
//! [`PreimageResolver`]. Backends are built per module root and [`MachineKind`] by a
//! [`MachineLoader`].
//!
//! [`GlobalState`]: rollup_validator_primitives::GlobalState

pub use error::{MachineError, PreimageError};
mod error;

pub use kind::MachineKind;
mod kind;

pub use loader::{CachingMachineLoader, MachineFactory, MachineLoader, DEFAULT_MACHINE_CACHE_SIZE};
mod loader;

pub use machine::{ExecutionMachine, PreimageResolver};
mod machine;

pub use view::PreimageStateView;
mod view;

/// Test utilities for the execution backends.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
