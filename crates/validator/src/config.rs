use std::{num::NonZeroUsize, str::FromStr};

use alloy_primitives::B256;
use rollup_validator_machine::{
    CachingMachineLoader, MachineFactory, MachineKind, DEFAULT_MACHINE_CACHE_SIZE,
};

/// The default count of steps a backend runs between two yields.
pub const DEFAULT_STEP_BATCH_SIZE: u64 = 500_000_000;

/// The module root of the pending upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingModuleRoot {
    /// The module root of the latest available build.
    Latest,
    /// An explicit module root.
    Root(B256),
}

impl FromStr for PendingModuleRoot {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "latest" {
            return Ok(Self::Latest)
        }
        let root = B256::from_str(s).map_err(|err| format!("invalid module root {s:?}: {err}"))?;
        if root.is_zero() {
            return Err("pending module root cannot be zero".to_string())
        }
        Ok(Self::Root(root))
    }
}

/// The stateless block validator arguments.
#[derive(Debug, Clone, clap::Args)]
pub struct StatelessValidatorArgs {
    /// The module root of the pending upgrade, or `latest` for the latest available build.
    #[arg(long = "validator.pending-upgrade-module-root", value_name = "MODULE_ROOT")]
    pub pending_upgrade_module_root: Option<PendingModuleRoot>,
    /// Whether blocks are validated with the interpreter backend.
    #[arg(long = "validator.interpreter", num_args=0..=1, default_value_t = false)]
    pub interpreter: bool,
    /// Whether blocks are validated with the JIT backend.
    #[arg(long = "validator.jit", num_args=0..=1, default_value_t = true)]
    pub jit: bool,
    /// The count of steps a backend runs between two yields.
    #[arg(long = "validator.step-batch-size", default_value_t = DEFAULT_STEP_BATCH_SIZE)]
    pub step_batch_size: u64,
    /// The count of base machines kept in memory.
    #[arg(long = "validator.machine-cache-size", default_value_t = DEFAULT_MACHINE_CACHE_SIZE)]
    pub machine_cache_size: usize,
}

impl Default for StatelessValidatorArgs {
    fn default() -> Self {
        Self {
            pending_upgrade_module_root: None,
            interpreter: false,
            jit: true,
            step_batch_size: DEFAULT_STEP_BATCH_SIZE,
            machine_cache_size: DEFAULT_MACHINE_CACHE_SIZE,
        }
    }
}

impl StatelessValidatorArgs {
    /// Validates the arguments.
    pub fn validate(&self) -> Result<(), String> {
        if !self.interpreter && !self.jit {
            return Err("at least one of the interpreter or the JIT backend must be enabled".into())
        }
        if self.step_batch_size == 0 {
            return Err("step batch size must be positive".into())
        }
        if self.machine_cache_size == 0 {
            return Err("machine cache size must be positive".into())
        }
        Ok(())
    }

    /// Returns the enabled backends.
    pub fn enabled_kinds(&self) -> Vec<MachineKind> {
        MachineKind::ALL
            .into_iter()
            .filter(|kind| match kind {
                MachineKind::Interpreter => self.interpreter,
                MachineKind::Jit => self.jit,
            })
            .collect()
    }

    /// Returns a [`CachingMachineLoader`] over the factory sized by the arguments.
    pub fn machine_loader<F: MachineFactory>(&self, factory: F) -> CachingMachineLoader<F> {
        let capacity = NonZeroUsize::new(self.machine_cache_size).unwrap_or(NonZeroUsize::MIN);
        CachingMachineLoader::new(factory, capacity)
    }
}
