use crate::{ExecutionMachine, MachineError, MachineKind};
use std::num::NonZeroUsize;

use alloy_primitives::B256;
use lru::LruCache;
use parking_lot::Mutex;

/// The default count of base machines kept by the [`CachingMachineLoader`].
pub const DEFAULT_MACHINE_CACHE_SIZE: usize = 4;

/// An instance of the trait builds the base machine of a module root.
#[auto_impl::auto_impl(&, Arc)]
pub trait MachineFactory: Send + Sync {
    /// Builds a machine in its initial state for the module root.
    fn build(
        &self,
        module_root: B256,
        kind: MachineKind,
    ) -> Result<Box<dyn ExecutionMachine>, MachineError>;

    /// Returns the module root of the latest available build.
    fn latest_module_root(&self) -> Result<B256, MachineError>;
}

/// An instance of the trait hands out fresh machines for a module root.
#[auto_impl::auto_impl(&, Arc)]
pub trait MachineLoader: Send + Sync {
    /// Returns a machine in its initial state for the module root.
    fn machine(
        &self,
        module_root: B256,
        kind: MachineKind,
    ) -> Result<Box<dyn ExecutionMachine>, MachineError>;

    /// Prepares the machine for the module root ahead of its first use.
    fn create_machine(&self, module_root: B256, kind: MachineKind) -> Result<(), MachineError>;

    /// Returns the module root of the latest available build.
    fn latest_module_root(&self) -> Result<B256, MachineError>;
}

/// A [`MachineLoader`] building every base machine once and handing out clones of it.
#[derive(Debug)]
pub struct CachingMachineLoader<F> {
    factory: F,
    cache: Mutex<LruCache<(B256, MachineKind), Box<dyn ExecutionMachine>>>,
}

impl<F: MachineFactory> CachingMachineLoader<F> {
    /// Returns a new [`CachingMachineLoader`] keeping up to `capacity` base machines.
    pub fn new(factory: F, capacity: NonZeroUsize) -> Self {
        Self { factory, cache: Mutex::new(LruCache::new(capacity)) }
    }

    /// Returns the count of cached base machines.
    pub fn cached(&self) -> usize {
        self.cache.lock().len()
    }

    fn base_machine(
        &self,
        module_root: B256,
        kind: MachineKind,
    ) -> Result<Box<dyn ExecutionMachine>, MachineError> {
        let mut cache = self.cache.lock();
        if let Some(machine) = cache.get(&(module_root, kind)) {
            return Ok(machine.clone_machine())
        }

        tracing::debug!(target: "scroll::validator::machine", %module_root, %kind, "building machine");
        let machine = self.factory.build(module_root, kind)?;
        let clone = machine.clone_machine();
        cache.put((module_root, kind), machine);
        Ok(clone)
    }
}

impl<F: MachineFactory> MachineLoader for CachingMachineLoader<F> {
    fn machine(
        &self,
        module_root: B256,
        kind: MachineKind,
    ) -> Result<Box<dyn ExecutionMachine>, MachineError> {
        self.base_machine(module_root, kind)
    }

    fn create_machine(&self, module_root: B256, kind: MachineKind) -> Result<(), MachineError> {
        self.base_machine(module_root, kind).map(|_| ())
    }

    fn latest_module_root(&self) -> Result<B256, MachineError> {
        self.factory.latest_module_root()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{TestMachineFactory, TEST_MODULE_ROOT};
    use std::sync::Arc;

    #[test]
    fn test_should_build_base_machine_once() -> eyre::Result<()> {
        let factory = Arc::new(TestMachineFactory::default());
        let loader = CachingMachineLoader::new(factory.clone(), NonZeroUsize::new(1).unwrap());

        loader.create_machine(TEST_MODULE_ROOT, MachineKind::Jit)?;
        let machine = loader.machine(TEST_MODULE_ROOT, MachineKind::Jit)?;
        assert!(machine.is_running());
        assert_eq!(factory.builds(), 1);

        loader.machine(TEST_MODULE_ROOT, MachineKind::Interpreter)?;
        loader.machine(TEST_MODULE_ROOT, MachineKind::Jit)?;
        assert_eq!(factory.builds(), 3);
        assert_eq!(loader.cached(), 1);
        Ok(())
    }

    #[test]
    fn test_should_reject_unknown_module_root() {
        let loader = CachingMachineLoader::new(
            TestMachineFactory::default(),
            NonZeroUsize::new(DEFAULT_MACHINE_CACHE_SIZE).unwrap(),
        );
        let root = B256::repeat_byte(0x42);

        assert_eq!(
            loader.machine(root, MachineKind::Interpreter).unwrap_err(),
            MachineError::UnknownModuleRoot(root)
        );
        assert_eq!(loader.cached(), 0);
        assert_eq!(loader.latest_module_root(), Ok(TEST_MODULE_ROOT));
    }
}
