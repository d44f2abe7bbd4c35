/// The locally configured identity of the rollup chain.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct ChainConfig {
    /// The chain id.
    pub chain_id: u64,
    /// The number of the first block produced by the state-transition function.
    pub genesis_block_number: u64,
    /// Whether the chain posts its batches to a data availability committee.
    pub data_availability_committee: bool,
}

impl ChainConfig {
    /// Returns a new instance of [`ChainConfig`].
    pub const fn new(chain_id: u64, genesis_block_number: u64) -> Self {
        Self { chain_id, genesis_block_number, data_availability_committee: false }
    }

    /// Sets whether the chain requires a data availability committee.
    pub const fn with_data_availability_committee(mut self, committee: bool) -> Self {
        self.data_availability_committee = committee;
        self
    }
}

/// The chain identity as stored in the system state of the state-transition function.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct SystemState {
    /// The chain id.
    pub chain_id: u64,
    /// The genesis block number.
    pub genesis_block_number: u64,
}
