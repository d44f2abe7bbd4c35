use crate::GlobalStatePosition;
use alloy_primitives::{keccak256, B256};

/// The externally observable state fingerprint both execution backends must reproduce.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct GlobalState {
    /// The batch number.
    pub batch: u64,
    /// The position in the batch.
    pub position_in_batch: u64,
    /// The hash of the last produced block.
    pub block_hash: B256,
    /// The send root of the last produced block.
    pub send_root: B256,
}

impl GlobalState {
    /// Returns a new instance of [`GlobalState`] at the provided position.
    pub const fn new(position: GlobalStatePosition, block_hash: B256, send_root: B256) -> Self {
        Self {
            batch: position.batch_number,
            position_in_batch: position.position_in_batch,
            block_hash,
            send_root,
        }
    }

    /// Returns the inbox position of the global state.
    pub const fn position(&self) -> GlobalStatePosition {
        GlobalStatePosition::new(self.batch, self.position_in_batch)
    }

    /// Returns the commitment to the global state.
    pub fn hash(&self) -> B256 {
        let mut data = Vec::with_capacity(13 + 32 + 32 + 8 + 8);
        data.extend_from_slice(b"Global state:");
        data.extend_from_slice(self.block_hash.as_slice());
        data.extend_from_slice(self.send_root.as_slice());
        data.extend_from_slice(&self.batch.to_be_bytes());
        data.extend_from_slice(&self.position_in_batch.to_be_bytes());
        keccak256(data)
    }
}
