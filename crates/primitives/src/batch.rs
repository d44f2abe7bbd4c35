use alloy_primitives::Bytes;

/// The raw bytes a sequencer published for one batch.
///
/// Ownership of the data passes to the validation entry once the batch has been recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchInfo {
    /// The sequence number of the batch.
    pub number: u64,
    /// The serialized sequencer message.
    pub data: Bytes,
}

impl BatchInfo {
    /// Returns a new instance of [`BatchInfo`].
    pub const fn new(number: u64, data: Bytes) -> Self {
        Self { number, data }
    }
}
