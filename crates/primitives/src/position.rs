/// The coordinates of a message within the sequence of batches.
///
/// Positions within a batch are contiguous and start at 0. Crossing a batch boundary resets the
/// position to 0 and increments the batch number.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, derive_more::Display)]
#[display("{batch_number}:{position_in_batch}")]
pub struct GlobalStatePosition {
    /// The batch number.
    pub batch_number: u64,
    /// The position of the message in the batch.
    pub position_in_batch: u64,
}

impl GlobalStatePosition {
    /// Returns a new instance of [`GlobalStatePosition`].
    pub const fn new(batch_number: u64, position_in_batch: u64) -> Self {
        Self { batch_number, position_in_batch }
    }

    /// Returns the position of the following message. If the current message is the last one of
    /// its batch, the next position is the start of the following batch.
    pub const fn next(self, last_in_batch: bool) -> Self {
        if last_in_batch {
            Self::new(self.batch_number + 1, 0)
        } else {
            Self::new(self.batch_number, self.position_in_batch + 1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_position_crosses_batch_boundary() {
        let position = GlobalStatePosition::new(3, 7);
        assert_eq!(position.next(false), GlobalStatePosition::new(3, 8));
        assert_eq!(position.next(true), GlobalStatePosition::new(4, 0));
        assert_eq!(position.to_string(), "3:7");
    }
}
