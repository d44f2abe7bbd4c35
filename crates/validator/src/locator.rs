use crate::ValidationError;

use rollup_validator_primitives::{GlobalStatePosition, MessageIndex};
use rollup_validator_providers::InboxTracker;

/// Returns the batch containing the message, searching the batches `0..batch_count`.
///
/// The cumulative message counts of the batches are non-decreasing; batches which posted no
/// messages share the count of their predecessor and never contain a message.
pub async fn find_batch_containing_message_index(
    tracker: &dyn InboxTracker,
    message_index: MessageIndex,
    batch_count: u64,
) -> Result<u64, ValidationError> {
    // invariants: count(low - 1) <= message_index and count(high) > message_index.
    let mut low = 0;
    let mut high = batch_count;
    while low < high {
        let mid = low + (high - low) / 2;
        let count = tracker.batch_message_count(mid).await?;
        if count <= message_index {
            low = mid + 1;
        } else if mid == low {
            return Ok(mid)
        } else {
            high = mid;
        }
    }

    if low < batch_count {
        return Ok(low)
    }
    Err(ValidationError::MessageNotInBatches { message_index, batch_count })
}

/// Returns the start and end positions of the message in the batch.
pub async fn global_state_positions_for(
    tracker: &dyn InboxTracker,
    message_index: MessageIndex,
    batch_number: u64,
) -> Result<(GlobalStatePosition, GlobalStatePosition), ValidationError> {
    let first_message = match batch_number.checked_sub(1) {
        Some(prev) => tracker.batch_message_count(prev).await?,
        None => 0,
    };
    let message_count = tracker.batch_message_count(batch_number).await?;

    if message_count <= message_index {
        return Err(ValidationError::MessageAfterBatch {
            message_index,
            batch_number,
            message_count,
        })
    }
    if first_message > message_index {
        return Err(ValidationError::MessageBeforeBatch {
            message_index,
            batch_number,
            first_message,
        })
    }

    let start = GlobalStatePosition::new(batch_number, message_index - first_message);
    let end = start.next(message_index + 1 == message_count);
    Ok((start, end))
}
