use crate::ValidationError;
use std::collections::HashMap;

use alloy_primitives::{keccak256, Bytes, B256};
use rollup_validator_primitives::{
    sequencer::{header_byte, is_das_message_header_byte},
    BatchInfo, DataAvailabilityCertificate, SequencerMessageHeader, SEQUENCER_MESSAGE_HEADER_LEN,
};
use rollup_validator_providers::DataAvailabilityReader;

/// The minimum lifetime of a data availability certificate past the batch timestamps.
pub const MIN_LIFETIME_SECONDS_FOR_DAS_CERT: u64 = 7 * 24 * 60 * 60;

/// Recovers the payload of a sequencer message carrying a data availability certificate,
/// recording the keyset and the payload into the preimages.
///
/// Returns `None` if the certificate expires too early to be trusted.
pub async fn recover_payload_from_das_batch(
    batch_number: u64,
    sequencer_message: &[u8],
    das: &dyn DataAvailabilityReader,
    preimages: &mut HashMap<B256, Bytes>,
) -> Result<Option<Bytes>, ValidationError> {
    let header = SequencerMessageHeader::decode(sequencer_message)?;
    let certificate =
        DataAvailabilityCertificate::decode(&sequencer_message[SEQUENCER_MESSAGE_HEADER_LEN..])?;

    if certificate.timeout < header.max_timestamp.saturating_add(MIN_LIFETIME_SECONDS_FOR_DAS_CERT)
    {
        tracing::warn!(
            target: "scroll::validator::das",
            batch_number,
            timeout = certificate.timeout,
            max_timestamp = header.max_timestamp,
            "data availability certificate expires too early, ignoring"
        );
        return Ok(None)
    }

    let keyset = fetch_verified(das, certificate.keyset_hash).await?;
    preimages.insert(certificate.keyset_hash, keyset);

    let payload = fetch_verified(das, certificate.data_hash).await?;
    preimages.insert(certificate.data_hash, payload.clone());
    Ok(Some(payload))
}

/// Scans the batches for data availability certificates and returns the preimages of the
/// certified payloads.
///
/// Without a reader, certificates are logged and skipped unless the chain requires a
/// committee.
pub async fn preimages_from_batches(
    batches: &[BatchInfo],
    das: Option<&dyn DataAvailabilityReader>,
    requires_committee: bool,
) -> Result<HashMap<B256, Bytes>, ValidationError> {
    let mut preimages = HashMap::new();
    for batch in batches {
        if !header_byte(&batch.data).is_some_and(is_das_message_header_byte) {
            continue
        }
        match das {
            Some(das) => {
                recover_payload_from_das_batch(batch.number, &batch.data, das, &mut preimages)
                    .await?;
            }
            None => {
                tracing::error!(target: "scroll::validator::das", batch_number = batch.number, "no data availability reader configured, but sequencer message found with a certificate");
                if requires_committee {
                    return Err(ValidationError::MissingDataAvailabilityReader)
                }
            }
        }
    }
    Ok(preimages)
}

async fn fetch_verified(
    das: &dyn DataAvailabilityReader,
    hash: B256,
) -> Result<Bytes, ValidationError> {
    let preimage =
        das.get_by_hash(hash).await?.ok_or(ValidationError::MissingDasPreimage(hash))?;
    let actual = keccak256(&preimage);
    if actual != hash {
        return Err(ValidationError::DasHashMismatch { expected: hash, actual })
    }
    Ok(preimage)
}
