use alloy_primitives::Bytes;
use rollup_validator_primitives::{
    sequencer::BROTLI_MESSAGE_HEADER_BYTE, DataAvailabilityCertificate, MessageWithMetadata,
    SequencerMessageHeader,
};

/// Encodes a sequencer message carrying the messages inline.
pub fn encode_batch(header: &SequencerMessageHeader, messages: &[MessageWithMetadata]) -> Bytes {
    let mut out = header.encode().to_vec();
    out.push(BROTLI_MESSAGE_HEADER_BYTE);
    alloy_rlp::encode_list::<_, MessageWithMetadata>(messages, &mut out);
    out.into()
}

/// Encodes a sequencer message carrying a data availability certificate for the payload
/// returned by [`encode_das_payload`].
pub fn encode_das_batch(
    header: &SequencerMessageHeader,
    certificate: &DataAvailabilityCertificate,
) -> Bytes {
    let mut out = header.encode().to_vec();
    out.extend_from_slice(&certificate.encode());
    out.into()
}

/// Encodes the payload stored with the data availability committee.
pub fn encode_das_payload(messages: &[MessageWithMetadata]) -> Bytes {
    let mut out = Vec::new();
    alloy_rlp::encode_list::<_, MessageWithMetadata>(messages, &mut out);
    out.into()
}

/// Decodes the messages of a batch payload, stripped from its header and header byte.
pub fn decode_batch_messages(payload: &[u8]) -> Result<Vec<MessageWithMetadata>, alloy_rlp::Error> {
    alloy_rlp::decode_exact(payload)
}
