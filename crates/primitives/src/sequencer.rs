//! The sequencer message format: a fixed header followed by a flag byte and the payload.

use alloy_primitives::{Bytes, B256};

/// The length of the header prefixed to every sequencer message.
pub const SEQUENCER_MESSAGE_HEADER_LEN: usize = 40;

/// The payload is stored with a data availability committee and replaced by a certificate.
pub const DAS_MESSAGE_HEADER_FLAG: u8 = 0x80;
/// The payload is authenticated by L1.
pub const L1_AUTHENTICATED_MESSAGE_HEADER_FLAG: u8 = 0x40;
/// The payload is zero-heavy encoded.
pub const ZEROHEAVY_MESSAGE_HEADER_FLAG: u8 = 0x20;
/// The committee stored the payload as a merkle tree.
pub const TREE_DAS_MESSAGE_HEADER_FLAG: u8 = 0x08;
/// The payload is brotli compressed.
pub const BROTLI_MESSAGE_HEADER_BYTE: u8 = 0x00;

/// The serialized length of a [`DataAvailabilityCertificate`], flag byte included.
pub const DATA_AVAILABILITY_CERTIFICATE_LEN: usize = 1 + 32 + 32 + 8 + 8 + 96;

/// Returns true if the header byte marks a data availability certificate.
pub const fn is_das_message_header_byte(header: u8) -> bool {
    header & DAS_MESSAGE_HEADER_FLAG != 0
}

/// Returns the flag byte following the header of the sequencer message, if any.
pub fn header_byte(data: &[u8]) -> Option<u8> {
    data.get(SEQUENCER_MESSAGE_HEADER_LEN).copied()
}

/// An error occurring when decoding a sequencer message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SequencerMessageError {
    /// The sequencer message is shorter than its header.
    #[error("sequencer message of length {0} is shorter than its header")]
    MissingHeader(usize),
    /// The certificate is truncated.
    #[error("data availability certificate of length {0} is truncated")]
    TruncatedCertificate(usize),
    /// The flag byte does not mark a data availability certificate.
    #[error("header byte {0:#04x} is not a data availability certificate")]
    NotACertificate(u8),
}

/// The header of a sequencer message.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct SequencerMessageHeader {
    /// The minimum timestamp of the messages in the batch.
    pub min_timestamp: u64,
    /// The maximum timestamp of the messages in the batch.
    pub max_timestamp: u64,
    /// The minimum L1 block number of the messages in the batch.
    pub min_l1_block: u64,
    /// The maximum L1 block number of the messages in the batch.
    pub max_l1_block: u64,
    /// The count of delayed messages read after the batch.
    pub after_delayed_messages: u64,
}

impl SequencerMessageHeader {
    /// Decodes the header at the start of the sequencer message.
    pub fn decode(data: &[u8]) -> Result<Self, SequencerMessageError> {
        if data.len() < SEQUENCER_MESSAGE_HEADER_LEN {
            return Err(SequencerMessageError::MissingHeader(data.len()))
        }
        let read_u64 = |index: usize| {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&data[index * 8..index * 8 + 8]);
            u64::from_be_bytes(bytes)
        };
        Ok(Self {
            min_timestamp: read_u64(0),
            max_timestamp: read_u64(1),
            min_l1_block: read_u64(2),
            max_l1_block: read_u64(3),
            after_delayed_messages: read_u64(4),
        })
    }

    /// Encodes the header.
    pub fn encode(&self) -> [u8; SEQUENCER_MESSAGE_HEADER_LEN] {
        let mut out = [0u8; SEQUENCER_MESSAGE_HEADER_LEN];
        let fields = [
            self.min_timestamp,
            self.max_timestamp,
            self.min_l1_block,
            self.max_l1_block,
            self.after_delayed_messages,
        ];
        for (chunk, field) in out.chunks_exact_mut(8).zip(fields) {
            chunk.copy_from_slice(&field.to_be_bytes());
        }
        out
    }
}

/// A certificate from the data availability committee standing in for the batch payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataAvailabilityCertificate {
    /// The flag byte of the certificate.
    pub header: u8,
    /// The hash of the committee keyset which signed the certificate.
    pub keyset_hash: B256,
    /// The hash of the stored payload.
    pub data_hash: B256,
    /// The timestamp until which the committee guarantees availability.
    pub timeout: u64,
    /// The mask of the committee members which signed.
    pub signers_mask: u64,
    /// The aggregated signature of the signers.
    pub signature: Bytes,
}

impl DataAvailabilityCertificate {
    /// Decodes the certificate from the sequencer message bytes following the header.
    pub fn decode(data: &[u8]) -> Result<Self, SequencerMessageError> {
        let Some(&header) = data.first() else {
            return Err(SequencerMessageError::TruncatedCertificate(0))
        };
        if !is_das_message_header_byte(header) {
            return Err(SequencerMessageError::NotACertificate(header))
        }
        if data.len() < DATA_AVAILABILITY_CERTIFICATE_LEN {
            return Err(SequencerMessageError::TruncatedCertificate(data.len()))
        }

        let read_u64 = |offset: usize| {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&data[offset..offset + 8]);
            u64::from_be_bytes(bytes)
        };
        Ok(Self {
            header,
            keyset_hash: B256::from_slice(&data[1..33]),
            data_hash: B256::from_slice(&data[33..65]),
            timeout: read_u64(65),
            signers_mask: read_u64(73),
            signature: Bytes::copy_from_slice(&data[81..DATA_AVAILABILITY_CERTIFICATE_LEN]),
        })
    }

    /// Encodes the certificate.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(DATA_AVAILABILITY_CERTIFICATE_LEN);
        out.push(self.header);
        out.extend_from_slice(self.keyset_hash.as_slice());
        out.extend_from_slice(self.data_hash.as_slice());
        out.extend_from_slice(&self.timeout.to_be_bytes());
        out.extend_from_slice(&self.signers_mask.to_be_bytes());
        let mut signature = [0u8; 96];
        let len = self.signature.len().min(96);
        signature[..len].copy_from_slice(&self.signature[..len]);
        out.extend_from_slice(&signature);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::b256;

    #[test]
    fn test_should_detect_das_header_byte() {
        let mut data = SequencerMessageHeader::default().encode().to_vec();
        assert_eq!(header_byte(&data), None);

        data.push(BROTLI_MESSAGE_HEADER_BYTE);
        assert_eq!(header_byte(&data), Some(0));
        assert!(!is_das_message_header_byte(0));

        data[SEQUENCER_MESSAGE_HEADER_LEN] = DAS_MESSAGE_HEADER_FLAG | TREE_DAS_MESSAGE_HEADER_FLAG;
        assert!(header_byte(&data).is_some_and(is_das_message_header_byte));
    }

    #[test]
    fn test_should_decode_header_fields() -> Result<(), SequencerMessageError> {
        let header = SequencerMessageHeader {
            min_timestamp: 1,
            max_timestamp: 2,
            min_l1_block: 3,
            max_l1_block: 4,
            after_delayed_messages: 5,
        };
        let mut data = header.encode().to_vec();
        data.extend_from_slice(&[0xaa; 10]);

        assert_eq!(SequencerMessageHeader::decode(&data)?, header);
        assert_eq!(
            SequencerMessageHeader::decode(&data[..39]),
            Err(SequencerMessageError::MissingHeader(39))
        );
        Ok(())
    }

    #[test]
    fn test_should_decode_certificate() -> Result<(), SequencerMessageError> {
        let certificate = DataAvailabilityCertificate {
            header: DAS_MESSAGE_HEADER_FLAG,
            keyset_hash: b256!("0x0101010101010101010101010101010101010101010101010101010101010101"),
            data_hash: b256!("0x0202020202020202020202020202020202020202020202020202020202020202"),
            timeout: 1_800_000_000,
            signers_mask: 0b101,
            signature: Bytes::from(vec![9u8; 96]),
        };
        let encoded = certificate.encode();
        assert_eq!(encoded.len(), DATA_AVAILABILITY_CERTIFICATE_LEN);
        assert_eq!(DataAvailabilityCertificate::decode(&encoded)?, certificate);

        assert_eq!(
            DataAvailabilityCertificate::decode(&encoded[..100]),
            Err(SequencerMessageError::TruncatedCertificate(100))
        );
        assert_eq!(
            DataAvailabilityCertificate::decode(&[ZEROHEAVY_MESSAGE_HEADER_FLAG]),
            Err(SequencerMessageError::NotACertificate(ZEROHEAVY_MESSAGE_HEADER_FLAG))
        );
        Ok(())
    }
}
