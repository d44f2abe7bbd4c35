use alloy_consensus::Header;
use alloy_primitives::{Bytes, B256};

/// An error occurring when extracting the [`HeaderInfo`] of a header.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HeaderInfoError {
    /// The header extra data does not hold a send root.
    #[error("unexpected header extra field length {0}")]
    UnexpectedExtraDataLength(usize),
}

/// The rollup specific information a block header carries in its extra data and mix hash fields.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct HeaderInfo {
    /// The commitment to the outbound cross-chain messages.
    pub send_root: B256,
    /// The number of outbound cross-chain messages.
    pub send_count: u64,
    /// The L1 block number observed by the block.
    pub l1_block_number: u64,
    /// The version of the state-transition function that produced the block.
    pub arbos_format_version: u64,
}

impl HeaderInfo {
    /// Extracts the [`HeaderInfo`] from the header.
    ///
    /// Headers without a base fee (imported blocks) or without extra data (genesis) hold no
    /// information and return the default value.
    pub fn from_header(header: &Header) -> Result<Self, HeaderInfoError> {
        if header.base_fee_per_gas.unwrap_or_default() == 0 || header.extra_data.is_empty() {
            return Ok(Self::default())
        }
        if header.extra_data.len() != 32 {
            return Err(HeaderInfoError::UnexpectedExtraDataLength(header.extra_data.len()))
        }

        let mix = header.mix_hash.as_slice();
        let read_u64 = |offset: usize| {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&mix[offset..offset + 8]);
            u64::from_be_bytes(bytes)
        };
        Ok(Self {
            send_root: B256::from_slice(&header.extra_data),
            send_count: read_u64(0),
            l1_block_number: read_u64(8),
            arbos_format_version: read_u64(16),
        })
    }

    /// Writes the information into the extra data and mix hash of the header.
    pub fn apply_to(&self, header: &mut Header) {
        header.extra_data = Bytes::copy_from_slice(self.send_root.as_slice());
        let mut mix = [0u8; 32];
        mix[..8].copy_from_slice(&self.send_count.to_be_bytes());
        mix[8..16].copy_from_slice(&self.l1_block_number.to_be_bytes());
        mix[16..24].copy_from_slice(&self.arbos_format_version.to_be_bytes());
        header.mix_hash = B256::from(mix);
    }
}

/// Returns the count of delayed messages read once the block is executed, stored in the header
/// nonce.
pub fn delayed_messages_read(header: &Header) -> u64 {
    u64::from_be_bytes(header.nonce.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::b256;

    #[test]
    fn test_should_round_trip_through_header() -> Result<(), HeaderInfoError> {
        let info = HeaderInfo {
            send_root: b256!("0xabababababababababababababababababababababababababababababababab"),
            send_count: 12,
            l1_block_number: 19_000_000,
            arbos_format_version: 31,
        };
        let mut header = Header { base_fee_per_gas: Some(100_000_000), ..Default::default() };
        info.apply_to(&mut header);

        assert_eq!(HeaderInfo::from_header(&header)?, info);
        Ok(())
    }

    #[test]
    fn test_should_default_without_base_fee_or_extra_data() -> Result<(), HeaderInfoError> {
        let genesis = Header { base_fee_per_gas: Some(100_000_000), ..Default::default() };
        assert_eq!(HeaderInfo::from_header(&genesis)?, HeaderInfo::default());

        let imported = Header { extra_data: Bytes::from(vec![1u8; 32]), ..Default::default() };
        assert_eq!(HeaderInfo::from_header(&imported)?, HeaderInfo::default());
        Ok(())
    }

    #[test]
    fn test_should_reject_malformed_extra_data() {
        let header = Header {
            base_fee_per_gas: Some(1),
            extra_data: Bytes::from(vec![1u8; 20]),
            ..Default::default()
        };
        assert_eq!(
            HeaderInfo::from_header(&header),
            Err(HeaderInfoError::UnexpectedExtraDataLength(20))
        );
    }
}
