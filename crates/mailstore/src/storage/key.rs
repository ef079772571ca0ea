//! Fixed-width storage keys

use crate::error::{Result, StoreError};

/// Width of an encoded key in bytes
pub const KEY_LEN: usize = 16;

/// A message's position in a bucket
///
/// The sequence number is written big-endian into the first eight bytes and
/// the remaining eight are zero, so byte order equals numeric order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageKey([u8; KEY_LEN]);

impl MessageKey {
    pub fn from_sequence(sequence: u64) -> Self {
        let mut bytes = [0u8; KEY_LEN];
        bytes[..8].copy_from_slice(&sequence.to_be_bytes());
        Self(bytes)
    }

    pub fn sequence(&self) -> u64 {
        let mut high = [0u8; 8];
        high.copy_from_slice(&self.0[..8]);
        u64::from_be_bytes(high)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<&[u8]> for MessageKey {
    type Error = StoreError;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; KEY_LEN] = bytes.try_into().map_err(|_| {
            StoreError::unavailable(format!(
                "corrupt key: expected {} bytes, found {}",
                KEY_LEN,
                bytes.len()
            ))
        })?;
        Ok(Self(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let key = MessageKey::from_sequence(0x0102);
        assert_eq!(
            key.as_bytes(),
            &[0u8, 0, 0, 0, 0, 0, 1, 2, 0, 0, 0, 0, 0, 0, 0, 0]
        );
        assert_eq!(key.sequence(), 0x0102);
    }

    #[test]
    fn test_byte_order_matches_numeric_order() {
        let values = [0, 1, 255, 256, 65_535, 1 << 40, u64::MAX - 1, u64::MAX];
        for pair in values.windows(2) {
            let (a, b) = (MessageKey::from_sequence(pair[0]), MessageKey::from_sequence(pair[1]));
            assert!(a.as_bytes() < b.as_bytes(), "{} !< {}", pair[0], pair[1]);
            assert!(a < b);
        }
    }

    #[test]
    fn test_try_from_rejects_wrong_width() {
        let key = MessageKey::from_sequence(7);
        assert_eq!(MessageKey::try_from(key.as_bytes()).unwrap(), key);
        assert!(MessageKey::try_from(&[0u8; 8][..]).is_err());
    }
}
