//! Fixed-width 256-bit channel presence vector

/// Maximum number of channels a recording can define
pub const MAX_CHANNELS: usize = 256;

/// Set of channel indices, serialized as 32 bytes
///
/// Bit `i` lives in byte `i / 8` at bit position `i % 8` (least significant
/// first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct ChannelSet {
    bits: [u8; MAX_CHANNELS / 8],
}

impl ChannelSet {
    /// Empty set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a serialized vector
    #[must_use]
    pub fn from_bytes(bits: [u8; MAX_CHANNELS / 8]) -> Self {
        Self { bits }
    }

    /// Serialized form
    #[must_use]
    pub fn to_bytes(&self) -> [u8; MAX_CHANNELS / 8] {
        self.bits
    }

    /// Add channel `index`
    pub fn insert(&mut self, index: u8) {
        self.bits[usize::from(index / 8)] |= 1 << (index % 8);
    }

    /// Remove channel `index`
    pub fn remove(&mut self, index: u8) {
        self.bits[usize::from(index / 8)] &= !(1 << (index % 8));
    }

    /// True if channel `index` is present
    #[must_use]
    pub fn contains(&self, index: u8) -> bool {
        self.bits[usize::from(index / 8)] & (1 << (index % 8)) != 0
    }

    /// Number of channels present
    #[must_use]
    pub fn len(&self) -> usize {
        self.bits.iter().map(|b| b.count_ones() as usize).sum()
    }

    /// True if no channel is present
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|&b| b == 0)
    }

    /// Present channel indices in ascending order
    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        (0..=u8::MAX).filter(move |&i| self.contains(i))
    }
}

impl FromIterator<u8> for ChannelSet {
    fn from_iter<I: IntoIterator<Item = u8>>(iter: I) -> Self {
        let mut set = Self::new();
        for index in iter {
            set.insert(index);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_bit_positions() {
        let set: ChannelSet = [0u8, 1, 255].into_iter().collect();
        let bytes = set.to_bytes();

        assert_eq!(bytes[0], 0b0000_0011);
        assert_eq!(bytes[31], 0b1000_0000);
        assert!(bytes[1..31].iter().all(|&b| b == 0));

        let parsed = ChannelSet::from_bytes(bytes);
        assert_eq!(parsed.iter().collect::<Vec<_>>(), vec![0, 1, 255]);
        assert_eq!(parsed.len(), 3);
    }

    #[test]
    fn test_insert_remove() {
        let mut set = ChannelSet::new();
        assert!(set.is_empty());

        set.insert(9);
        set.insert(9);
        assert!(set.contains(9));
        assert!(!set.contains(8));
        assert_eq!(set.len(), 1);

        set.remove(9);
        assert!(set.is_empty());
    }

    proptest! {
        #[test]
        fn prop_roundtrip(indices in proptest::collection::btree_set(any::<u8>(), 0..64)) {
            let set: ChannelSet = indices.iter().copied().collect();
            let parsed = ChannelSet::from_bytes(set.to_bytes());
            prop_assert_eq!(
                parsed.iter().collect::<Vec<_>>(),
                indices.into_iter().collect::<Vec<_>>()
            );
        }
    }
}
