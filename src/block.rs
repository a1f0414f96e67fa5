use bitvec::prelude::*;

use crate::wheel;

/// A fixed-size window of the odd-number index space. Bit `b` represents the
/// odd integer `(cursor + b) * 2 + 1`; a set bit means "not yet proven
/// composite".
pub struct Block {
    bits: BitBox<u8, Lsb0>,
    /// Starting bit offset of this block in the global odd index space.
    pub cursor: u64,
}

impl Block {
    pub fn new(block_bytes: usize) -> Self {
        Self {
            bits: bitbox![u8, Lsb0; 0; block_bytes * 8],
            cursor: 0,
        }
    }

    pub fn bit_len(&self) -> u64 {
        self.bits.len() as u64
    }

    /// First bit offset past this block.
    pub fn end_cursor(&self) -> u64 {
        self.cursor + self.bit_len()
    }

    pub fn bits(&self) -> &BitSlice<u8, Lsb0> {
        &self.bits
    }

    /// Raw byte view for the wheel fill and the striking engine.
    pub fn as_raw_mut_bytes(&mut self) -> &mut [u8] {
        self.bits.as_raw_mut_slice()
    }

    /// The odd integer represented by bit `bit` of this block.
    pub fn value_at(&self, bit: usize) -> u64 {
        (self.cursor + bit as u64) * 2 + 1
    }
}

/// Largest multiple of the wheel fill unit that fits the L1 data cache, so a
/// block stays resident while the striking engine walks it. Falls back to
/// 32 KiB when detection fails, matching the common L1 size.
pub fn default_block_bytes() -> usize {
    let l1 = cache_size::l1_cache_size().unwrap_or(32 * 1024);
    (l1 / wheel::FILL_BYTES).max(1) * wheel::FILL_BYTES
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_to_value_mapping() {
        let mut block = Block::new(24);
        assert_eq!(block.bit_len(), 192);
        assert_eq!(block.value_at(0), 1);
        assert_eq!(block.value_at(1), 3);
        assert_eq!(block.value_at(100), 201);

        block.cursor = 192;
        assert_eq!(block.value_at(0), 385);
        assert_eq!(block.end_cursor(), 384);
    }

    #[test]
    fn default_size_tiles_the_wheel() {
        let bytes = default_block_bytes();
        assert!(bytes > 0);
        assert_eq!(bytes % wheel::FILL_BYTES, 0);
    }
}
