use crate::config::{MAX_SUBSTRING_LEN, MIN_SUBSTRING_LEN};
use crate::errors::{ScanError, ScanResult};
use crate::kernel::{Block, BLOCK_WORDS, LANES};

/// Word holding the message length in bits
const LENGTH_WORD: usize = 14;

/// Mask and `0x80` marker for the partial word, indexed by `len % 4`
const TAIL: [(u32, u32); 4] = [
    (0x0000_0000, 0x0000_0080),
    (0x0000_00ff, 0x0000_8000),
    (0x0000_ffff, 0x0080_0000),
    (0x00ff_ffff, 0x8000_0000),
];

/// Reads a little-endian word at `pos`; bytes past the end of `data` read as zero.
#[inline(always)]
pub fn read_word(data: &[u8], pos: usize) -> u32 {
    match data.get(pos..pos + 4) {
        Some(bytes) => u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        None => {
            let mut word = [0u8; 4];
            if pos < data.len() {
                let avail = data.len() - pos;
                word[..avail].copy_from_slice(&data[pos..]);
            }
            u32::from_le_bytes(word)
        }
    }
}

/// Turns eight consecutive windows of `len` bytes into one padded kernel block.
///
/// Lane `i` holds the window starting at `offset + i`. Only the first `len / 4 + 1`
/// words change between batches; the zero words and the bit length in word 14 are
/// written once by [`WindowBuilder::empty_block`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowBuilder {
    len: usize,
    full_words: usize,
    tail_mask: u32,
    tail_marker: u32,
}

impl WindowBuilder {
    pub fn new(len: usize) -> ScanResult<Self> {
        if !(MIN_SUBSTRING_LEN..=MAX_SUBSTRING_LEN).contains(&len) {
            return Err(ScanError::config_error(format!(
                "substring length must be between {} and {}, got {}",
                MIN_SUBSTRING_LEN, MAX_SUBSTRING_LEN, len
            )));
        }
        let (tail_mask, tail_marker) = TAIL[len % 4];
        Ok(Self {
            len,
            full_words: len / 4,
            tail_mask,
            tail_marker,
        })
    }

    pub fn substring_len(&self) -> usize {
        self.len
    }

    /// A block with the constant padding words filled in
    pub fn empty_block(&self) -> Block {
        let mut block = [[0u32; LANES]; BLOCK_WORDS];
        block[LENGTH_WORD] = [(self.len * 8) as u32; LANES];
        block
    }

    /// Loads the windows at `offset..offset + 8` into a block from [`empty_block`](Self::empty_block)
    #[inline]
    pub fn fill(&self, block: &mut Block, data: &[u8], offset: usize) {
        for lane in 0..LANES {
            let start = offset + lane;
            for w in 0..self.full_words {
                block[w][lane] = read_word(data, start + 4 * w);
            }
            let tail = read_word(data, start + 4 * self.full_words);
            block[self.full_words][lane] = (tail & self.tail_mask) | self.tail_marker;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Textbook single-block padding of one message
    fn reference_block(message: &[u8]) -> [u32; BLOCK_WORDS] {
        let mut bytes = [0u8; 64];
        bytes[..message.len()].copy_from_slice(message);
        bytes[message.len()] = 0x80;
        bytes[56..].copy_from_slice(&((message.len() as u64) * 8).to_le_bytes());
        std::array::from_fn(|w| read_word(&bytes, 4 * w))
    }

    #[test]
    fn test_read_word_zero_fills() {
        let data = [1u8, 2, 3, 4, 5, 6];
        assert_eq!(read_word(&data, 0), 0x0403_0201);
        assert_eq!(read_word(&data, 4), 0x0000_0605);
        assert_eq!(read_word(&data, 6), 0);
        assert_eq!(read_word(&data, 100), 0);
    }

    #[test]
    fn test_padding_matches_reference_for_each_residue() {
        let data: Vec<u8> = (0..200u32).map(|i| b'A' + (i % 26) as u8).collect();
        for len in [20, 21, 22, 23, 52, 53, 54, 55] {
            let windows = WindowBuilder::new(len).unwrap();
            let mut block = windows.empty_block();
            windows.fill(&mut block, &data, 17);
            for lane in 0..LANES {
                let start = 17 + lane;
                let expected = reference_block(&data[start..start + len]);
                let actual: [u32; BLOCK_WORDS] = std::array::from_fn(|w| block[w][lane]);
                assert_eq!(actual, expected, "len {} lane {}", len, lane);
            }
        }
    }

    #[test]
    fn test_windows_hash_like_reference() {
        let data = b"the quick brown fox jumps over the lazy dog again and again".to_vec();
        let kernel = crate::kernel::Kernel::detect();
        for len in 19..=40 {
            let windows = WindowBuilder::new(len).unwrap();
            let mut block = windows.empty_block();
            windows.fill(&mut block, &data, 3);
            let digests = kernel.digests(&block);
            for lane in 0..LANES {
                let start = 3 + lane;
                assert_eq!(digests[lane], md5::compute(&data[start..start + len]).0);
            }
        }
    }

    #[test]
    fn test_rejects_out_of_range_len() {
        assert!(WindowBuilder::new(18).is_err());
        assert!(WindowBuilder::new(56).is_err());
        assert_eq!(WindowBuilder::new(55).unwrap().substring_len(), 55);
    }
}
