//! Eight-lane MD5 compression kernel.
//!
//! The kernel hashes eight independent single-block messages in lock-step and reports
//! which lanes produced the target digest. It is the only hot-path primitive of the
//! scan: everything else exists to keep it fed.
//!
//! # Data Layout
//!
//! Messages are stored transposed. `block[w][lane]` is message word `w` (little-endian,
//! 16 words per 64-byte block) of the message in `lane`. One row of the block therefore
//! maps onto one 256-bit register, and every MD5 step runs once for all eight lanes.
//!
//! # Backends
//!
//! The rounds are written once, generically over the [`Lanes`] abstraction
//! (an 8 x u32 vector supporting add, rotate-left and the bitwise operators).
//! Two implementations exist:
//!
//! 1. **Portable** - a lane-unrolled `[u32; 8]`, available everywhere. LLVM
//!    vectorizes most of it on its own.
//! 2. **AVX2** - explicit `std::arch` intrinsics on x86_64, chosen at runtime when
//!    the CPU supports it.
//!
//! Both backends must agree bit for bit; the tests check this against the `md5` crate.
//!
//! ```rust,ignore
//! let kernel = Kernel::detect();
//! if let Some(lane) = kernel.find_match(&block, &target) {
//!     // lane in 0..8 hashed to the target
//! }
//! ```

mod lanes;

#[cfg(target_arch = "x86_64")]
mod avx2;

pub use lanes::{Lanes, PortableLanes};

use crate::target::TargetDigest;

/// Number of messages hashed per kernel invocation
pub const LANES: usize = 8;

/// Number of 32-bit words in one MD5 block
pub const BLOCK_WORDS: usize = 16;

/// Size of an MD5 digest in bytes
pub const DIGEST_LEN: usize = 16;

/// Transposed kernel input: `block[word][lane]`
pub type Block = [[u32; LANES]; BLOCK_WORDS];

/// A raw MD5 digest in canonical byte order
pub type Digest = [u8; DIGEST_LEN];

/// MD5 initial chaining values A, B, C, D (RFC 1321).
pub const INIT_STATE: [u32; 4] = [0x6745_2301, 0xefcd_ab89, 0x98ba_dcfe, 0x1032_5476];

/// Left-rotation amount for each of the 64 steps.
pub const SHIFTS: [u32; 64] = [
    7, 12, 17, 22, 7, 12, 17, 22, 7, 12, 17, 22, 7, 12, 17, 22, // round 0
    5, 9, 14, 20, 5, 9, 14, 20, 5, 9, 14, 20, 5, 9, 14, 20, // round 1
    4, 11, 16, 23, 4, 11, 16, 23, 4, 11, 16, 23, 4, 11, 16, 23, // round 2
    6, 10, 15, 21, 6, 10, 15, 21, 6, 10, 15, 21, 6, 10, 15, 21, // round 3
];

/// Additive constants, `floor(2^32 * |sin(i + 1)|)`.
pub const ROUND_CONSTANTS: [u32; 64] = [
    0xd76a_a478, 0xe8c7_b756, 0x2420_70db, 0xc1bd_ceee, 0xf57c_0faf, 0x4787_c62a, 0xa830_4613,
    0xfd46_9501, 0x6980_98d8, 0x8b44_f7af, 0xffff_5bb1, 0x895c_d7be, 0x6b90_1122, 0xfd98_7193,
    0xa679_438e, 0x49b4_0821, 0xf61e_2562, 0xc040_b340, 0x265e_5a51, 0xe9b6_c7aa, 0xd62f_105d,
    0x0244_1453, 0xd8a1_e681, 0xe7d3_fbc8, 0x21e1_cde6, 0xc337_07d6, 0xf4d5_0d87, 0x455a_14ed,
    0xa9e3_e905, 0xfcef_a3f8, 0x676f_02d9, 0x8d2a_4c8a, 0xfffa_3942, 0x8771_f681, 0x6d9d_6122,
    0xfde5_380c, 0xa4be_ea44, 0x4bde_cfa9, 0xf6bb_4b60, 0xbebf_bc70, 0x289b_7ec6, 0xeaa1_27fa,
    0xd4ef_3085, 0x0488_1d05, 0xd9d4_d039, 0xe6db_99e5, 0x1fa2_7cf8, 0xc4ac_5665, 0xf429_2244,
    0x432a_ff97, 0xab94_23a7, 0xfc93_a039, 0x655b_59c3, 0x8f0c_cc92, 0xffef_f47d, 0x8584_5dd1,
    0x6fa8_7e4f, 0xfe2c_e6e0, 0xa301_4314, 0x4e08_11a1, 0xf753_7e82, 0xbd3a_f235, 0x2ad7_d2bb,
    0xeb86_d391,
];

/// Index of the message word consumed by `step`.
pub const fn message_index(step: usize) -> usize {
    match step {
        0..=15 => step,
        16..=31 => (5 * step + 1) % 16,
        32..=47 => (3 * step + 5) % 16,
        _ => (7 * step) % 16,
    }
}

#[inline(always)]
fn f<V: Lanes>(b: V, c: V, d: V) -> V {
    c.xor(d).and(b).xor(d)
}

#[inline(always)]
fn g<V: Lanes>(b: V, c: V, d: V) -> V {
    b.xor(c).and(d).xor(c)
}

#[inline(always)]
fn h<V: Lanes>(b: V, c: V, d: V) -> V {
    b.xor(c).xor(d)
}

#[inline(always)]
fn i<V: Lanes>(b: V, c: V, d: V) -> V {
    d.not().or(b).xor(c)
}

// a = b + rotl(a + fun(b, c, d) + x[k] + t, s), with every table lookup constant folded
macro_rules! step {
    ($fun:ident, $x:ident, $a:ident, $b:ident, $c:ident, $d:ident, $n:literal) => {
        $a = $a
            .add($fun($b, $c, $d))
            .add($x[message_index($n)])
            .add(V::splat(ROUND_CONSTANTS[$n]))
            .rotl(SHIFTS[$n])
            .add($b);
    };
}

/// Runs the MD5 compression function over all lanes, returning the final A, B, C, D.
#[inline(always)]
pub(crate) fn compress<V: Lanes>(block: &Block) -> [V; 4] {
    let x: [V; BLOCK_WORDS] = std::array::from_fn(|w| V::from_array(&block[w]));

    let mut a = V::splat(INIT_STATE[0]);
    let mut b = V::splat(INIT_STATE[1]);
    let mut c = V::splat(INIT_STATE[2]);
    let mut d = V::splat(INIT_STATE[3]);

    step!(f, x, a, b, c, d, 0);
    step!(f, x, d, a, b, c, 1);
    step!(f, x, c, d, a, b, 2);
    step!(f, x, b, c, d, a, 3);
    step!(f, x, a, b, c, d, 4);
    step!(f, x, d, a, b, c, 5);
    step!(f, x, c, d, a, b, 6);
    step!(f, x, b, c, d, a, 7);
    step!(f, x, a, b, c, d, 8);
    step!(f, x, d, a, b, c, 9);
    step!(f, x, c, d, a, b, 10);
    step!(f, x, b, c, d, a, 11);
    step!(f, x, a, b, c, d, 12);
    step!(f, x, d, a, b, c, 13);
    step!(f, x, c, d, a, b, 14);
    step!(f, x, b, c, d, a, 15);

    step!(g, x, a, b, c, d, 16);
    step!(g, x, d, a, b, c, 17);
    step!(g, x, c, d, a, b, 18);
    step!(g, x, b, c, d, a, 19);
    step!(g, x, a, b, c, d, 20);
    step!(g, x, d, a, b, c, 21);
    step!(g, x, c, d, a, b, 22);
    step!(g, x, b, c, d, a, 23);
    step!(g, x, a, b, c, d, 24);
    step!(g, x, d, a, b, c, 25);
    step!(g, x, c, d, a, b, 26);
    step!(g, x, b, c, d, a, 27);
    step!(g, x, a, b, c, d, 28);
    step!(g, x, d, a, b, c, 29);
    step!(g, x, c, d, a, b, 30);
    step!(g, x, b, c, d, a, 31);

    step!(h, x, a, b, c, d, 32);
    step!(h, x, d, a, b, c, 33);
    step!(h, x, c, d, a, b, 34);
    step!(h, x, b, c, d, a, 35);
    step!(h, x, a, b, c, d, 36);
    step!(h, x, d, a, b, c, 37);
    step!(h, x, c, d, a, b, 38);
    step!(h, x, b, c, d, a, 39);
    step!(h, x, a, b, c, d, 40);
    step!(h, x, d, a, b, c, 41);
    step!(h, x, c, d, a, b, 42);
    step!(h, x, b, c, d, a, 43);
    step!(h, x, a, b, c, d, 44);
    step!(h, x, d, a, b, c, 45);
    step!(h, x, c, d, a, b, 46);
    step!(h, x, b, c, d, a, 47);

    step!(i, x, a, b, c, d, 48);
    step!(i, x, d, a, b, c, 49);
    step!(i, x, c, d, a, b, 50);
    step!(i, x, b, c, d, a, 51);
    step!(i, x, a, b, c, d, 52);
    step!(i, x, d, a, b, c, 53);
    step!(i, x, c, d, a, b, 54);
    step!(i, x, b, c, d, a, 55);
    step!(i, x, a, b, c, d, 56);
    step!(i, x, d, a, b, c, 57);
    step!(i, x, c, d, a, b, 58);
    step!(i, x, b, c, d, a, 59);
    step!(i, x, a, b, c, d, 60);
    step!(i, x, d, a, b, c, 61);
    step!(i, x, c, d, a, b, 62);
    step!(i, x, b, c, d, a, 63);

    [
        a.add(V::splat(INIT_STATE[0])),
        b.add(V::splat(INIT_STATE[1])),
        c.add(V::splat(INIT_STATE[2])),
        d.add(V::splat(INIT_STATE[3])),
    ]
}

/// Bit `n` of the result is set when lane `n` hashed to `target`.
#[inline(always)]
pub(crate) fn match_mask_with<V: Lanes>(block: &Block, target: &[u32; 4]) -> u8 {
    let state = compress::<V>(block);
    let [a, b, c, d] = state.map(V::to_array);

    let mut mask = 0u8;
    for lane in 0..LANES {
        if a[lane] == target[0] && b[lane] == target[1] && c[lane] == target[2] && d[lane] == target[3]
        {
            mask |= 1 << lane;
        }
    }
    mask
}

#[inline(always)]
pub(crate) fn digests_with<V: Lanes>(block: &Block) -> [Digest; LANES] {
    let state = compress::<V>(block).map(V::to_array);
    std::array::from_fn(|lane| {
        let mut digest = [0u8; DIGEST_LEN];
        for (word, chunk) in state.iter().zip(digest.chunks_exact_mut(4)) {
            chunk.copy_from_slice(&word[lane].to_le_bytes());
        }
        digest
    })
}

/// Instruction set used to run the rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Portable,
    Avx2,
}

impl Backend {
    /// Whether this backend can run on the current CPU
    pub fn is_supported(self) -> bool {
        match self {
            Backend::Portable => true,
            #[cfg(target_arch = "x86_64")]
            Backend::Avx2 => is_x86_feature_detected!("avx2"),
            #[cfg(not(target_arch = "x86_64"))]
            Backend::Avx2 => false,
        }
    }

    /// All backends usable on this machine, fastest last
    pub fn supported() -> Vec<Backend> {
        [Backend::Portable, Backend::Avx2]
            .into_iter()
            .filter(|b| b.is_supported())
            .collect()
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Portable => write!(f, "portable"),
            Backend::Avx2 => write!(f, "avx2"),
        }
    }
}

/// Handle to a backend that is known to be supported by the running CPU.
///
/// A `Kernel` can only be obtained through [`Kernel::detect`], [`Kernel::portable`] or
/// [`Kernel::with_backend`], which checks CPU support, so the SIMD paths are never entered
/// on hardware that lacks them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Kernel {
    backend: Backend,
}

impl Kernel {
    /// Picks the fastest backend the CPU supports
    pub fn detect() -> Self {
        if Backend::Avx2.is_supported() {
            Self {
                backend: Backend::Avx2,
            }
        } else {
            Self::portable()
        }
    }

    pub fn portable() -> Self {
        Self {
            backend: Backend::Portable,
        }
    }

    /// Returns `None` when the CPU cannot run `backend`
    pub fn with_backend(backend: Backend) -> Option<Self> {
        backend.is_supported().then_some(Self { backend })
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Lane bit mask of every lane whose digest equals `target`
    #[inline]
    pub fn match_mask(&self, block: &Block, target: &TargetDigest) -> u8 {
        match self.backend {
            #[cfg(target_arch = "x86_64")]
            // SAFETY: a Kernel holding Backend::Avx2 is only built after feature detection.
            Backend::Avx2 => unsafe { avx2::match_mask(block, target.words()) },
            _ => match_mask_with::<PortableLanes>(block, target.words()),
        }
    }

    /// Lowest lane whose digest equals `target`
    #[inline]
    pub fn find_match(&self, block: &Block, target: &TargetDigest) -> Option<usize> {
        match self.match_mask(block, target) {
            0 => None,
            mask => Some(mask.trailing_zeros() as usize),
        }
    }

    /// Full digests of all eight lanes
    pub fn digests(&self, block: &Block) -> [Digest; LANES] {
        match self.backend {
            #[cfg(target_arch = "x86_64")]
            // SAFETY: see match_mask.
            Backend::Avx2 => unsafe { avx2::digests(block) },
            _ => digests_with::<PortableLanes>(block),
        }
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::detect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Pads each message (<= 55 bytes) into one block, one message per lane.
    fn pad_lanes(messages: &[Vec<u8>; LANES]) -> Block {
        let mut block = [[0u32; LANES]; BLOCK_WORDS];
        for (lane, message) in messages.iter().enumerate() {
            let mut bytes = [0u8; 64];
            bytes[..message.len()].copy_from_slice(message);
            bytes[message.len()] = 0x80;
            bytes[56..].copy_from_slice(&((message.len() as u64) * 8).to_le_bytes());
            for (w, chunk) in bytes.chunks_exact(4).enumerate() {
                block[w][lane] = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            }
        }
        block
    }

    fn sample_messages(len: usize, seed: u8) -> [Vec<u8>; LANES] {
        std::array::from_fn(|lane| {
            (0..len)
                .map(|i| b' ' + ((i * 7 + lane * 13 + seed as usize) % 95) as u8)
                .collect()
        })
    }

    #[test]
    fn test_message_schedule() {
        let round1: Vec<usize> = (16..32).map(message_index).collect();
        assert_eq!(round1, [1, 6, 11, 0, 5, 10, 15, 4, 9, 14, 3, 8, 13, 2, 7, 12]);
        let round2: Vec<usize> = (32..48).map(message_index).collect();
        assert_eq!(round2, [5, 8, 11, 14, 1, 4, 7, 10, 13, 0, 3, 6, 9, 12, 15, 2]);
        let round3: Vec<usize> = (48..64).map(message_index).collect();
        assert_eq!(round3, [0, 7, 14, 5, 12, 3, 10, 1, 8, 15, 6, 13, 4, 11, 2, 9]);
    }

    #[test]
    fn test_round_constants_are_sine_table() {
        for (n, &k) in ROUND_CONSTANTS.iter().enumerate() {
            let expected = ((n as f64 + 1.0).sin().abs() * 4_294_967_296.0).floor() as u32;
            assert_eq!(k, expected, "constant {}", n);
        }
    }

    #[test]
    fn test_empty_message_digest() {
        let messages: [Vec<u8>; LANES] = std::array::from_fn(|_| Vec::new());
        let block = pad_lanes(&messages);
        for backend in Backend::supported() {
            let kernel = Kernel::with_backend(backend).unwrap();
            for digest in kernel.digests(&block) {
                assert_eq!(hex::encode(digest), "d41d8cd98f00b204e9800998ecf8427e");
            }
        }
    }

    #[test]
    fn test_digests_match_reference_for_all_lengths() {
        for backend in Backend::supported() {
            let kernel = Kernel::with_backend(backend).unwrap();
            for len in 19..=55 {
                let messages = sample_messages(len, len as u8);
                let block = pad_lanes(&messages);
                let digests = kernel.digests(&block);
                for lane in 0..LANES {
                    assert_eq!(
                        digests[lane],
                        md5::compute(&messages[lane]).0,
                        "backend {} len {} lane {}",
                        backend,
                        len,
                        lane
                    );
                }
            }
        }
    }

    #[test]
    fn test_find_match_reports_matching_lane() {
        let messages = sample_messages(22, 3);
        let block = pad_lanes(&messages);
        for backend in Backend::supported() {
            let kernel = Kernel::with_backend(backend).unwrap();
            for lane in 0..LANES {
                let target = TargetDigest::from_bytes(md5::compute(&messages[lane]).0);
                assert_eq!(kernel.find_match(&block, &target), Some(lane));
                assert_eq!(kernel.match_mask(&block, &target), 1 << lane);
            }
            let absent = TargetDigest::from_bytes(md5::compute(b"").0);
            assert_eq!(kernel.find_match(&block, &absent), None);
        }
    }

    #[test]
    fn test_duplicate_lanes_all_reported_in_mask() {
        let mut messages = sample_messages(30, 9);
        messages[5] = messages[2].clone();
        let block = pad_lanes(&messages);
        let target = TargetDigest::from_bytes(md5::compute(&messages[2]).0);
        let kernel = Kernel::detect();
        assert_eq!(kernel.match_mask(&block, &target), (1 << 2) | (1 << 5));
        assert_eq!(kernel.find_match(&block, &target), Some(2));
    }

    #[test]
    fn test_backends_agree() {
        let messages = sample_messages(55, 77);
        let block = pad_lanes(&messages);
        let portable = Kernel::portable().digests(&block);
        for backend in Backend::supported() {
            let kernel = Kernel::with_backend(backend).unwrap();
            assert_eq!(kernel.digests(&block), portable);
        }
    }
}
