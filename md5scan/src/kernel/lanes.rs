use super::LANES;

/// Eight 32-bit lanes with the operations MD5 needs.
///
/// All arithmetic wraps modulo 2^32 per lane.
pub trait Lanes: Copy {
    fn splat(value: u32) -> Self;
    fn from_array(words: &[u32; LANES]) -> Self;
    fn to_array(self) -> [u32; LANES];
    fn add(self, rhs: Self) -> Self;
    fn and(self, rhs: Self) -> Self;
    fn or(self, rhs: Self) -> Self;
    fn xor(self, rhs: Self) -> Self;
    fn not(self) -> Self;
    /// Rotates every lane left by `bits` (1..=31)
    fn rotl(self, bits: u32) -> Self;
}

/// Lane-unrolled fallback that runs on any target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C, align(32))]
pub struct PortableLanes([u32; LANES]);

impl PortableLanes {
    #[inline(always)]
    fn zip(self, rhs: Self, op: impl Fn(u32, u32) -> u32) -> Self {
        Self(std::array::from_fn(|lane| op(self.0[lane], rhs.0[lane])))
    }
}

impl Lanes for PortableLanes {
    #[inline(always)]
    fn splat(value: u32) -> Self {
        Self([value; LANES])
    }

    #[inline(always)]
    fn from_array(words: &[u32; LANES]) -> Self {
        Self(*words)
    }

    #[inline(always)]
    fn to_array(self) -> [u32; LANES] {
        self.0
    }

    #[inline(always)]
    fn add(self, rhs: Self) -> Self {
        self.zip(rhs, u32::wrapping_add)
    }

    #[inline(always)]
    fn and(self, rhs: Self) -> Self {
        self.zip(rhs, |a, b| a & b)
    }

    #[inline(always)]
    fn or(self, rhs: Self) -> Self {
        self.zip(rhs, |a, b| a | b)
    }

    #[inline(always)]
    fn xor(self, rhs: Self) -> Self {
        self.zip(rhs, |a, b| a ^ b)
    }

    #[inline(always)]
    fn not(self) -> Self {
        Self(self.0.map(|a| !a))
    }

    #[inline(always)]
    fn rotl(self, bits: u32) -> Self {
        Self(self.0.map(|a| a.rotate_left(bits)))
    }
}
