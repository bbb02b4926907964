//! AVX2 backend: one `__m256i` holds the same word of all eight lanes.
//!
//! The [`Lanes`] methods are `#[inline(always)]` so that they are inlined into the
//! `#[target_feature(enable = "avx2")]` entry points below, which is where the
//! intrinsics get compiled with AVX2 enabled. Nothing in this module may be called
//! without first checking `is_x86_feature_detected!("avx2")`.

use std::arch::x86_64::*;

use super::{digests_with, match_mask_with, Block, Digest, Lanes, LANES};

#[derive(Clone, Copy)]
struct Avx2Lanes(__m256i);

impl Lanes for Avx2Lanes {
    #[inline(always)]
    fn splat(value: u32) -> Self {
        unsafe { Self(_mm256_set1_epi32(value as i32)) }
    }

    #[inline(always)]
    fn from_array(words: &[u32; LANES]) -> Self {
        unsafe { Self(_mm256_loadu_si256(words.as_ptr() as *const __m256i)) }
    }

    #[inline(always)]
    fn to_array(self) -> [u32; LANES] {
        let mut out = [0u32; LANES];
        unsafe { _mm256_storeu_si256(out.as_mut_ptr() as *mut __m256i, self.0) };
        out
    }

    #[inline(always)]
    fn add(self, rhs: Self) -> Self {
        unsafe { Self(_mm256_add_epi32(self.0, rhs.0)) }
    }

    #[inline(always)]
    fn and(self, rhs: Self) -> Self {
        unsafe { Self(_mm256_and_si256(self.0, rhs.0)) }
    }

    #[inline(always)]
    fn or(self, rhs: Self) -> Self {
        unsafe { Self(_mm256_or_si256(self.0, rhs.0)) }
    }

    #[inline(always)]
    fn xor(self, rhs: Self) -> Self {
        unsafe { Self(_mm256_xor_si256(self.0, rhs.0)) }
    }

    #[inline(always)]
    fn not(self) -> Self {
        unsafe { Self(_mm256_xor_si256(self.0, _mm256_set1_epi32(-1))) }
    }

    #[inline(always)]
    fn rotl(self, bits: u32) -> Self {
        unsafe {
            let left = _mm_cvtsi32_si128(bits as i32);
            let right = _mm_cvtsi32_si128((32 - bits) as i32);
            Self(_mm256_or_si256(
                _mm256_sll_epi32(self.0, left),
                _mm256_srl_epi32(self.0, right),
            ))
        }
    }
}

/// # Safety
///
/// The CPU must support AVX2.
#[target_feature(enable = "avx2")]
pub(super) unsafe fn match_mask(block: &Block, target: &[u32; 4]) -> u8 {
    match_mask_with::<Avx2Lanes>(block, target)
}

/// # Safety
///
/// The CPU must support AVX2.
#[target_feature(enable = "avx2")]
pub(super) unsafe fn digests(block: &Block) -> [Digest; LANES] {
    digests_with::<Avx2Lanes>(block)
}
