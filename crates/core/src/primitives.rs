//! Hashing and mixing primitives for Ethash and ProgPoW
//!
//! Keccak with the original (pre-SHA-3) padding built on the `keccak` crate
//! permutations, the ProgPoW Keccak-f[800] variant, FNV mixing, 32-bit bit
//! tricks and the KISS99 generator.

use crate::hash::{Hash256, Hash512};

/// FNV prime used by both FNV variants
pub const FNV_PRIME: u32 = 0x0100_0193;

/// FNV offset basis, the starting state of every ProgPoW FNV chain
pub const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;

/// Keccak sponge over Keccak-f[1600] with `0x01 .. 0x80` padding
///
/// Rate is `200 - 2 * OUT` bytes: 136 for 256-bit output, 72 for 512-bit.
#[inline]
fn keccak<const OUT: usize>(data: &[u8]) -> [u8; OUT] {
    let rate = 200 - 2 * OUT;
    let mut state = [0u64; 25];

    let mut blocks = data.chunks_exact(rate);
    for block in &mut blocks {
        absorb(&mut state, block);
        keccak::f1600(&mut state);
    }

    let tail = blocks.remainder();
    let mut last = [0u8; 200];
    last[..tail.len()].copy_from_slice(tail);
    last[tail.len()] ^= 0x01;
    last[rate - 1] ^= 0x80;
    absorb(&mut state, &last[..rate]);
    keccak::f1600(&mut state);

    let mut out = [0u8; OUT];
    for (chunk, lane) in out.chunks_mut(8).zip(state.iter()) {
        chunk.copy_from_slice(&lane.to_le_bytes()[..chunk.len()]);
    }
    out
}

/// XOR a rate-sized block into the state as little-endian lanes
#[inline(always)]
fn absorb(state: &mut [u64; 25], block: &[u8]) {
    for (lane, chunk) in state.iter_mut().zip(block.chunks_exact(8)) {
        let mut word = [0u8; 8];
        word.copy_from_slice(chunk);
        *lane ^= u64::from_le_bytes(word);
    }
}

/// Keccak-256 of arbitrary bytes
pub fn keccak256(data: &[u8]) -> Hash256 {
    Hash256(keccak::<32>(data))
}

/// Keccak-512 of arbitrary bytes
pub fn keccak512(data: &[u8]) -> Hash512 {
    Hash512(keccak::<64>(data))
}

/// ProgPoW Keccak-f[800] over `header || seed || mix`
///
/// No padding: the 18 input words are loaded into a zeroed state, permuted
/// once, and the first 8 words are the output.
pub fn keccak_progpow_256(header: &Hash256, seed: u64, mix_hash: &Hash256) -> Hash256 {
    let mut state = [0u32; 25];
    for i in 0..8 {
        state[i] = header.word32(i);
        state[10 + i] = mix_hash.word32(i);
    }
    state[8] = seed as u32;
    state[9] = (seed >> 32) as u32;

    keccak::f800(&mut state);

    let mut out = [0u32; 8];
    out.copy_from_slice(&state[..8]);
    Hash256::from_word32s(&out)
}

/// ProgPoW seed: Keccak-f[800] of `header || nonce` with a zero mix
///
/// The first 8 output bytes are read as a big-endian integer.
pub fn keccak_progpow_64(header: &Hash256, nonce: u64) -> u64 {
    let h = keccak_progpow_256(header, nonce, &Hash256::zero());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&h.0[..8]);
    u64::from_be_bytes(bytes)
}

/// FNV-1 step: multiply, then XOR
#[inline(always)]
pub fn fnv1(u: u32, v: u32) -> u32 {
    u.wrapping_mul(FNV_PRIME) ^ v
}

/// FNV-1a step: XOR, then multiply
#[inline(always)]
pub fn fnv1a(u: u32, v: u32) -> u32 {
    (u ^ v).wrapping_mul(FNV_PRIME)
}

/// Word-wise FNV-1 of two 512-bit values
#[inline(always)]
pub fn fnv1_512(u: &Hash512, v: &Hash512) -> Hash512 {
    let mut words = u.to_word32s();
    for (i, w) in words.iter_mut().enumerate() {
        *w = fnv1(*w, v.word32(i));
    }
    Hash512::from_word32s(&words)
}

/// Rotate left, shift taken modulo 32
#[inline(always)]
pub fn rotl32(n: u32, c: u32) -> u32 {
    n.rotate_left(c & 31)
}

/// Rotate right, shift taken modulo 32
#[inline(always)]
pub fn rotr32(n: u32, c: u32) -> u32 {
    n.rotate_right(c & 31)
}

/// Leading zero bits, 32 for zero
#[inline(always)]
pub fn clz32(x: u32) -> u32 {
    x.leading_zeros()
}

/// Set bits
#[inline(always)]
pub fn popcount32(x: u32) -> u32 {
    x.count_ones()
}

/// High 32 bits of the 64-bit product
#[inline(always)]
pub fn mul_hi32(x: u32, y: u32) -> u32 {
    ((u64::from(x) * u64::from(y)) >> 32) as u32
}

/// KISS99 pseudo-random generator (Marsaglia)
///
/// Fully determined by its four state words, so equal states always emit
/// equal sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Kiss99 {
    pub z: u32,
    pub w: u32,
    pub jsr: u32,
    pub jcong: u32,
}

impl Default for Kiss99 {
    fn default() -> Self {
        Self::new(362_436_069, 521_288_629, 123_456_789, 380_116_160)
    }
}

impl Kiss99 {
    pub const fn new(z: u32, w: u32, jsr: u32, jcong: u32) -> Self {
        Self { z, w, jsr, jcong }
    }

    /// Advance the state and return the next output
    #[inline(always)]
    pub fn next_u32(&mut self) -> u32 {
        self.z = 36969u32
            .wrapping_mul(self.z & 0xffff)
            .wrapping_add(self.z >> 16);
        self.w = 18000u32
            .wrapping_mul(self.w & 0xffff)
            .wrapping_add(self.w >> 16);
        self.jcong = 69069u32.wrapping_mul(self.jcong).wrapping_add(1_234_567);
        self.jsr ^= self.jsr << 17;
        self.jsr ^= self.jsr >> 13;
        self.jsr ^= self.jsr << 5;
        ((self.z << 16).wrapping_add(self.w) ^ self.jcong).wrapping_add(self.jsr)
    }
}
