//! ProgPoW hash kernel (revision 0.9.2)
//!
//! Sixteen lanes of 32 registers are seeded from the header and nonce, then
//! run `PROGPOW_NUM_ROUNDS` rounds of a random program that changes every
//! `PROGPOW_PERIOD_LENGTH` blocks. Each round mixes in L1 cache words, random
//! math between registers, and one 2048-bit dataset item.

use crate::dataset::{Lookup2048, lookup_2048_full, lookup_2048_light};
use crate::difficulty::check_against_difficulty;
use crate::epoch::EpochContext;
use crate::error::VerificationError;
use crate::ethash::{HashResult, SearchResult};
use crate::hash::{Hash256, Hash2048, is_less_or_equal};
use crate::params::*;
use crate::primitives::*;

const NUM_REGS: usize = PROGPOW_NUM_REGS;
const NUM_LANES: usize = PROGPOW_NUM_LANES;

/// Dataset words merged into each lane per round
const WORDS_PER_LANE: usize = Hash2048::NUM_WORD32S / NUM_LANES;

type Mix = [[u32; NUM_REGS]; NUM_LANES];

/// Random program of one period: a KISS99 stream plus shuffled register orders
#[derive(Debug, Clone, Copy)]
struct MixRngState {
    rng: Kiss99,
    dst_counter: usize,
    src_counter: usize,
    dst_seq: [u32; NUM_REGS],
    src_seq: [u32; NUM_REGS],
}

impl MixRngState {
    fn new(prog_seed: u64) -> Self {
        let seed_lo = prog_seed as u32;
        let seed_hi = (prog_seed >> 32) as u32;

        let z = fnv1a(FNV_OFFSET_BASIS, seed_lo);
        let w = fnv1a(z, seed_hi);
        let jsr = fnv1a(w, seed_lo);
        let jcong = fnv1a(jsr, seed_hi);
        let mut rng = Kiss99::new(z, w, jsr, jcong);

        let mut dst_seq = [0u32; NUM_REGS];
        let mut src_seq = [0u32; NUM_REGS];
        for (i, (d, s)) in dst_seq.iter_mut().zip(src_seq.iter_mut()).enumerate() {
            *d = i as u32;
            *s = i as u32;
        }

        // Fisher-Yates, destination and source interleaved
        for i in (2..=NUM_REGS).rev() {
            let j = rng.next_u32() as usize % i;
            dst_seq.swap(i - 1, j);
            let j = rng.next_u32() as usize % i;
            src_seq.swap(i - 1, j);
        }

        Self {
            rng,
            dst_counter: 0,
            src_counter: 0,
            dst_seq,
            src_seq,
        }
    }

    #[inline(always)]
    fn next_dst(&mut self) -> usize {
        let r = self.dst_seq[self.dst_counter % NUM_REGS];
        self.dst_counter += 1;
        r as usize
    }

    #[inline(always)]
    fn next_src(&mut self) -> usize {
        let r = self.src_seq[self.src_counter % NUM_REGS];
        self.src_counter += 1;
        r as usize
    }
}

#[inline(always)]
fn random_math(a: u32, b: u32, selector: u32) -> u32 {
    match selector % 11 {
        1 => a.wrapping_mul(b),
        2 => mul_hi32(a, b),
        3 => a.min(b),
        4 => rotl32(a, b),
        5 => rotr32(a, b),
        6 => a & b,
        7 => a | b,
        8 => a ^ b,
        9 => clz32(a) + clz32(b),
        10 => popcount32(a) + popcount32(b),
        _ => a.wrapping_add(b),
    }
}

/// Merge `b` into `a` keeping entropy in `a`
#[inline(always)]
fn random_merge(a: &mut u32, b: u32, selector: u32) {
    let x = (selector >> 16) % 31 + 1;
    *a = match selector % 4 {
        0 => a.wrapping_mul(33).wrapping_add(b),
        1 => (*a ^ b).wrapping_mul(33),
        2 => rotl32(*a, x) ^ b,
        _ => rotr32(*a, x) ^ b,
    };
}

fn init_mix(seed: u64) -> Mix {
    let z = fnv1a(FNV_OFFSET_BASIS, seed as u32);
    let w = fnv1a(z, (seed >> 32) as u32);

    let mut mix = [[0u32; NUM_REGS]; NUM_LANES];
    for (l, lane) in mix.iter_mut().enumerate() {
        let jsr = fnv1a(w, l as u32);
        let jcong = fnv1a(jsr, l as u32);
        let mut rng = Kiss99::new(z, w, jsr, jcong);
        for reg in lane.iter_mut() {
            *reg = rng.next_u32();
        }
    }
    mix
}

/// One round; `state` is a fresh copy of the period's program
fn round(
    context: &EpochContext,
    r: u32,
    mix: &mut Mix,
    mut state: MixRngState,
    lookup: Lookup2048,
) {
    let num_items = context.full_dataset_num_items() / 2;
    let item_index = mix[r as usize % NUM_LANES][0] % num_items;
    let item = lookup(context, item_index).to_word32s();
    let l1 = context.l1_cache();

    let num_ops = PROGPOW_NUM_CACHE_ACCESSES.max(PROGPOW_NUM_MATH_OPERATIONS);
    for i in 0..num_ops {
        if i < PROGPOW_NUM_CACHE_ACCESSES {
            let src = state.next_src();
            let dst = state.next_dst();
            let sel = state.rng.next_u32();
            for lane in mix.iter_mut() {
                let offset = lane[src] as usize % PROGPOW_L1_CACHE_NUM_ITEMS;
                random_merge(&mut lane[dst], l1[offset], sel);
            }
        }

        if i < PROGPOW_NUM_MATH_OPERATIONS {
            let src_rnd = state.rng.next_u32() as usize % (NUM_REGS * (NUM_REGS - 1));
            let src1 = src_rnd % NUM_REGS;
            let mut src2 = src_rnd / NUM_REGS;
            if src2 >= src1 {
                src2 += 1;
            }

            let sel1 = state.rng.next_u32();
            let dst = state.next_dst();
            let sel2 = state.rng.next_u32();
            for lane in mix.iter_mut() {
                let data = random_math(lane[src1], lane[src2], sel1);
                random_merge(&mut lane[dst], data, sel2);
            }
        }
    }

    // Register 0 always takes the first dataset word
    let mut dsts = [0usize; WORDS_PER_LANE];
    let mut sels = [0u32; WORDS_PER_LANE];
    for i in 0..WORDS_PER_LANE {
        dsts[i] = if i == 0 { 0 } else { state.next_dst() };
        sels[i] = state.rng.next_u32();
    }

    for (l, lane) in mix.iter_mut().enumerate() {
        let offset = ((l ^ r as usize) % NUM_LANES) * WORDS_PER_LANE;
        for i in 0..WORDS_PER_LANE {
            random_merge(&mut lane[dsts[i]], item[offset + i], sels[i]);
        }
    }
}

fn hash_mix(context: &EpochContext, block_number: u64, seed: u64, lookup: Lookup2048) -> Hash256 {
    let mut mix = init_mix(seed);
    let state = MixRngState::new(block_number / PROGPOW_PERIOD_LENGTH);

    for r in 0..PROGPOW_NUM_ROUNDS {
        round(context, r, &mut mix, state, lookup);
    }

    let mut lane_hash = [FNV_OFFSET_BASIS; NUM_LANES];
    for (h, lane) in lane_hash.iter_mut().zip(mix.iter()) {
        for reg in lane {
            *h = fnv1a(*h, *reg);
        }
    }

    let mut words = [FNV_OFFSET_BASIS; 8];
    for (l, h) in lane_hash.iter().enumerate() {
        words[l % 8] = fnv1a(words[l % 8], *h);
    }
    Hash256::from_word32s(&words)
}

fn hash_with(
    context: &EpochContext,
    block_number: u64,
    header_hash: &Hash256,
    nonce: u64,
    lookup: Lookup2048,
) -> HashResult {
    let seed = keccak_progpow_64(header_hash, nonce);
    let mix_hash = hash_mix(context, block_number, seed, lookup);
    HashResult {
        final_hash: keccak_progpow_256(header_hash, seed, &mix_hash),
        mix_hash,
    }
}

/// Hash one nonce, using the memoized dataset of a full context
pub fn hash(
    context: &EpochContext,
    block_number: u64,
    header_hash: &Hash256,
    nonce: u64,
) -> HashResult {
    hash_with(context, block_number, header_hash, nonce, lookup_2048_full)
}

/// Hash one nonce, computing every dataset item from the light cache
pub fn hash_light(
    context: &EpochContext,
    block_number: u64,
    header_hash: &Hash256,
    nonce: u64,
) -> HashResult {
    hash_with(context, block_number, header_hash, nonce, lookup_2048_light)
}

fn verify_mix(
    context: &EpochContext,
    block_number: u64,
    seed: u64,
    mix_hash: &Hash256,
) -> Result<(), VerificationError> {
    if hash_mix(context, block_number, seed, lookup_2048_full) != *mix_hash {
        return Err(VerificationError::InvalidMixHash);
    }
    Ok(())
}

/// Full verification against a boundary, cheap final hash check first
pub fn verify_against_boundary(
    context: &EpochContext,
    block_number: u64,
    header_hash: &Hash256,
    mix_hash: &Hash256,
    nonce: u64,
    boundary: &Hash256,
) -> Result<(), VerificationError> {
    let seed = keccak_progpow_64(header_hash, nonce);
    let final_hash = keccak_progpow_256(header_hash, seed, mix_hash);
    if !is_less_or_equal(&final_hash, boundary) {
        return Err(VerificationError::InvalidFinalHash);
    }
    verify_mix(context, block_number, seed, mix_hash)
}

/// Full verification against a difficulty, cheap final hash check first
pub fn verify_against_difficulty(
    context: &EpochContext,
    block_number: u64,
    header_hash: &Hash256,
    mix_hash: &Hash256,
    nonce: u64,
    difficulty: &Hash256,
) -> Result<(), VerificationError> {
    let seed = keccak_progpow_64(header_hash, nonce);
    let final_hash = keccak_progpow_256(header_hash, seed, mix_hash);
    if !check_against_difficulty(&final_hash, difficulty) {
        return Err(VerificationError::InvalidFinalHash);
    }
    verify_mix(context, block_number, seed, mix_hash)
}

/// `true` iff the proof is valid against `boundary`
pub fn verify(
    context: &EpochContext,
    block_number: u64,
    header_hash: &Hash256,
    mix_hash: &Hash256,
    nonce: u64,
    boundary: &Hash256,
) -> bool {
    verify_against_boundary(context, block_number, header_hash, mix_hash, nonce, boundary).is_ok()
}

fn search_with(
    context: &EpochContext,
    block_number: u64,
    header_hash: &Hash256,
    boundary: &Hash256,
    start_nonce: u64,
    iterations: u64,
    lookup: Lookup2048,
) -> SearchResult {
    for i in 0..iterations {
        let nonce = start_nonce.wrapping_add(i);
        let result = hash_with(context, block_number, header_hash, nonce, lookup);
        if is_less_or_equal(&result.final_hash, boundary) {
            return SearchResult::found(result, nonce);
        }
    }
    SearchResult::default()
}

/// First nonce in `start_nonce..start_nonce + iterations` within `boundary`
pub fn search(
    context: &EpochContext,
    block_number: u64,
    header_hash: &Hash256,
    boundary: &Hash256,
    start_nonce: u64,
    iterations: u64,
) -> SearchResult {
    search_with(
        context,
        block_number,
        header_hash,
        boundary,
        start_nonce,
        iterations,
        lookup_2048_full,
    )
}

/// [`search`] without touching the full dataset
pub fn search_light(
    context: &EpochContext,
    block_number: u64,
    header_hash: &Hash256,
    boundary: &Hash256,
    start_nonce: u64,
    iterations: u64,
) -> SearchResult {
    search_with(
        context,
        block_number,
        header_hash,
        boundary,
        start_nonce,
        iterations,
        lookup_2048_light,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::tiny_context;

    #[test]
    fn test_mix_rng_state_permutations() {
        for seed in [0u64, 1, 600, u64::MAX] {
            let state = MixRngState::new(seed);
            let mut dst = state.dst_seq;
            let mut src = state.src_seq;
            dst.sort_unstable();
            src.sort_unstable();
            let identity: Vec<u32> = (0..NUM_REGS as u32).collect();
            assert_eq!(&dst[..], &identity[..], "seed {seed}");
            assert_eq!(&src[..], &identity[..], "seed {seed}");
        }
        assert_ne!(MixRngState::new(0).dst_seq, MixRngState::new(1).dst_seq);
    }

    #[test]
    fn test_mix_rng_state_cycles() {
        let mut state = MixRngState::new(12);
        let first: Vec<usize> = (0..NUM_REGS).map(|_| state.next_dst()).collect();
        let second: Vec<usize> = (0..NUM_REGS).map(|_| state.next_dst()).collect();
        assert_eq!(first, second);
        assert_eq!(state.next_src(), state.src_seq[0] as usize);
    }

    #[test]
    fn test_random_math() {
        let (a, b) = (0x8000_0001u32, 3u32);
        assert_eq!(random_math(a, b, 0), a.wrapping_add(b));
        assert_eq!(random_math(a, b, 1), a.wrapping_mul(b));
        assert_eq!(random_math(a, b, 2), 1);
        assert_eq!(random_math(a, b, 3), 3);
        assert_eq!(random_math(a, b, 4), a.rotate_left(3));
        assert_eq!(random_math(a, b, 5), a.rotate_right(3));
        assert_eq!(random_math(a, b, 6), 1);
        assert_eq!(random_math(a, b, 7), 0x8000_0003);
        assert_eq!(random_math(a, b, 8), 0x8000_0002);
        assert_eq!(random_math(a, b, 9), 30);
        assert_eq!(random_math(a, b, 10), 4);
        assert_eq!(random_math(a, b, 11), random_math(a, b, 0));
    }

    #[test]
    fn test_random_merge() {
        let mut a = 10u32;
        random_merge(&mut a, 5, 0);
        assert_eq!(a, 335);

        let mut a = 10u32;
        random_merge(&mut a, 5, 1);
        assert_eq!(a, (10 ^ 5) * 33);

        // x = (sel >> 16) % 31 + 1 = 2
        let sel = (1 << 16) | 2;
        let mut a = 0x8000_0000u32;
        random_merge(&mut a, 1, sel);
        assert_eq!(a, 0x0000_0003);

        let mut a = 4u32;
        random_merge(&mut a, 0, sel + 1);
        assert_eq!(a, 1);
    }

    #[test]
    fn test_init_mix_lanes_differ() {
        let mix = init_mix(0x1234_5678_9abc_def0);
        assert_ne!(mix[0], mix[1]);
        assert_eq!(mix, init_mix(0x1234_5678_9abc_def0));
        assert_ne!(mix, init_mix(0));
    }

    #[test]
    fn test_hash_light_matches_full() {
        let light = tiny_context(false);
        let full = tiny_context(true);
        let header = Hash256([0x42; 32]);
        for (block, nonce) in [(0u64, 0u64), (49, 7), (50, 7), (1_000_000, u64::MAX)] {
            let a = hash_light(&light, block, &header, nonce);
            assert_eq!(a, hash(&full, block, &header, nonce));
            assert_eq!(a, hash(&full, block, &header, nonce));
        }
    }

    #[test]
    fn test_program_changes_with_period() {
        let ctx = tiny_context(false);
        let header = Hash256([0x42; 32]);
        let a = hash(&ctx, 0, &header, 5);
        assert_eq!(a, hash(&ctx, PROGPOW_PERIOD_LENGTH - 1, &header, 5));
        assert_ne!(a, hash(&ctx, PROGPOW_PERIOD_LENGTH, &header, 5));
    }

    #[test]
    fn test_verify_and_search() {
        let ctx = tiny_context(true);
        let header = Hash256([0x42; 32]);
        let block = 120;

        let mut boundary = Hash256::MAX;
        boundary.0[0] = 0x3f;
        let found = search(&ctx, block, &header, &boundary, 10, 500);
        assert!(found.solution_found);
        assert_eq!(search_light(&ctx, block, &header, &boundary, 10, 500), found);
        let (mix, nonce) = (found.result.mix_hash, found.nonce);
        assert!(verify(&ctx, block, &header, &mix, nonce, &boundary));

        let mut bad_mix = mix;
        bad_mix.0[5] ^= 0x10;
        assert_eq!(
            verify_against_boundary(&ctx, block, &header, &bad_mix, nonce, &Hash256::MAX),
            Err(VerificationError::InvalidMixHash)
        );
        assert_eq!(
            verify_against_boundary(&ctx, block, &header, &mix, nonce, &Hash256::zero()),
            Err(VerificationError::InvalidFinalHash)
        );

        let mut one = Hash256::zero();
        one.0[31] = 1;
        assert_eq!(verify_against_difficulty(&ctx, block, &header, &mix, nonce, &one), Ok(()));
        assert_eq!(
            verify_against_difficulty(&ctx, block, &header, &mix, nonce, &Hash256::MAX),
            Err(VerificationError::InvalidFinalHash)
        );

        // Wrong block: different program, the mix no longer matches
        let next_period = block + PROGPOW_PERIOD_LENGTH;
        assert_eq!(
            verify_against_boundary(&ctx, next_period, &header, &mix, nonce, &Hash256::MAX),
            Err(VerificationError::InvalidMixHash)
        );

        assert_eq!(
            search(&ctx, block, &header, &Hash256::zero(), 0, 10),
            SearchResult::default()
        );
    }
}
