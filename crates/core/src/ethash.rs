//! Ethash hash kernel
//!
//! `seed = keccak512(header || nonce)`, 64 FNV-driven accesses into the
//! 1024-bit dataset, a 4:1 FNV compression of the mix, and
//! `final = keccak256(seed || mix_hash)`.

use crate::dataset::{Lookup1024, lookup_1024_full, lookup_1024_light};
use crate::difficulty::check_against_difficulty;
use crate::epoch::EpochContext;
use crate::error::VerificationError;
use crate::hash::{Hash256, Hash512, is_less_or_equal};
use crate::params::NUM_DATASET_ACCESSES;
use crate::primitives::{fnv1, keccak256, keccak512};

/// Final and mix hash of one nonce
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HashResult {
    pub final_hash: Hash256,
    pub mix_hash: Hash256,
}

/// Outcome of a nonce range scan
///
/// `Default` is the "nothing found" value: all fields zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchResult {
    pub result: HashResult,
    pub nonce: u64,
    pub solution_found: bool,
}

impl SearchResult {
    pub(crate) fn found(result: HashResult, nonce: u64) -> Self {
        Self {
            result,
            nonce,
            solution_found: true,
        }
    }
}

fn hash_seed(header_hash: &Hash256, nonce: u64) -> Hash512 {
    let mut init = [0u8; 40];
    init[..32].copy_from_slice(&header_hash.0);
    init[32..].copy_from_slice(&nonce.to_le_bytes());
    keccak512(&init)
}

fn hash_final(seed: &Hash512, mix_hash: &Hash256) -> Hash256 {
    let mut data = [0u8; 96];
    data[..64].copy_from_slice(&seed.0);
    data[64..].copy_from_slice(&mix_hash.0);
    keccak256(&data)
}

fn hash_kernel(context: &EpochContext, seed: &Hash512, lookup: Lookup1024) -> Hash256 {
    let num_items = context.full_dataset_num_items();
    let seed_init = seed.word32(0);
    let seed_words = seed.to_word32s();

    let mut mix = [0u32; 32];
    mix[..16].copy_from_slice(&seed_words);
    mix[16..].copy_from_slice(&seed_words);

    for i in 0..NUM_DATASET_ACCESSES {
        let p = fnv1(i ^ seed_init, mix[i as usize % mix.len()]) % num_items;
        let item = lookup(context, p).to_word32s();
        for (m, w) in mix.iter_mut().zip(item.iter()) {
            *m = fnv1(*m, *w);
        }
    }

    let mut compressed = [0u32; 8];
    for (out, c) in compressed.iter_mut().zip(mix.chunks_exact(4)) {
        *out = fnv1(fnv1(fnv1(c[0], c[1]), c[2]), c[3]);
    }
    Hash256::from_word32s(&compressed)
}

fn hash_with(
    context: &EpochContext,
    header_hash: &Hash256,
    nonce: u64,
    lookup: Lookup1024,
) -> HashResult {
    let seed = hash_seed(header_hash, nonce);
    let mix_hash = hash_kernel(context, &seed, lookup);
    HashResult {
        final_hash: hash_final(&seed, &mix_hash),
        mix_hash,
    }
}

/// Hash one nonce, using the memoized dataset of a full context
pub fn hash(context: &EpochContext, header_hash: &Hash256, nonce: u64) -> HashResult {
    hash_with(context, header_hash, nonce, lookup_1024_full)
}

/// Hash one nonce, computing every dataset item from the light cache
pub fn hash_light(context: &EpochContext, header_hash: &Hash256, nonce: u64) -> HashResult {
    hash_with(context, header_hash, nonce, lookup_1024_light)
}

fn final_hash_of(header_hash: &Hash256, mix_hash: &Hash256, nonce: u64) -> Hash256 {
    hash_final(&hash_seed(header_hash, nonce), mix_hash)
}

/// Cheap pre-check: does the claimed mix hash give a final hash within `boundary`
///
/// Needs no epoch context. A pass here says nothing about the mix hash itself.
pub fn verify_final_hash(
    header_hash: &Hash256,
    mix_hash: &Hash256,
    nonce: u64,
    boundary: &Hash256,
) -> bool {
    is_less_or_equal(&final_hash_of(header_hash, mix_hash, nonce), boundary)
}

fn verify_mix(
    context: &EpochContext,
    header_hash: &Hash256,
    mix_hash: &Hash256,
    nonce: u64,
) -> Result<(), VerificationError> {
    let seed = hash_seed(header_hash, nonce);
    if hash_kernel(context, &seed, lookup_1024_full) != *mix_hash {
        return Err(VerificationError::InvalidMixHash);
    }
    Ok(())
}

/// Full verification against a boundary, cheap final hash check first
pub fn verify_against_boundary(
    context: &EpochContext,
    header_hash: &Hash256,
    mix_hash: &Hash256,
    nonce: u64,
    boundary: &Hash256,
) -> Result<(), VerificationError> {
    if !verify_final_hash(header_hash, mix_hash, nonce, boundary) {
        return Err(VerificationError::InvalidFinalHash);
    }
    verify_mix(context, header_hash, mix_hash, nonce)
}

/// Full verification against a difficulty, cheap final hash check first
pub fn verify_against_difficulty(
    context: &EpochContext,
    header_hash: &Hash256,
    mix_hash: &Hash256,
    nonce: u64,
    difficulty: &Hash256,
) -> Result<(), VerificationError> {
    let final_hash = final_hash_of(header_hash, mix_hash, nonce);
    if !check_against_difficulty(&final_hash, difficulty) {
        return Err(VerificationError::InvalidFinalHash);
    }
    verify_mix(context, header_hash, mix_hash, nonce)
}

/// `true` iff the proof is valid against `boundary`
pub fn verify(
    context: &EpochContext,
    header_hash: &Hash256,
    mix_hash: &Hash256,
    nonce: u64,
    boundary: &Hash256,
) -> bool {
    verify_against_boundary(context, header_hash, mix_hash, nonce, boundary).is_ok()
}

fn search_with(
    context: &EpochContext,
    header_hash: &Hash256,
    boundary: &Hash256,
    start_nonce: u64,
    iterations: u64,
    lookup: Lookup1024,
) -> SearchResult {
    for i in 0..iterations {
        let nonce = start_nonce.wrapping_add(i);
        let result = hash_with(context, header_hash, nonce, lookup);
        if is_less_or_equal(&result.final_hash, boundary) {
            return SearchResult::found(result, nonce);
        }
    }
    SearchResult::default()
}

/// First nonce in `start_nonce..start_nonce + iterations` within `boundary`
///
/// The range wraps past `u64::MAX`.
pub fn search(
    context: &EpochContext,
    header_hash: &Hash256,
    boundary: &Hash256,
    start_nonce: u64,
    iterations: u64,
) -> SearchResult {
    search_with(context, header_hash, boundary, start_nonce, iterations, lookup_1024_full)
}

/// [`search`] without touching the full dataset
pub fn search_light(
    context: &EpochContext,
    header_hash: &Hash256,
    boundary: &Hash256,
    start_nonce: u64,
    iterations: u64,
) -> SearchResult {
    search_with(context, header_hash, boundary, start_nonce, iterations, lookup_1024_light)
}
