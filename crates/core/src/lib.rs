//! # Ethash / ProgPoW Core Algorithm
//!
//! Proof-of-work engine implementing two memory-hard algorithms over the same
//! epoch-keyed data:
//!
//! - **Ethash**: FNV-driven mixing of 1024-bit dataset items
//! - **ProgPoW 0.9.2**: a random per-period program over 16 lanes of 32
//!   registers, L1 cache reads, random math and 2048-bit dataset items
//!
//! ## Epochs
//!
//! Every 30000 blocks form an epoch. Each epoch has a seed, a light cache
//! (16 MB and growing) built from the seed, and a full dataset (1 GB and
//! growing) whose items are derived from the light cache. Verification only
//! needs the light cache; mining is much faster with the full dataset, which
//! this crate fills lazily on first access.
//!
//! ## Example
//!
//! ```rust,no_run
//! use ethash_core::{Hash256, create_epoch_context, ethash, get_epoch_number};
//!
//! let context = create_epoch_context(get_epoch_number(1_000_000)).unwrap();
//! let header = Hash256::zero();
//!
//! let result = ethash::hash(&context, &header, 42);
//! assert!(ethash::verify(&context, &header, &result.mix_hash, 42, &result.final_hash));
//!
//! // Shared, reference-counted contexts for worker threads
//! let shared = ethash_core::get_global_epoch_context(33).unwrap();
//! let found = ethash_core::progpow::search(&shared, 1_000_000, &header, &Hash256::MAX, 0, 10);
//! assert!(found.solution_found);
//! ```
//!
//! ## Features
//!
//! - `parallel` (default): generate full datasets with `rayon`

mod dataset;
mod difficulty;
mod epoch;
mod error;
mod hash;
mod managed;
mod params;
mod primes;
mod primitives;

pub mod ethash;
pub mod progpow;

mod ffi;

pub use dataset::{
    FullDataset, calculate_dataset_item_512, calculate_dataset_item_1024,
    calculate_dataset_item_2048,
};
pub use difficulty::{check_against_difficulty, difficulty_to_boundary};
pub use epoch::{
    EpochContext, build_light_cache, build_light_cache_with, calculate_epoch_seed,
    calculate_full_dataset_num_items, calculate_light_cache_num_items, create_epoch_context,
    create_epoch_context_full, find_epoch_number, get_epoch_number, get_full_dataset_size,
    get_light_cache_size,
};
pub use error::{Error, VerificationError};
pub use ethash::{HashResult, SearchResult};
pub use hash::{Hash256, Hash512, Hash1024, Hash2048, is_less_or_equal};
pub use managed::{
    BuildFn, EpochCache, LocalContext, get_global_epoch_context, get_global_epoch_context_full,
};
pub use params::*;
pub use primes::find_largest_prime;
pub use primitives::{
    FNV_OFFSET_BASIS, FNV_PRIME, Kiss99, clz32, fnv1, fnv1a, keccak_progpow_64,
    keccak_progpow_256, keccak256, keccak512, mul_hi32, popcount32, rotl32, rotr32,
};
