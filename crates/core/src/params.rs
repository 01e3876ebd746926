//! Ethash and ProgPoW Algorithm Parameters
//!
//! Consensus constants. Changing any of these forks the chain.

/// Number of blocks in one epoch
pub const EPOCH_LENGTH: u64 = 30_000;

/// Largest epoch whose full dataset item count fits in a signed 32-bit integer
pub const MAX_EPOCH_NUMBER: u32 = 32_639;

/// Light cache size at epoch 0 in bytes (16 MB)
pub const LIGHT_CACHE_INIT_SIZE: u64 = 1 << 24;

/// Light cache growth per epoch in bytes (128 KB)
pub const LIGHT_CACHE_GROWTH: u64 = 1 << 17;

/// Number of RandMemoHash passes over the light cache
pub const LIGHT_CACHE_ROUNDS: usize = 3;

/// Light cache item size in bytes (one 512-bit hash)
pub const LIGHT_CACHE_ITEM_SIZE: u64 = 64;

/// Full dataset size at epoch 0 in bytes (1 GB)
pub const FULL_DATASET_INIT_SIZE: u64 = 1 << 30;

/// Full dataset growth per epoch in bytes (8 MB)
pub const FULL_DATASET_GROWTH: u64 = 1 << 23;

/// Full dataset item size in bytes (one 1024-bit hash)
pub const FULL_DATASET_ITEM_SIZE: u64 = 128;

/// Light cache parents folded into every 512-bit dataset item
pub const FULL_DATASET_ITEM_PARENTS: u32 = 256;

/// Dataset accesses per Ethash hash
pub const NUM_DATASET_ACCESSES: u32 = 64;

/// ProgPoW revision implemented by this crate
pub const PROGPOW_REVISION: &str = "0.9.2";

/// Blocks sharing one random ProgPoW program
pub const PROGPOW_PERIOD_LENGTH: u64 = 50;

/// Registers per lane
pub const PROGPOW_NUM_REGS: usize = 32;

/// Parallel lanes sharing one mix
pub const PROGPOW_NUM_LANES: usize = 16;

/// Random L1 cache accesses per round
pub const PROGPOW_NUM_CACHE_ACCESSES: usize = 12;

/// Random math operations per round
pub const PROGPOW_NUM_MATH_OPERATIONS: usize = 20;

/// L1 cache size in bytes (first 16 KB of the full dataset)
pub const PROGPOW_L1_CACHE_SIZE: usize = 16 * 1024;

/// L1 cache size in 32-bit words
pub const PROGPOW_L1_CACHE_NUM_ITEMS: usize = PROGPOW_L1_CACHE_SIZE / 4;

/// Mixing rounds per ProgPoW hash
pub const PROGPOW_NUM_ROUNDS: u32 = 64;
