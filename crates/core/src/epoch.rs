//! Epoch contexts
//!
//! Every `EPOCH_LENGTH` blocks the seed changes and with it the light cache,
//! the dataset size and the ProgPoW L1 cache. An [`EpochContext`] owns all of
//! them for one epoch and is immutable after construction, apart from the
//! lazily filled full dataset.

use std::cell::Cell;
use std::time::Instant;

use tracing::debug;

use crate::dataset::{self, FullDataset};
use crate::error::Error;
use crate::hash::{Hash256, Hash512};
use crate::params::*;
use crate::primes::find_largest_prime;
use crate::primitives::keccak512;

/// Seed of an epoch: `keccak256` applied `epoch_number` times to zero
pub fn calculate_epoch_seed(epoch_number: u32) -> Hash256 {
    let mut seed = Hash256::zero();
    for _ in 0..epoch_number {
        seed = crate::primitives::keccak256(&seed.0);
    }
    seed
}

fn num_items(epoch_number: u32, init_size: u64, growth: u64, item_size: u64) -> u32 {
    if epoch_number > MAX_EPOCH_NUMBER {
        return 0;
    }
    let upper_bound = (init_size + u64::from(epoch_number) * growth) / item_size;
    // Bounded by MAX_EPOCH_NUMBER, so both counts stay below 2^31.
    find_largest_prime(upper_bound as u32)
}

/// Number of 512-bit light cache items, 0 past the last epoch
pub fn calculate_light_cache_num_items(epoch_number: u32) -> u32 {
    num_items(
        epoch_number,
        LIGHT_CACHE_INIT_SIZE,
        LIGHT_CACHE_GROWTH,
        LIGHT_CACHE_ITEM_SIZE,
    )
}

/// Number of 1024-bit full dataset items, 0 past the last epoch
pub fn calculate_full_dataset_num_items(epoch_number: u32) -> u32 {
    num_items(
        epoch_number,
        FULL_DATASET_INIT_SIZE,
        FULL_DATASET_GROWTH,
        FULL_DATASET_ITEM_SIZE,
    )
}

/// Light cache size in bytes
pub fn get_light_cache_size(num_items: u32) -> u64 {
    u64::from(num_items) * LIGHT_CACHE_ITEM_SIZE
}

/// Full dataset size in bytes
pub fn get_full_dataset_size(num_items: u32) -> u64 {
    u64::from(num_items) * FULL_DATASET_ITEM_SIZE
}

/// Epoch a block belongs to, saturating for absurd block numbers
pub fn get_epoch_number(block_number: u64) -> u32 {
    u32::try_from(block_number / EPOCH_LENGTH).unwrap_or(u32::MAX)
}

thread_local! {
    /// Last successful seed lookup on this thread
    static LAST_SEED_HIT: Cell<(u32, Hash256)> = const { Cell::new((0, Hash256::zero())) };
}

/// Epoch whose seed equals `seed`, if any
///
/// Miners ask for the current seed over and over and move forward one epoch
/// at a time, so the previous hit and its successor are tried before the
/// full scan.
pub fn find_epoch_number(seed: &Hash256) -> Option<u32> {
    let (last_epoch, last_seed) = LAST_SEED_HIT.get();
    if *seed == last_seed {
        return Some(last_epoch);
    }

    if last_epoch < MAX_EPOCH_NUMBER {
        let next_seed = crate::primitives::keccak256(&last_seed.0);
        if *seed == next_seed {
            LAST_SEED_HIT.set((last_epoch + 1, next_seed));
            return Some(last_epoch + 1);
        }
    }

    let mut candidate = Hash256::zero();
    for epoch in 0..=MAX_EPOCH_NUMBER {
        if candidate == *seed {
            LAST_SEED_HIT.set((epoch, candidate));
            return Some(epoch);
        }
        candidate = crate::primitives::keccak256(&candidate.0);
    }
    None
}

/// Build a light cache in place with `keccak512`
pub fn build_light_cache(cache: &mut [Hash512], seed: &Hash256) {
    build_light_cache_with(keccak512, cache, seed);
}

/// Build a light cache in place with a caller-chosen 512-bit digest
///
/// Sequential fill `cache[i] = H(cache[i - 1])` from `H(seed)`, followed by
/// `LIGHT_CACHE_ROUNDS` RandMemoHash passes.
pub fn build_light_cache_with(
    hash_fn: fn(&[u8]) -> Hash512,
    cache: &mut [Hash512],
    seed: &Hash256,
) {
    let n = cache.len();
    if n == 0 {
        return;
    }

    cache[0] = hash_fn(&seed.0);
    for i in 1..n {
        cache[i] = hash_fn(&cache[i - 1].0);
    }

    for _ in 0..LIGHT_CACHE_ROUNDS {
        for i in 0..n {
            let v = cache[i].word32(0) as usize % n;
            let w = (n + i - 1) % n;
            let x = cache[v].xor(&cache[w]);
            cache[i] = hash_fn(&x.0);
        }
    }
}

/// Everything needed to hash and verify within one epoch
pub struct EpochContext {
    epoch_number: u32,
    light_cache: Box<[Hash512]>,
    full_dataset_num_items: u32,
    l1_cache: Box<[u32]>,
    full_dataset: Option<FullDataset>,
}

impl std::fmt::Debug for EpochContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EpochContext")
            .field("epoch_number", &self.epoch_number)
            .field("light_cache_num_items", &self.light_cache.len())
            .field("full_dataset_num_items", &self.full_dataset_num_items)
            .field("full", &self.full_dataset.is_some())
            .finish()
    }
}

impl EpochContext {
    /// Wrap a prebuilt light cache with an explicit dataset size
    ///
    /// Used by tools and tests that want a small synthetic dataset. The ProgPoW
    /// L1 cache is derived from the given light cache.
    pub fn from_light_cache(
        epoch_number: u32,
        light_cache: Vec<Hash512>,
        full_dataset_num_items: u32,
        full: bool,
    ) -> Result<Self, Error> {
        if light_cache.is_empty() || full_dataset_num_items < 2 {
            return Err(Error::InvalidContext {
                light_cache_num_items: light_cache.len(),
                full_dataset_num_items,
            });
        }
        let light_cache = light_cache.into_boxed_slice();
        let l1_cache = dataset::build_l1_cache(&light_cache)?;
        let full_dataset = if full {
            Some(FullDataset::new_zeroed(full_dataset_num_items)?)
        } else {
            None
        };
        Ok(Self {
            epoch_number,
            light_cache,
            full_dataset_num_items,
            l1_cache,
            full_dataset,
        })
    }

    pub fn epoch_number(&self) -> u32 {
        self.epoch_number
    }

    pub fn light_cache(&self) -> &[Hash512] {
        &self.light_cache
    }

    pub fn light_cache_num_items(&self) -> u32 {
        // Never more than the u32 count it was sized from.
        self.light_cache.len() as u32
    }

    pub fn full_dataset_num_items(&self) -> u32 {
        self.full_dataset_num_items
    }

    /// First 16 KB of the full dataset as 32-bit words
    pub fn l1_cache(&self) -> &[u32] {
        &self.l1_cache
    }

    /// Lazily populated dataset, present for full contexts only
    pub fn full_dataset(&self) -> Option<&FullDataset> {
        self.full_dataset.as_ref()
    }

    pub fn is_full(&self) -> bool {
        self.full_dataset.is_some()
    }
}

fn create(epoch_number: u32, full: bool) -> Result<EpochContext, Error> {
    if epoch_number > MAX_EPOCH_NUMBER {
        return Err(Error::EpochOutOfRange(epoch_number));
    }

    let light_num_items = calculate_light_cache_num_items(epoch_number) as usize;
    let full_num_items = calculate_full_dataset_num_items(epoch_number);

    let mut light_cache: Vec<Hash512> = Vec::new();
    light_cache
        .try_reserve_exact(light_num_items)
        .map_err(|_| Error::OutOfMemory {
            bytes: light_num_items * Hash512::SIZE,
        })?;
    light_cache.resize(light_num_items, Hash512::zero());

    let start = Instant::now();
    let seed = calculate_epoch_seed(epoch_number);
    build_light_cache(&mut light_cache, &seed);
    debug!(
        epoch = epoch_number,
        items = light_num_items,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "built light cache"
    );

    let context = EpochContext::from_light_cache(epoch_number, light_cache, full_num_items, full)?;
    if full {
        debug!(
            epoch = epoch_number,
            bytes = get_full_dataset_size(full_num_items),
            "allocated lazy full dataset"
        );
    }
    Ok(context)
}

/// Light context: light cache and L1 cache only
pub fn create_epoch_context(epoch_number: u32) -> Result<EpochContext, Error> {
    create(epoch_number, false)
}

/// Full context: additionally a zeroed dataset filled on first access
pub fn create_epoch_context_full(epoch_number: u32) -> Result<EpochContext, Error> {
    create(epoch_number, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_seeds() {
        assert_eq!(calculate_epoch_seed(0), Hash256::zero());
        assert_eq!(
            calculate_epoch_seed(1),
            crate::primitives::keccak256(&[0u8; 32])
        );
        assert_eq!(
            calculate_epoch_seed(171).to_string(),
            "a9b0e0c9aca72c07ba06b5bbdae8b8f69e61878301508473379bb4f71807d707"
        );
    }

    #[test]
    fn test_item_counts() {
        assert_eq!(calculate_light_cache_num_items(0), 262_139);
        assert_eq!(calculate_full_dataset_num_items(0), 8_388_593);
        assert_eq!(get_light_cache_size(262_139), 16_776_896);
        assert_eq!(get_full_dataset_size(8_388_593), 1_073_739_904);

        assert_eq!(
            get_light_cache_size(calculate_light_cache_num_items(2047)),
            285_081_536
        );
        assert_eq!(
            get_full_dataset_size(calculate_full_dataset_num_items(2047)),
            18_245_220_736
        );

        assert_eq!(
            calculate_light_cache_num_items(MAX_EPOCH_NUMBER),
            67_106_813
        );
        assert_eq!(
            calculate_full_dataset_num_items(MAX_EPOCH_NUMBER),
            2_147_418_083
        );
        assert_eq!(calculate_light_cache_num_items(MAX_EPOCH_NUMBER + 1), 0);
        assert_eq!(calculate_full_dataset_num_items(MAX_EPOCH_NUMBER + 1), 0);
    }

    #[test]
    fn test_item_counts_increase() {
        let mut prev = (0, 0);
        for epoch in (0..=MAX_EPOCH_NUMBER).step_by(997) {
            let cur = (
                calculate_light_cache_num_items(epoch),
                calculate_full_dataset_num_items(epoch),
            );
            assert!(cur.0 > prev.0 && cur.1 > prev.1, "epoch {epoch}");
            prev = cur;
        }
    }

    #[test]
    fn test_get_epoch_number() {
        assert_eq!(get_epoch_number(0), 0);
        assert_eq!(get_epoch_number(29_999), 0);
        assert_eq!(get_epoch_number(30_000), 1);
        assert_eq!(get_epoch_number(5_000_000), 166);
        assert_eq!(get_epoch_number(u64::MAX), u32::MAX);
    }

    #[test]
    fn test_find_epoch_number() {
        assert_eq!(find_epoch_number(&Hash256::zero()), Some(0));

        // Sequential lookups walk the memo forward
        for epoch in [1, 2, 3, 4, 5, 171, 172, 2047, 10, 0] {
            let seed = calculate_epoch_seed(epoch);
            assert_eq!(find_epoch_number(&seed), Some(epoch));
            assert_eq!(find_epoch_number(&seed), Some(epoch));
        }

        assert_eq!(find_epoch_number(&Hash256([0xff; 32])), None);
    }

    #[test]
    fn test_find_last_epoch() {
        let last = calculate_epoch_seed(MAX_EPOCH_NUMBER);
        assert_eq!(find_epoch_number(&last), Some(MAX_EPOCH_NUMBER));
        let past_last = crate::primitives::keccak256(&last.0);
        assert_eq!(find_epoch_number(&past_last), None);
    }

    fn mock_hash(data: &[u8]) -> Hash512 {
        let mut out = [0u8; 64];
        for (i, b) in data.iter().enumerate() {
            let o = &mut out[i % 64];
            *o = o.wrapping_mul(31).wrapping_add(*b).wrapping_add(i as u8);
        }
        Hash512(out)
    }

    #[test]
    fn test_build_light_cache_with_mock_digest() {
        let seed = Hash256([7u8; 32]);
        let mut a = vec![Hash512::zero(); 97];
        let mut b = vec![Hash512::zero(); 97];
        build_light_cache_with(mock_hash, &mut a, &seed);
        build_light_cache_with(mock_hash, &mut b, &seed);
        assert_eq!(a, b);

        let mut k = vec![Hash512::zero(); 97];
        build_light_cache(&mut k, &seed);
        assert_ne!(a, k);

        let mut empty: Vec<Hash512> = Vec::new();
        build_light_cache_with(mock_hash, &mut empty, &seed);
    }

    #[test]
    fn test_build_light_cache_single_item() {
        // With one item every RandMemoHash pass hashes item ^ item = 0
        let seed = Hash256([1u8; 32]);
        let mut cache = vec![Hash512::zero(); 1];
        build_light_cache(&mut cache, &seed);
        let zero = keccak512(&[0u8; 64]);
        assert_eq!(cache[0], zero);
    }

    #[test]
    fn test_create_out_of_range() {
        assert_eq!(
            create_epoch_context(MAX_EPOCH_NUMBER + 1).unwrap_err(),
            Error::EpochOutOfRange(MAX_EPOCH_NUMBER + 1)
        );
        assert!(create_epoch_context_full(u32::MAX).is_err());
    }

    #[test]
    fn test_from_light_cache_rejects_degenerate_sizes() {
        assert!(EpochContext::from_light_cache(0, Vec::new(), 501, false).is_err());
        assert!(EpochContext::from_light_cache(0, vec![Hash512::zero(); 3], 1, false).is_err());
        let ctx = EpochContext::from_light_cache(0, vec![Hash512::zero(); 3], 2, true).unwrap();
        assert!(ctx.is_full());
        assert_eq!(ctx.light_cache_num_items(), 3);
        assert_eq!(ctx.l1_cache().len(), PROGPOW_L1_CACHE_NUM_ITEMS);
    }
}
