//! Dataset items and the lazily populated full dataset
//!
//! A 512-bit item folds `FULL_DATASET_ITEM_PARENTS` pseudo-randomly chosen
//! light cache items together. 1024-bit items (Ethash) and 2048-bit items
//! (ProgPoW) are concatenations of consecutive narrower items.

use std::alloc::{self, Layout};
use std::ptr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::{debug, trace};

use crate::epoch::EpochContext;
use crate::error::Error;
use crate::hash::{Hash1024, Hash2048, Hash512};
use crate::params::{FULL_DATASET_ITEM_PARENTS, PROGPOW_L1_CACHE_NUM_ITEMS};
use crate::primitives::{fnv1, fnv1_512, keccak512};

/// 64-bit words per 1024-bit item
const ITEM_WORDS: usize = Hash1024::NUM_WORD64S;

/// Items generated between progress events
const GENERATE_CHUNK: u32 = 1 << 16;

pub(crate) fn item_512(light_cache: &[Hash512], index: u64) -> Hash512 {
    let n = light_cache.len() as u64;
    let seed = index as u32;

    let mut mix = light_cache[(index % n) as usize].to_word32s();
    mix[0] ^= seed;
    let mut mix = keccak512(&Hash512::from_word32s(&mix).0);

    for j in 0..FULL_DATASET_ITEM_PARENTS {
        let t = fnv1(seed ^ j, mix.word32(j as usize % Hash512::NUM_WORD32S));
        let parent = &light_cache[(u64::from(t) % n) as usize];
        mix = fnv1_512(&mix, parent);
    }

    keccak512(&mix.0)
}

pub(crate) fn item_1024(light_cache: &[Hash512], index: u64) -> Hash1024 {
    Hash1024::from_halves(
        &item_512(light_cache, index * 2),
        &item_512(light_cache, index * 2 + 1),
    )
}

pub(crate) fn item_2048(light_cache: &[Hash512], index: u64) -> Hash2048 {
    Hash2048::from_halves(
        &item_1024(light_cache, index * 2),
        &item_1024(light_cache, index * 2 + 1),
    )
}

/// ProgPoW L1 cache: the leading 1024-bit dataset items as 32-bit words
pub(crate) fn build_l1_cache(light_cache: &[Hash512]) -> Result<Box<[u32]>, Error> {
    let mut l1: Vec<u32> = Vec::new();
    l1.try_reserve_exact(PROGPOW_L1_CACHE_NUM_ITEMS)
        .map_err(|_| Error::OutOfMemory {
            bytes: PROGPOW_L1_CACHE_NUM_ITEMS * 4,
        })?;

    let items = (PROGPOW_L1_CACHE_NUM_ITEMS / Hash1024::NUM_WORD32S) as u64;
    for i in 0..items {
        l1.extend_from_slice(&item_1024(light_cache, i).to_word32s());
    }
    Ok(l1.into_boxed_slice())
}

/// 512-bit dataset item, always computed from the light cache
pub fn calculate_dataset_item_512(context: &EpochContext, index: u64) -> Hash512 {
    item_512(context.light_cache(), index)
}

/// 1024-bit dataset item: 512-bit items `2 * index` and `2 * index + 1`
pub fn calculate_dataset_item_1024(context: &EpochContext, index: u32) -> Hash1024 {
    item_1024(context.light_cache(), u64::from(index))
}

/// 2048-bit dataset item: 1024-bit items `2 * index` and `2 * index + 1`
pub fn calculate_dataset_item_2048(context: &EpochContext, index: u32) -> Hash2048 {
    item_2048(context.light_cache(), u64::from(index))
}

/// Dataset item source used by the hash kernels
pub(crate) type Lookup1024 = fn(&EpochContext, u32) -> Hash1024;

/// Dataset item source used by the ProgPoW kernel
pub(crate) type Lookup2048 = fn(&EpochContext, u32) -> Hash2048;

pub(crate) fn lookup_1024_light(context: &EpochContext, index: u32) -> Hash1024 {
    calculate_dataset_item_1024(context, index)
}

/// Memoized lookup for full contexts, light computation otherwise
pub(crate) fn lookup_1024_full(context: &EpochContext, index: u32) -> Hash1024 {
    match context.full_dataset() {
        Some(dataset) => dataset.get_or_compute(index, || {
            item_1024(context.light_cache(), u64::from(index))
        }),
        None => lookup_1024_light(context, index),
    }
}

pub(crate) fn lookup_2048_light(context: &EpochContext, index: u32) -> Hash2048 {
    calculate_dataset_item_2048(context, index)
}

pub(crate) fn lookup_2048_full(context: &EpochContext, index: u32) -> Hash2048 {
    let index = index * 2;
    Hash2048::from_halves(
        &lookup_1024_full(context, index),
        &lookup_1024_full(context, index + 1),
    )
}

/// Full dataset storage, filled on demand
///
/// Each 1024-bit item is 16 atomic 64-bit words. The first word doubles as
/// the "computed" flag: zero means unset. Writers store words 1..16 first and
/// publish word 0 with `Release`; readers `Acquire` word 0 before reading the
/// rest. Two threads racing on the same item both compute it and store the
/// same bytes.
pub struct FullDataset {
    words: Box<[AtomicU64]>,
}

impl FullDataset {
    /// Zero-initialized storage for `num_items` items
    ///
    /// Allocation failure is reported instead of aborting. Untouched pages of
    /// a zeroed allocation are typically never committed by the OS.
    pub(crate) fn new_zeroed(num_items: u32) -> Result<Self, Error> {
        let len = num_items as usize * ITEM_WORDS;
        let bytes = len.saturating_mul(8);
        if len == 0 {
            return Ok(Self {
                words: Box::new([]),
            });
        }

        let layout = Layout::array::<AtomicU64>(len).map_err(|_| Error::OutOfMemory { bytes })?;
        // SAFETY: the layout has a non-zero size, and all-zero bytes are a valid
        // AtomicU64. The pointer comes from the global allocator with the exact
        // layout Box<[AtomicU64]> of this length uses, so Box may free it.
        let words = unsafe {
            let raw = alloc::alloc_zeroed(layout) as *mut AtomicU64;
            if raw.is_null() {
                return Err(Error::OutOfMemory { bytes });
            }
            Box::from_raw(ptr::slice_from_raw_parts_mut(raw, len))
        };
        Ok(Self { words })
    }

    pub fn num_items(&self) -> u32 {
        (self.words.len() / ITEM_WORDS) as u32
    }

    fn slot(&self, index: u32) -> &[AtomicU64] {
        let start = index as usize * ITEM_WORDS;
        &self.words[start..start + ITEM_WORDS]
    }

    /// Whether item `index` has been published
    pub fn is_computed(&self, index: u32) -> bool {
        self.slot(index)[0].load(Ordering::Acquire) != 0
    }

    /// Item `index`, computing and publishing it first if unset
    pub fn get_or_compute(&self, index: u32, compute: impl FnOnce() -> Hash1024) -> Hash1024 {
        let slot = self.slot(index);

        let first = slot[0].load(Ordering::Acquire);
        if first != 0 {
            let mut words = [0u64; ITEM_WORDS];
            words[0] = first;
            for (word, cell) in words.iter_mut().zip(slot.iter()).skip(1) {
                *word = cell.load(Ordering::Relaxed);
            }
            return Hash1024::from_word64s(&words);
        }

        let item = compute();
        let words = item.to_word64s();
        for (cell, word) in slot.iter().zip(words.iter()).skip(1) {
            cell.store(*word, Ordering::Relaxed);
        }
        slot[0].store(words[0], Ordering::Release);
        item
    }
}

impl EpochContext {
    /// Compute every unset dataset item up front
    ///
    /// Returns `false` for light contexts, which have nothing to fill.
    pub fn generate_full_dataset(&self) -> bool {
        let Some(dataset) = self.full_dataset() else {
            return false;
        };

        let start = Instant::now();
        let num_items = dataset.num_items();
        let mut begin = 0u32;
        while begin < num_items {
            let end = begin.saturating_add(GENERATE_CHUNK).min(num_items);
            fill_range(self, dataset, begin, end);
            trace!(done = end, total = num_items, "dataset generation progress");
            begin = end;
        }
        debug!(
            epoch = self.epoch_number(),
            items = num_items,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "generated full dataset"
        );
        true
    }
}

#[cfg(feature = "parallel")]
fn fill_range(context: &EpochContext, dataset: &FullDataset, begin: u32, end: u32) {
    (begin..end).into_par_iter().for_each(|i| {
        dataset.get_or_compute(i, || item_1024(context.light_cache(), u64::from(i)));
    });
}

#[cfg(not(feature = "parallel"))]
fn fill_range(context: &EpochContext, dataset: &FullDataset, begin: u32, end: u32) {
    for i in begin..end {
        dataset.get_or_compute(i, || item_1024(context.light_cache(), u64::from(i)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epoch::build_light_cache;
    use crate::hash::Hash256;
    use std::sync::Arc;
    use std::thread;

    fn small_cache(n: usize) -> Vec<Hash512> {
        let mut cache = vec![Hash512::zero(); n];
        build_light_cache(&mut cache, &Hash256([3u8; 32]));
        cache
    }

    #[test]
    fn test_wide_items_are_concatenations() {
        let ctx = EpochContext::from_light_cache(0, small_cache(211), 101, false).unwrap();
        for i in [0u32, 1, 7, 50] {
            let item = calculate_dataset_item_1024(&ctx, i);
            let (lo, hi) = item.halves();
            assert_eq!(lo, calculate_dataset_item_512(&ctx, u64::from(i) * 2));
            assert_eq!(hi, calculate_dataset_item_512(&ctx, u64::from(i) * 2 + 1));

            let wide = calculate_dataset_item_2048(&ctx, i);
            assert_eq!(&wide.0[..128], &calculate_dataset_item_1024(&ctx, i * 2).0[..]);
            assert_eq!(&wide.0[128..], &calculate_dataset_item_1024(&ctx, i * 2 + 1).0[..]);
        }
    }

    #[test]
    fn test_item_index_wraps_light_cache() {
        // The cache index uses the full index, the parent seed its low 32 bits
        let cache = small_cache(13);
        let a = item_512(&cache, 5);
        let b = item_512(&cache, 5 + 13);
        assert_ne!(a, b);
        assert_eq!(item_512(&cache, 5), a);
    }

    #[test]
    fn test_l1_cache_is_dataset_prefix() {
        let ctx = EpochContext::from_light_cache(0, small_cache(211), 101, false).unwrap();
        let l1 = ctx.l1_cache();
        assert_eq!(l1.len(), PROGPOW_L1_CACHE_NUM_ITEMS);
        assert_eq!(&l1[..32], &calculate_dataset_item_1024(&ctx, 0).to_word32s()[..]);
        assert_eq!(&l1[4064..], &calculate_dataset_item_1024(&ctx, 127).to_word32s()[..]);
    }

    #[test]
    fn test_lazy_lookup_memoizes() {
        let ctx = EpochContext::from_light_cache(0, small_cache(211), 101, true).unwrap();
        let dataset = ctx.full_dataset().unwrap();
        assert_eq!(dataset.num_items(), 101);
        assert!(!dataset.is_computed(42));

        let item = lookup_1024_full(&ctx, 42);
        assert!(dataset.is_computed(42));
        assert_eq!(item, calculate_dataset_item_1024(&ctx, 42));

        // A published item is returned as stored, without recomputation
        let cached = dataset.get_or_compute(42, || panic!("recomputed a published item"));
        assert_eq!(cached, item);
    }

    #[test]
    fn test_lazy_lookup_concurrent() {
        let ctx = Arc::new(EpochContext::from_light_cache(0, small_cache(211), 101, true).unwrap());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let ctx = Arc::clone(&ctx);
                thread::spawn(move || {
                    (0..101u32)
                        .map(|i| lookup_1024_full(&ctx, (i + t * 25) % 101))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let results: Vec<Vec<Hash1024>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        for (t, items) in results.iter().enumerate() {
            for (i, item) in items.iter().enumerate() {
                let index = (i as u32 + t as u32 * 25) % 101;
                assert_eq!(*item, calculate_dataset_item_1024(&ctx, index));
            }
        }
    }

    #[test]
    fn test_generate_full_dataset() {
        let light = EpochContext::from_light_cache(0, small_cache(211), 101, false).unwrap();
        assert!(!light.generate_full_dataset());

        let full = EpochContext::from_light_cache(0, small_cache(211), 101, true).unwrap();
        assert!(full.generate_full_dataset());
        let dataset = full.full_dataset().unwrap();
        for i in 0..101 {
            assert!(dataset.is_computed(i), "item {i} not generated");
        }
        assert_eq!(lookup_1024_full(&full, 100), calculate_dataset_item_1024(&light, 100));
    }
}
