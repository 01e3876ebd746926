//! Error types

use thiserror::Error;

/// Epoch context construction failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Epoch number past the last supported epoch
    #[error("epoch {0} is out of range (max {max})", max = crate::params::MAX_EPOCH_NUMBER)]
    EpochOutOfRange(u32),

    /// The cache or dataset allocation could not be satisfied
    #[error("failed to allocate {bytes} bytes")]
    OutOfMemory { bytes: usize },

    /// Hand-built context with an empty light cache or fewer than two dataset items
    #[error(
        "invalid context: {light_cache_num_items} light cache items, \
         {full_dataset_num_items} dataset items"
    )]
    InvalidContext {
        light_cache_num_items: usize,
        full_dataset_num_items: u32,
    },
}

/// Why a submitted proof of work was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VerificationError {
    /// Recomputed final hash is above the boundary
    #[error("final hash does not satisfy the boundary")]
    InvalidFinalHash,

    /// Final hash is fine but the claimed mix hash does not match
    #[error("mix hash does not match")]
    InvalidMixHash,
}
