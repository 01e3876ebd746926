//! Ethash / ProgPoW Prover Library
//!
//! Multi-threaded mining and verification on top of [`ethash_core`].
//!
//! # Overview
//!
//! The core crate holds the algorithms: epoch contexts, Ethash, ProgPoW and
//! difficulty arithmetic. This crate adds a [`Miner`] that shards the nonce
//! space across worker threads and the `ethash` command-line tool.
//!
//! # Example
//!
//! ```rust,no_run
//! use ethash_prover::{Algorithm, Miner, MinerConfig};
//! use ethash_prover::algorithm::{Hash256, difficulty_to_boundary};
//!
//! let difficulty = ethash_prover::parse_u256("1000").unwrap();
//! let config = MinerConfig {
//!     algorithm: Algorithm::Progpow,
//!     block_number: 30_000,
//!     header_hash: Hash256::zero(),
//!     boundary: difficulty_to_boundary(&difficulty),
//!     ..MinerConfig::default()
//! };
//!
//! if let Some(proof) = Miner::new(config).run().unwrap() {
//!     println!("nonce {} mix {}", proof.nonce, proof.mix_hash);
//! }
//! ```

// Re-export the core algorithm
pub use ethash_core as algorithm;

pub mod miner;

// Convenience re-exports
pub use algorithm::{EpochContext, Hash256, HashResult, VerificationError};
pub use miner::{Algorithm, FoundProof, Miner, MinerConfig, MinerError, ProofReport, parse_u256};
