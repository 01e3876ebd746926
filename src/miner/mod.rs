//! Multi-threaded nonce search
//!
//! The nonce space is cut into fixed-size batches handed out in order from a
//! shared counter. Each worker scans its batch with the core `search` entry
//! point of the chosen algorithm. Once a solution is found no batch past it is
//! started, and batches already running before it are allowed to finish, so
//! the reported nonce is always the lowest solution in the scanned range, the
//! same one a single-threaded scan would return.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::algorithm::{
    self, EpochContext, Hash256, SearchResult, ethash, get_epoch_number, progpow,
};

/// Default nonces per batch
pub const DEFAULT_BATCH_SIZE: u64 = 256;

/// Proof-of-work algorithm to mine or verify
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    #[default]
    Ethash,
    Progpow,
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Algorithm::Ethash => f.write_str("ethash"),
            Algorithm::Progpow => f.write_str("progpow"),
        }
    }
}

impl FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ethash" => Ok(Algorithm::Ethash),
            "progpow" => Ok(Algorithm::Progpow),
            other => Err(format!("unknown algorithm '{}' (expected ethash or progpow)", other)),
        }
    }
}

impl Algorithm {
    /// Hash one nonce
    pub fn hash(
        self,
        context: &EpochContext,
        block_number: u64,
        header_hash: &Hash256,
        nonce: u64,
    ) -> algorithm::HashResult {
        match self {
            Algorithm::Ethash => ethash::hash(context, header_hash, nonce),
            Algorithm::Progpow => progpow::hash(context, block_number, header_hash, nonce),
        }
    }

    /// Verify a proof against a boundary
    pub fn verify(
        self,
        context: &EpochContext,
        block_number: u64,
        header_hash: &Hash256,
        mix_hash: &Hash256,
        nonce: u64,
        boundary: &Hash256,
    ) -> Result<(), algorithm::VerificationError> {
        match self {
            Algorithm::Ethash => {
                ethash::verify_against_boundary(context, header_hash, mix_hash, nonce, boundary)
            }
            Algorithm::Progpow => progpow::verify_against_boundary(
                context,
                block_number,
                header_hash,
                mix_hash,
                nonce,
                boundary,
            ),
        }
    }

    fn search(
        self,
        context: &EpochContext,
        block_number: u64,
        header_hash: &Hash256,
        boundary: &Hash256,
        start_nonce: u64,
        iterations: u64,
    ) -> SearchResult {
        match self {
            Algorithm::Ethash => {
                ethash::search(context, header_hash, boundary, start_nonce, iterations)
            }
            Algorithm::Progpow => progpow::search(
                context,
                block_number,
                header_hash,
                boundary,
                start_nonce,
                iterations,
            ),
        }
    }
}

/// Miner configuration
#[derive(Debug, Clone)]
pub struct MinerConfig {
    /// Worker threads
    pub threads: usize,
    /// Algorithm to mine
    pub algorithm: Algorithm,
    /// Block being mined; selects the epoch and the ProgPoW program
    pub block_number: u64,
    /// Header hash being mined
    pub header_hash: Hash256,
    /// Largest acceptable final hash
    pub boundary: Hash256,
    /// First nonce to try
    pub start_nonce: u64,
    /// Nonces per batch
    pub batch_size: u64,
    /// Total nonces to try, unlimited when `None`
    pub max_nonces: Option<u64>,
    /// Use a full (lazily filled) dataset instead of the light cache
    pub full_dataset: bool,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            threads: num_cpus::get(),
            algorithm: Algorithm::default(),
            block_number: 0,
            header_hash: Hash256::zero(),
            boundary: Hash256::MAX,
            start_nonce: 0,
            batch_size: DEFAULT_BATCH_SIZE,
            max_nonces: None,
            full_dataset: true,
        }
    }
}

/// Miner failures
#[derive(Debug, Error)]
pub enum MinerError {
    /// The epoch context could not be built
    #[error("epoch context: {0}")]
    Context(#[from] algorithm::Error),

    /// Zero threads or a zero batch size
    #[error("invalid miner configuration: {0}")]
    InvalidConfig(&'static str),
}

/// A valid proof found by a mining thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FoundProof {
    pub algorithm: Algorithm,
    pub block_number: u64,
    pub nonce: u64,
    pub final_hash: Hash256,
    pub mix_hash: Hash256,
}

/// JSON form of a [`FoundProof`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofReport {
    pub algorithm: Algorithm,
    pub block_number: u64,
    pub epoch: u32,
    pub nonce: u64,
    pub final_hash: String,
    pub mix_hash: String,
}

impl From<&FoundProof> for ProofReport {
    fn from(proof: &FoundProof) -> Self {
        Self {
            algorithm: proof.algorithm,
            block_number: proof.block_number,
            epoch: get_epoch_number(proof.block_number),
            nonce: proof.nonce,
            final_hash: proof.final_hash.to_string(),
            mix_hash: proof.mix_hash.to_string(),
        }
    }
}

/// Parse a 256-bit big-endian number given in decimal or `0x` hex
pub fn parse_u256(s: &str) -> Result<Hash256, String> {
    let s = s.trim();
    let mut out = Hash256::zero();
    if let Some(digits) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        if digits.is_empty() || digits.len() > 64 {
            return Err(format!("'{}' is not a 256-bit hex number", s));
        }
        let padded = format!("{:0>64}", digits);
        hex::decode_to_slice(&padded, &mut out.0).map_err(|e| format!("'{}': {}", s, e))?;
        return Ok(out);
    }
    let value: u128 = s
        .parse()
        .map_err(|e| format!("'{}' is not a number: {}", s, e))?;
    out.0[16..].copy_from_slice(&value.to_be_bytes());
    Ok(out)
}

/// Solution with the batch it came from
struct Best {
    batch: u64,
    proof: FoundProof,
}

/// Multi-threaded miner over one header
pub struct Miner {
    config: MinerConfig,
    context: Option<Arc<EpochContext>>,
    total_hashes: AtomicU64,
    stop: AtomicBool,
}

impl Miner {
    /// Miner fetching contexts from the process-wide epoch cache
    pub fn new(config: MinerConfig) -> Self {
        Self {
            config,
            context: None,
            total_hashes: AtomicU64::new(0),
            stop: AtomicBool::new(false),
        }
    }

    /// Miner over a caller-provided context
    pub fn with_context(config: MinerConfig, context: Arc<EpochContext>) -> Self {
        Self {
            context: Some(context),
            ..Self::new(config)
        }
    }

    pub fn config(&self) -> &MinerConfig {
        &self.config
    }

    /// Nonces hashed so far across all workers
    pub fn total_hashes(&self) -> u64 {
        self.total_hashes.load(Ordering::Relaxed)
    }

    /// Ask the workers to stop after their current batch
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    fn context(&self) -> Result<Arc<EpochContext>, MinerError> {
        if let Some(context) = &self.context {
            return Ok(Arc::clone(context));
        }
        let epoch = get_epoch_number(self.config.block_number);
        let context = if self.config.full_dataset {
            algorithm::get_global_epoch_context_full(epoch)?
        } else {
            algorithm::get_global_epoch_context(epoch)?
        };
        Ok(context)
    }

    /// Nonce count of batch `batch`, `None` past the configured budget
    fn batch_len(&self, batch: u64) -> Option<u64> {
        let size = self.config.batch_size;
        match self.config.max_nonces {
            None => Some(size),
            Some(max) => {
                let begin = batch.checked_mul(size)?;
                (begin < max).then(|| size.min(max - begin))
            }
        }
    }

    fn work(
        &self,
        thread_id: usize,
        next_batch: &AtomicU64,
        best: &Mutex<Option<Best>>,
        best_batch: &AtomicU64,
    ) -> Result<(), MinerError> {
        // Each worker resolves the context itself, so global contexts are
        // cached per thread
        let context = self.context()?;
        let config = &self.config;

        while !self.stop.load(Ordering::Relaxed) {
            let batch = next_batch.fetch_add(1, Ordering::SeqCst);
            if batch >= best_batch.load(Ordering::SeqCst) {
                break;
            }
            let Some(len) = self.batch_len(batch) else {
                break;
            };

            let start = config
                .start_nonce
                .wrapping_add(batch.wrapping_mul(config.batch_size));
            let found = config.algorithm.search(
                &context,
                config.block_number,
                &config.header_hash,
                &config.boundary,
                start,
                len,
            );

            if !found.solution_found {
                self.total_hashes.fetch_add(len, Ordering::Relaxed);
                continue;
            }

            self.total_hashes
                .fetch_add(found.nonce.wrapping_sub(start) + 1, Ordering::Relaxed);
            debug!(thread_id, batch, nonce = found.nonce, "solution in batch");

            let mut guard = best.lock().unwrap_or_else(PoisonError::into_inner);
            if guard.as_ref().map_or(true, |b| batch < b.batch) {
                *guard = Some(Best {
                    batch,
                    proof: FoundProof {
                        algorithm: config.algorithm,
                        block_number: config.block_number,
                        nonce: found.nonce,
                        final_hash: found.result.final_hash,
                        mix_hash: found.result.mix_hash,
                    },
                });
                best_batch.store(batch, Ordering::SeqCst);
            }
            break;
        }
        Ok(())
    }

    /// Scan until a proof is found, the budget runs out, or [`Miner::stop`]
    ///
    /// Blocks the calling thread; workers run on scoped threads.
    pub fn run(&self) -> Result<Option<FoundProof>, MinerError> {
        if self.config.threads == 0 {
            return Err(MinerError::InvalidConfig("threads must be positive"));
        }
        if self.config.batch_size == 0 {
            return Err(MinerError::InvalidConfig("batch size must be positive"));
        }

        info!(
            algorithm = %self.config.algorithm,
            block = self.config.block_number,
            threads = self.config.threads,
            boundary = %self.config.boundary,
            "mining started"
        );

        let next_batch = AtomicU64::new(0);
        let best_batch = AtomicU64::new(u64::MAX);
        let best = Mutex::new(None::<Best>);

        let results: Vec<Result<(), MinerError>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..self.config.threads)
                .map(|thread_id| {
                    let (next_batch, best, best_batch) = (&next_batch, &best, &best_batch);
                    scope.spawn(move || self.work(thread_id, next_batch, best, best_batch))
                })
                .collect();
            handles
                .into_iter()
                .map(|h| match h.join() {
                    Ok(result) => result,
                    Err(panic) => std::panic::resume_unwind(panic),
                })
                .collect()
        });
        for result in results {
            result?;
        }

        let proof = best
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .map(|b| b.proof);
        match &proof {
            Some(p) => info!(nonce = p.nonce, hashes = self.total_hashes(), "proof found"),
            None => info!(hashes = self.total_hashes(), "no proof in range"),
        }
        Ok(proof)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::{
        Hash512, build_light_cache, calculate_epoch_seed, difficulty_to_boundary,
    };

    fn tiny_context() -> Arc<EpochContext> {
        let mut cache = vec![Hash512::zero(); 1021];
        build_light_cache(&mut cache, &calculate_epoch_seed(2));
        Arc::new(EpochContext::from_light_cache(0, cache, 509, true).unwrap())
    }

    fn boundary_for(difficulty: u64) -> Hash256 {
        let mut d = Hash256::zero();
        d.0[24..].copy_from_slice(&difficulty.to_be_bytes());
        difficulty_to_boundary(&d)
    }

    fn config(algorithm: Algorithm, threads: usize) -> MinerConfig {
        MinerConfig {
            threads,
            algorithm,
            block_number: 75,
            header_hash: Hash256([0x5c; 32]),
            boundary: boundary_for(32),
            start_nonce: 1_000,
            batch_size: 4,
            max_nonces: Some(2_000),
            full_dataset: false,
        }
    }

    #[test]
    fn test_sharded_matches_single_threaded_search() {
        let context = tiny_context();
        for algorithm in [Algorithm::Ethash, Algorithm::Progpow] {
            let cfg = config(algorithm, 4);
            let expected = algorithm.search(
                &context,
                cfg.block_number,
                &cfg.header_hash,
                &cfg.boundary,
                cfg.start_nonce,
                2_000,
            );
            assert!(expected.solution_found, "{algorithm}: no solution in range");

            let miner = Miner::with_context(cfg.clone(), Arc::clone(&context));
            let proof = miner.run().unwrap().unwrap();
            assert_eq!(proof.nonce, expected.nonce, "{algorithm}");
            assert_eq!(proof.final_hash, expected.result.final_hash);
            assert_eq!(proof.mix_hash, expected.result.mix_hash);
            assert!(miner.total_hashes() >= proof.nonce - cfg.start_nonce + 1);

            assert_eq!(
                algorithm.verify(
                    &context,
                    cfg.block_number,
                    &cfg.header_hash,
                    &proof.mix_hash,
                    proof.nonce,
                    &cfg.boundary
                ),
                Ok(())
            );
        }
    }

    #[test]
    fn test_budget_exhausted() {
        let mut cfg = config(Algorithm::Ethash, 3);
        cfg.boundary = Hash256::zero();
        cfg.max_nonces = Some(30);
        let miner = Miner::with_context(cfg, tiny_context());
        assert_eq!(miner.run().unwrap(), None);
        assert_eq!(miner.total_hashes(), 30);
    }

    #[test]
    fn test_stopped_miner_returns_nothing() {
        let mut cfg = config(Algorithm::Ethash, 2);
        cfg.boundary = Hash256::zero();
        cfg.max_nonces = None;
        let miner = Miner::with_context(cfg, tiny_context());
        miner.stop();
        assert_eq!(miner.run().unwrap(), None);
    }

    #[test]
    fn test_invalid_config() {
        let mut cfg = config(Algorithm::Ethash, 0);
        assert!(matches!(
            Miner::with_context(cfg.clone(), tiny_context()).run(),
            Err(MinerError::InvalidConfig(_))
        ));
        cfg.threads = 1;
        cfg.batch_size = 0;
        assert!(Miner::with_context(cfg, tiny_context()).run().is_err());
    }

    #[test]
    fn test_parse_u256() {
        let mut expected = Hash256::zero();
        expected.0[30] = 0x01;
        expected.0[31] = 0x00;
        assert_eq!(parse_u256("256"), Ok(expected));
        assert_eq!(parse_u256("0x100"), Ok(expected));
        assert_eq!(parse_u256(&format!("0x{}", "f".repeat(64))), Ok(Hash256::MAX));
        assert!(parse_u256("0x").is_err());
        assert!(parse_u256(&format!("0x1{}", "0".repeat(64))).is_err());
        assert!(parse_u256("12ab").is_err());
    }

    #[test]
    fn test_algorithm_parse_and_report() {
        assert_eq!("ethash".parse::<Algorithm>(), Ok(Algorithm::Ethash));
        assert_eq!("ProgPoW".parse::<Algorithm>(), Ok(Algorithm::Progpow));
        assert!("scrypt".parse::<Algorithm>().is_err());

        let proof = FoundProof {
            algorithm: Algorithm::Progpow,
            block_number: 30_000,
            nonce: 7,
            final_hash: Hash256::zero(),
            mix_hash: Hash256::MAX,
        };
        let json = serde_json::to_value(ProofReport::from(&proof)).unwrap();
        assert_eq!(json["algorithm"], "progpow");
        assert_eq!(json["epoch"], 1);
        assert_eq!(json["nonce"], 7);
        assert_eq!(json["mix_hash"], "f".repeat(64));
    }
}
