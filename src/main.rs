//! Ethash / ProgPoW Prover CLI
//!
//! A command-line tool for computing, verifying and mining Ethash and ProgPoW
//! proofs.
//!
//! # Commands
//!
//! - `epoch` - Show epoch parameters for a block, epoch or seed
//! - `hash` - Hash one nonce
//! - `verify` - Verify a proof against a boundary or difficulty
//! - `mine` - Search for a nonce on all cores
//! - `benchmark` - Run performance benchmark

use clap::{Args, Parser, Subcommand};
use std::io::Write;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

use ethash_prover::algorithm::{
    Hash256, MAX_EPOCH_NUMBER, PROGPOW_PERIOD_LENGTH, PROGPOW_REVISION, calculate_epoch_seed,
    calculate_full_dataset_num_items, calculate_light_cache_num_items, create_epoch_context,
    difficulty_to_boundary, find_epoch_number, get_epoch_number, get_full_dataset_size,
    get_global_epoch_context, get_light_cache_size, keccak256,
};
use ethash_prover::{Algorithm, Miner, MinerConfig, ProofReport, parse_u256};

#[derive(Parser)]
#[command(name = "ethash")]
#[command(author = "Cyberia")]
#[command(version = "0.1.0")]
#[command(about = "Ethash / ProgPoW proof-of-work miner and verifier")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,
}

/// Boundary given directly or derived from a difficulty
#[derive(Args)]
#[group(required = true, multiple = false)]
struct Target {
    /// Largest acceptable final hash (decimal or 0x hex)
    #[arg(long, value_parser = parse_u256)]
    boundary: Option<Hash256>,

    /// Block difficulty (decimal or 0x hex)
    #[arg(long, value_parser = parse_u256)]
    difficulty: Option<Hash256>,
}

impl Target {
    fn boundary(&self) -> Hash256 {
        match (self.boundary, self.difficulty) {
            (Some(boundary), _) => boundary,
            (None, Some(difficulty)) => difficulty_to_boundary(&difficulty),
            (None, None) => Hash256::MAX,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show epoch parameters
    Epoch {
        /// Block number
        #[arg(long, conflicts_with_all = ["epoch", "seed"])]
        block: Option<u64>,

        /// Epoch number
        #[arg(long, conflicts_with = "seed")]
        epoch: Option<u32>,

        /// Epoch seed (hex), searched in the supported epoch range
        #[arg(long)]
        seed: Option<Hash256>,
    },

    /// Hash a single nonce
    Hash {
        #[arg(short, long, default_value_t = Algorithm::Ethash)]
        algorithm: Algorithm,

        /// Block number
        #[arg(short, long, default_value = "0")]
        block: u64,

        /// Header hash (hex)
        #[arg(long)]
        header: Hash256,

        /// Nonce
        #[arg(short, long)]
        nonce: u64,
    },

    /// Verify a proof
    Verify {
        #[arg(short, long, default_value_t = Algorithm::Ethash)]
        algorithm: Algorithm,

        /// Block number
        #[arg(short, long, default_value = "0")]
        block: u64,

        /// Header hash (hex)
        #[arg(long)]
        header: Hash256,

        /// Mix hash (hex)
        #[arg(long)]
        mix: Hash256,

        /// Nonce
        #[arg(short, long)]
        nonce: u64,

        #[command(flatten)]
        target: Target,
    },

    /// Search for a valid nonce
    Mine {
        /// Number of threads to use (default: number of CPU cores)
        #[arg(short, long)]
        threads: Option<usize>,

        #[arg(short, long, default_value_t = Algorithm::Ethash)]
        algorithm: Algorithm,

        /// Block number
        #[arg(short, long, default_value = "0")]
        block: u64,

        /// Header hash (hex)
        #[arg(long)]
        header: Hash256,

        #[command(flatten)]
        target: Target,

        /// First nonce to try
        #[arg(long, default_value = "0")]
        start_nonce: u64,

        /// Nonces per work batch
        #[arg(long, default_value_t = ethash_prover::miner::DEFAULT_BATCH_SIZE)]
        batch: u64,

        /// Stop after this many nonces
        #[arg(long)]
        max_nonces: Option<u64>,

        /// Mine from the light cache instead of the full dataset
        #[arg(long)]
        light: bool,
    },

    /// Run performance benchmark
    Benchmark {
        #[arg(short, long, default_value_t = Algorithm::Ethash)]
        algorithm: Algorithm,

        /// Block number
        #[arg(short, long, default_value = "0")]
        block: u64,

        /// Number of hashes to compute
        #[arg(short, long, default_value = "100")]
        count: u32,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("ethash_prover=info,ethash_core=info")),
        )
        .init();

    let json = cli.json;
    let result = match cli.command {
        Commands::Epoch { block, epoch, seed } => cmd_epoch(block, epoch, seed, json),
        Commands::Hash {
            algorithm,
            block,
            header,
            nonce,
        } => cmd_hash(algorithm, block, &header, nonce, json),
        Commands::Verify {
            algorithm,
            block,
            header,
            mix,
            nonce,
            target,
        } => cmd_verify(algorithm, block, &header, &mix, nonce, &target.boundary(), json),
        Commands::Mine {
            threads,
            algorithm,
            block,
            header,
            target,
            start_nonce,
            batch,
            max_nonces,
            light,
        } => cmd_mine(
            MinerConfig {
                threads: threads.unwrap_or_else(num_cpus::get),
                algorithm,
                block_number: block,
                header_hash: header,
                boundary: target.boundary(),
                start_nonce,
                batch_size: batch,
                max_nonces,
                full_dataset: !light,
            },
            json,
        ),
        Commands::Benchmark {
            algorithm,
            block,
            count,
        } => cmd_benchmark(algorithm, block, count),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_epoch(
    block: Option<u64>,
    epoch: Option<u32>,
    seed: Option<Hash256>,
    json: bool,
) -> anyhow::Result<()> {
    let epoch = match (block, epoch, seed) {
        (Some(block), _, _) => get_epoch_number(block),
        (None, Some(epoch), _) => epoch,
        (None, None, Some(seed)) => find_epoch_number(&seed)
            .ok_or_else(|| anyhow::anyhow!("Seed {} matches no supported epoch", seed))?,
        (None, None, None) => anyhow::bail!("Give one of --block, --epoch or --seed"),
    };

    let light_items = calculate_light_cache_num_items(epoch);
    let full_items = calculate_full_dataset_num_items(epoch);
    if light_items == 0 || full_items == 0 {
        anyhow::bail!(
            "Epoch {} is past the last supported epoch {}",
            epoch,
            MAX_EPOCH_NUMBER
        );
    }
    let seed = calculate_epoch_seed(epoch);

    if json {
        let report = serde_json::json!({
            "epoch": epoch,
            "seed": seed.to_string(),
            "light_cache_items": light_items,
            "light_cache_size": get_light_cache_size(light_items),
            "full_dataset_items": full_items,
            "full_dataset_size": get_full_dataset_size(full_items),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Epoch: {}", epoch);
    println!("Seed:  {}", seed);
    println!(
        "Light cache:  {} items ({} bytes)",
        light_items,
        get_light_cache_size(light_items)
    );
    println!(
        "Full dataset: {} items ({} bytes)",
        full_items,
        get_full_dataset_size(full_items)
    );

    Ok(())
}

fn cmd_hash(
    algorithm: Algorithm,
    block: u64,
    header: &Hash256,
    nonce: u64,
    json: bool,
) -> anyhow::Result<()> {
    let context = get_global_epoch_context(get_epoch_number(block))?;
    let result = algorithm.hash(&context, block, header, nonce);

    if json {
        let report = serde_json::json!({
            "algorithm": algorithm,
            "block_number": block,
            "nonce": nonce,
            "final_hash": result.final_hash.to_string(),
            "mix_hash": result.mix_hash.to_string(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Final hash: {}", result.final_hash);
        println!("Mix hash:   {}", result.mix_hash);
    }

    Ok(())
}

fn cmd_verify(
    algorithm: Algorithm,
    block: u64,
    header: &Hash256,
    mix: &Hash256,
    nonce: u64,
    boundary: &Hash256,
    json: bool,
) -> anyhow::Result<()> {
    let context = get_global_epoch_context(get_epoch_number(block))?;
    let outcome = algorithm.verify(&context, block, header, mix, nonce, boundary);

    if json {
        let report = serde_json::json!({
            "valid": outcome.is_ok(),
            "error": outcome.err().map(|e| e.to_string()),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    match outcome {
        Ok(()) => {
            println!("Valid proof");
            Ok(())
        }
        Err(e) => anyhow::bail!("Invalid proof: {}", e),
    }
}

fn cmd_mine(config: MinerConfig, json: bool) -> anyhow::Result<()> {
    // Status goes to stderr so stdout carries only the result
    let epoch = get_epoch_number(config.block_number);
    eprintln!("\n=== {} Miner ===", config.algorithm);
    eprintln!("Block:    {} (epoch {})", config.block_number, epoch);
    eprintln!("Header:   {}", config.header_hash);
    eprintln!("Boundary: {}", config.boundary);
    eprintln!("Threads:  {}", config.threads);
    eprintln!("Dataset:  {}", if config.full_dataset { "full" } else { "light" });
    eprintln!("========================\n");

    let miner = Miner::new(config);
    let start = Instant::now();

    let outcome = std::thread::scope(|scope| {
        let handle = scope.spawn(|| miner.run());

        // Monitor progress while threads work
        let mut last_report = Instant::now();
        while !handle.is_finished() {
            std::thread::sleep(Duration::from_millis(100));
            if last_report.elapsed() < Duration::from_secs(2) {
                continue;
            }
            last_report = Instant::now();

            let hashes = miner.total_hashes();
            let elapsed = start.elapsed().as_secs_f64();
            let hashrate = if elapsed > 0.0 {
                hashes as f64 / elapsed
            } else {
                0.0
            };
            eprint!(
                "\rHashrate: {:.0} H/s | Hashes: {} | Time: {:.0}s",
                hashrate, hashes, elapsed
            );
            std::io::stderr().flush().ok();
        }

        handle.join()
    });
    let proof = match outcome {
        Ok(result) => result?,
        Err(panic) => std::panic::resume_unwind(panic),
    };

    let hashes = miner.total_hashes();
    let elapsed = start.elapsed().as_secs_f64();

    let Some(proof) = proof else {
        anyhow::bail!("No valid nonce found after {} hashes", hashes);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&ProofReport::from(&proof))?);
        return Ok(());
    }

    eprintln!();
    println!("Found valid proof!");
    println!("  Nonce:      {}", proof.nonce);
    println!("  Final hash: {}", proof.final_hash);
    println!("  Mix hash:   {}", proof.mix_hash);
    println!(
        "  Hashes:     {} ({:.0} H/s)",
        hashes,
        hashes as f64 / elapsed
    );

    Ok(())
}

fn cmd_benchmark(algorithm: Algorithm, block: u64, count: u32) -> anyhow::Result<()> {
    let epoch = get_epoch_number(block);
    println!("Building light cache for epoch {}...", epoch);
    let setup = Instant::now();
    let context = create_epoch_context(epoch)?;
    println!("  Done in {:.2}s", setup.elapsed().as_secs_f64());

    println!("Running {} benchmark with {} hashes...", algorithm, count);

    let header = keccak256(b"benchmark header");
    let start = Instant::now();

    for nonce in 0..count {
        let _ = algorithm.hash(&context, block, &header, u64::from(nonce));
    }

    let elapsed = start.elapsed();
    let hashrate = count as f64 / elapsed.as_secs_f64();

    println!("\nResults:");
    println!("  Total hashes: {}", count);
    println!("  Time elapsed: {:.2}s", elapsed.as_secs_f64());
    println!("  Hashrate: {:.2} H/s", hashrate);

    // Memory info
    println!("\nAlgorithm parameters:");
    println!("  Epoch: {}", epoch);
    println!(
        "  Light cache: {} MB",
        get_light_cache_size(context.light_cache_num_items()) / (1024 * 1024)
    );
    println!(
        "  Full dataset: {} MB",
        get_full_dataset_size(context.full_dataset_num_items()) / (1024 * 1024)
    );
    if algorithm == Algorithm::Progpow {
        println!("  ProgPoW revision: {}", PROGPOW_REVISION);
        println!("  Period length: {} blocks", PROGPOW_PERIOD_LENGTH);
    }

    Ok(())
}
