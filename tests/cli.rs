//! End-to-end checks of the `ethash` binary

use std::process::{Command, Output};

use ethash_prover::{Algorithm, ProofReport};

fn ethash(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_ethash"))
        .args(args)
        .env("RUST_LOG", "info")
        .output()
        .unwrap()
}

#[test]
fn test_mine_json_stdout_is_only_the_report() {
    let boundary = format!("0x{}", "f".repeat(64));
    let header = "2a8de2adf89af77358250bf908bf04ba94a6e8c3ba87775564a41d269a05e4ce";
    let output = ethash(&[
        "--json",
        "mine",
        "--algorithm",
        "ethash",
        "--header",
        header,
        "--boundary",
        &boundary,
        "--threads",
        "2",
        "--start-nonce",
        "42",
        "--max-nonces",
        "16",
        "--light",
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8(output.stdout).unwrap();
    let report: ProofReport = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report.algorithm, Algorithm::Ethash);
    assert_eq!(report.epoch, 0);
    assert_eq!(report.nonce, 42);
    assert_eq!(report.mix_hash.len(), 64);

    // The banner still reaches the user, on stderr
    assert!(String::from_utf8_lossy(&output.stderr).contains("Miner"));
}

#[test]
fn test_epoch_json() {
    let output = ethash(&["epoch", "--epoch", "171", "--json"]);
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["epoch"], 171);
    assert_eq!(
        report["seed"],
        "a9b0e0c9aca72c07ba06b5bbdae8b8f69e61878301508473379bb4f71807d707"
    );
}
