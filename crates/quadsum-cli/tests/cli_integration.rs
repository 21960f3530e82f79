//! Integration tests for the qsum CLI.
//!
//! Run with: `cargo test --package quadsum-cli --test cli_integration`

use std::fs;
use std::process::{Command, Output};

use tempfile::TempDir;

/// Helper to run the qsum CLI with given arguments.
fn run_qsum(args: &[&str]) -> Output {
    run_qsum_with_env(args, &[])
}

/// Helper to run qsum with extra environment variables.
fn run_qsum_with_env(args: &[&str], env: &[(&str, &str)]) -> Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_qsum"));
    for key in [
        "QUADSUM_THREADS",
        "QUADSUM_NODE_CAPACITY",
        "QUADSUM_ITERATIONS",
        "QUADSUM_WARMUP",
        "QUADSUM_SEED",
    ] {
        command.env_remove(key);
    }
    command
        .envs(env.iter().copied())
        .args(args)
        .output()
        .expect("Failed to execute qsum command")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

const FAST: &[&str] = &["-i", "2", "-w", "1", "--threads", "2", "--seed", "7"];

fn compare(extra: &[&str]) -> Output {
    let mut args = vec!["compare"];
    args.extend_from_slice(extra);
    args.extend_from_slice(FAST);
    run_qsum(&args)
}

// =============================================================================
// Help
// =============================================================================

#[test]
fn test_help_lists_commands() {
    let output = run_qsum(&["--help"]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("compare"));
    assert!(text.contains("probe"));
    assert!(text.contains("show-config"));
}

// =============================================================================
// Compare: single configuration
// =============================================================================

#[test]
fn test_compare_sample_both_engines() {
    let output = compare(&["-d", "4", "-n", "1000", "-p", "-q"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let text = stdout(&output);
    let pyramid = text.find("## Pyramid").expect("pyramid section");
    let quadtree = text.find("## Quadtree").expect("quadtree section");
    assert!(pyramid < quadtree);
    assert!(text.contains("P spent net:"));
    assert!(text.contains("P spent total:"));
    assert!(text.contains("Q spent net:"));
    assert!(text.contains("Q nodes used:"));
    assert!(!text.contains("Queued\tStart"));
}

#[test]
fn test_compare_verbose_prints_events() {
    let output = compare(&["-d", "3", "-n", "100", "-p", "--verbose"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let text = stdout(&output);
    assert!(text.contains("Queued\tStart\tEnd\tDelta\tPhase"));
    assert!(text.contains("scatter"));
    assert!(text.contains("reduce[0]"));
    assert!(!text.contains("## Quadtree"));
}

#[test]
fn test_compare_requires_an_engine() {
    let output = compare(&["-d", "3", "-n", "100"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Select at least one engine"));
}

#[test]
fn test_compare_rejects_invalid_depth() {
    let output = compare(&["-d", "0", "-n", "100", "-q"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("max depth must be at least 1"));
}

#[test]
fn test_compare_rejects_bad_warmup() {
    let output = run_qsum(&["compare", "-d", "3", "-n", "100", "-p", "-i", "3", "-w", "3"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("warm-up"));
}

// =============================================================================
// Compare: sweeps
// =============================================================================

#[test]
fn test_compare_depth_sweep() {
    let output = compare(&["-d", "2:4:1", "-n", "500", "-p"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let text = stdout(&output);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "Depth\tPoints\tP net\tP total");
    assert_eq!(lines.len(), 4);
    for (line, depth) in lines[1..].iter().zip(2..) {
        let fields: Vec<&str> = line.split('\t').collect();
        assert_eq!(fields.len(), 4);
        assert_eq!(fields[0], depth.to_string());
        assert_eq!(fields[1], "500");
    }
}

#[test]
fn test_compare_points_sweep_default_step() {
    let output = compare(&["-d", "3", "-n", "100:300", "-p", "-q"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let text = stdout(&output);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "Depth\tPoints\tP net\tP total\tQ net\tQ total");
    let counts: Vec<&str> = lines[1..]
        .iter()
        .map(|line| line.split('\t').nth(1).unwrap())
        .collect();
    assert_eq!(counts, vec!["100", "200", "300"]);
}

#[test]
fn test_compare_rejects_two_ranges() {
    let output = compare(&["-d", "2:4:1", "-n", "100:300", "-p"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Only one of --depth and --points"));
}

#[test]
fn test_compare_rejects_reversed_range() {
    let output = compare(&["-d", "5:2", "-n", "100", "-p"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("past its end"));
}

// =============================================================================
// Compare: JSON output
// =============================================================================

#[test]
fn test_compare_json_records() {
    let output = compare(&["-d", "3:5:1", "-n", "250", "-p", "-q", "--format", "json"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let text = stdout(&output);
    let records: Vec<serde_json::Value> = text
        .lines()
        .map(|line| serde_json::from_str(line).expect("valid JSON line"))
        .collect();
    assert_eq!(records.len(), 3);

    for (record, depth) in records.iter().zip(3..) {
        assert_eq!(record["depth"], depth);
        assert_eq!(record["points"], 250);
        assert_eq!(record["pyramid"]["root"]["count"], 250);
        assert_eq!(record["quadtree"]["root"]["count"], 250);
        assert!(record["pyramid"]["net_ms"].as_f64().unwrap() >= 0.0);
        assert!(record["pyramid"].get("nodes_used").is_none());
        let used = record["quadtree"]["nodes_used"].as_u64().unwrap();
        let capacity = record["quadtree"]["node_capacity"].as_u64().unwrap();
        assert!(used <= capacity);
    }
}

#[test]
fn test_seed_makes_points_reproducible() {
    let args = ["-d", "6", "-n", "400", "-q", "--format", "json"];
    let first: serde_json::Value = serde_json::from_str(stdout(&compare(&args)).trim()).unwrap();
    let second: serde_json::Value = serde_json::from_str(stdout(&compare(&args)).trim()).unwrap();
    assert_eq!(
        first["quadtree"]["nodes_used"],
        second["quadtree"]["nodes_used"]
    );
}

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn test_config_file_then_env_precedence() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("qsum.json");
    fs::write(
        &path,
        r#"{ "iterations": 4, "warmup": 1, "seed": 9, "engine": { "threads": 2 } }"#,
    )
    .unwrap();
    let path = path.to_str().unwrap();

    let output = run_qsum(&["--config", path, "show-config"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let config: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(config["iterations"], 4);
    assert_eq!(config["warmup"], 1);
    assert_eq!(config["seed"], 9);
    assert_eq!(config["engine"]["threads"], 2);

    let output = run_qsum_with_env(
        &["--config", path, "show-config"],
        &[("QUADSUM_ITERATIONS", "6"), ("QUADSUM_THREADS", "3")],
    );
    let config: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(config["iterations"], 6);
    assert_eq!(config["warmup"], 1);
    assert_eq!(config["engine"]["threads"], 3);
}

#[test]
fn test_missing_config_file_fails() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("absent.json");
    let output = run_qsum(&["--config", path.to_str().unwrap(), "show-config"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Failed to read config"));
}

#[test]
fn test_invalid_env_value_fails() {
    let output = run_qsum_with_env(&["show-config"], &[("QUADSUM_SEED", "abc")]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("QUADSUM_SEED"));
}

#[test]
fn test_invalid_engine_env_values_fail() {
    for key in ["QUADSUM_THREADS", "QUADSUM_NODE_CAPACITY"] {
        let output = run_qsum_with_env(&["show-config"], &[(key, "many")]);
        assert!(!output.status.success(), "{key} was accepted");
        assert!(stderr(&output).contains(key));
    }
}

#[test]
fn test_node_capacity_limit_aborts_quadtree() {
    let output = run_qsum_with_env(
        &["compare", "-d", "6", "-n", "1000", "-q", "-i", "1", "-w", "0"],
        &[("QUADSUM_NODE_CAPACITY", "5")],
    );
    assert!(!output.status.success());
    let err = stderr(&output);
    assert!(err.contains("Quadtree failed"));
    assert!(err.contains("node arena exhausted"));
}

// =============================================================================
// Probe
// =============================================================================

#[test]
fn test_probe_reports_latency_and_rate() {
    let output = run_qsum(&["probe", "--threads", "2", "--samples", "50"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let text = stdout(&output);
    assert!(text.contains("Worker threads:   2"));
    assert!(text.contains("Dispatch latency:"));
    assert!(text.contains(" us"));
    assert!(text.contains("GOps/s"));
}

#[test]
fn test_probe_rejects_zero_samples() {
    let output = run_qsum(&["probe", "--samples", "0"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("--samples must be between 1"));
}

#[test]
fn test_probe_rejects_samples_past_u32() {
    let output = run_qsum(&["probe", "--samples", "4294967296"]);
    assert!(!output.status.success());
    assert!(!stderr(&output).contains("panicked"));
}
