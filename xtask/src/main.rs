//! Custom cargo commands for rtdbg.
//!
//! Usage:
//!   cargo xtask verify    - Run full verification suite
//!   cargo xtask test      - Run all tests
//!   cargo xtask kani      - Run Kani proofs
//!   cargo xtask check     - Quick check (no Kani)

use anyhow::{bail, Context, Result};
use std::env;
use std::path::PathBuf;
use std::process::Command;

fn main() -> Result<()> {
    let task = env::args().nth(1);
    match task.as_deref() {
        Some("verify") => verify()?,
        Some("test") => test()?,
        Some("kani") => kani()?,
        Some("check") => check()?,
        Some("bench") => bench()?,
        _ => print_help(),
    }
    Ok(())
}

fn print_help() {
    eprintln!(
        r#"
cargo xtask <COMMAND>

Commands:
  verify    Run full verification suite (tests + Kani + constant alignment)
  test      Run all Rust tests
  kani      Run Kani proofs only
  check     Quick check (cargo test + clippy, no Kani)
  bench     Run benchmarks
"#
    );
}

/// Full verification suite
fn verify() -> Result<()> {
    println!("==========================================");
    println!("rtdbg Verification Suite");
    println!("==========================================\n");

    println!("[1/4] Running Rust tests...");
    run_cargo(&["test", "--quiet"])?;
    println!("✓ All Rust tests passed\n");

    println!("[2/4] Running clippy...");
    run_cargo(&["clippy", "--quiet", "--", "-D", "warnings"])?;
    println!("✓ Clippy passed\n");

    println!("[3/4] Verifying proof constants match the crate...");
    verify_constants()?;
    println!("✓ Constants aligned\n");

    println!("[4/4] Running Kani proofs...");
    kani()?;
    println!("✓ Kani proofs hold\n");

    println!("==========================================");
    println!("✓ ALL VERIFICATION CHECKS PASSED");
    println!("==========================================");
    println!("\nSafe to release.");

    Ok(())
}

/// Run all tests
fn test() -> Result<()> {
    run_cargo(&["test"])
}

/// Run Kani proofs in the standalone proof crate
fn kani() -> Result<()> {
    let proofs_dir = project_root()?.join("kani-proofs");
    if !proofs_dir.exists() {
        println!("  (no kani-proofs directory, skipping)");
        return Ok(());
    }

    let status = Command::new("cargo")
        .arg("kani")
        .current_dir(&proofs_dir)
        .status()
        .context("Failed to run cargo kani (is Kani installed?)")?;

    if !status.success() {
        bail!("Kani proofs failed");
    }

    Ok(())
}

/// Quick check (no Kani)
fn check() -> Result<()> {
    println!("Running quick checks...\n");

    println!("[1/3] cargo check...");
    run_cargo(&["check"])?;

    println!("[2/3] cargo test...");
    run_cargo(&["test", "--quiet"])?;

    println!("[3/3] cargo clippy...");
    run_cargo(&["clippy", "--quiet", "--", "-D", "warnings"])?;

    println!("\n✓ Quick checks passed");
    Ok(())
}

/// Run benchmarks
fn bench() -> Result<()> {
    run_cargo(&["bench"])
}

// ============================================================================
// Helper functions
// ============================================================================

fn project_root() -> Result<PathBuf> {
    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => env::current_dir().context("Failed to read current directory")?,
    };

    // xtask is in project_root/xtask, so go up one level
    let root = manifest_dir.parent().unwrap_or(&manifest_dir);
    Ok(root.to_path_buf())
}

fn run_cargo(args: &[&str]) -> Result<()> {
    let root = project_root()?;

    let status = Command::new("cargo")
        .args(args)
        .current_dir(&root)
        .status()
        .with_context(|| format!("Failed to run cargo {:?}", args))?;

    if !status.success() {
        bail!("cargo {:?} failed", args);
    }

    Ok(())
}

/// The proof crate copies header constants; a drift makes the proofs vacuous.
fn verify_constants() -> Result<()> {
    let root = project_root()?;

    let header_rs =
        std::fs::read_to_string(root.join("src/header.rs")).context("Failed to read header.rs")?;
    let proofs_path = root.join("kani-proofs/src/lib.rs");
    if !proofs_path.exists() {
        println!("  (no kani-proofs, skipping constant check)");
        return Ok(());
    }
    let proofs_rs = std::fs::read_to_string(&proofs_path).context("Failed to read proofs")?;

    for name in ["HEADER_PREFIX_SIZE", "POINTER_SIZE_8", "BIG_ENDIAN"] {
        let crate_value = extract_const(&header_rs, name)
            .with_context(|| format!("{} not found in header.rs", name))?;
        let proof_value = extract_const(&proofs_rs, name)
            .with_context(|| format!("{} not found in kani-proofs", name))?;
        if crate_value != proof_value {
            bail!(
                "{}: crate has {:#x}, proofs have {:#x}",
                name,
                crate_value,
                proof_value
            );
        }
    }

    Ok(())
}

/// Value of `const NAME: ty = <literal>;`, accepting decimal, hex and binary.
fn extract_const(content: &str, name: &str) -> Option<u64> {
    let needle = format!("const {}:", name);
    let line = content.lines().find(|l| l.contains(&needle))?;
    let literal = line
        .split('=')
        .nth(1)?
        .trim()
        .trim_end_matches(';')
        .replace('_', "");
    if let Some(hex) = literal.strip_prefix("0x") {
        u64::from_str_radix(hex, 16).ok()
    } else if let Some(bin) = literal.strip_prefix("0b") {
        u64::from_str_radix(bin, 2).ok()
    } else {
        literal.parse().ok()
    }
}
