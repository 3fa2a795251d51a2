// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! CLI definitions for the rtdbg command-line interface.
//!
//! `dump` publishes a contract for a chosen target next to a small demo heap
//! and saves it as a snapshot. `inspect` and `lookup` read a snapshot back the
//! way a debugger would. `manifest` and `check` enforce the versioning policy.

pub mod commands;
pub mod display;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use rtdbg::{ContractVersion, Endianness, PointerWidth};

#[derive(Parser)]
#[command(
    name = "rtdbg",
    about = "Publish and inspect versioned runtime debug contracts",
    version
)]
pub struct Cli {
    /// JSON configuration file (target, base address, limits)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Target selection shared by commands that build a contract.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Target pointer width in bytes
    #[arg(long, value_enum)]
    pub pointer_width: Option<WidthArg>,

    /// Target byte order
    #[arg(long, value_enum)]
    pub endian: Option<EndianArg>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidthArg {
    #[value(name = "4")]
    Four,
    #[value(name = "8")]
    Eight,
}

impl From<WidthArg> for PointerWidth {
    fn from(arg: WidthArg) -> Self {
        match arg {
            WidthArg::Four => PointerWidth::Four,
            WidthArg::Eight => PointerWidth::Eight,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndianArg {
    Little,
    Big,
}

impl From<EndianArg> for Endianness {
    fn from(arg: EndianArg) -> Self {
        match arg {
            EndianArg::Little => Endianness::Little,
            EndianArg::Big => Endianness::Big,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build a contract and demo heap for a target and save them as a snapshot
    Dump {
        /// Output snapshot file
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        target: TargetArgs,

        /// Base address of the demo heap (contract follows it)
        #[arg(long, value_parser = parse_address)]
        base: Option<u64>,
    },

    /// Show the contract, its thread list and requested objects in a snapshot
    Inspect {
        /// Snapshot file
        file: PathBuf,

        /// Print the decoded contract as JSON
        #[arg(long)]
        json: bool,

        /// Decode the object at this address (repeatable)
        #[arg(long = "object", value_parser = parse_address)]
        objects: Vec<u64>,
    },

    /// Look up one type's fields (or a single field) in a snapshot
    Lookup {
        /// Snapshot file
        file: PathBuf,

        /// Type name, or `Globals` for defines
        type_name: String,

        /// Field name; omit to list every field of the type
        field: Option<String>,
    },

    /// Print the layout manifest this build publishes
    Manifest {
        #[command(flatten)]
        target: TargetArgs,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check that a version bump covers the changes between two manifests
    Check {
        /// Manifest of the last release
        old: PathBuf,

        /// Manifest of this build
        new: PathBuf,

        /// Version of the last release (defaults to the old manifest's)
        #[arg(long)]
        old_version: Option<ContractVersion>,

        /// Version being released (defaults to the new manifest's)
        #[arg(long)]
        new_version: Option<ContractVersion>,
    },
}

/// Accepts `0x`-prefixed hex or decimal.
fn parse_address(s: &str) -> Result<u64, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid address '{}': {}", s, e))
}
