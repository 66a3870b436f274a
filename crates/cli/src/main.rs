//! Operator tool for inspecting snapshot files offline.
//!
//! Works directly on envelope files without opening a store, so it is safe
//! to point at a live store directory: nothing here writes.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use floe_snapshot::{read_envelope, FORMAT_VERSION};
use floe_vm::ModuleState;
use serde::Serialize;
use sha2::{Digest, Sha256};

#[derive(Parser, Debug)]
#[command(name = "floe", version, about = "Inspect and verify floe snapshot files")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the envelope header and content counts for a snapshot.
    Info {
        /// Path to a snapshot file.
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Emit the report as JSON instead of plain text.
        #[arg(long)]
        json: bool,
    },
    /// Check a snapshot's integrity; exits non-zero if it is corrupt.
    Verify {
        /// Path to a snapshot file.
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// List the functions a snapshot's module exports.
    Exports {
        /// Path to a snapshot file.
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Command::Info { file, json } => info(&file, json),
        Command::Verify { file } => verify(&file),
        Command::Exports { file } => exports(&file),
    }
}

#[derive(Serialize)]
struct InfoReport {
    module: String,
    format_version: u16,
    file_bytes: usize,
    checksum: String,
    code_bytes: usize,
    functions: usize,
    exported: usize,
    globals: u16,
    storage_entries: usize,
}

fn load(path: &Path) -> Result<(Vec<u8>, String, ModuleState)> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    log::debug!("read {} bytes from {}", bytes.len(), path.display());
    let (module, state) = read_envelope(&path.display().to_string(), &bytes)?;
    Ok((bytes, module, state))
}

fn info(path: &Path, json: bool) -> Result<()> {
    let (bytes, module, state) = load(path)?;
    let program = state.program();
    let exported = program.functions().iter().filter(|f| f.exported).count();
    let report = InfoReport {
        module,
        format_version: FORMAT_VERSION,
        file_bytes: bytes.len(),
        checksum: format!("{:#010x}", stored_checksum(&bytes)),
        code_bytes: program.code().len(),
        functions: program.functions().len(),
        exported,
        globals: program.globals(),
        storage_entries: state.storage().len(),
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("module:    {}", report.module);
        println!("format:    version {}", report.format_version);
        println!("file:      {} bytes, checksum {}", report.file_bytes, report.checksum);
        println!("code:      {} bytes", report.code_bytes);
        println!("functions: {} defined, {} exported", report.functions, report.exported);
        println!("globals:   {}", report.globals);
        println!("storage:   {} entries", report.storage_entries);
    }
    Ok(())
}

/// The trailing four bytes of every envelope that passed validation.
fn stored_checksum(bytes: &[u8]) -> u32 {
    let tail = &bytes[bytes.len() - 4..];
    u32::from_le_bytes([tail[0], tail[1], tail[2], tail[3]])
}

fn verify(path: &Path) -> Result<()> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let (module, _state) = read_envelope(&path.display().to_string(), &bytes)?;
    println!("{}: ok", path.display());
    println!("  module: {module}");
    println!("  sha256: {}", hex::encode(Sha256::digest(&bytes)));
    Ok(())
}

fn exports(path: &Path) -> Result<()> {
    let (_, module, state) = load(path)?;
    println!("module {module}:");
    for func in state.program().functions() {
        if !func.exported {
            continue;
        }
        let params = func
            .params
            .iter()
            .map(|p| format!("{}: {}", p.name, p.kind.name()))
            .collect::<Vec<_>>()
            .join(", ");
        let returns = if func.returns { " -> value" } else { "" };
        let view = if func.safe { "  [view]" } else { "" };
        println!("  {}({params}){returns}{view}", func.name);
    }
    Ok(())
}
