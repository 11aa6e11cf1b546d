//! Command-line driver: build proofs from a leaf list, inspect and verify them.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::info;

use crate::domain::hash::{sha256::Sha256d, Hash256};
use crate::domain::proof::MerkleProof;
use crate::domain::tree::{TreeBuilder, TreeOptions};

#[derive(Parser, Debug)]
#[command(name = "merkle-proof", version, about = "Build and verify merkle inclusion proofs")]
pub struct Cli {
    /// Levels with at least this many nodes are hashed in parallel.
    #[arg(long, global = true, default_value_t = TreeOptions::default().parallel_threshold)]
    pub parallel_threshold: usize,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build a tree from a leaf file (one txid per line, `-` for stdin) and print
    /// the root followed by one proof per target.
    Build {
        leaves: PathBuf,
        #[arg(long = "target", required = true)]
        targets: Vec<Hash256>,
        #[arg(long, value_enum, default_value_t = Format::Json)]
        format: Format,
    },
    /// Print the root a proof leads to.
    Root { proof: PathBuf },
    /// Verify a proof against its own target or an explicit root.
    Verify {
        proof: PathBuf,
        #[arg(long)]
        root: Option<Hash256>,
    },
    /// Re-encode a proof as JSON or binary hex.
    Convert {
        proof: PathBuf,
        #[arg(long, value_enum)]
        to: Format,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Json,
    Binary,
}

pub fn run(cli: Cli) -> Result<()> {
    let stdout = io::stdout();
    run_with(cli, &mut stdout.lock())
}

pub fn run_with<W: Write>(cli: Cli, out: &mut W) -> Result<()> {
    match cli.command {
        Command::Build {
            leaves,
            targets,
            format,
        } => {
            let options = TreeOptions {
                parallel_threshold: cli.parallel_threshold,
            };
            let mut builder = TreeBuilder::<Sha256d>::with_options(options);
            for target in targets {
                builder.register_interest(target)?;
            }
            for (line, text) in read_input(&leaves)?.lines().enumerate() {
                let text = text.trim();
                if text.is_empty() {
                    continue;
                }
                let leaf = text
                    .parse::<Hash256>()
                    .with_context(|| format!("leaf on line {}", line + 1))?;
                builder.feed(leaf)?;
            }
            let output = builder.finalize().context("building merkle tree")?;

            writeln!(out, "{}", output.root)?;
            for proof in &output.proofs {
                writeln!(out, "{}", encode(proof, format)?)?;
            }
        }
        Command::Root { proof } => {
            let proof = load_proof(&proof)?;
            writeln!(out, "{}", proof.calculate_root()?)?;
        }
        Command::Verify { proof, root } => {
            let proof = load_proof(&proof)?;
            match root {
                Some(root) => proof.verify_against(&root)?,
                None => proof.verify()?,
            }
            info!("Proof for index {} is valid", proof.index);
            writeln!(out, "ok")?;
        }
        Command::Convert { proof, to } => {
            let proof = load_proof(&proof)?;
            writeln!(out, "{}", encode(&proof, to)?)?;
        }
    }
    Ok(())
}

fn encode(proof: &MerkleProof, format: Format) -> Result<String> {
    match format {
        Format::Json => proof.to_json().context("Failed to encode proof as JSON"),
        Format::Binary => Ok(proof.to_hex()),
    }
}

/// Accepts either JSON or binary hex.
pub fn parse_proof(text: &str) -> Result<MerkleProof> {
    let text = text.trim();
    if text.is_empty() {
        bail!("empty proof input");
    }
    let proof = if text.starts_with('{') {
        MerkleProof::from_json(text)?
    } else {
        MerkleProof::from_hex(text)?
    };
    Ok(proof)
}

fn load_proof(path: &Path) -> Result<MerkleProof> {
    parse_proof(&read_input(path)?).with_context(|| format!("decoding {}", path.display()))
}

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("reading stdin")?;
        return Ok(buffer);
    }
    fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}
