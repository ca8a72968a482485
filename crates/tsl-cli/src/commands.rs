use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, bail, Context};
use colored::Colorize;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};
use tsl_crypto::{build_leaf, verify, AllowListCommitment, AllowListEntry, EntryProof};
use tsl_sale::{Phase, SaleConfig};
use tsl_types::{format_units, parse_units, Address, Digest, PRICE_SCALE};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let format = cli.format;
    let output = match cli.command {
        Command::Leaf(args) => cmd_leaf(&args, format)?,
        Command::Tree(args) => cmd_tree(&args, format)?,
        Command::Proof(args) => cmd_proof(&args, format)?,
        Command::Verify(args) => cmd_verify(&args, format)?,
        Command::Units(args) => cmd_units(&args, format)?,
        Command::Config(args) => cmd_config(&args, format)?,
    };
    println!("{output}");
    Ok(())
}

/// One allow-list file entry. Allocations are whole-token amounts, given as
/// a string ("43.3125031") or a plain integer.
#[derive(Deserialize)]
struct EntryInput {
    address: String,
    allocation: AllocationInput,
    #[serde(default)]
    vesting: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AllocationInput {
    Text(String),
    Whole(u64),
}

impl AllocationInput {
    fn as_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Whole(value) => value.to_string(),
        }
    }
}

pub(crate) fn load_entries(path: &Path, decimals: u8) -> anyhow::Result<Vec<AllowListEntry>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading allow-list {}", path.display()))?;
    let inputs: Vec<EntryInput> = serde_json::from_str(&text)
        .with_context(|| format!("parsing allow-list {}", path.display()))?;
    let entries = inputs
        .iter()
        .enumerate()
        .map(|(index, input)| {
            AllowListEntry::parse(
                &input.address,
                &input.allocation.as_text(),
                input.vesting,
                decimals,
            )
            .with_context(|| format!("allow-list entry {index} ({})", input.address))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    debug!(path = %path.display(), entries = entries.len(), "allow-list loaded");
    Ok(entries)
}

fn parse_digest(text: &str, what: &str) -> anyhow::Result<Digest> {
    Digest::from_hex(text).with_context(|| format!("invalid {what} {text:?}"))
}

fn vesting_label(vesting: bool) -> String {
    if vesting {
        "vesting".yellow().to_string()
    } else {
        "immediate".normal().to_string()
    }
}

fn render_entry_proof(out: &mut String, proof: &EntryProof, decimals: u8) -> anyhow::Result<()> {
    writeln!(
        out,
        "{} {} ({})",
        proof.entry.address.to_string().bold(),
        format_units(proof.entry.allocation, decimals),
        vesting_label(proof.entry.vesting)
    )?;
    writeln!(out, "  Leaf:  0x{}", proof.leaf.to_hex().cyan())?;
    if proof.proof.is_empty() {
        writeln!(out, "  Proof: (empty, single-entry tree)")?;
    }
    for (level, sibling) in proof.proof.iter().enumerate() {
        writeln!(out, "  Proof[{level}]: 0x{}", sibling.to_hex())?;
    }
    Ok(())
}

fn cmd_leaf(args: &LeafArgs, format: OutputFormat) -> anyhow::Result<String> {
    let entry = AllowListEntry::parse(&args.address, &args.allocation, args.vesting, args.decimals)
        .context("invalid allow-list entry")?;
    let leaf = entry.leaf();
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(&json!({
            "entry": entry,
            "leaf": leaf,
        }))?,
        OutputFormat::Text => format!("0x{}", leaf.to_hex()),
    })
}

fn cmd_tree(args: &TreeArgs, format: OutputFormat) -> anyhow::Result<String> {
    let entries = load_entries(&args.file, args.decimals)?;
    let commitment = AllowListCommitment::build(&entries)?;
    info!(root = %commitment.root, entries = entries.len(), "allow-list committed");

    if let Some(path) = &args.output {
        fs::write(path, commitment.to_json()?)
            .with_context(|| format!("writing commitment to {}", path.display()))?;
    }

    match format {
        OutputFormat::Json => Ok(commitment.to_json()?),
        OutputFormat::Text => {
            let mut out = String::new();
            writeln!(out, "Root: 0x{}", commitment.root.to_hex().green().bold())?;
            writeln!(out, "Entries: {}", commitment.proofs.len())?;
            for proof in &commitment.proofs {
                writeln!(out)?;
                render_entry_proof(&mut out, proof, args.decimals)?;
            }
            if let Some(path) = &args.output {
                writeln!(out, "\n{} Commitment written to {}", "✓".green(), path.display())?;
            }
            Ok(out.trim_end().to_string())
        }
    }
}

fn cmd_proof(args: &ProofArgs, format: OutputFormat) -> anyhow::Result<String> {
    let address = Address::parse(&args.address).context("invalid address")?;
    let entries = load_entries(&args.file, args.decimals)?;
    let commitment = AllowListCommitment::build(&entries)?;
    let proof = commitment
        .proof_for(&address)
        .ok_or_else(|| anyhow!("{address} is not on the allow-list"))?;

    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&json!({
            "root": commitment.root,
            "entry": proof,
        }))?),
        OutputFormat::Text => {
            let mut out = String::new();
            writeln!(out, "Root: 0x{}", commitment.root.to_hex().green())?;
            render_entry_proof(&mut out, proof, args.decimals)?;
            Ok(out.trim_end().to_string())
        }
    }
}

fn cmd_verify(args: &VerifyArgs, format: OutputFormat) -> anyhow::Result<String> {
    let root = parse_digest(&args.root, "root")?;
    let leaf = match (&args.leaf, &args.address, &args.allocation) {
        (Some(leaf), _, _) => parse_digest(leaf, "leaf")?,
        (None, Some(address), Some(allocation)) => {
            let entry = AllowListEntry::parse(address, allocation, args.vesting, args.decimals)
                .context("invalid allow-list entry")?;
            build_leaf(&entry.address, entry.allocation, entry.vesting)
        }
        _ => bail!("either --leaf or --address with --allocation is required"),
    };
    let proof = args
        .proof
        .iter()
        .map(|sibling| parse_digest(sibling, "proof hash"))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let valid = verify(&root, &leaf, &proof);
    debug!(%root, %leaf, steps = proof.len(), valid, "proof checked");
    if !valid {
        bail!("proof does not verify against root 0x{}", root.to_hex());
    }
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(&json!({
            "root": root,
            "leaf": leaf,
            "valid": true,
        }))?,
        OutputFormat::Text => format!("{} Proof verifies against 0x{}", "✓".green().bold(), root.to_hex()),
    })
}

fn cmd_units(args: &UnitsArgs, format: OutputFormat) -> anyhow::Result<String> {
    let value = if args.human {
        args.amount
            .trim()
            .parse::<u128>()
            .with_context(|| format!("invalid smallest-unit amount {:?}", args.amount))?
    } else {
        parse_units(&args.amount, args.decimals)
            .with_context(|| format!("invalid amount {:?}", args.amount))?
    };
    let human = format_units(value, args.decimals);
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(&json!({
            "value": value.to_string(),
            "decimals": args.decimals,
            "human": human,
        }))?,
        OutputFormat::Text if args.human => human,
        OutputFormat::Text => value.to_string(),
    })
}

fn cmd_config(args: &ConfigArgs, format: OutputFormat) -> anyhow::Result<String> {
    let config = SaleConfig::load(&args.file)?;
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&config)?),
        OutputFormat::Text => {
            let active: Vec<String> = Phase::ALL
                .iter()
                .filter(|phase| config.phases.is_active(**phase))
                .map(|phase| phase.to_string())
                .collect();
            let mut out = String::new();
            writeln!(out, "{} {} is valid", "✓".green().bold(), args.file.display())?;
            writeln!(
                out,
                "  Price:      {} tokens per payment unit",
                format_units(config.sale_price, price_decimals())
            )?;
            writeln!(
                out,
                "  Cap:        {} payment units",
                format_units(config.total_cap, args.payment_decimals)
            )?;
            writeln!(out, "  Treasury:   {}", config.treasury.to_string().cyan())?;
            writeln!(out, "  Custody:    {:?}", config.custody)?;
            writeln!(out, "  Rail:       {:?}", config.rail)?;
            writeln!(out, "  Redemption: {:?}", config.redemption)?;
            if active.is_empty() {
                writeln!(out, "  Phases:     {}", "none active".dimmed())?;
            } else {
                writeln!(out, "  Phases:     {}", active.join(", ").yellow())?;
            }
            Ok(out.trim_end().to_string())
        }
    }
}

/// Decimal places of `PRICE_SCALE`.
fn price_decimals() -> u8 {
    PRICE_SCALE.ilog10() as u8
}
