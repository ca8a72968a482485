use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tsl_types::TOKEN_DECIMALS;

#[derive(Parser)]
#[command(
    name = "tsl",
    about = "Token Sale Ledger: allow-list and sale tooling",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Compute the leaf hash of one allow-list entry
    Leaf(LeafArgs),
    /// Build an allow-list tree: root and every proof
    Tree(TreeArgs),
    /// Show the membership proof for one address
    Proof(ProofArgs),
    /// Check a membership proof against a root
    Verify(VerifyArgs),
    /// Convert between human amounts and smallest units
    Units(UnitsArgs),
    /// Validate a sale configuration file
    Config(ConfigArgs),
}

#[derive(Args)]
pub struct LeafArgs {
    pub address: String,
    /// Allocation in whole tokens, e.g. "210000" or "43.3125031"
    pub allocation: String,
    #[arg(long)]
    pub vesting: bool,
    #[arg(long, default_value_t = TOKEN_DECIMALS)]
    pub decimals: u8,
}

#[derive(Args)]
pub struct TreeArgs {
    /// JSON allow-list: [{"address", "allocation", "vesting"}, ...]
    pub file: PathBuf,
    #[arg(long, default_value_t = TOKEN_DECIMALS)]
    pub decimals: u8,
    /// Also write the commitment (root and proofs) as JSON to this path
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct ProofArgs {
    pub file: PathBuf,
    pub address: String,
    #[arg(long, default_value_t = TOKEN_DECIMALS)]
    pub decimals: u8,
}

#[derive(Args)]
pub struct VerifyArgs {
    #[arg(long)]
    pub root: String,
    /// Leaf hash; alternatively give --address and --allocation
    #[arg(long, conflicts_with_all = ["address", "allocation"], required_unless_present = "address")]
    pub leaf: Option<String>,
    #[arg(long, requires = "allocation")]
    pub address: Option<String>,
    #[arg(long)]
    pub allocation: Option<String>,
    #[arg(long)]
    pub vesting: bool,
    /// Sibling hashes, leaf to root, comma separated or repeated
    #[arg(long, value_delimiter = ',')]
    pub proof: Vec<String>,
    #[arg(long, default_value_t = TOKEN_DECIMALS)]
    pub decimals: u8,
}

#[derive(Args)]
pub struct UnitsArgs {
    pub amount: String,
    #[arg(long, default_value_t = TOKEN_DECIMALS)]
    pub decimals: u8,
    /// Treat AMOUNT as smallest units and print the human form
    #[arg(long)]
    pub human: bool,
}

#[derive(Args)]
pub struct ConfigArgs {
    pub file: PathBuf,
    /// Decimals of the payment token, used to display the cap
    #[arg(long, default_value_t = 6)]
    pub payment_decimals: u8,
}
