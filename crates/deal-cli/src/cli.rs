//! Command-line argument parsing with clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use deal_token::Network;

/// dealctl - single-edition deal tokens on Solana.
#[derive(Parser, Debug, Clone)]
#[command(name = "dealctl")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Network to use (devnet, testnet, mainnet).
    #[arg(short, long, env = "DEAL_NETWORK")]
    pub network: Option<Network>,

    /// RPC endpoint overriding the network's default.
    #[arg(long, env = "DEAL_RPC_URL")]
    pub rpc_url: Option<String>,

    /// Keypair file (Solana CLI JSON format).
    #[arg(short, long, env = "DEAL_KEYPAIR")]
    pub keypair: Option<PathBuf>,

    /// Configuration file (JSON).
    #[arg(short, long, env = "DEAL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Return placeholder signatures for wallets that cannot sign.
    #[arg(long)]
    pub simulated: bool,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = Format::Table)]
    pub format: Format,

    /// Emit logs as JSON.
    #[arg(long)]
    pub log_json: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Format {
    /// Human-readable table format.
    #[default]
    Table,
    /// The operation result as JSON, for scripting.
    Json,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Generate a new keypair file.
    Keygen {
        /// Where to write the keypair.
        #[arg(short, long)]
        out: PathBuf,

        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },

    /// Show the SOL balance of an address (default: the keypair's).
    Balance {
        /// Address to inspect.
        address: Option<String>,
    },

    /// Mint a new deal token from a metadata JSON file.
    Mint {
        /// Deal metadata file.
        metadata: PathBuf,
    },

    /// Finish a partially minted token.
    Resume {
        /// Token identity reported by the failed mint.
        mint: String,

        /// Deal metadata file used for the original mint.
        metadata: PathBuf,
    },

    /// Show the on-ledger state of a token identity.
    MintInfo {
        /// Token identity.
        mint: String,
    },

    /// Transfer a deal token.
    Transfer {
        /// Token identity.
        mint: String,

        /// Recipient address.
        to: String,
    },

    /// List a deal token for sale.
    List {
        /// Token identity.
        mint: String,

        /// Ask price in SOL.
        price: String,
    },

    /// Buy a listed deal token.
    ///
    /// Pays the ask price to the seller. The seller then transfers the token.
    Buy {
        /// Listing file produced by `list`.
        listing: PathBuf,
    },

    /// Redeem (burn) a deal token.
    Redeem {
        /// Token identity.
        mint: String,
    },

    /// Redemption tickets.
    Ticket {
        /// Ticket subcommand to execute.
        #[command(subcommand)]
        command: TicketCommands,
    },
}

/// Redemption ticket subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum TicketCommands {
    /// Issue a ticket for a deal record JSON file.
    Issue {
        /// Deal record file.
        deal: PathBuf,

        /// Also write the ticket document to this file.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Verify a ticket JSON file.
    Verify {
        /// Ticket file.
        ticket: PathBuf,
    },
}
