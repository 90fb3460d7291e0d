use clap::{Parser, Subcommand};
use highwind::network::Network;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "highwind")]
#[command(about = "Highwind allows you to manage NFT contracts", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// YAML config file (defaults are used when it does not exist)
    #[arg(long, global = true, env = "HIGHWIND_CONFIG", default_value = "highwind.yaml")]
    pub config: PathBuf,

    /// Log level when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Deploy a new NFT contract with truffle
    ///
    /// Reads INFURA_KEY and HIGHWIND_MNEMONIC from the environment.
    Deploy {
        #[arg(long, value_enum)]
        network: Network,

        #[arg(long, default_value = "MyNFT")]
        name: String,

        #[arg(long, default_value = "MyNFT")]
        symbol: String,

        /// Public wallet address that owns the contract
        #[arg(long, env = "OWNER_ADDRESS")]
        owner: String,
    },

    /// List deployed contracts
    Contracts,

    /// List pinned items
    Items,

    /// Pin item metadata (YAML) to IPFS and save it as an item
    ///
    /// Reads PINATA_API_KEY and PINATA_SECRET_API_KEY from the environment.
    Pin {
        /// Item definition file
        #[arg(long)]
        item: PathBuf,
    },

    /// Mint a pinned item on a deployed contract
    ///
    /// Reads INFURA_KEY and HIGHWIND_PRIVATE_KEY from the environment.
    Mint {
        /// Contract record key
        #[arg(long)]
        contract: String,

        /// Item label (`<name>_<hash>`) or IPFS hash
        #[arg(long)]
        item: String,

        /// Address to send the token to
        #[arg(long)]
        to: String,

        /// Public wallet address matching the private key
        #[arg(long, env = "OWNER_ADDRESS")]
        owner: String,
    },

    /// Show the OpenSea testnet collection for a contract
    Opensea {
        /// Contract record key (first contract when omitted)
        #[arg(long)]
        contract: Option<String>,
    },

    /// Pin a raw file to IPFS
    PinFile {
        path: PathBuf,

        /// Name stored in pinataMetadata (file name when omitted)
        #[arg(long)]
        name: Option<String>,
    },

    /// Query pinned objects and fetch their content
    PinSearch {
        /// Raw pinList query string, e.g. `status=pinned&metadata[name]=Sword`
        query: String,
    },
}
