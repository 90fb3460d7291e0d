mod cli;

use cli::{Cli, Commands};
use highwind::config::Config;
use highwind::credentials::EnvCredentials;
use highwind::deploy::{DeployOutcome, DeployRequest, Deployer};
use highwind::metadata::MetadataDraft;
use highwind::mint::{self, MintRequest};
use highwind::network::Network;
use highwind::pinata::{self, PinMetadata, PinataClient};
use highwind::store::{ContractRecord, ItemRecord, Namespace, RecordStore};

use anyhow::{Context, Result, bail};
use clap::Parser;
use dotenvy::dotenv;
use std::fs;
use std::path::Path;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("highwind={},reqwest=warn", cli.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cfg = Config::load_or_default(&cli.config)?;
    let store = RecordStore::new(&cfg.store_dir);
    debug!("Using record store {:?}", store.root());

    match cli.command {
        Commands::Deploy {
            network,
            name,
            symbol,
            owner,
        } => deploy(&cfg, &store, network, name, symbol, owner),
        Commands::Contracts => list_contracts(&store),
        Commands::Items => list_items(&store),
        Commands::Pin { item } => pin(&cfg, &store, &item).await,
        Commands::Mint {
            contract,
            item,
            to,
            owner,
        } => mint(&cfg, &store, &contract, &item, &to, &owner).await,
        Commands::Opensea { contract } => opensea(&store, contract.as_deref()),
        Commands::PinFile { path, name } => pin_file(&cfg, &path, name).await,
        Commands::PinSearch { query } => pin_search(&cfg, &query).await,
    }
}

fn print_faucet(network: Network) {
    println!("Faucet: {}", network.faucet_url());
    println!("  {}", network.faucet_note());
}

fn deploy(
    cfg: &Config,
    store: &RecordStore,
    network: Network,
    name: String,
    symbol: String,
    owner: String,
) -> Result<()> {
    print_faucet(network);
    println!("Deploying {} Smart Contract on {}...", name, network);

    let request = DeployRequest {
        network,
        nft_name: name,
        nft_symbol: symbol,
        owner_address: owner,
    };
    let deployer = Deployer::new(&cfg.deploy, store);

    match deployer.deploy(&request, &EnvCredentials)? {
        DeployOutcome::Deployed { key, record, log } => {
            info!("Migration log:\n{}", log);
            println!("✅ Contract Address: {}", record.contract_address);
            println!("{}", record.scan_url);
            println!("Saved as contract {:?}", key);
            Ok(())
        }
        DeployOutcome::Failed { hints, log } => {
            eprintln!("---- log output ----\n{}", log);
            for hint in &hints {
                eprintln!("⚠ {}", hint);
            }
            bail!("deployment of {} failed", request.nft_name);
        }
    }
}

fn list_contracts(store: &RecordStore) -> Result<()> {
    let contracts = store.contracts()?;
    if contracts.is_empty() {
        println!("(no contracts in {:?})", store.namespace_dir(Namespace::Contracts));
        return Ok(());
    }

    for (key, c) in &contracts {
        println!(
            "{:24} {} - {}  {}  [{}]",
            key, c.token_name, c.token_symbol, c.contract_address, c.network
        );
    }
    Ok(())
}

fn list_items(store: &RecordStore) -> Result<()> {
    let items = store.items_by_label()?;
    if items.is_empty() {
        println!("(no items in {:?})", store.namespace_dir(Namespace::Items));
        return Ok(());
    }

    for (label, item) in &items {
        println!("{:40} {}", label, item.ipfs_url);
    }
    Ok(())
}

async fn pin(cfg: &Config, store: &RecordStore, item: &Path) -> Result<()> {
    let draft = MetadataDraft::load(item)?;
    info!("Item has {} attributes", draft.attribute_count());
    let metadata = draft.build()?;
    println!("Current Metadata:\n{}", serde_json::to_string_pretty(&metadata)?);

    let client = PinataClient::new(&cfg.pinata, &EnvCredentials)?;
    let record = pinata::pin_and_record(&client, store, metadata, client.gateway_url()).await?;

    println!("✅ Pinned {}", record.ipfs_url);
    println!("{}", record.url);
    Ok(())
}

fn find_contract<'a>(
    contracts: &'a std::collections::BTreeMap<String, ContractRecord>,
    key: &str,
) -> Result<&'a ContractRecord> {
    contracts.get(key).with_context(|| {
        format!(
            "コントラクト {:?} がありません (候補: {})",
            key,
            contracts.keys().cloned().collect::<Vec<_>>().join(", ")
        )
    })
}

/// ラベル（`<名前>_<ハッシュ>`）でもハッシュでも選べる
fn find_item(store: &RecordStore, selector: &str) -> Result<ItemRecord> {
    if let Some(item) = store.items_by_label()?.remove(selector) {
        return Ok(item);
    }
    store
        .load(Namespace::Items, selector)
        .with_context(|| format!("アイテム {:?} がありません", selector))
}

async fn mint(
    cfg: &Config,
    store: &RecordStore,
    contract_key: &str,
    item_selector: &str,
    to: &str,
    owner: &str,
) -> Result<()> {
    let contracts = store.require_contracts()?;
    let contract = find_contract(&contracts, contract_key)?;
    print_faucet(contract.network);
    println!("NFT Info: {} - {}", contract.token_name, contract.token_symbol);
    println!("Contract address: {}", contract.contract_address);

    let item = find_item(store, item_selector)?;
    println!("Item metadata:\n{}", serde_json::to_string_pretty(&item.item)?);

    println!("Minting...");
    let request = MintRequest {
        contract,
        recipient: to,
        token_uri: &item.ipfs_url,
        owner_address: owner,
    };
    let receipt = mint::mint(&cfg.deploy.project_dir, &request, &EnvCredentials).await?;

    println!("✅ txn hash: {}", receipt.tx_hash);
    println!("{}", receipt.explorer_url);
    Ok(())
}

fn opensea(store: &RecordStore, contract_key: Option<&str>) -> Result<()> {
    let contracts = store.require_contracts()?;
    let contract = match contract_key {
        Some(key) => find_contract(&contracts, key)?,
        // require_contracts で空でないことは確認済み
        None => contracts.values().next().context("Deploy a contract first")?,
    };

    println!("Contract address: {}", contract.contract_address);
    println!("OpenSea URL: {}", contract.opensea_url());
    Ok(())
}

async fn pin_file(cfg: &Config, path: &Path, name: Option<String>) -> Result<()> {
    let content = fs::read(path).with_context(|| format!("ファイルが読めません: {:?}", path))?;
    let file_name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("file")
        .to_string();
    let metadata = PinMetadata {
        name: name.unwrap_or_else(|| file_name.clone()),
        ..Default::default()
    };

    let client = PinataClient::new(&cfg.pinata, &EnvCredentials)?;
    let pinned = client.pin_file(&file_name, content, &metadata).await?;

    println!("✅ Pinned ipfs://{}", pinned.ipfs_hash);
    println!("{}/ipfs/{}", client.gateway_url(), pinned.ipfs_hash);
    Ok(())
}

async fn pin_search(cfg: &Config, query: &str) -> Result<()> {
    let client = PinataClient::new(&cfg.pinata, &EnvCredentials)?;
    let results = client.pin_search(query).await?;

    println!("{} pinned objects", results.len());
    for value in &results {
        println!("{}", serde_json::to_string_pretty(value)?);
    }
    Ok(())
}
