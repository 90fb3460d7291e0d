//! デプロイ済みコントラクトに対するミント。
//! 署名・nonce・ガス見積もりは alloy とリモートの RPC に任せる。

use crate::credentials::{CredentialProvider, INFURA_KEY, PRIVATE_KEY, Secret};
use crate::store::ContractRecord;
use alloy::network::EthereumWallet;
use alloy::primitives::Address;
use alloy::providers::ProviderBuilder;
use alloy::signers::local::PrivateKeySigner;
use alloy::sol;
use anyhow::{Context, Result, anyhow, bail};
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};

sol! {
    #[sol(rpc)]
    interface IHighwindNft {
        function mintNFT(address recipient, string tokenURI) external returns (uint256);
    }
}

pub const MINT_FUNCTION: &str = "mintNFT";

#[derive(Debug, Clone)]
pub struct MintRequest<'a> {
    pub contract: &'a ContractRecord,
    pub recipient: &'a str,
    /// アイテムレコードの `ipfs_url`
    pub token_uri: &'a str,
    pub owner_address: &'a str,
}

#[derive(Debug, Clone)]
pub struct MintReceipt {
    pub tx_hash: String,
    pub explorer_url: String,
}

pub async fn mint(
    project_dir: &Path,
    request: &MintRequest<'_>,
    creds: &dyn CredentialProvider,
) -> Result<MintReceipt> {
    let contract = request.contract;
    check_abi(&project_dir.join(&contract.abi_path))?;

    let contract_address = parse_address(&contract.contract_address)?;
    let recipient = parse_address(request.recipient)?;
    let signer = signer_for_owner(&creds.secret(PRIVATE_KEY)?, request.owner_address)?;
    let rpc_url: reqwest::Url = creds
        .secret(INFURA_KEY)?
        .expose(|k| contract.network.rpc_url(k))
        .parse()
        .context("RPC URL が不正です")?;

    let provider = ProviderBuilder::new()
        .wallet(EthereumWallet::from(signer))
        .connect_http(rpc_url);
    let nft = IHighwindNft::new(contract_address, &provider);

    info!(
        "Minting {} to {} on {} ({})",
        request.token_uri, recipient, contract.network, contract.token_name
    );
    let pending_tx = nft
        .mintNFT(recipient, request.token_uri.to_string())
        .send()
        .await
        .context("ミントトランザクションの送信に失敗しました")?;

    let tx_hash = format!("{:?}", *pending_tx.tx_hash());
    let receipt = pending_tx
        .get_receipt()
        .await
        .with_context(|| format!("レシートの取得に失敗しました: {}", tx_hash))?;
    if !receipt.status() {
        bail!("Transaction failed on-chain. Tx hash: {}", tx_hash);
    }

    Ok(MintReceipt {
        explorer_url: contract.network.tx_url(&tx_hash),
        tx_hash,
    })
}

pub fn parse_address(address: &str) -> Result<Address> {
    address
        .trim()
        .parse::<Address>()
        .map_err(|e| anyhow!("Invalid Ethereum address {}: {}", address, e))
}

/// 秘密鍵から署名者を作り、入力された公開アドレスと一致するか確かめる
pub fn signer_for_owner(private_key: &Secret, owner_address: &str) -> Result<PrivateKeySigner> {
    let signer = private_key
        .expose(|k| PrivateKeySigner::from_str(k.trim()))
        .map_err(|e| anyhow!("秘密鍵を読み込めません: {}", e))?;
    let owner = parse_address(owner_address)?;

    if signer.address() != owner {
        bail!(
            "秘密鍵のアドレス {} が入力されたウォレット {} と一致しません",
            signer.address(),
            owner
        );
    }
    Ok(signer)
}

/// ビルド成果物の ABI にミント関数があるか確認する。成果物が無ければ警告だけ
pub fn check_abi(path: &Path) -> Result<()> {
    if !path.exists() {
        warn!("ABI artifact {:?} not found, skipping ABI check", path);
        return Ok(());
    }

    let text = fs::read_to_string(path)
        .with_context(|| format!("ABI の読み込みに失敗しました: {:?}", path))?;
    let artifact: Value = serde_json::from_str(&text)
        .with_context(|| format!("ABI のパースに失敗しました: {:?}", path))?;
    let abi = artifact.get("abi").unwrap_or(&artifact);

    let has_mint = abi.as_array().is_some_and(|entries| {
        entries.iter().any(|e| {
            e.get("type").and_then(Value::as_str) == Some("function")
                && e.get("name").and_then(Value::as_str) == Some(MINT_FUNCTION)
        })
    });
    if !has_mint {
        bail!("{:?} の ABI に {} 関数がありません", path, MINT_FUNCTION);
    }
    Ok(())
}
