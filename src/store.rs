//! `highwind_jsons/` 以下のフラットな JSON レコードストア。
//!
//! 名前空間ごとに1ディレクトリ、1レコード1ファイル。キーは拡張子抜きのファイル名。
//! ロックは取らない（操作者は1人という前提）。

use crate::metadata::NftMetadata;
use crate::network::Network;
use crate::pinata::PinResponse;
use anyhow::{Context, Result, bail};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    Contracts,
    Items,
}

impl Namespace {
    pub fn dir_name(&self) -> &'static str {
        match self {
            Namespace::Contracts => "contracts",
            Namespace::Items => "items",
        }
    }

    /// 同名キーがあるとき `_1`, `_2`, ... を付けて別ファイルにするか
    fn suffixes_on_collision(&self) -> bool {
        matches!(self, Namespace::Contracts)
    }
}

/// デプロイ済みコントラクト
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractRecord {
    pub token_name: String,
    pub token_symbol: String,
    pub contract_address: String,
    pub network: Network,
    pub scan_url: String,
    pub abi_path: String,
}

impl ContractRecord {
    pub fn opensea_url(&self) -> String {
        format!(
            "https://testnets.opensea.io/collection/{}/",
            self.token_name.to_lowercase()
        )
    }
}

/// ピン済みアイテム
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub hash_info: PinResponse,
    pub item: NftMetadata,
    pub url: String,
    pub ipfs_url: String,
}

impl ItemRecord {
    pub fn new(hash_info: PinResponse, item: NftMetadata, gateway_url: &str) -> Self {
        let hash = hash_info.ipfs_hash.clone();
        Self {
            hash_info,
            item,
            url: format!("{}/ipfs/{}", gateway_url.trim_end_matches('/'), hash),
            ipfs_url: format!("ipfs://{}", hash),
        }
    }

    pub fn hash(&self) -> &str {
        &self.hash_info.ipfs_hash
    }
}

/// `RecordStore::scan` の結果
#[derive(Debug)]
pub struct Scan<T> {
    pub records: BTreeMap<String, T>,
    pub unreadable: Vec<(String, anyhow::Error)>,
}

#[derive(Debug, Clone)]
pub struct RecordStore {
    root: PathBuf,
}

impl RecordStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn namespace_dir(&self, namespace: Namespace) -> PathBuf {
        self.root.join(namespace.dir_name())
    }

    fn record_path(&self, namespace: Namespace, key: &str) -> PathBuf {
        self.namespace_dir(namespace).join(format!("{}.json", key))
    }

    /// 名前空間内の全レコードを読む。ディレクトリが無ければ空。
    /// 読めないファイルが1つでもあればエラー
    pub fn list<T: DeserializeOwned>(&self, namespace: Namespace) -> Result<BTreeMap<String, T>> {
        let scan = self.scan(namespace)?;
        if let Some((_, err)) = scan.unreadable.into_iter().next() {
            return Err(err);
        }
        Ok(scan.records)
    }

    /// 1ファイルずつ読み、読めなかったものはキーとエラーの組で集める
    pub fn scan<T: DeserializeOwned>(&self, namespace: Namespace) -> Result<Scan<T>> {
        let dir = self.namespace_dir(namespace);
        let mut scan = Scan {
            records: BTreeMap::new(),
            unreadable: Vec::new(),
        };
        if !dir.is_dir() {
            return Ok(scan);
        }

        for entry in fs::read_dir(&dir)
            .with_context(|| format!("レコードディレクトリが読めません: {:?}", dir))?
        {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            let Some(key) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            match read_record(&path) {
                Ok(record) => {
                    scan.records.insert(key.to_string(), record);
                }
                Err(err) => scan.unreadable.push((key.to_string(), err)),
            }
        }

        debug!(
            "Scanned {} {} records ({} unreadable)",
            scan.records.len(),
            namespace.dir_name(),
            scan.unreadable.len()
        );
        Ok(scan)
    }

    pub fn load<T: DeserializeOwned>(&self, namespace: Namespace, key: &str) -> Result<T> {
        check_key(key)?;
        read_record(&self.record_path(namespace, key))
    }

    /// レコードを書き込み、実際に使ったキーを返す
    pub fn save<T: Serialize>(&self, namespace: Namespace, key: &str, record: &T) -> Result<String> {
        check_key(key)?;
        let dir = self.namespace_dir(namespace);
        fs::create_dir_all(&dir)
            .with_context(|| format!("レコードディレクトリの作成に失敗しました: {:?}", dir))?;

        let key = if namespace.suffixes_on_collision() {
            self.free_key(namespace, key)
        } else {
            key.to_string()
        };

        let path = self.record_path(namespace, &key);
        let json = serde_json::to_string_pretty(record)
            .context("レコードのJSONシリアライズに失敗しました")?;
        fs::write(&path, json)
            .with_context(|| format!("レコードの書き込みに失敗しました: {:?}", path))?;

        debug!("Wrote {:?}", path);
        Ok(key)
    }

    /// 既存ファイルと衝突しないキーを探す
    fn free_key(&self, namespace: Namespace, key: &str) -> String {
        if !self.record_path(namespace, key).exists() {
            return key.to_string();
        }

        let mut counter = 1u32;
        loop {
            let candidate = format!("{}_{}", key, counter);
            if !self.record_path(namespace, &candidate).exists() {
                return candidate;
            }
            counter += 1;
        }
    }

    pub fn contracts(&self) -> Result<BTreeMap<String, ContractRecord>> {
        self.list(Namespace::Contracts)
    }

    /// コントラクトが1件も無ければミントもギャラリーも進めない
    pub fn require_contracts(&self) -> Result<BTreeMap<String, ContractRecord>> {
        let contracts = self.contracts()?;
        if contracts.is_empty() {
            bail!("Deploy a contract first");
        }
        Ok(contracts)
    }

    pub fn save_contract(&self, record: &ContractRecord) -> Result<String> {
        self.save(Namespace::Contracts, &record.token_name, record)
    }

    pub fn items(&self) -> Result<BTreeMap<String, ItemRecord>> {
        self.list(Namespace::Items)
    }

    /// `<アイテム名>_<ハッシュ>` をキーにした一覧（選択用）
    pub fn items_by_label(&self) -> Result<BTreeMap<String, ItemRecord>> {
        Ok(self
            .items()?
            .into_iter()
            .map(|(key, item)| (format!("{}_{}", item.item.name, key), item))
            .collect())
    }

    pub fn save_item(&self, record: &ItemRecord) -> Result<String> {
        self.save(Namespace::Items, record.hash(), record)
    }
}

fn read_record<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("JSON 読み込み失敗: {:?}", path))?;
    serde_json::from_str(&text).with_context(|| format!("JSON パース失敗: {:?}", path))
}

/// キーはファイル名になるので、パス区切りや空文字は受け付けない
fn check_key(key: &str) -> Result<()> {
    if key.is_empty() || key == "." || key == ".." || key.contains(['/', '\\']) {
        bail!("レコードキーとして使えない名前です: {:?}", key);
    }
    Ok(())
}
