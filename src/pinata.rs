//! Pinata (IPFS ピンサービス) クライアント。
//!
//! リトライもタイムアウト設定も持たない。呼び出しは1件ずつ await する。

use crate::config::PinataConfig;
use crate::credentials::{CredentialProvider, PINATA_API_KEY, PINATA_SECRET_API_KEY, Secret};
use crate::metadata::NftMetadata;
use crate::store::{ItemRecord, RecordStore};
use anyhow::{Context, Result, bail};
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// ピン結果。アイテムレコードの `hash_info` にそのまま残す
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinResponse {
    #[serde(rename = "IpfsHash")]
    pub ipfs_hash: String,
    #[serde(rename = "PinSize", default, skip_serializing_if = "Option::is_none")]
    pub pin_size: Option<u64>,
    #[serde(rename = "Timestamp", default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// ファイルピン時に付ける pinataMetadata
#[derive(Debug, Clone, Default, Serialize)]
pub struct PinMetadata {
    pub name: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub keyvalues: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct PinList {
    #[serde(default)]
    rows: Vec<PinRow>,
}

#[derive(Debug, Deserialize)]
struct PinRow {
    ipfs_pin_hash: String,
}

#[allow(async_fn_in_trait)]
pub trait PinningService {
    async fn pin_json(&self, metadata: &NftMetadata) -> Result<PinResponse>;
}

/// pinJSONToIPFS に送るエンベロープ
pub fn pin_envelope(metadata: &NftMetadata) -> Result<Value> {
    Ok(json!({
        "pinataMetadata": { "name": metadata.name },
        "pinataContent": serde_json::to_value(metadata)?,
    }))
}

pub struct PinataClient {
    http: reqwest::Client,
    api_url: String,
    gateway_url: String,
    api_key: Secret,
    secret_key: Secret,
}

impl PinataClient {
    pub fn new(config: &PinataConfig, creds: &dyn CredentialProvider) -> Result<Self> {
        Ok(Self {
            http: reqwest::Client::new(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            gateway_url: config.gateway_url.trim_end_matches('/').to_string(),
            api_key: creds.secret(PINATA_API_KEY)?,
            secret_key: creds.secret(PINATA_SECRET_API_KEY)?,
        })
    }

    pub fn gateway_url(&self) -> &str {
        &self.gateway_url
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = self.api_key.expose(|k| request.header("pinata_api_key", k));
        self.secret_key
            .expose(|k| request.header("pinata_secret_api_key", k))
    }

    /// 生バイト列をマルチパートでピンする
    pub async fn pin_file(
        &self,
        file_name: &str,
        content: Vec<u8>,
        metadata: &PinMetadata,
    ) -> Result<PinResponse> {
        let endpoint = format!("{}/pinning/pinFileToIPFS", self.api_url);
        let form = Form::new()
            .part("file", Part::bytes(content).file_name(file_name.to_string()))
            .text("pinataMetadata", serde_json::to_string(metadata)?);

        info!("Pinning file {} to IPFS", file_name);
        let response = self
            .authorize(self.http.post(&endpoint))
            .multipart(form)
            .send()
            .await
            .with_context(|| format!("ファイルのピンに失敗しました: {}", endpoint))?;
        read_json(response).await
    }

    /// pinList をクエリし、ヒットした各ピンの中身をゲートウェイから順に取得する。
    /// 1件でも失敗したら全体を失敗にする。ページングはしない。
    pub async fn pin_search(&self, query: &str) -> Result<Vec<Value>> {
        let endpoint = format!("{}/data/pinList?{}", self.api_url, query);
        let response = self
            .authorize(self.http.get(&endpoint))
            .send()
            .await
            .with_context(|| format!("ピン一覧の取得に失敗しました: {}", endpoint))?;
        let list: PinList = read_json(response).await?;
        debug!("pinList returned {} rows", list.rows.len());

        let mut data = Vec::with_capacity(list.rows.len());
        for row in list.rows {
            let url = format!("{}/ipfs/{}", self.gateway_url, row.ipfs_pin_hash);
            let response = self
                .http
                .get(&url)
                .send()
                .await
                .with_context(|| format!("ピン内容の取得に失敗しました: {}", url))?;
            data.push(read_json(response).await?);
        }
        Ok(data)
    }
}

impl PinningService for PinataClient {
    async fn pin_json(&self, metadata: &NftMetadata) -> Result<PinResponse> {
        let endpoint = format!("{}/pinning/pinJSONToIPFS", self.api_url);
        let body = pin_envelope(metadata)?;

        info!("Pinning metadata {:?} to IPFS", metadata.name);
        let response = self
            .authorize(self.http.post(&endpoint))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("メタデータのピンに失敗しました: {}", endpoint))?;
        read_json(response).await
    }
}

/// ステータスを確認してから JSON として読む。失敗時は本文をエラーに含める
async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    let url = response.url().to_string();
    let text = response
        .text()
        .await
        .with_context(|| format!("レスポンス本文の読み込みに失敗しました: {}", url))?;

    if !status.is_success() {
        bail!("{} が {} を返しました: {}", url, status, text);
    }

    serde_json::from_str(&text)
        .with_context(|| format!("JSON ではないレスポンスです ({}): {}", url, text))
}

/// メタデータをピンし、ハッシュをキーにアイテムレコードを保存する
pub async fn pin_and_record<P: PinningService>(
    pinner: &P,
    store: &RecordStore,
    metadata: NftMetadata,
    gateway_url: &str,
) -> Result<ItemRecord> {
    let hash_info = pinner.pin_json(&metadata).await?;
    if hash_info.ipfs_hash.is_empty() {
        bail!("ピン結果に IpfsHash がありません");
    }

    let record = ItemRecord::new(hash_info, metadata, gateway_url);
    store.save_item(&record)?;
    info!("Saved item {} ({})", record.item.name, record.hash());
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Namespace;
    use std::cell::Cell;

    fn metadata(name: &str) -> NftMetadata {
        NftMetadata {
            name: name.to_string(),
            image: "https://example.com/a.png".to_string(),
            external_url: String::new(),
            description: "desc".to_string(),
            background_color: "ffffff".to_string(),
            animation_url: String::new(),
            youtube_url: String::new(),
            attributes: Vec::new(),
        }
    }

    struct FakePinata {
        hash: String,
        calls: Cell<u32>,
    }

    impl PinningService for FakePinata {
        async fn pin_json(&self, _metadata: &NftMetadata) -> Result<PinResponse> {
            self.calls.set(self.calls.get() + 1);
            Ok(serde_json::from_value(json!({
                "IpfsHash": self.hash,
                "PinSize": 321,
                "Timestamp": "2021-06-01T00:00:00.000Z",
                "isDuplicate": true
            }))?)
        }
    }

    #[test]
    fn envelope_wraps_content_with_name() {
        let env = pin_envelope(&metadata("Sword")).unwrap();
        assert_eq!(env["pinataMetadata"], json!({"name": "Sword"}));
        assert_eq!(env["pinataContent"]["name"], "Sword");
        assert_eq!(env["pinataContent"]["attributes"], json!([]));
    }

    #[test]
    fn pin_response_keeps_unknown_fields() {
        let raw = json!({"IpfsHash": "QmX", "PinSize": 10, "Timestamp": "t", "isDuplicate": false});
        let parsed: PinResponse = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(parsed.ipfs_hash, "QmX");
        assert_eq!(parsed.pin_size, Some(10));
        assert_eq!(serde_json::to_value(&parsed).unwrap(), raw);
    }

    #[test]
    fn pin_metadata_skips_empty_keyvalues() {
        let meta = PinMetadata {
            name: "logo.png".to_string(),
            ..Default::default()
        };
        assert_eq!(serde_json::to_string(&meta).unwrap(), r#"{"name":"logo.png"}"#);
    }

    #[tokio::test]
    async fn pin_and_record_saves_under_hash() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path());
        let fake = FakePinata {
            hash: "QmTestHash".to_string(),
            calls: Cell::new(0),
        };

        let record = pin_and_record(&fake, &store, metadata("Sword"), "https://gateway.pinata.cloud")
            .await
            .unwrap();

        assert_eq!(fake.calls.get(), 1);
        assert_eq!(record.url, "https://gateway.pinata.cloud/ipfs/QmTestHash");
        assert_eq!(record.ipfs_url, "ipfs://QmTestHash");
        assert!(store.namespace_dir(Namespace::Items).join("QmTestHash.json").exists());

        let items = store.items().unwrap();
        assert_eq!(items["QmTestHash"], record);
    }
}
