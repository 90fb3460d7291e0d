//! コントラクトのデプロイ。
//!
//! テンプレートをコピーしてプレースホルダを置換し、truffle を子プロセスとして
//! 実行する。アドレスはビルド成果物（truffle の artifact JSON）の `networks`
//! から取り、無ければ出力ログから拾う。

use crate::config::DeployConfig;
use crate::credentials::{CredentialProvider, INFURA_KEY, MNEMONIC};
use crate::network::Network;
use crate::store::{ContractRecord, RecordStore};
use anyhow::{Context, Result, bail};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// truffle の出力でデプロイ済みアドレスの直前に出る文字列
pub const ADDRESS_MARKER: &str = "contract address:    ";
pub const NAME_PLACEHOLDER: &str = "REPLACE_NAME";
pub const SYMBOL_PLACEHOLDER: &str = "REPLACE_SYM";

#[derive(Debug, Clone)]
pub struct DeployRequest {
    pub network: Network,
    pub nft_name: String,
    pub nft_symbol: String,
    pub owner_address: String,
}

#[derive(Debug, Clone)]
pub enum DeployOutcome {
    Deployed {
        key: String,
        record: ContractRecord,
        log: String,
    },
    /// レコードは書かない。作業ディレクトリは残る
    Failed { hints: Vec<String>, log: String },
}

/// テンプレートから作った作業ディレクトリ
#[derive(Debug, Clone)]
pub struct Workspace {
    pub token_name: String,
    pub contracts_dir: String,
    pub contracts_build: String,
}

impl Workspace {
    pub fn new(token_name: &str, build_dir: &str) -> Self {
        Self {
            token_name: token_name.to_string(),
            contracts_dir: format!("contracts_{}", token_name),
            contracts_build: format!("{}/contracts_{}", build_dir.trim_end_matches('/'), token_name),
        }
    }

    pub fn abi_path(&self) -> String {
        format!("{}/{}.json", self.contracts_build, self.token_name)
    }
}

struct MigrationRun {
    succeeded: bool,
    log: String,
}

pub struct Deployer<'a> {
    config: &'a DeployConfig,
    store: &'a RecordStore,
}

impl<'a> Deployer<'a> {
    pub fn new(config: &'a DeployConfig, store: &'a RecordStore) -> Self {
        Self { config, store }
    }

    fn project_path(&self, relative: &str) -> PathBuf {
        self.config.project_dir.join(relative)
    }

    pub fn deploy(
        &self,
        request: &DeployRequest,
        creds: &dyn CredentialProvider,
    ) -> Result<DeployOutcome> {
        if request.nft_symbol.trim().is_empty() {
            bail!("NFT シンボルが空です");
        }
        if request.owner_address.trim().is_empty() {
            bail!("ウォレットアドレスが空です");
        }
        let token_name = token_name(&request.nft_name)?;

        let workspace = self.prepare_workspace(&token_name, &request.nft_symbol)?;
        let run = self.run_migration(request, &workspace, creds)?;

        if !run.succeeded {
            warn!("Migration tool exited with a failure status");
            return Ok(failed(request, run.log));
        }

        let manifest = self.project_path(&workspace.abi_path());
        let address = match artifact_address(&manifest, request.network.chain_id()) {
            Ok(Some(address)) => Some(address),
            Ok(None) => extract_address(&run.log),
            Err(err) => {
                warn!("Ignoring unreadable build artifact: {:#}", err);
                extract_address(&run.log)
            }
        };
        let Some(contract_address) = address else {
            return Ok(failed(request, run.log));
        };

        let record = ContractRecord {
            token_name: token_name.clone(),
            token_symbol: request.nft_symbol.clone(),
            contract_address: contract_address.clone(),
            network: request.network,
            scan_url: request.network.address_url(&contract_address),
            abi_path: workspace.abi_path(),
        };
        let key = self.store.save_contract(&record)?;
        info!("Deployed {} at {} (record {})", token_name, contract_address, key);

        Ok(DeployOutcome::Deployed {
            key,
            record,
            log: run.log,
        })
    }

    /// テンプレートを作業ディレクトリへコピーし、名前とシンボルを埋め込む
    pub fn prepare_workspace(&self, token_name: &str, symbol: &str) -> Result<Workspace> {
        let workspace = Workspace::new(token_name, &self.config.build_dir);

        let template = self.project_path(&self.config.contracts_template);
        let contracts_dir = self.project_path(&workspace.contracts_dir);
        copy_tree(&template, &contracts_dir)?;
        render_template(
            &contracts_dir.join(&self.config.contract_source),
            &[(NAME_PLACEHOLDER, token_name), (SYMBOL_PLACEHOLDER, symbol)],
        )?;

        let migration_template = self.project_path(&self.config.migrations_template);
        let migrations_dir = self.project_path(&self.config.migrations_dir);
        let file_name = migration_template
            .file_name()
            .with_context(|| format!("マイグレーションテンプレートのパスが不正です: {:?}", migration_template))?;
        fs::create_dir_all(&migrations_dir)
            .with_context(|| format!("migrations ディレクトリの作成に失敗しました: {:?}", migrations_dir))?;
        let migration = migrations_dir.join(file_name);
        fs::copy(&migration_template, &migration).with_context(|| {
            format!("マイグレーションのコピーに失敗しました: {:?}", migration_template)
        })?;
        render_template(&migration, &[(NAME_PLACEHOLDER, token_name)])?;

        // アドレスはこの実行で書かれた artifact からだけ読む
        let artifact = self.project_path(&workspace.abi_path());
        if artifact.exists() {
            fs::remove_file(&artifact)
                .with_context(|| format!("古い artifact の削除に失敗しました: {:?}", artifact))?;
            debug!("Removed stale build artifact {:?}", artifact);
        }

        debug!("Prepared workspace {:?}", contracts_dir);
        Ok(workspace)
    }

    fn run_migration(
        &self,
        request: &DeployRequest,
        workspace: &Workspace,
        creds: &dyn CredentialProvider,
    ) -> Result<MigrationRun> {
        let infura_key = creds.secret(INFURA_KEY)?;
        let mnemonic = creds.secret(MNEMONIC)?;

        let mut command = Command::new(&self.config.migrate_program);
        command
            .args(&self.config.migrate_args)
            .args(["migrate", "--reset", "--network", request.network.as_str()])
            .current_dir(&self.config.project_dir)
            .env("OWNER_ADDRESS", &request.owner_address)
            .env("CONTRACTS_DIR", &workspace.contracts_dir)
            .env("CONTRACTS_BUILD", &workspace.contracts_build);
        infura_key.expose(|k| {
            command.env("INFURA_KEY", k);
        });
        mnemonic.expose(|m| {
            command.env("MNEMONIC", m);
        });

        info!(
            "Running {} migrate --network {} for {}",
            self.config.migrate_program, request.network, workspace.token_name
        );
        let output = command.output().with_context(|| {
            format!("マイグレーションツールを起動できません: {}", self.config.migrate_program)
        })?;

        let mut log = String::from_utf8_lossy(&output.stdout).into_owned();
        log.push_str(&String::from_utf8_lossy(&output.stderr));
        debug!("Migration output:\n{}", log);

        Ok(MigrationRun {
            succeeded: output.status.success(),
            log,
        })
    }
}

fn failed(request: &DeployRequest, log: String) -> DeployOutcome {
    DeployOutcome::Failed {
        hints: vec![
            funds_hint(request.network, &request.owner_address),
            "Check log output for error details".to_string(),
        ],
        log,
    }
}

pub fn funds_hint(network: Network, owner_address: &str) -> String {
    format!(
        "Do you have enough {} in wallet {}?",
        network.native_token(),
        owner_address
    )
}

/// 空白をアンダースコアにしたトークン名。
/// Solidity のコントラクト名とディレクトリ名に使うので英数字と `_` だけ許す
pub fn token_name(nft_name: &str) -> Result<String> {
    let name = nft_name.trim().replace(' ', "_");
    if name.is_empty() {
        bail!("NFT 名が空です");
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        bail!("NFT 名には英数字と空白・アンダースコアのみ使えます: {:?}", nft_name);
    }
    Ok(name)
}

/// マーカーの3回目の出現直後の最初のトークンをアドレスとみなす
pub fn extract_address(transcript: &str) -> Option<String> {
    transcript
        .split(ADDRESS_MARKER)
        .nth(3)?
        .split_whitespace()
        .next()
        .map(|s| s.to_string())
}

/// truffle の artifact JSON から `networks.<chain_id>.address` を読む
pub fn artifact_address(path: &Path, chain_id: u64) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    let text = fs::read_to_string(path)
        .with_context(|| format!("artifact の読み込みに失敗しました: {:?}", path))?;
    let artifact: Value = serde_json::from_str(&text)
        .with_context(|| format!("artifact のパースに失敗しました: {:?}", path))?;

    Ok(artifact
        .get("networks")
        .and_then(|n| n.get(chain_id.to_string()))
        .and_then(|n| n.get("address"))
        .and_then(Value::as_str)
        .map(|s| s.to_string()))
}

/// ディレクトリを再帰的にコピー（既存ファイルは上書き）
fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    if !src.is_dir() {
        bail!("テンプレートディレクトリがありません: {:?}", src);
    }

    for entry in WalkDir::new(src) {
        let entry = entry.with_context(|| format!("テンプレートの走査に失敗しました: {:?}", src))?;
        let relative = entry.path().strip_prefix(src)?;
        let target = dst.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("ディレクトリの作成に失敗しました: {:?}", target))?;
        } else if entry.file_type().is_file() {
            fs::copy(entry.path(), &target)
                .with_context(|| format!("ファイルのコピーに失敗しました: {:?}", entry.path()))?;
        }
    }
    Ok(())
}

fn render_template(path: &Path, replacements: &[(&str, &str)]) -> Result<()> {
    let mut text = fs::read_to_string(path)
        .with_context(|| format!("テンプレートの読み込みに失敗しました: {:?}", path))?;
    for &(token, value) in replacements {
        text = text.replace(token, value);
    }
    fs::write(path, text).with_context(|| format!("テンプレートの書き込みに失敗しました: {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRANSCRIPT: &str = "\
1_initial_migration.js
   Deploying 'Migrations'
   > transaction hash:    0xaaa
   > contract address:    0x1111111111111111111111111111111111111111
   > block number:        1
2_deploy_contracts.js
   Replacing 'Test_NFT'
   > contract address:    0x2222222222222222222222222222222222222222
   > block number:        2
   Linking
   > contract address:    0x3333333333333333333333333333333333333333
   > block number:        3
";

    #[test]
    fn takes_token_after_third_marker() {
        assert_eq!(
            extract_address(TRANSCRIPT).as_deref(),
            Some("0x3333333333333333333333333333333333333333")
        );
    }

    #[test]
    fn missing_marker_yields_nothing() {
        assert_eq!(extract_address("Error: insufficient funds for gas"), None);
        let two = "contract address:    0x1\ncontract address:    0x2\n";
        assert_eq!(extract_address(two), None);
    }

    #[test]
    fn token_name_replaces_spaces() {
        assert_eq!(token_name("Test NFT").unwrap(), "Test_NFT");
        assert!(token_name("   ").is_err());
    }

    #[test]
    fn token_name_allows_identifier_characters_only() {
        assert_eq!(token_name("  My Cool_NFT 2 ").unwrap(), "My_Cool_NFT_2");
        assert!(token_name("../evil").is_err());
        assert!(token_name("Café").is_err());
        assert!(token_name("NFT-1").is_err());
    }

    #[test]
    fn funds_hint_names_native_token() {
        assert_eq!(
            funds_hint(Network::Mumbai, "0xabc"),
            "Do you have enough MATIC in wallet 0xabc?"
        );
        assert_eq!(
            funds_hint(Network::Rinkeby, "0xabc"),
            "Do you have enough ETH in wallet 0xabc?"
        );
    }

    #[test]
    fn workspace_paths() {
        let ws = Workspace::new("Test_NFT", "./build");
        assert_eq!(ws.contracts_dir, "contracts_Test_NFT");
        assert_eq!(ws.contracts_build, "./build/contracts_Test_NFT");
        assert_eq!(ws.abi_path(), "./build/contracts_Test_NFT/Test_NFT.json");
    }

    #[test]
    fn artifact_address_reads_network_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Test_NFT.json");
        assert_eq!(artifact_address(&path, 4).unwrap(), None);

        fs::write(
            &path,
            r#"{"contractName":"Test_NFT","networks":{"4":{"address":"0xABC","transactionHash":"0x1"}}}"#,
        )
        .unwrap();
        assert_eq!(artifact_address(&path, 4).unwrap().as_deref(), Some("0xABC"));
        assert_eq!(artifact_address(&path, 80001).unwrap(), None);
    }
}
