use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("設定ファイルの読み込みに失敗しました: {:?}", path))?;
        let config: Config = serde_yaml::from_str(&text)
            .with_context(|| format!("設定ファイルのパースに失敗しました: {:?}", path))?;
        Ok(config)
    }

    /// 設定ファイルが無い場合はデフォルト値で動かす
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store_dir: PathBuf,
    pub deploy: DeployConfig,
    pub pinata: PinataConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_dir: PathBuf::from("highwind_jsons"),
            deploy: DeployConfig::default(),
            pinata: PinataConfig::default(),
        }
    }
}

/// truffle プロジェクトのレイアウトとマイグレーションコマンド
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    /// テンプレートがあり、マイグレーションツールを実行するディレクトリ
    pub project_dir: PathBuf,
    pub contracts_template: String,
    pub contract_source: String,
    pub migrations_template: String,
    pub migrations_dir: String,
    pub build_dir: String,
    pub migrate_program: String,
    /// `migrate` の前に渡す追加引数
    pub migrate_args: Vec<String>,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            project_dir: PathBuf::from("."),
            contracts_template: "contracts_temp".to_string(),
            contract_source: "MyNFT.sol".to_string(),
            migrations_template: "migrations_temp/2_deploy_contracts.js".to_string(),
            migrations_dir: "migrations".to_string(),
            build_dir: "./build".to_string(),
            migrate_program: "truffle".to_string(),
            migrate_args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PinataConfig {
    pub api_url: String,
    pub gateway_url: String,
}

impl Default for PinataConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.pinata.cloud".to_string(),
            gateway_url: "https://gateway.pinata.cloud".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let yaml = r#"
store_dir: records
deploy:
  migrate_program: npx
  migrate_args: ["truffle"]
"#;
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.store_dir, PathBuf::from("records"));
        assert_eq!(cfg.deploy.migrate_program, "npx");
        assert_eq!(cfg.deploy.migrate_args, vec!["truffle".to_string()]);
        assert_eq!(cfg.deploy.contracts_template, "contracts_temp");
        assert_eq!(cfg.deploy.build_dir, "./build");
        assert_eq!(cfg.pinata.gateway_url, "https://gateway.pinata.cloud");
    }

    #[test]
    fn demo_config_parses() {
        let cfg: Config = serde_yaml::from_str(include_str!("../demos/highwind.yaml")).unwrap();
        assert_eq!(cfg.deploy.migrate_program, "npx");
        assert_eq!(cfg.pinata.api_url, "https://api.pinata.cloud");
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load_or_default(&dir.path().join("highwind.yaml")).unwrap();
        assert_eq!(cfg.store_dir, PathBuf::from("highwind_jsons"));
        assert_eq!(cfg.deploy.migrate_program, "truffle");
    }
}
