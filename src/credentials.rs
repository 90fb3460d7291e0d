//! 秘密情報の取得。
//!
//! ニーモニックや秘密鍵はコマンドライン引数では受け取らず、
//! `CredentialProvider` から `Secret` として取り出し、`Secret::expose` の
//! クロージャ内でだけ平文に触れる。

use anyhow::{Result, bail};
use std::collections::HashMap;
use std::env;
use std::fmt;

pub const INFURA_KEY: &str = "INFURA_KEY";
pub const MNEMONIC: &str = "HIGHWIND_MNEMONIC";
pub const PRIVATE_KEY: &str = "HIGHWIND_PRIVATE_KEY";
pub const PINATA_API_KEY: &str = "PINATA_API_KEY";
pub const PINATA_SECRET_API_KEY: &str = "PINATA_SECRET_API_KEY";

#[derive(Clone)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose<R>(&self, f: impl FnOnce(&str) -> R) -> R {
        f(&self.0)
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

pub trait CredentialProvider {
    fn secret(&self, name: &str) -> Result<Secret>;
}

/// プロセス環境変数（`.env` 読み込み後）から取得する
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvCredentials;

impl CredentialProvider for EnvCredentials {
    fn secret(&self, name: &str) -> Result<Secret> {
        match env::var(name) {
            Ok(v) if !v.trim().is_empty() => Ok(Secret::new(v)),
            Ok(_) => bail!("環境変数 {} が空です", name),
            Err(_) => bail!("環境変数 {} が設定されていません", name),
        }
    }
}

/// 固定値のプロバイダ（テストやスクリプトからの埋め込み用）
#[derive(Default, Clone)]
pub struct MapCredentials {
    values: HashMap<String, String>,
}

impl MapCredentials {
    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.values.insert(name.to_string(), value.to_string());
        self
    }
}

impl CredentialProvider for MapCredentials {
    fn secret(&self, name: &str) -> Result<Secret> {
        match self.values.get(name) {
            Some(v) if !v.trim().is_empty() => Ok(Secret::new(v.clone())),
            _ => bail!("認証情報 {} がありません", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_is_redacted() {
        let s = Secret::new("test test test junk");
        assert_eq!(format!("{:?}", s), "Secret(***)");
        assert_eq!(s.expose(|v| v.len()), 19);
    }

    #[test]
    fn empty_value_is_rejected() {
        let creds = MapCredentials::default()
            .with(INFURA_KEY, "abc")
            .with(MNEMONIC, "  ");
        assert!(creds.secret(INFURA_KEY).is_ok());
        assert!(creds.secret(MNEMONIC).is_err());
        assert!(creds.secret(PRIVATE_KEY).is_err());
    }

    #[test]
    fn env_provider_reports_missing_variable() {
        let err = EnvCredentials
            .secret("HIGHWIND_TEST_SURELY_UNSET_VARIABLE")
            .unwrap_err();
        assert!(err.to_string().contains("HIGHWIND_TEST_SURELY_UNSET_VARIABLE"));
    }
}
