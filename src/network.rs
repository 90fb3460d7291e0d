use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// デプロイ・ミント先のテストネットワーク
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mumbai,
    Rinkeby,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Mumbai => "mumbai",
            Network::Rinkeby => "rinkeby",
        }
    }

    pub fn chain_id(&self) -> u64 {
        match self {
            Network::Mumbai => 80001,
            Network::Rinkeby => 4,
        }
    }

    pub fn native_token(&self) -> &'static str {
        match self {
            Network::Mumbai => "MATIC",
            Network::Rinkeby => "ETH",
        }
    }

    pub fn faucet_url(&self) -> &'static str {
        match self {
            Network::Mumbai => "https://faucet.matic.network/",
            Network::Rinkeby => "https://faucet.rinkeby.io/",
        }
    }

    pub fn faucet_note(&self) -> String {
        format!(
            "The Faucet allows you to get free {} on test networks",
            self.native_token().to_lowercase()
        )
    }

    fn explorer_base(&self) -> &'static str {
        match self {
            Network::Mumbai => "https://explorer-mumbai.maticvigil.com",
            Network::Rinkeby => "https://rinkeby.etherscan.io",
        }
    }

    pub fn address_url(&self, address: &str) -> String {
        format!("{}/address/{}", self.explorer_base(), address)
    }

    pub fn tx_url(&self, tx_hash: &str) -> String {
        format!("{}/tx/{}", self.explorer_base(), tx_hash)
    }

    /// Infura の JSON-RPC エンドポイント
    pub fn rpc_url(&self, infura_key: &str) -> String {
        match self {
            Network::Mumbai => format!("https://polygon-mumbai.infura.io/v3/{}", infura_key),
            Network::Rinkeby => format!("https://rinkeby.infura.io/v3/{}", infura_key),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mumbai" => Ok(Network::Mumbai),
            "rinkeby" => Ok(Network::Rinkeby),
            other => bail!("未対応のネットワークです: {} (mumbai / rinkeby)", other),
        }
    }
}
