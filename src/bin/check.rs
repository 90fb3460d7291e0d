use anyhow::{Context, Result};
use highwind::config::Config;
use highwind::store::{ContractRecord, ItemRecord, Namespace, RecordStore};
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashMap};
use std::env;
use std::path::PathBuf;

/// 読めなかったレコードを問題として移し、読めたものだけ返す
fn parse_all<T: DeserializeOwned>(
    store: &RecordStore,
    namespace: Namespace,
    problems: &mut Vec<(String, String)>,
) -> Result<BTreeMap<String, T>> {
    let scan = store.scan(namespace)?;
    for (key, err) in scan.unreadable {
        problems.push((
            format!("{}/{}.json", namespace.dir_name(), key),
            format!("unreadable record: {:#}", err),
        ));
    }
    Ok(scan.records)
}

/// メインのバイナリと同じく `HIGHWIND_CONFIG` があればそれを使う
fn config_path(env_value: Option<String>) -> PathBuf {
    env_value
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("highwind.yaml"))
}

fn main() -> Result<()> {
    let path = config_path(env::var("HIGHWIND_CONFIG").ok());
    let cfg = Config::load_or_default(&path)
        .with_context(|| format!("設定を読めません: {:?}", path))?;
    let store = RecordStore::new(&cfg.store_dir);

    let mut problems: Vec<(String, String)> = Vec::new();
    let contracts: BTreeMap<String, ContractRecord> =
        parse_all(&store, Namespace::Contracts, &mut problems)?;
    let items: BTreeMap<String, ItemRecord> = parse_all(&store, Namespace::Items, &mut problems)?;

    let mut by_address: HashMap<String, Vec<&str>> = HashMap::new();
    for (key, c) in &contracts {
        by_address
            .entry(format!("{}:{}", c.network, c.contract_address.to_lowercase()))
            .or_default()
            .push(key);

        let abi = cfg.deploy.project_dir.join(&c.abi_path);
        if !abi.exists() {
            problems.push((
                format!("contracts/{}.json", key),
                format!("abi_path not found: {}", c.abi_path),
            ));
        }
    }
    for (address, keys) in &by_address {
        if keys.len() > 1 {
            problems.push((
                address.clone(),
                format!("same contract recorded {} times: {}", keys.len(), keys.join(", ")),
            ));
        }
    }

    let mut stats: BTreeMap<String, HashMap<String, usize>> = BTreeMap::new();
    for (key, item) in &items {
        if item.hash() != key.as_str() {
            problems.push((
                format!("items/{}.json", key),
                format!("file name does not match IpfsHash {}", item.hash()),
            ));
        }
        for attr in &item.item.attributes {
            *stats
                .entry(attr.trait_type.clone())
                .or_default()
                .entry(attr.value.clone())
                .or_insert(0) += 1;
        }
    }

    println!("==============================");
    println!(" Highwind Record Check");
    println!(" Contracts: {}", contracts.len());
    println!(" Items:     {}", items.len());
    println!("==============================\n");

    for (key, c) in &contracts {
        println!("▶ {} ({} / {}) {}", key, c.token_symbol, c.network, c.contract_address);
    }
    if !contracts.is_empty() {
        println!();
    }

    for (trait_type, values) in stats {
        println!("▶ Trait: {}", trait_type);

        let mut sorted: Vec<_> = values.into_iter().collect();
        sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        for (value, count) in sorted {
            let ratio = count as f64 / items.len() as f64 * 100.0;
            println!("  {:30} {:5} ({:.2}%)", value, count, ratio);
        }
        println!();
    }

    if problems.is_empty() {
        println!("✅ 問題は見つかりませんでした");
        return Ok(());
    }

    println!("❌ {} 件の問題が見つかりました:", problems.len());
    for (what, msg) in &problems {
        println!("  - {} : {}", what, msg);
    }
    std::process::exit(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_path_follows_env() {
        assert_eq!(config_path(None), PathBuf::from("highwind.yaml"));
        assert_eq!(config_path(Some(String::new())), PathBuf::from("highwind.yaml"));
        assert_eq!(
            config_path(Some("/etc/highwind/prod.yaml".to_string())),
            PathBuf::from("/etc/highwind/prod.yaml")
        );
    }

    #[test]
    fn broken_records_become_problems() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path());
        let items_dir = store.namespace_dir(Namespace::Items);
        std::fs::create_dir_all(&items_dir).unwrap();
        std::fs::write(items_dir.join("QmBroken.json"), "{").unwrap();

        let mut problems = Vec::new();
        let items: BTreeMap<String, ItemRecord> =
            parse_all(&store, Namespace::Items, &mut problems).unwrap();
        assert!(items.is_empty());
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].0, "items/QmBroken.json");
        assert!(problems[0].1.starts_with("unreadable record:"));
    }
}
