use anyhow::Result;
use highwind::metadata::{Attribute, NftMetadata};
use highwind::network::Network;
use highwind::pinata::PinResponse;
use highwind::store::{ContractRecord, ItemRecord, Namespace, RecordStore};
use std::fs;
use tempfile::TempDir;

fn contract(name: &str, address: &str) -> ContractRecord {
    ContractRecord {
        token_name: name.to_string(),
        token_symbol: "TNFT".to_string(),
        contract_address: address.to_string(),
        network: Network::Rinkeby,
        scan_url: Network::Rinkeby.address_url(address),
        abi_path: format!("./build/contracts_{}/{}.json", name, name),
    }
}

fn item(name: &str, hash: &str) -> ItemRecord {
    let hash_info: PinResponse = serde_json::from_value(serde_json::json!({
        "IpfsHash": hash,
        "PinSize": 512,
        "Timestamp": "2021-06-01T12:00:00.000Z"
    }))
    .unwrap();
    let metadata = NftMetadata {
        name: name.to_string(),
        image: "ipfs://QmImage".to_string(),
        external_url: "https://example.com".to_string(),
        description: "A test item".to_string(),
        background_color: "ffffff".to_string(),
        animation_url: String::new(),
        youtube_url: String::new(),
        attributes: vec![Attribute {
            display_type: Some("boost_number".to_string()),
            trait_type: "Power".to_string(),
            value: "40".to_string(),
        }],
    };
    ItemRecord::new(hash_info, metadata, "https://gateway.pinata.cloud")
}

#[test]
fn contract_round_trip() -> Result<()> {
    let dir = TempDir::new()?;
    let store = RecordStore::new(dir.path().join("highwind_jsons"));

    let record = contract("Test_NFT", "0x3333333333333333333333333333333333333333");
    let key = store.save_contract(&record)?;
    assert_eq!(key, "Test_NFT");

    let contracts = store.contracts()?;
    assert_eq!(contracts.len(), 1);
    assert_eq!(contracts["Test_NFT"], record);
    Ok(())
}

#[test]
fn same_token_name_gets_suffixed() -> Result<()> {
    let dir = TempDir::new()?;
    let store = RecordStore::new(dir.path());

    let first = store.save_contract(&contract("Test_NFT", "0x01"))?;
    let second = store.save_contract(&contract("Test_NFT", "0x02"))?;
    assert_eq!(first, "Test_NFT");
    assert_eq!(second, "Test_NFT_1");

    let contracts = store.contracts()?;
    assert_eq!(contracts.len(), 2);
    assert_eq!(contracts["Test_NFT"].contract_address, "0x01");
    assert_eq!(contracts["Test_NFT_1"].contract_address, "0x02");
    Ok(())
}

#[test]
fn same_hash_overwrites_item() -> Result<()> {
    let dir = TempDir::new()?;
    let store = RecordStore::new(dir.path());

    store.save_item(&item("Sword", "QmSame"))?;
    let key = store.save_item(&item("Sword v2", "QmSame"))?;
    assert_eq!(key, "QmSame");

    let files: Vec<_> = fs::read_dir(store.namespace_dir(Namespace::Items))?.collect();
    assert_eq!(files.len(), 1);

    let items = store.items()?;
    assert_eq!(items["QmSame"].item.name, "Sword v2");
    Ok(())
}

#[test]
fn items_are_labelled_by_name_and_hash() -> Result<()> {
    let dir = TempDir::new()?;
    let store = RecordStore::new(dir.path());

    let record = item("Sword", "QmAbc");
    store.save_item(&record)?;

    let labelled = store.items_by_label()?;
    assert_eq!(labelled["Sword_QmAbc"], record);
    assert_eq!(labelled["Sword_QmAbc"].ipfs_url, "ipfs://QmAbc");
    assert_eq!(labelled["Sword_QmAbc"].url, "https://gateway.pinata.cloud/ipfs/QmAbc");

    let loaded: ItemRecord = store.load(Namespace::Items, "QmAbc")?;
    assert_eq!(loaded, record);
    Ok(())
}

#[test]
fn stored_json_uses_record_field_names() -> Result<()> {
    let dir = TempDir::new()?;
    let store = RecordStore::new(dir.path());
    store.save_contract(&contract("Test_NFT", "0xabc"))?;

    let text = fs::read_to_string(store.namespace_dir(Namespace::Contracts).join("Test_NFT.json"))?;
    let value: serde_json::Value = serde_json::from_str(&text)?;
    assert_eq!(value["network"], "rinkeby");
    assert_eq!(value["scan_url"], "https://rinkeby.etherscan.io/address/0xabc");
    assert_eq!(value["abi_path"], "./build/contracts_Test_NFT/Test_NFT.json");
    Ok(())
}
