use anyhow::{Context, Result, bail};
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::Path;

/// OpenSea 形式の NFT メタデータ（IPFS にピンされる本体）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NftMetadata {
    pub name: String,
    pub image: String,
    pub external_url: String,
    pub description: String,
    pub background_color: String,
    pub animation_url: String,
    pub youtube_url: String,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_type: Option<String>,
    pub trait_type: String,
    pub value: String,
}

/// 数値属性の表示形式。`ranking` のときは display_type を出力しない
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberDisplay {
    #[default]
    Number,
    BoostNumber,
    BoostPercentage,
    Ranking,
}

impl NumberDisplay {
    pub fn display_type(&self) -> Option<&'static str> {
        match self {
            NumberDisplay::Number => Some("number"),
            NumberDisplay::BoostNumber => Some("boost_number"),
            NumberDisplay::BoostPercentage => Some("boost_percentage"),
            NumberDisplay::Ranking => None,
        }
    }
}

/// 入力中の属性1件
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum AttributeInput {
    Text {
        trait_type: String,
        #[serde(deserialize_with = "scalar_string")]
        value: String,
    },
    Number {
        #[serde(default)]
        display: NumberDisplay,
        trait_type: String,
        #[serde(deserialize_with = "scalar_string")]
        value: String,
    },
    /// value は unix タイムスタンプ
    Date {
        trait_type: String,
        #[serde(deserialize_with = "scalar_string")]
        value: String,
    },
}

impl AttributeInput {
    pub fn into_attribute(self) -> Attribute {
        match self {
            AttributeInput::Text { trait_type, value } => Attribute {
                display_type: None,
                trait_type,
                value,
            },
            AttributeInput::Number {
                display,
                trait_type,
                value,
            } => Attribute {
                display_type: display.display_type().map(str::to_string),
                trait_type,
                value,
            },
            AttributeInput::Date { trait_type, value } => Attribute {
                display_type: Some("date".to_string()),
                trait_type,
                value,
            },
        }
    }
}

/// YAML では `value: 5` のように書けるので、スカラーは文字列に寄せる
fn scalar_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Str(String),
        Int(i64),
        Float(f64),
        Bool(bool),
    }

    Ok(match Scalar::deserialize(deserializer)? {
        Scalar::Str(s) => s,
        Scalar::Int(i) => i.to_string(),
        Scalar::Float(f) => f.to_string(),
        Scalar::Bool(b) => b.to_string(),
    })
}

/// 1セッション分の入力途中のアイテム。
/// 属性の件数はこの値が持ち、ピン前に破棄すれば何も残らない。
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MetadataDraft {
    pub name: String,
    pub image: String,
    pub external_url: String,
    pub description: String,
    pub background_color: String,
    pub animation_url: String,
    pub youtube_url: String,
    pub attributes: Vec<AttributeInput>,
}

impl Default for MetadataDraft {
    fn default() -> Self {
        Self {
            name: String::new(),
            image: String::new(),
            external_url: String::new(),
            description: String::new(),
            background_color: "#ffffff".to_string(),
            animation_url: String::new(),
            youtube_url: String::new(),
            attributes: Vec::new(),
        }
    }
}

impl MetadataDraft {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("アイテム定義の読み込みに失敗しました: {:?}", path))?;
        let draft: MetadataDraft = serde_yaml::from_str(&text)
            .with_context(|| format!("アイテム定義のパースに失敗しました: {:?}", path))?;
        Ok(draft)
    }

    pub fn attribute_count(&self) -> usize {
        self.attributes.len()
    }

    pub fn add_attribute(&mut self, attribute: AttributeInput) {
        self.attributes.push(attribute);
    }

    /// 最後に追加した属性を取り除く
    pub fn remove_attribute(&mut self) -> Option<AttributeInput> {
        self.attributes.pop()
    }

    pub fn build(self) -> Result<NftMetadata> {
        if self.name.trim().is_empty() {
            bail!("アイテム名が空です");
        }

        Ok(NftMetadata {
            name: self.name,
            image: self.image,
            external_url: self.external_url,
            description: self.description,
            background_color: self.background_color.replace('#', ""),
            animation_url: self.animation_url,
            youtube_url: self.youtube_url,
            attributes: self
                .attributes
                .into_iter()
                .map(AttributeInput::into_attribute)
                .collect(),
        })
    }
}
