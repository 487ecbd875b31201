//! Token metadata document parsing.
//!
//! Metadata JSON in the wild follows two naming conventions for the same
//! fields (`image_png` vs `imagePng`) and two shapes for attributes (a list
//! of `{trait_type, value}` objects or a flat string map). Parsing accepts
//! both and normalizes into a single struct.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single token trait.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub trait_type: String,
    pub value: String,
}

/// Parsed token metadata, normalized from the on-chain document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenMetadata {
    /// Token id; not part of the document, filled in from the task.
    #[serde(default)]
    pub token_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default, alias = "imagePng")]
    pub image_png: Option<String>,
    /// Alternate GIF source URL, when the collection ships one.
    #[serde(default)]
    pub gif: Option<String>,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    /// Set during media dispatch when a GIF variant was uploaded.
    #[serde(default)]
    pub is_gif: bool,
}

/// Raw document shape before attribute normalization.
#[derive(Debug, Deserialize)]
struct RawMetadata {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    image: Option<String>,
    #[serde(default, alias = "imagePng")]
    image_png: Option<String>,
    #[serde(default)]
    gif: Option<String>,
    #[serde(default)]
    attributes: Option<RawAttributes>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawAttributes {
    /// `[{"trait_type": "body", "value": "blue"}, ...]`
    List(Vec<RawAttribute>),
    /// `{"body": "blue", ...}`
    Map(BTreeMap<String, serde_json::Value>),
}

#[derive(Debug, Deserialize)]
struct RawAttribute {
    #[serde(alias = "traitType")]
    trait_type: String,
    value: serde_json::Value,
}

fn value_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Parse a metadata document body.
///
/// A failure here is deterministic for a given body, so callers treat it as
/// permanent rather than retrying the fetch.
pub fn parse_token_metadata(body: &str) -> Result<TokenMetadata> {
    let raw: RawMetadata =
        serde_json::from_str(body).context("malformed token metadata document")?;

    let attributes = match raw.attributes {
        Some(RawAttributes::List(list)) => list
            .into_iter()
            .map(|a| Attribute {
                trait_type: a.trait_type,
                value: value_to_string(&a.value),
            })
            .collect(),
        Some(RawAttributes::Map(map)) => map
            .into_iter()
            .map(|(trait_type, value)| Attribute {
                trait_type,
                value: value_to_string(&value),
            })
            .collect(),
        None => Vec::new(),
    };

    Ok(TokenMetadata {
        token_id: String::new(),
        name: raw.name.context("metadata document has no name")?,
        description: raw.description,
        image: raw.image,
        image_png: raw.image_png,
        gif: raw.gif,
        attributes,
        is_gif: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_snake_case_with_attribute_list() {
        let body = r#"{
            "name": "Sleepy #1",
            "description": "zzz",
            "image": "ipfs://Qm/1.gif",
            "image_png": "ipfs://Qm/1.png",
            "attributes": [{"trait_type": "mood", "value": "sleepy"}]
        }"#;
        let meta = parse_token_metadata(body).unwrap();
        assert_eq!(meta.name, "Sleepy #1");
        assert_eq!(meta.image_png.as_deref(), Some("ipfs://Qm/1.png"));
        assert_eq!(meta.attributes.len(), 1);
        assert_eq!(meta.attributes[0].trait_type, "mood");
        assert_eq!(meta.attributes[0].value, "sleepy");
    }

    #[test]
    fn test_parse_camel_case_fields() {
        let body = r#"{"name": "Tok", "imagePng": "https://x/1.png", "attributes": []}"#;
        let meta = parse_token_metadata(body).unwrap();
        assert_eq!(meta.image_png.as_deref(), Some("https://x/1.png"));
    }

    #[test]
    fn test_parse_attribute_map() {
        let body = r#"{"name": "Tok", "attributes": {"body": "blue", "level": 3}}"#;
        let meta = parse_token_metadata(body).unwrap();
        assert_eq!(meta.attributes.len(), 2);
        assert!(meta
            .attributes
            .iter()
            .any(|a| a.trait_type == "level" && a.value == "3"));
    }

    #[test]
    fn test_parse_missing_name_fails() {
        assert!(parse_token_metadata(r#"{"image": "x"}"#).is_err());
    }

    #[test]
    fn test_parse_garbage_fails() {
        assert!(parse_token_metadata("<html>not json</html>").is_err());
    }
}
