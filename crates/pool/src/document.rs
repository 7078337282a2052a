//! Versioned metadata document persisted as `index.cmg`

use cairn_core::{Error, Result, SerializationOp, INDEX_FILE};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{Read, Write};

use crate::item::Item;

/// Current document format version
pub const DOCUMENT_VERSION: &str = "1";

/// All item metadata of one location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataDocument {
    pub version: String,
    pub items: BTreeMap<String, Item>,
    /// Time of the last save; the only merge arbitration signal
    pub last_modified: DateTime<Utc>,
}

impl Default for MetadataDocument {
    fn default() -> Self {
        Self {
            version: DOCUMENT_VERSION.to_string(),
            items: BTreeMap::new(),
            last_modified: DateTime::<Utc>::MIN_UTC,
        }
    }
}

impl MetadataDocument {
    pub fn encode<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer(writer, self)
            .map_err(|e| Error::serialization(INDEX_FILE, SerializationOp::Serialize, e))
    }

    /// Decode a document, rejecting versions this build does not understand
    pub fn decode<R: Read>(reader: R) -> Result<Self> {
        let document: Self = serde_json::from_reader(reader)
            .map_err(|e| Error::serialization(INDEX_FILE, SerializationOp::Deserialize, e))?;

        if document.version != DOCUMENT_VERSION {
            return Err(Error::serialization(
                INDEX_FILE,
                SerializationOp::Deserialize,
                serde::de::Error::custom(format!(
                    "unsupported document version '{}', expected '{DOCUMENT_VERSION}'",
                    document.version
                )),
            ));
        }
        if let Some((key, item)) = document.items.iter().find(|(key, item)| **key != item.id) {
            return Err(Error::serialization(
                INDEX_FILE,
                SerializationOp::Deserialize,
                serde::de::Error::custom(format!(
                    "entry '{key}' holds item '{}'",
                    item.id
                )),
            ));
        }
        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_round_trip_keeps_version_tag() {
        let mut document = MetadataDocument {
            last_modified: Utc::now(),
            ..Default::default()
        };
        let item = Item::new("a", BTreeSet::new());
        document.items.insert(item.id.clone(), item);

        let mut bytes = Vec::new();
        document.encode(&mut bytes).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["version"], "1");
        assert!(json.get("lastModified").is_some());

        assert_eq!(MetadataDocument::decode(&bytes[..]).unwrap(), document);
    }

    #[test]
    fn test_unknown_version_is_rejected() {
        let json = r#"{"version":"2","items":{},"lastModified":"2024-01-01T00:00:00Z"}"#;
        assert!(matches!(
            MetadataDocument::decode(json.as_bytes()),
            Err(Error::Serialization { .. })
        ));
    }

    #[test]
    fn test_missing_version_is_rejected() {
        let json = r#"{"items":{},"lastModified":"2024-01-01T00:00:00Z"}"#;
        assert!(MetadataDocument::decode(json.as_bytes()).is_err());
    }

    #[test]
    fn test_mismatched_entry_is_rejected() {
        let json = r#"{"version":"1","lastModified":"2024-01-01T00:00:00Z","items":{
            "a":{"id":"b","created":"2024-01-01T00:00:00Z","lastModified":"2024-01-01T00:00:00Z"}}}"#;
        assert!(MetadataDocument::decode(json.as_bytes()).is_err());
    }
}
