//! Hand-authored description table.
//!
//! ```json
//! {
//!   "hackathon-2024": {
//!     "default": "Our yearly hackathon",
//!     "team.jpg": "The winning team"
//!   }
//! }
//! ```

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Descriptions of one collection; `default` is reserved for the fallback text
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionDescriptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(flatten)]
    pub files: BTreeMap<String, String>,
}

/// Collection id → filename → description
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DescriptionTable(pub BTreeMap<String, CollectionDescriptions>);

impl DescriptionTable {
    pub async fn load(path: &Path) -> Result<Self, PipelineError> {
        if !path.exists() {
            return Err(PipelineError::MissingInput(format!(
                "description table {}",
                path.display()
            )));
        }
        let content = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Description for a file: exact name, then same stem (the table may predate
    /// a WebP conversion), then the collection default, then empty
    pub fn lookup(&self, collection_id: &str, file_name: &str) -> String {
        let Some(collection) = self.0.get(collection_id) else {
            return String::new();
        };

        if let Some(text) = collection.files.get(file_name) {
            return text.clone();
        }

        let stem = file_stem(file_name);
        if let Some((_, text)) = collection.files.iter().find(|(name, _)| file_stem(name) == stem) {
            return text.clone();
        }

        collection.default.clone().unwrap_or_default()
    }
}

fn file_stem(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) if idx > 0 => &name[..idx],
        _ => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn table() -> DescriptionTable {
        serde_json::from_str(
            r#"{
                "hack": { "default": "Hackathon night", "team.jpg": "The winning team" },
                "bare": { "a.png": "Only one" }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_lookup_exact_name() {
        assert_eq!(table().lookup("hack", "team.jpg"), "The winning team");
    }

    #[test]
    fn test_lookup_matches_converted_stem() {
        assert_eq!(table().lookup("hack", "team.webp"), "The winning team");
    }

    #[test]
    fn test_lookup_falls_back_to_default_then_empty() {
        let table = table();
        assert_eq!(table.lookup("hack", "other.jpg"), "Hackathon night");
        assert_eq!(table.lookup("bare", "other.jpg"), "");
        assert_eq!(table.lookup("unknown", "a.png"), "");
    }

    #[tokio::test]
    async fn test_load_missing_is_missing_input() {
        let temp_dir = TempDir::new().unwrap();
        let err = DescriptionTable::load(&temp_dir.path().join("nope.json")).await.unwrap_err();
        assert!(matches!(err, PipelineError::MissingInput(_)));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("descriptions.json");
        tokio::fs::write(&path, r#"{ "x": { "default": "d" } }"#).await.unwrap();

        let table = DescriptionTable::load(&path).await.unwrap();
        assert_eq!(table.lookup("x", "any.jpg"), "d");
    }
}
