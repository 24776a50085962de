//! Seed manifests: declarative initial tree contents
//!
//! ```yaml
//! current_dir: /repo
//! entries:
//!   /repo/README.md: "# hello"
//!   /repo/build:
//!     kind: directory
//!   /repo/logo.bin:
//!     bytes: [137, 80, 78, 71]
//!     readonly: true
//! ```

use crate::config::ConfigError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeedKind {
    #[default]
    File,
    Directory,
}

fn is_false(v: &bool) -> bool {
    !*v
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedNode {
    #[serde(default)]
    pub kind: SeedKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub readonly: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub hidden: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
}

/// One manifest entry: a bare string is a text file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SeedEntry {
    Text(String),
    Detailed(SeedNode),
}

impl SeedEntry {
    pub fn file(content: impl Into<String>) -> Self {
        SeedEntry::Text(content.into())
    }

    pub fn binary(bytes: Vec<u8>) -> Self {
        SeedEntry::Detailed(SeedNode {
            bytes: Some(bytes),
            ..SeedNode::default()
        })
    }

    pub fn directory() -> Self {
        SeedEntry::Detailed(SeedNode {
            kind: SeedKind::Directory,
            ..SeedNode::default()
        })
    }

    pub fn kind(&self) -> SeedKind {
        match self {
            SeedEntry::Text(_) => SeedKind::File,
            SeedEntry::Detailed(node) => node.kind,
        }
    }

    /// File content; `bytes` wins over `content` when both are given.
    pub fn content_bytes(&self) -> Vec<u8> {
        match self {
            SeedEntry::Text(text) => text.as_bytes().to_vec(),
            SeedEntry::Detailed(node) => match (&node.bytes, &node.content) {
                (Some(bytes), _) => bytes.clone(),
                (None, Some(text)) => text.as_bytes().to_vec(),
                (None, None) => Vec::new(),
            },
        }
    }

    pub fn readonly(&self) -> bool {
        matches!(self, SeedEntry::Detailed(node) if node.readonly)
    }

    pub fn hidden(&self) -> bool {
        matches!(self, SeedEntry::Detailed(node) if node.hidden)
    }

    pub fn modified(&self) -> Option<DateTime<Utc>> {
        match self {
            SeedEntry::Detailed(node) => node.modified,
            SeedEntry::Text(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedManifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_sensitive: Option<bool>,
    #[serde(default)]
    pub entries: BTreeMap<String, SeedEntry>,
}

impl SeedManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.entries.insert(path.into(), SeedEntry::file(content));
        self
    }

    pub fn with_dir(mut self, path: impl Into<String>) -> Self {
        self.entries.insert(path.into(), SeedEntry::directory());
        self
    }

    pub fn with_entry(mut self, path: impl Into<String>, entry: SeedEntry) -> Self {
        self.entries.insert(path.into(), entry);
        self
    }

    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(s).map_err(|e| ConfigError::ManifestParse {
            origin: "<yaml>".to_string(),
            error: e.to_string(),
        })
    }

    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(s).map_err(|e| ConfigError::ManifestParse {
            origin: "<json>".to_string(),
            error: e.to_string(),
        })
    }

    /// Loads a manifest file; `.json` is parsed as JSON, anything else as YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::ManifestRead {
            path: path.to_path_buf(),
            source,
        })?;
        let is_json = path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        let parsed = if is_json {
            serde_json::from_str(&text).map_err(|e| e.to_string())
        } else {
            serde_yaml::from_str(&text).map_err(|e| e.to_string())
        };
        parsed.map_err(|error| ConfigError::ManifestParse {
            origin: path.display().to_string(),
            error,
        })
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::ManifestParse {
            origin: "<yaml>".to_string(),
            error: e.to_string(),
        })
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::ManifestParse {
            origin: "<json>".to_string(),
            error: e.to_string(),
        })
    }
}
