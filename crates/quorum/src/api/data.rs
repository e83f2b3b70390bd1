use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Signed skin texture property of a profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkinData {
    pub value: String,
    pub signature: Option<String>,
}

/// A loaded configuration file, flattened to dotted keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigSnapshot {
    pub file_name: String,
    pub path: Option<PathBuf>,
    pub values: BTreeMap<String, String>,
}

impl ConfigSnapshot {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
