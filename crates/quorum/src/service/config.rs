use crate::api::{ConfigManager, ConfigSnapshot};
use crate::error::{BridgeError, BridgeResult, InvokeError};
use crate::reflect::{Call, ClassInfo, RealmId, Reflect};
use crate::skeleton;
use crate::value::{OwnerRef, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Loads TOML configuration files from each owner's data directory.
pub struct ConfigManagerImpl {
    class: ClassInfo,
}

impl ConfigManagerImpl {
    pub fn new(realm: RealmId) -> Arc<Self> {
        Arc::new(Self {
            class: skeleton::config_manager_class("ConfigManagerImpl", realm),
        })
    }
}

fn validate_file_name(file_name: &str) -> BridgeResult<()> {
    let invalid = file_name.trim().is_empty()
        || file_name.contains(['/', '\\'])
        || file_name == "."
        || file_name == "..";
    if invalid {
        return Err(BridgeError::Config(format!(
            "invalid config file name: '{file_name}'"
        )));
    }
    Ok(())
}

/// Flatten nested tables to dotted keys. Strings are kept raw, everything
/// else is rendered as TOML.
fn flatten(prefix: &str, table: &toml::Table, out: &mut BTreeMap<String, String>) {
    for (key, value) in table {
        let key = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            toml::Value::Table(nested) => flatten(&key, nested, out),
            toml::Value::String(text) => {
                out.insert(key, text.clone());
            }
            other => {
                out.insert(key, other.to_string());
            }
        }
    }
}

fn load(path: &Path) -> BridgeResult<BTreeMap<String, String>> {
    let table: toml::Table = toml::from_str(&fs::read_to_string(path)?)?;
    let mut values = BTreeMap::new();
    flatten("", &table, &mut values);
    Ok(values)
}

impl ConfigManager for ConfigManagerImpl {
    fn create_config(&self, owner: &OwnerRef, file_name: &str) -> BridgeResult<ConfigSnapshot> {
        validate_file_name(file_name)?;
        let dir = owner.data_dir().ok_or_else(|| {
            BridgeError::Config(format!("owner '{}' has no data directory", owner.name()))
        })?;

        fs::create_dir_all(&dir)?;
        let path = dir.join(file_name);
        if !path.exists() {
            fs::write(&path, "")?;
            debug!(owner = %owner, path = %path.display(), "Created empty config file");
        }

        Ok(ConfigSnapshot {
            file_name: file_name.to_string(),
            values: load(&path)?,
            path: Some(path),
        })
    }
}

impl Reflect for ConfigManagerImpl {
    fn class(&self) -> &ClassInfo {
        &self.class
    }

    fn invoke(&self, slot: usize, args: &[Value]) -> Result<Value, InvokeError> {
        let call = Call::new(&self.class, slot, args)?;
        skeleton::dispatch_config_manager(self, &call)?.ok_or_else(|| call.unsupported(&self.class))
    }

    fn into_config_manager(self: Arc<Self>) -> Option<Arc<dyn ConfigManager>> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::NamedOwner;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn owner(dir: &TempDir) -> OwnerRef {
        OwnerRef::new(NamedOwner::new("PluginA").with_data_dir(dir.path().join("PluginA")))
    }

    #[test]
    fn test_creates_missing_file() {
        let dir = TempDir::new().unwrap();
        let manager = ConfigManagerImpl::new(RealmId::new());

        let config = manager.create_config(&owner(&dir), "settings.toml").unwrap();
        assert!(config.is_empty());
        assert_eq!(config.file_name, "settings.toml");
        assert!(dir.path().join("PluginA").join("settings.toml").is_file());
    }

    #[test]
    fn test_flattens_existing_file() {
        let dir = TempDir::new().unwrap();
        let data_dir = dir.path().join("PluginA");
        fs::create_dir_all(&data_dir).unwrap();
        fs::write(
            data_dir.join("settings.toml"),
            "greeting = \"hello\"\n\n[limits]\nmax = 5\nstrict = true\n",
        )
        .unwrap();

        let config = ConfigManagerImpl::new(RealmId::new())
            .create_config(&owner(&dir), "settings.toml")
            .unwrap();
        assert_eq!(config.get("greeting"), Some("hello"));
        assert_eq!(config.get("limits.max"), Some("5"));
        assert_eq!(config.get("limits.strict"), Some("true"));
        assert_eq!(config.path, Some(data_dir.join("settings.toml")));
    }

    #[test]
    fn test_rejects_bad_requests() {
        let dir = TempDir::new().unwrap();
        let manager = ConfigManagerImpl::new(RealmId::new());

        for name in ["", "../escape.toml", "nested/file.toml", ".."] {
            let err = manager.create_config(&owner(&dir), name).unwrap_err();
            assert!(matches!(err, BridgeError::Config(_)), "{name}: {err}");
        }

        let err = manager
            .create_config(&OwnerRef::named("NoDir"), "settings.toml")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration error: owner 'NoDir' has no data directory"
        );
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let data_dir = dir.path().join("PluginA");
        fs::create_dir_all(&data_dir).unwrap();
        fs::write(data_dir.join("broken.toml"), "key = ").unwrap();

        let err = ConfigManagerImpl::new(RealmId::new())
            .create_config(&owner(&dir), "broken.toml")
            .unwrap_err();
        assert_eq!(err.kind(), "Toml");
    }
}
