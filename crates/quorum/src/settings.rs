//! Packaged settings.
//!
//! Each copy of the library compiles in its own `quorum.toml` and reads it
//! once per realm. The protocol version in this file is the only
//! compatibility signal exchanged between copies; everything else configures
//! the leader's shared runtime.

use crate::error::BridgeResult;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// The settings file shipped with this copy of the library.
pub const PACKAGED_SETTINGS: &str = include_str!("../quorum.toml");

/// Protocol version used when the packaged file is missing or unreadable.
pub const DEFAULT_PROTOCOL_VERSION: u32 = 1;

/// Runtime settings of one realm.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Bridge protocol version; copies only bridge on exact equality.
    pub protocol_version: u32,
    /// Leader worker pool size. `None` uses tokio's default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_threads: Option<usize>,
    /// Profile cache lifetime in seconds.
    pub cache_ttl_secs: u64,
    /// Outbound HTTP settings.
    pub http: HttpSettings,
    /// Profile lookup endpoints.
    pub profiles: ProfileEndpoints,
}

/// Outbound HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpSettings {
    /// Default: 10
    pub connect_timeout_secs: u64,
    /// Default: 15
    pub request_timeout_secs: u64,
    pub user_agent: String,
}

/// Base URLs of the profile lookup service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProfileEndpoints {
    /// Id -> profile (name, textures). The id is appended without dashes.
    pub session_url: String,
    /// Name -> id. The name is appended as one escaped path segment.
    pub profile_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            protocol_version: DEFAULT_PROTOCOL_VERSION,
            worker_threads: None,
            cache_ttl_secs: 600,
            http: HttpSettings::default(),
            profiles: ProfileEndpoints::default(),
        }
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            request_timeout_secs: 15,
            user_agent: concat!("quorum/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Default for ProfileEndpoints {
    fn default() -> Self {
        Self {
            session_url: "https://sessionserver.mojang.com/session/minecraft/profile/".to_string(),
            profile_url: "https://api.mojang.com/users/profiles/minecraft/".to_string(),
        }
    }
}

impl Settings {
    /// Settings from the packaged `quorum.toml`, or defaults if it does not
    /// parse.
    pub fn packaged() -> Self {
        match Self::parse(PACKAGED_SETTINGS) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("Packaged settings unreadable, using defaults: {}", e);
                Self::default()
            }
        }
    }

    /// Parse settings from TOML text.
    pub fn parse(content: &str) -> BridgeResult<Self> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a file.
    pub fn load(path: impl AsRef<Path>) -> BridgeResult<Self> {
        Self::parse(&fs::read_to_string(path)?)
    }

    /// Same settings with another protocol version.
    pub fn with_protocol_version(mut self, protocol_version: u32) -> Self {
        self.protocol_version = protocol_version;
        self
    }

    /// Ensures values are usable.
    pub fn validate(&self) -> BridgeResult<()> {
        use crate::error::BridgeError;

        if self.worker_threads == Some(0) {
            return Err(BridgeError::Config(
                "worker_threads must be greater than 0".to_string(),
            ));
        }
        if self.http.connect_timeout_secs == 0 || self.http.request_timeout_secs == 0 {
            return Err(BridgeError::Config(
                "http timeouts must be greater than 0".to_string(),
            ));
        }
        for (name, url) in [
            ("session_url", &self.profiles.session_url),
            ("profile_url", &self.profiles.profile_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(BridgeError::Config(format!(
                    "profiles.{name} must be an http(s) URL: {url}"
                )));
            }
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.http.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.http.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_packaged_settings_parse() {
        let settings = Settings::parse(PACKAGED_SETTINGS).unwrap();
        assert_eq!(settings.protocol_version, 1);
        assert_eq!(settings.http.connect_timeout_secs, 10);
        assert_eq!(settings, Settings::packaged());
    }

    #[test]
    fn test_missing_protocol_version_defaults_to_one() {
        let settings = Settings::parse("cache_ttl_secs = 5").unwrap();
        assert_eq!(settings.protocol_version, DEFAULT_PROTOCOL_VERSION);
        assert_eq!(settings.cache_ttl(), Duration::from_secs(5));
    }

    #[test]
    fn test_unparseable_protocol_version_is_an_error() {
        assert!(Settings::parse("protocol_version = \"two\"").is_err());
    }

    #[test]
    fn test_validate_zero_workers() {
        let mut settings = Settings::default();
        settings.worker_threads = Some(0);
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_bad_endpoint() {
        let mut settings = Settings::default();
        settings.profiles.profile_url = "ftp://example.com/".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
protocol_version = 3
worker_threads = 2

[http]
request_timeout_secs = 30
"#
        )
        .unwrap();

        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.protocol_version, 3);
        assert_eq!(settings.worker_threads, Some(2));
        assert_eq!(settings.request_timeout(), Duration::from_secs(30));
        assert_eq!(settings.connect_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_with_protocol_version() {
        let settings = Settings::default().with_protocol_version(7);
        assert_eq!(settings.protocol_version, 7);
    }
}
