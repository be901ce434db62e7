//! Configuration for the session layer.
//!
//! Values come from a JSON document or from the environment (a `.env` file is
//! honored when present). Only the backend's `api_key` and `project_id` are
//! checked, and only for being non-empty.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{SessionError, SessionResult};

pub const DEFAULT_LOGIN_VIEW: &str = "index.html";
pub const DEFAULT_SENTINEL_DOCUMENT: &str = "system/test";
pub const DEFAULT_READY_TIMEOUT_MS: u64 = 10_000;

/// Connection settings for the managed backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendConfig {
    pub api_key: String,
    #[serde(default)]
    pub auth_domain: String,
    pub project_id: String,
    #[serde(default)]
    pub storage_bucket: String,
    #[serde(default)]
    pub messaging_sender_id: String,
    #[serde(default)]
    pub app_id: String,
}

impl BackendConfig {
    /// Reject empty identifiers; everything else is passed through opaquely
    pub fn validate(&self) -> SessionResult<()> {
        if self.api_key.trim().is_empty() {
            return Err(SessionError::ConfigMissing {
                key: "api_key".to_string(),
            });
        }
        if self.project_id.trim().is_empty() {
            return Err(SessionError::ConfigMissing {
                key: "project_id".to_string(),
            });
        }
        Ok(())
    }
}

/// Local cache size for the document store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheSize {
    Unlimited,
    Bytes(u64),
}

/// Settings applied to the document store right after initialization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSettings {
    pub cache_size: CacheSize,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            cache_size: CacheSize::Unlimited,
        }
    }
}

/// Options for the offline persistence request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistenceOptions {
    /// Share the persisted cache between tabs
    pub synchronize_tabs: bool,
}

impl Default for PersistenceOptions {
    fn default() -> Self {
        Self {
            synchronize_tabs: true,
        }
    }
}

/// Full configuration of a session context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub backend: BackendConfig,
    /// View the user is sent to on sign-out or when unauthenticated
    #[serde(default = "default_login_view")]
    pub login_view: String,
    /// Document read by the connection probe
    #[serde(default = "default_sentinel_document")]
    pub sentinel_document: String,
    /// Upper bound for waiting on the first auth state
    #[serde(default = "default_ready_timeout", with = "duration_millis")]
    pub ready_timeout: Duration,
    #[serde(default)]
    pub settings: StoreSettings,
    #[serde(default)]
    pub persistence: PersistenceOptions,
}

fn default_login_view() -> String {
    DEFAULT_LOGIN_VIEW.to_string()
}

fn default_sentinel_document() -> String {
    DEFAULT_SENTINEL_DOCUMENT.to_string()
}

fn default_ready_timeout() -> Duration {
    Duration::from_millis(DEFAULT_READY_TIMEOUT_MS)
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

impl SessionConfig {
    pub fn new(backend: BackendConfig) -> Self {
        Self {
            backend,
            login_view: default_login_view(),
            sentinel_document: default_sentinel_document(),
            ready_timeout: default_ready_timeout(),
            settings: StoreSettings::default(),
            persistence: PersistenceOptions::default(),
        }
    }

    /// Parse a JSON configuration document
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse session configuration")
    }

    /// Load from the environment, reading a `.env` file first if one exists
    pub fn load() -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => info!("Loaded environment variables from {}", path.display()),
            Err(_) => debug!("No .env file found. Using existing environment variables."),
        }

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from any key lookup (the environment in production)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).unwrap_or_default();

        let backend = BackendConfig {
            api_key: get("BACKEND_API_KEY"),
            auth_domain: get("BACKEND_AUTH_DOMAIN"),
            project_id: get("BACKEND_PROJECT_ID"),
            storage_bucket: get("BACKEND_STORAGE_BUCKET"),
            messaging_sender_id: get("BACKEND_MESSAGING_SENDER_ID"),
            app_id: get("BACKEND_APP_ID"),
        };

        let mut config = SessionConfig::new(backend);

        if let Some(view) = lookup("SESSION_LOGIN_VIEW").filter(|v| !v.is_empty()) {
            config.login_view = view;
        }
        if let Some(path) = lookup("SESSION_SENTINEL_DOCUMENT").filter(|v| !v.is_empty()) {
            config.sentinel_document = path;
        }
        if let Some(raw) = lookup("SESSION_READY_TIMEOUT_MS") {
            let millis: u64 = raw.trim().parse().map_err(|e: std::num::ParseIntError| {
                SessionError::ConfigInvalid {
                    key: "SESSION_READY_TIMEOUT_MS".to_string(),
                    reason: format!("'{}' is not a number of milliseconds: {}", raw, e),
                }
            })?;
            config.ready_timeout = Duration::from_millis(millis);
        }

        debug!(
            project_id = %config.backend.project_id,
            login_view = %config.login_view,
            "Session configuration loaded"
        );
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn backend() -> BackendConfig {
        BackendConfig {
            api_key: "key".into(),
            project_id: "attendance".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_requires_key_and_project() {
        assert!(backend().validate().is_ok());

        let missing_key = BackendConfig {
            api_key: "  ".into(),
            ..backend()
        };
        assert_eq!(
            missing_key.validate(),
            Err(SessionError::ConfigMissing {
                key: "api_key".into()
            })
        );

        let missing_project = BackendConfig {
            project_id: String::new(),
            ..backend()
        };
        assert!(matches!(
            missing_project.validate(),
            Err(SessionError::ConfigMissing { key }) if key == "project_id"
        ));
    }

    #[test]
    fn test_defaults() {
        let config = SessionConfig::new(backend());
        assert_eq!(config.login_view, "index.html");
        assert_eq!(config.sentinel_document, "system/test");
        assert_eq!(config.ready_timeout, Duration::from_secs(10));
        assert_eq!(config.settings.cache_size, CacheSize::Unlimited);
        assert!(config.persistence.synchronize_tabs);
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config = SessionConfig::from_json(
            r#"{"backend": {"apiKey": "k", "projectId": "p", "appId": "1:web"}, "ready_timeout": 250}"#,
        )
        .unwrap();

        assert_eq!(config.backend.app_id, "1:web");
        assert_eq!(config.ready_timeout, Duration::from_millis(250));
        assert_eq!(config.login_view, DEFAULT_LOGIN_VIEW);
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("BACKEND_API_KEY", "abc"),
            ("BACKEND_PROJECT_ID", "proj"),
            ("SESSION_LOGIN_VIEW", "login.html"),
            ("SESSION_READY_TIMEOUT_MS", "1500"),
        ]
        .into_iter()
        .collect();

        let config = SessionConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.backend.api_key, "abc");
        assert_eq!(config.backend.project_id, "proj");
        assert_eq!(config.login_view, "login.html");
        assert_eq!(config.sentinel_document, DEFAULT_SENTINEL_DOCUMENT);
        assert_eq!(config.ready_timeout, Duration::from_millis(1500));
    }

    #[test]
    fn test_from_lookup_rejects_bad_timeout() {
        let result = SessionConfig::from_lookup(|k| {
            (k == "SESSION_READY_TIMEOUT_MS").then(|| "soon".to_string())
        });

        let err = result.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SessionError>(),
            Some(SessionError::ConfigInvalid { key, .. }) if key == "SESSION_READY_TIMEOUT_MS"
        ));
    }
}
