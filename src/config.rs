//! Host configuration for the companion agent.
//!
//! Settings live in a single JSON document owned by the host. The cycle reads
//! them once per tick through [`SettingsStore::reload`] and turns them into a
//! [`CycleConfig`] snapshot; the only writes are startup defaults and the
//! generated device UUID.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CompanionError;

/// Farm controller host applied on first start when none is configured.
pub const DEFAULT_OCTOFARM_HOST: &str = "http://127.0.0.1";

/// Farm controller port applied on first start when none is configured.
pub const DEFAULT_OCTOFARM_PORT: u16 = 4000;

/// Default announcement interval in seconds.
pub const DEFAULT_PING_SECS: u64 = 120;

/// Default port the printer host listens on.
pub const DEFAULT_SERVER_PORT: u16 = 5000;

/// Default HTTP request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// The host configuration document.
///
/// Keys this agent does not know are carried in `extra` and written back
/// untouched, so the file can be shared with other host settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub octofarm_host: Option<String>,
    #[serde(default)]
    pub octofarm_port: Option<u16>,
    /// Advertised port, overriding `server_port` when the host sits behind a proxy.
    #[serde(default)]
    pub port_override: Option<u16>,
    #[serde(default)]
    pub device_uuid: Option<String>,
    #[serde(default)]
    pub oidc_client_id: Option<String>,
    #[serde(default)]
    pub oidc_client_secret: Option<String>,
    /// Announcement interval in seconds. `None` or `0` disables the timer.
    #[serde(default = "default_ping")]
    pub ping: Option<u64>,
    /// Host the printer server listens on. Falls back to the machine hostname.
    #[serde(default)]
    pub server_host: Option<String>,
    #[serde(default = "default_server_port")]
    pub server_port: u16,
    #[serde(default)]
    pub allow_cross_origin: bool,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_ping() -> Option<u64> {
    Some(DEFAULT_PING_SECS)
}

fn default_server_port() -> u16 {
    DEFAULT_SERVER_PORT
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            octofarm_host: None,
            octofarm_port: None,
            port_override: None,
            device_uuid: None,
            oidc_client_id: None,
            oidc_client_secret: None,
            ping: default_ping(),
            server_host: None,
            server_port: DEFAULT_SERVER_PORT,
            allow_cross_origin: false,
            request_timeout: DEFAULT_REQUEST_TIMEOUT_SECS,
            extra: serde_json::Map::new(),
        }
    }
}

impl Settings {
    /// Timer period, or `None` when periodic announcements are disabled.
    pub fn ping_interval(&self) -> Option<Duration> {
        match self.ping {
            Some(secs) if secs > 0 => Some(Duration::from_secs(secs)),
            _ => None,
        }
    }

    /// `{octofarm_host}:{octofarm_port}`, or `None` if either is missing.
    pub fn base_url(&self) -> Option<String> {
        let host = self.octofarm_host.as_deref().filter(|h| !h.trim().is_empty())?;
        let port = self.octofarm_port?;
        Some(format!("{}:{}", host.trim_end_matches('/'), port))
    }

    /// Port announced to the farm controller.
    pub fn advertised_port(&self) -> u16 {
        self.port_override.unwrap_or(self.server_port)
    }

    /// Host announced to the farm controller.
    pub fn advertised_host(&self) -> String {
        match self.server_host.as_deref() {
            Some(h) if !h.is_empty() => h.to_string(),
            _ => hostname::get()
                .map(|h| h.to_string_lossy().into_owned())
                .unwrap_or_else(|_| "localhost".to_string()),
        }
    }
}

/// Client id/secret pair for the client-credentials grant.
#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Build credentials, rejecting empty or absent values.
    pub fn new(client_id: Option<&str>, client_secret: Option<&str>) -> Result<Self, CompanionError> {
        match (non_empty(client_id), non_empty(client_secret)) {
            (Some(id), Some(secret)) => Ok(Self {
                client_id: id.to_string(),
                client_secret: secret.to_string(),
            }),
            _ => Err(CompanionError::Configuration(
                "'oidc_client_id' or 'oidc_client_secret' not set".to_string(),
            )),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Per-tick snapshot of everything the announcement cycle needs from settings.
#[derive(Debug, Clone)]
pub struct CycleConfig {
    pub base_url: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub device_uuid: String,
    pub advertised_host: String,
    pub advertised_port: u16,
    pub allow_cross_origin: bool,
}

impl CycleConfig {
    pub fn from_settings(settings: &Settings, device_uuid: String) -> Self {
        Self {
            base_url: settings.base_url(),
            client_id: settings.oidc_client_id.clone(),
            client_secret: settings.oidc_client_secret.clone(),
            device_uuid,
            advertised_host: settings.advertised_host(),
            advertised_port: settings.advertised_port(),
            allow_cross_origin: settings.allow_cross_origin,
        }
    }
}

/// File-backed settings owned by the host.
pub struct SettingsStore {
    path: PathBuf,
    settings: Settings,
}

impl SettingsStore {
    /// Open the settings file. A missing file yields default settings.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CompanionError> {
        let path = path.into();
        let settings = read_settings(&path)?;
        Ok(Self { path, settings })
    }

    /// Re-read the settings file from disk.
    pub fn reload(&mut self) -> Result<&Settings, CompanionError> {
        self.settings = read_settings(&self.path)?;
        Ok(&self.settings)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn save(&self) -> Result<(), CompanionError> {
        crate::fs::write_json(&self.path, &self.settings)
    }

    /// Fill in the farm controller host and port if they were never set.
    pub fn apply_startup_defaults(&mut self) -> Result<(), CompanionError> {
        let mut changed = false;
        if self.settings.octofarm_host.is_none() {
            self.settings.octofarm_host = Some(DEFAULT_OCTOFARM_HOST.to_string());
            changed = true;
        }
        if self.settings.octofarm_port.is_none() {
            self.settings.octofarm_port = Some(DEFAULT_OCTOFARM_PORT);
            changed = true;
        }
        if changed {
            log::info!("Applied default farm controller address to settings");
            self.save()?;
        }
        Ok(())
    }

    /// Return the configured device UUID, generating and saving one if unset.
    ///
    /// This identifier survives data directory resets; the persistence UUID in
    /// the data file does not.
    pub fn ensure_device_uuid(&mut self) -> Result<String, CompanionError> {
        if let Some(uuid) = self.settings.device_uuid.as_deref().filter(|u| !u.is_empty()) {
            return Ok(uuid.to_string());
        }
        let uuid = uuid::Uuid::new_v4().to_string();
        self.settings.device_uuid = Some(uuid.clone());
        self.save()?;
        log::info!("Generated new device UUID {}", uuid);
        Ok(uuid)
    }
}

fn read_settings(path: &Path) -> Result<Settings, CompanionError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(serde_json::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Settings::default()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_document() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.ping_interval(), Some(Duration::from_secs(120)));
        assert_eq!(settings.base_url(), None);
        assert_eq!(settings.advertised_port(), DEFAULT_SERVER_PORT);
    }

    #[test]
    fn test_ping_zero_or_null_disables_timer() {
        let zero: Settings = serde_json::from_str(r#"{"ping": 0}"#).unwrap();
        assert_eq!(zero.ping_interval(), None);

        let null: Settings = serde_json::from_str(r#"{"ping": null}"#).unwrap();
        assert_eq!(null.ping_interval(), None);

        let one: Settings = serde_json::from_str(r#"{"ping": 1}"#).unwrap();
        assert_eq!(one.ping_interval(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_base_url_and_port_override() {
        let settings: Settings = serde_json::from_str(
            r#"{"octofarm_host": "http://farm.local/", "octofarm_port": 4000,
                "port_override": 80, "server_port": 5000, "some_other_key": true}"#,
        )
        .unwrap();
        assert_eq!(settings.base_url().as_deref(), Some("http://farm.local:4000"));
        assert_eq!(settings.advertised_port(), 80);
    }

    #[test]
    fn test_credentials_reject_missing_or_empty() {
        assert!(matches!(
            Credentials::new(None, Some("secret")),
            Err(CompanionError::Configuration(_))
        ));
        assert!(matches!(
            Credentials::new(Some("id"), Some("")),
            Err(CompanionError::Configuration(_))
        ));
        let creds = Credentials::new(Some("id"), Some("secret")).unwrap();
        assert_eq!(creds.client_id, "id");
        let debug = format!("{:?}", creds);
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("\"secret\""));
    }

    #[test]
    fn test_ensure_device_uuid_generates_once_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let mut store = SettingsStore::open(&path).unwrap();
        let first = store.ensure_device_uuid().unwrap();
        assert_eq!(first.len(), 36);

        let mut reopened = SettingsStore::open(&path).unwrap();
        assert_eq!(reopened.ensure_device_uuid().unwrap(), first);
    }

    #[test]
    fn test_save_keeps_foreign_host_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"octofarm_host": "http://farm", "octofarm_port": 4000,
                "some_other_key": 42, "api": {"allowCrossOrigin": true}}"#,
        )
        .unwrap();

        let mut store = SettingsStore::open(&path).unwrap();
        let uuid = store.ensure_device_uuid().unwrap();

        let after: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(after["some_other_key"], serde_json::json!(42));
        assert_eq!(after["api"]["allowCrossOrigin"], serde_json::json!(true));
        assert_eq!(after["device_uuid"], serde_json::json!(uuid));
        assert_eq!(after["octofarm_port"], serde_json::json!(4000));

        // Known keys are not duplicated into the pass-through map
        let reopened = SettingsStore::open(&path).unwrap();
        assert!(!reopened.settings().extra.contains_key("device_uuid"));
        assert_eq!(reopened.settings().extra.len(), 2);
    }

    #[test]
    fn test_startup_defaults_keep_existing_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"octofarm_host": "http://farm"}"#).unwrap();

        let mut store = SettingsStore::open(&path).unwrap();
        store.apply_startup_defaults().unwrap();
        assert_eq!(store.settings().octofarm_host.as_deref(), Some("http://farm"));
        assert_eq!(store.settings().octofarm_port, Some(DEFAULT_OCTOFARM_PORT));

        let reloaded = SettingsStore::open(&path).unwrap();
        assert_eq!(reloaded.settings().base_url().as_deref(), Some("http://farm:4000"));
    }
}
