//! Persisted device state for the companion agent.
//!
//! A single flat JSON document in the data directory holding the persistence
//! UUID and, once obtained, the access token with its metadata. This module is
//! the only writer of that file. The document is excluded from host backups
//! since it carries a machine-specific identity and secret.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::api::types::TokenResponse;
use crate::error::CompanionError;

/// File name of the persisted document inside the data directory.
pub const BACKUP_EXCLUDED_FILE: &str = "backup_excluded_data.json";

/// The on-disk document.
///
/// Token fields are individually optional on disk; [`PersistedData::token`]
/// only yields a token when all five are present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistence_uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// A complete stored access token.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenState {
    pub access_token: String,
    pub token_type: String,
    pub scope: String,
    pub expires_in: i64,
    pub requested_at: i64,
}

impl TokenState {
    /// Expired when `now > requested_at + expires_in`.
    ///
    /// Local clock against the authorization server's validity window; skew
    /// between the two is not corrected for.
    pub fn is_expired_at(&self, now: i64) -> bool {
        now > self.requested_at.saturating_add(self.expires_in)
    }
}

impl PersistedData {
    pub fn token(&self) -> Option<TokenState> {
        Some(TokenState {
            access_token: self.access_token.clone()?,
            token_type: self.token_type.clone()?,
            scope: self.scope.clone()?,
            expires_in: self.expires_in?,
            requested_at: self.requested_at?,
        })
    }

    fn clear_token(&mut self) {
        self.access_token = None;
        self.expires_in = None;
        self.requested_at = None;
        self.token_type = None;
        self.scope = None;
    }
}

/// Owner of the persisted document and its in-memory copy.
pub struct PersistedDeviceState {
    path: PathBuf,
    data: PersistedData,
}

impl PersistedDeviceState {
    /// Create a handle for the document in `data_dir`. Nothing is read yet.
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(BACKUP_EXCLUDED_FILE),
            data: PersistedData::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn data(&self) -> &PersistedData {
        &self.data
    }

    /// Read the document from disk.
    ///
    /// A missing or malformed file (or one without a persistence UUID) is
    /// treated as a first run: a fresh persistence UUID is generated and the
    /// document rewritten. Other I/O errors propagate.
    pub fn load(&mut self) -> Result<&PersistedData, CompanionError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => match serde_json::from_str::<PersistedData>(&content) {
                Ok(data) if data.persistence_uuid.is_some() => {
                    self.data = data;
                    return Ok(&self.data);
                }
                Ok(_) => {
                    log::warn!("Persisted data file had no persistence UUID, regenerating");
                }
                Err(e) => {
                    log::warn!("Persisted data file was of invalid format: {}", e);
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        self.write_new_persistence_uuid()?;
        Ok(&self.data)
    }

    /// Replace the file with the in-memory document.
    pub fn save(&self) -> Result<(), CompanionError> {
        crate::fs::write_json(&self.path, &self.data)
    }

    /// Store a freshly granted token, stamped with the current time, and save.
    pub fn record_token(&mut self, response: &TokenResponse) -> Result<(), CompanionError> {
        self.record_token_at(response, now_secs())
    }

    pub(crate) fn record_token_at(
        &mut self,
        response: &TokenResponse,
        requested_at: i64,
    ) -> Result<(), CompanionError> {
        self.data.access_token = Some(response.access_token.clone());
        self.data.expires_in = Some(response.expires_in);
        self.data.requested_at = Some(requested_at);
        self.data.token_type = Some(response.token_type.clone());
        self.data.scope = Some(response.scope.clone());
        self.save()?;
        log::info!("Persisted data file was updated (access_token)");
        Ok(())
    }

    /// Drop the stored token so the next tick requests a new one.
    pub fn forget_token(&mut self) -> Result<(), CompanionError> {
        self.data.clear_token();
        self.save()
    }

    fn write_new_persistence_uuid(&mut self) -> Result<(), CompanionError> {
        self.data = PersistedData {
            persistence_uuid: Some(uuid::Uuid::new_v4().to_string()),
            ..PersistedData::default()
        };
        self.save()?;
        log::info!("Persisted data file was updated (persistence_uuid)");
        Ok(())
    }
}

/// Current Unix time in seconds.
pub fn now_secs() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
