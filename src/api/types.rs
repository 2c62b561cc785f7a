//! Request and response types for the farm controller API.

use serde::{Deserialize, Serialize};

use crate::error::CompanionError;

/// Raw body of a POST /oidc/token response. Every field may be missing.
#[derive(Debug, Deserialize)]
pub struct RawTokenResponse {
    pub access_token: Option<String>,
    pub expires_in: Option<i64>,
    pub token_type: Option<String>,
    pub scope: Option<String>,
}

/// Validated token grant.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: i64,
    pub token_type: String,
    pub scope: String,
}

impl TryFrom<RawTokenResponse> for TokenResponse {
    type Error = CompanionError;

    fn try_from(raw: RawTokenResponse) -> Result<Self, Self::Error> {
        let access_token = raw.access_token.ok_or_else(|| {
            CompanionError::Response(
                "'access_token' not received. Check your OctoFarm server logs".to_string(),
            )
        })?;
        let expires_in = raw.expires_in.ok_or_else(|| {
            CompanionError::Response(
                "'expires_in' not received. Check your OctoFarm server logs".to_string(),
            )
        })?;
        Ok(Self {
            access_token,
            expires_in,
            token_type: raw.token_type.unwrap_or_else(|| "Bearer".to_string()),
            scope: raw.scope.unwrap_or_else(|| super::REQUESTED_SCOPE.to_string()),
        })
    }
}

/// Body of POST /octoprint/announce.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnounceRequest {
    pub device_uuid: String,
    pub persistence_uuid: String,
    pub host: String,
    pub port: u16,
    pub docker: bool,
    pub allow_cross_origin: bool,
}

/// Response from GET /serverChecks/version.
///
/// Only `version` is required; anything else the server sends is passed
/// through untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionResponse {
    pub version: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}
