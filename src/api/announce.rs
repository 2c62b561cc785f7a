//! Announcement of this printer host to the farm controller.

use std::path::Path;

use reqwest::StatusCode;

use super::client::ApiClient;
use super::types::AnnounceRequest;
use super::ANNOUNCE_ROUTE;
use crate::error::CompanionError;

/// Shortest access token accepted for use. Structural check only.
pub const MIN_ACCESS_TOKEN_LEN: usize = 43;

/// What the farm controller answered.
#[derive(Debug, Clone)]
pub struct AnnounceResponse {
    pub status: StatusCode,
    pub body: String,
}

/// Reject announcements that cannot succeed before touching the network.
pub fn validate(base_url: Option<&str>, access_token: &str) -> Result<String, CompanionError> {
    let base_url = match base_url {
        Some(url) if !url.trim().is_empty() => url.to_string(),
        _ => {
            return Err(CompanionError::Validation(
                "The 'base_url' was not provided. Preventing announcement query to OctoFarm"
                    .to_string(),
            ))
        }
    };
    if access_token.chars().count() < MIN_ACCESS_TOKEN_LEN {
        return Err(CompanionError::Validation(format!(
            "The 'access_token' did not meet the expected length of {} characters. \
             Preventing announcement query to OctoFarm",
            MIN_ACCESS_TOKEN_LEN
        )));
    }
    Ok(base_url)
}

/// POST {base_url}/octoprint/announce with a bearer token.
///
/// Any received response is returned; the caller decides what a non-2xx
/// status means.
pub async fn announce(
    client: &ApiClient,
    base_url: Option<&str>,
    access_token: &str,
    request: &AnnounceRequest,
) -> Result<AnnounceResponse, CompanionError> {
    let base_url = validate(base_url, access_token)?;

    let resp = client
        .authenticated_post(&base_url, ANNOUNCE_ROUTE, access_token, request)
        .await?;
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    Ok(AnnounceResponse { status, body })
}

/// Whether this process runs inside a Docker container.
pub fn is_docker() -> bool {
    if Path::new("/.dockerenv").exists() {
        return true;
    }
    std::fs::read_to_string("/proc/self/cgroup")
        .map(|cgroup| cgroup.lines().any(|line| line.contains("docker")))
        .unwrap_or(false)
}
