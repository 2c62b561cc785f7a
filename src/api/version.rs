//! Connectivity probe for a candidate farm controller URL.

use super::client::ApiClient;
use super::types::VersionResponse;
use super::VERSION_ROUTE;
use crate::error::CompanionError;

/// GET {url}/serverChecks/version and return the parsed version document.
pub async fn fetch_version(client: &ApiClient, url: &str) -> Result<VersionResponse, CompanionError> {
    if url.trim().is_empty() {
        return Err(CompanionError::Validation("Expected 'url' parameter".to_string()));
    }
    log::info!("Testing OctoFarm URL {}", url);

    let resp = client.get(url, VERSION_ROUTE).await?;
    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(CompanionError::Response(format!(
            "version check failed ({}): {}",
            status, body
        )));
    }

    let body = resp.text().await?;
    let version: VersionResponse = serde_json::from_str(&body)
        .map_err(|e| CompanionError::Response(format!("Failed to parse version response: {}", e)))?;

    log::info!("Version response from OctoFarm {}", version.version);
    Ok(version)
}
