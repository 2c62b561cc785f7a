//! OAuth2 client-credentials grant against the farm controller.

use super::client::ApiClient;
use super::types::{RawTokenResponse, TokenResponse};
use super::{ACCESS_TOKEN_ROUTE, REQUESTED_SCOPE};
use crate::config::Credentials;
use crate::error::CompanionError;

/// Request an access token.
///
/// POST {base_url}/oidc/token with `grant_type=client_credentials` and the
/// fixed scope, authenticated with HTTP basic credentials. Missing credentials
/// are rejected before any request is sent. A parsed body must carry both
/// `access_token` and `expires_in`.
pub async fn fetch_access_token(
    client: &ApiClient,
    base_url: &str,
    client_id: Option<&str>,
    client_secret: Option<&str>,
) -> Result<TokenResponse, CompanionError> {
    let credentials = Credentials::new(client_id, client_secret)?;
    if base_url.trim().is_empty() {
        return Err(CompanionError::Validation(
            "The 'base_url' was not provided. Preventing access_token query to OctoFarm".to_string(),
        ));
    }

    log::info!("Requesting access_token from OctoFarm at {}", base_url);
    let form = [
        ("grant_type", "client_credentials"),
        ("scope", REQUESTED_SCOPE),
    ];
    let resp = client
        .post_form_basic(base_url, ACCESS_TOKEN_ROUTE, &form, &credentials)
        .await?;

    let status = resp.status();
    let body = resp.text().await?;
    log::debug!("access_token response ({}): {} bytes", status, body.len());

    if !status.is_success() {
        return Err(CompanionError::Response(format!(
            "access_token request failed ({}): {}",
            status, body
        )));
    }

    let raw: RawTokenResponse = serde_json::from_str(&body).map_err(|e| {
        CompanionError::Response(format!("Failed to parse access_token response: {}", e))
    })?;
    TokenResponse::try_from(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use std::time::Duration;

    fn client() -> ApiClient {
        ApiClient::new(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_fetch_access_token_success() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/oidc/token")
            // "id:secret" base64-encoded
            .match_header("authorization", "Basic aWQ6c2VjcmV0")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "client_credentials".into()),
                Matcher::UrlEncoded("scope".into(), "openid".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"access_token": "tok", "expires_in": 3600, "token_type": "Bearer", "scope": "openid"}"#,
            )
            .create_async()
            .await;

        let token = fetch_access_token(&client(), &server.url(), Some("id"), Some("secret"))
            .await
            .unwrap();
        assert_eq!(token.access_token, "tok");
        assert_eq!(token.expires_in, 3600);

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_access_token_missing_credentials_sends_nothing() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/oidc/token")
            .expect(0)
            .create_async()
            .await;

        for (id, secret) in [(None, Some("secret")), (Some("id"), None), (Some(""), Some("secret"))] {
            let result = fetch_access_token(&client(), &server.url(), id, secret).await;
            assert!(matches!(result, Err(CompanionError::Configuration(_))));
        }

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_access_token_missing_expiry_is_response_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/oidc/token")
            .with_status(200)
            .with_body(r#"{"access_token": "tok"}"#)
            .create_async()
            .await;

        let result = fetch_access_token(&client(), &server.url(), Some("id"), Some("secret")).await;
        assert!(matches!(result, Err(CompanionError::Response(_))));
    }

    #[tokio::test]
    async fn test_fetch_access_token_error_status() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/oidc/token")
            .with_status(401)
            .with_body(r#"{"error": "invalid_client"}"#)
            .create_async()
            .await;

        let err = fetch_access_token(&client(), &server.url(), Some("id"), Some("bad"))
            .await
            .unwrap_err();
        assert!(matches!(err, CompanionError::Response(ref m) if m.contains("401")));
    }

    #[tokio::test]
    async fn test_fetch_access_token_connection_refused_is_transport() {
        let url = crate::test_util::closed_port_url();
        let err = fetch_access_token(&client(), &url, Some("id"), Some("secret"))
            .await
            .unwrap_err();
        assert!(err.is_transport());
    }
}
