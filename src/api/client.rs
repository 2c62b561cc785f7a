//! HTTP client for farm controller communication.
//!
//! Wraps a single `reqwest::Client` with request and connect timeouts so a
//! hung farm controller cannot stall a tick indefinitely. The base URL is
//! passed per call since it is re-read from settings on every tick.

use std::time::Duration;

use reqwest::{Client, Response};
use serde::Serialize;

use crate::config::Credentials;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct ApiClient {
    client: Client,
}

impl ApiClient {
    /// Create a new API client with the given per-request timeout.
    pub fn new(request_timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client }
    }

    /// POST a form body authenticated with HTTP basic credentials.
    pub async fn post_form_basic<T: Serialize + ?Sized>(
        &self,
        base_url: &str,
        route: &str,
        form: &T,
        credentials: &Credentials,
    ) -> Result<Response, reqwest::Error> {
        self.client
            .post(endpoint(base_url, route))
            .basic_auth(&credentials.client_id, Some(&credentials.client_secret))
            .form(form)
            .send()
            .await
    }

    /// POST a JSON body with a bearer token.
    pub async fn authenticated_post<T: Serialize>(
        &self,
        base_url: &str,
        route: &str,
        access_token: &str,
        body: &T,
    ) -> Result<Response, reqwest::Error> {
        self.client
            .post(endpoint(base_url, route))
            .bearer_auth(access_token)
            .json(body)
            .send()
            .await
    }

    /// Unauthenticated GET.
    pub async fn get(&self, base_url: &str, route: &str) -> Result<Response, reqwest::Error> {
        self.client.get(endpoint(base_url, route)).send().await
    }
}

/// Join a base URL and a relative route with exactly one slash between them.
pub fn endpoint(base_url: &str, route: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        route.trim_start_matches('/')
    )
}
