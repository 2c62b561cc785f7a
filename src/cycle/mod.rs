//! Announcement cycle for the companion agent.
//!
//! Each tick makes sure a usable access token exists (requesting a new one
//! when it is missing or expired) and then announces this host to the farm
//! controller. Ticks are driven by [`AnnouncementCycle::run`] at the
//! configured ping interval; a failed tick is logged and the schedule goes on.
//! There is no in-process backoff: `Retry` means "try again next tick".

pub mod status;

pub use status::{CycleEvent, CycleState};

use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;

use crate::api::announce::{self, is_docker};
use crate::api::client::ApiClient;
use crate::api::token::fetch_access_token;
use crate::api::types::{AnnounceRequest, TokenResponse};
use crate::config::{CycleConfig, SettingsStore};
use crate::error::CompanionError;
use crate::state::{now_secs, PersistedDeviceState};

pub struct AnnouncementCycle {
    api: ApiClient,
    settings: SettingsStore,
    persisted: PersistedDeviceState,
    state: CycleState,
}

impl AnnouncementCycle {
    pub fn new(api: ApiClient, settings: SettingsStore, persisted: PersistedDeviceState) -> Self {
        Self {
            api,
            settings,
            persisted,
            state: CycleState::Boot,
        }
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    #[cfg(test)]
    pub fn persisted(&self) -> &PersistedDeviceState {
        &self.persisted
    }

    /// Tick at `interval` until `shutdown` resolves. The first tick runs immediately.
    pub async fn run<F: Future>(&mut self, interval: Duration, shutdown: F) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        log::info!("Announcement cycle started (interval: {}s)", interval.as_secs());

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.tick().await {
                        log::warn!("Announcement cycle failed ({}): {}", self.state, e);
                    }
                }
                _ = &mut shutdown => {
                    log::info!("Announcement cycle stopped");
                    break;
                }
            }
        }
    }

    /// Run one full cycle: token check, token fetch if needed, announce.
    pub async fn tick(&mut self) -> Result<(), CompanionError> {
        self.settings.reload()?;
        self.persisted.load()?;
        let config = self.snapshot()?;

        let base_url = match config.base_url.clone() {
            Some(url) => url,
            None => {
                let err = CompanionError::Configuration(
                    "'octofarm_host' or 'octofarm_port' not set".to_string(),
                );
                log::error!("{}", err);
                self.state = CycleState::Crashed;
                return Err(err);
            }
        };

        let access_token = match self.persisted.data().token() {
            Some(token) if !token.is_expired_at(now_secs()) => {
                log::debug!("Using stored {} token (scope '{}')", token.token_type, token.scope);
                self.apply(&CycleEvent::TokenValid);
                token.access_token
            }
            _ => self.refresh_token(&config, &base_url).await?.access_token,
        };

        self.announce(Some(&base_url), &access_token).await
    }

    fn snapshot(&mut self) -> Result<CycleConfig, CompanionError> {
        let device_uuid = self.settings.ensure_device_uuid()?;
        Ok(CycleConfig::from_settings(self.settings.settings(), device_uuid))
    }

    fn apply(&mut self, event: &CycleEvent<'_>) {
        self.state = self.state.next(event);
    }

    async fn refresh_token(
        &mut self,
        config: &CycleConfig,
        base_url: &str,
    ) -> Result<TokenResponse, CompanionError> {
        let result = fetch_access_token(
            &self.api,
            base_url,
            config.client_id.as_deref(),
            config.client_secret.as_deref(),
        )
        .await;

        match result {
            Ok(token) => {
                self.persisted.record_token(&token)?;
                self.apply(&CycleEvent::TokenGranted);
                Ok(token)
            }
            Err(e) => {
                self.apply(&CycleEvent::TokenFailed(&e));
                log::error!("Error requesting access_token from OctoFarm: {}", e);
                Err(e)
            }
        }
    }

    /// Announce this host with the given base URL and token.
    ///
    /// A missing URL or a structurally invalid token crashes the cycle
    /// without sending anything.
    pub async fn announce(
        &mut self,
        base_url: Option<&str>,
        access_token: &str,
    ) -> Result<(), CompanionError> {
        if self.persisted.data().persistence_uuid.is_none() {
            self.persisted.load()?;
        }
        let config = self.snapshot()?;

        if self.state != CycleState::Success {
            log::warn!(
                "State error: tried to announce when state was '{}' instead of 'success'",
                self.state
            );
        }

        let request = AnnounceRequest {
            device_uuid: config.device_uuid.clone(),
            persistence_uuid: self.persisted.data().persistence_uuid.clone().unwrap_or_default(),
            host: config.advertised_host.clone(),
            port: config.advertised_port,
            docker: is_docker(),
            allow_cross_origin: config.allow_cross_origin,
        };

        let resp = match announce::announce(&self.api, base_url, access_token, &request).await {
            Ok(resp) => resp,
            Err(e) => {
                self.apply(&CycleEvent::AnnounceFailed);
                log::error!("Error sending announcement to OctoFarm: {}", e);
                return Err(e);
            }
        };

        self.apply(&CycleEvent::Announced(resp.status));
        log::info!("Done announcing to OctoFarm server ({})", resp.status);
        log::debug!("Announcement response: {}", resp.body);

        if resp.status.is_success() {
            return Ok(());
        }
        if resp.status == StatusCode::UNAUTHORIZED {
            log::warn!("OctoFarm rejected the access_token, a new one is requested next tick");
            self.persisted.forget_token()?;
        }
        Err(CompanionError::Response(format!(
            "announcement rejected ({}): {}",
            resp.status, resp.body
        )))
    }
}

/// Validate credentials against a candidate farm controller.
///
/// Runs a token request with its own local state, so the daemon's
/// [`CycleState`] is untouched. A granted token is persisted (last write wins
/// if a tick writes at the same time).
pub async fn test_credentials(
    api: &ApiClient,
    persisted: &mut PersistedDeviceState,
    url: &str,
    client_id: Option<&str>,
    client_secret: Option<&str>,
) -> Result<CycleState, CompanionError> {
    let state = CycleState::Boot;
    match fetch_access_token(api, url, client_id, client_secret).await {
        Ok(token) => {
            persisted.load()?;
            persisted.record_token(&token)?;
            log::info!("Queried access_token from OctoFarm");
            Ok(state.next(&CycleEvent::TokenGranted))
        }
        Err(e) => {
            log::error!("Credential test against {} failed: {}", url, e);
            Ok(state.next(&CycleEvent::TokenFailed(&e)))
        }
    }
}
