//! State machine for the announcement cycle.
//!
//! `Boot` is only ever the value before the first tick. A tick ends in
//! `Sleep` when the farm controller answered, or in `Retry`/`Crashed` when it
//! aborted. The state carries over into the next tick unchanged.

use reqwest::StatusCode;
use serde::Serialize;

use crate::error::CompanionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CycleState {
    /// No tick has run yet.
    Boot,
    /// Transport failure; the next tick tries again.
    Retry,
    /// Configuration, validation or response failure.
    Crashed,
    /// A usable access token is available for announcing.
    Success,
    /// Announced; waiting for the next tick.
    Sleep,
}

/// Something that happened during a tick.
#[derive(Debug)]
pub enum CycleEvent<'a> {
    /// Stored token present and not expired.
    TokenValid,
    /// New token granted and persisted.
    TokenGranted,
    TokenFailed(&'a CompanionError),
    /// Announcement not sent or not answered.
    AnnounceFailed,
    /// Farm controller answered the announcement.
    Announced(StatusCode),
}

impl CycleState {
    /// Transition function for the cycle.
    pub fn next(self, event: &CycleEvent<'_>) -> CycleState {
        match event {
            CycleEvent::TokenValid | CycleEvent::TokenGranted => CycleState::Success,
            CycleEvent::TokenFailed(e) if e.is_transport() => CycleState::Retry,
            CycleEvent::TokenFailed(_) => CycleState::Crashed,
            CycleEvent::AnnounceFailed => CycleState::Crashed,
            CycleEvent::Announced(status) if status.is_success() => CycleState::Sleep,
            CycleEvent::Announced(_) => CycleState::Retry,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CycleState::Boot => "boot",
            CycleState::Retry => "retry",
            CycleState::Crashed => "crashed",
            CycleState::Success => "success",
            CycleState::Sleep => "sleep",
        }
    }
}

impl std::fmt::Display for CycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
