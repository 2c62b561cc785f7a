//! Farm controller API for the companion agent.
//!
//! Provides the HTTP client with timeouts and auth helpers, the OAuth2
//! client-credentials token request, the announcement call, the version probe
//! used by the connection test, and the wire types they exchange.

pub mod announce;
pub mod client;
pub mod token;
pub mod types;
pub mod version;

/// Token endpoint, relative to the farm controller base URL.
pub const ACCESS_TOKEN_ROUTE: &str = "oidc/token";

/// Announcement endpoint, relative to the farm controller base URL.
pub const ANNOUNCE_ROUTE: &str = "octoprint/announce";

/// Version probe endpoint, relative to a candidate base URL.
pub const VERSION_ROUTE: &str = "serverChecks/version";

/// Scope requested with the client-credentials grant.
pub const REQUESTED_SCOPE: &str = "openid";
