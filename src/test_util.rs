//! Shared helpers for unit tests.

/// A loopback URL nothing is listening on.
pub fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}", port)
}

/// A token that passes the structural length check.
pub fn valid_token() -> String {
    "A".repeat(crate::api::announce::MIN_ACCESS_TOKEN_LEN)
}
