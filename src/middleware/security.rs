use axum::{
    extract::{Request, State},
    http::header::HOST,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{error::AppError, state::AppState};

/// Rejects requests whose Host header is not in `TRUSTED_HOSTS`.
pub async fn enforce_trusted_hosts(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let host = request
        .headers()
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    if !host_is_trusted(host, &state.config.trusted_hosts) {
        tracing::warn!(host, "Rejected request for untrusted host");
        return AppError::BadRequest("Invalid host header.".to_string()).into_response();
    }
    next.run(request).await
}

fn host_is_trusted(host: &str, trusted_hosts: &[String]) -> bool {
    if trusted_hosts.iter().any(|trusted| trusted == "*") {
        return true;
    }
    let hostname = strip_port(host.trim()).to_ascii_lowercase();
    if hostname.is_empty() {
        return false;
    }
    trusted_hosts.iter().any(|trusted| {
        let trusted = trusted.trim().to_ascii_lowercase();
        match trusted.strip_prefix("*.") {
            Some(suffix) => hostname.ends_with(&format!(".{suffix}")),
            None => hostname == trusted,
        }
    })
}

fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return host
            .split_once(']')
            .map(|(address, _)| &address[1..])
            .unwrap_or(host);
    }
    host.rsplit_once(':')
        .filter(|(_, port)| port.chars().all(|character| character.is_ascii_digit()))
        .map(|(name, _)| name)
        .unwrap_or(host)
}
