//! Gateway API handlers
//!
//! Direct pass-through of the gateway call surface, settings management,
//! and connection probes.

use crate::error::AppError;
use crate::executor::CliRunner;
use crate::gateway::{CronList, GatewaySettings, HealthSnapshot, StatusSnapshot};
use crate::state::SharedState;
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

/// Endpoint probed when the caller names none
pub const DEFAULT_GATEWAY_HTTP: &str = "http://localhost:18789";

/// Deadline for the plain HTTP reachability fallback
const HTTP_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Gateway settings as shown to clients (token masked)
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsResponse {
    /// Endpoint URL
    pub url: String,
    /// Whether a token is configured
    pub has_token: bool,
    /// Token with all but its last characters hidden
    pub token: String,
}

impl From<&GatewaySettings> for SettingsResponse {
    fn from(settings: &GatewaySettings) -> Self {
        Self {
            url: settings.url.clone(),
            has_token: settings.token().is_some(),
            token: settings.masked_token(),
        }
    }
}

/// Replace settings request
#[derive(Debug, Deserialize)]
pub struct UpdateSettingsRequest {
    /// New endpoint URL
    pub url: String,
    /// New token; omitted keeps the current one, empty clears it
    pub token: Option<String>,
}

/// Connection test request
#[derive(Debug, Deserialize)]
pub struct TestConnectionRequest {
    /// Endpoint to probe
    pub url: String,
    /// Optional token
    pub token: Option<String>,
}

/// Connection test response
#[derive(Debug, Serialize)]
pub struct TestConnectionResponse {
    /// Whether the handshake and a `health` call succeeded
    pub ok: bool,
}

/// Query of the gateway reachability probe
#[derive(Debug, Deserialize)]
pub struct GatewayHealthQuery {
    /// Gateway base URL
    pub gateway: Option<String>,
}

/// GET /api/gateway/health - `health` through the shared client
pub async fn gateway_health_call(
    State(state): State<SharedState>,
) -> Result<Json<HealthSnapshot>, AppError> {
    Ok(Json(state.gateway.fetch_health().await?))
}

/// GET /api/gateway/status - `status` through the shared client
pub async fn gateway_status(
    State(state): State<SharedState>,
) -> Result<Json<StatusSnapshot>, AppError> {
    Ok(Json(state.gateway.fetch_status().await?))
}

/// GET /api/gateway/crons - `cron.list` through the shared client
pub async fn gateway_crons(State(state): State<SharedState>) -> Result<Json<CronList>, AppError> {
    Ok(Json(state.gateway.fetch_crons().await?))
}

/// GET /api/gateway/settings - Current settings with the token masked
pub async fn get_settings(State(state): State<SharedState>) -> Json<SettingsResponse> {
    Json(SettingsResponse::from(&state.gateway.settings()))
}

/// PUT /api/gateway/settings - Replace and persist settings
///
/// Subscribers (the dashboard poller) reconnect when the settings change.
pub async fn update_settings(
    State(state): State<SharedState>,
    Json(request): Json<UpdateSettingsRequest>,
) -> Result<Json<SettingsResponse>, AppError> {
    let url = request.url.trim();
    if url.is_empty() {
        return Err(AppError::InvalidRequest(
            "Gateway URL cannot be empty".to_string(),
        ));
    }
    crate::gateway::transport::websocket_url(url, None)?;

    let token = request
        .token
        .unwrap_or_else(|| state.gateway.settings().token);
    let settings = GatewaySettings::new(url, Some(&token));

    let changed = state.update_gateway_settings(settings.clone())?;
    info!(url = %settings.url, changed, "Gateway settings saved");

    Ok(Json(SettingsResponse::from(&settings)))
}

/// POST /api/gateway/test - Probe an endpoint with a throwaway client
pub async fn test_connection(
    State(state): State<SharedState>,
    Json(request): Json<TestConnectionRequest>,
) -> Json<TestConnectionResponse> {
    let ok = state
        .gateway
        .test_connection(request.url.trim(), request.token.as_deref())
        .await;
    Json(TestConnectionResponse { ok })
}

/// GET /api/gateway-health?gateway= - Reachability via the CLI, then plain HTTP
pub async fn gateway_reachability(
    State(state): State<SharedState>,
    Query(query): Query<GatewayHealthQuery>,
) -> Json<Value> {
    let gateway = query
        .gateway
        .filter(|g| !g.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_GATEWAY_HTTP.to_string());
    Json(probe_gateway(&state.cli, &state.http, &gateway).await)
}

/// GET /api/gateway-test?gateway= - Fetch the gateway's own `/api/health` over HTTP
///
/// Answers 502 when the gateway is unreachable or replies with an error status.
pub async fn gateway_http_test(
    State(state): State<SharedState>,
    Query(query): Query<GatewayHealthQuery>,
) -> (StatusCode, Json<Value>) {
    let gateway = query
        .gateway
        .filter(|g| !g.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_GATEWAY_HTTP.to_string());
    let (status, body) = check_gateway_http(&state.http, &gateway).await;
    (status, Json(body))
}

/// GET `{gateway}/api/health` with the HTTP probe deadline
pub async fn check_gateway_http(http: &reqwest::Client, gateway: &str) -> (StatusCode, Value) {
    let url = format!("{}/api/health", gateway.trim_end_matches('/'));
    let result: Result<Result<Value, u16>, reqwest::Error> = async {
        let response = http.get(&url).timeout(HTTP_PROBE_TIMEOUT).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Ok(Err(status.as_u16()));
        }
        Ok(Ok(response.json::<Value>().await?))
    }
    .await;

    match result {
        Ok(Ok(data)) => (
            StatusCode::OK,
            json!({ "status": "connected", "gateway": gateway, "data": data }),
        ),
        Ok(Err(code)) => (
            StatusCode::BAD_GATEWAY,
            json!({ "status": "error", "gateway": gateway, "error": format!("HTTP {}", code) }),
        ),
        Err(e) => {
            debug!(error = %e, gateway, "Gateway HTTP check failed");
            (
                StatusCode::BAD_GATEWAY,
                json!({ "status": "disconnected", "gateway": gateway, "error": e.to_string() }),
            )
        }
    }
}

/// Whether `gateway` points at this machine (unparseable counts as local)
pub fn is_local_gateway(gateway: &str) -> bool {
    match url::Url::parse(gateway) {
        Ok(url) => matches!(
            url.host_str(),
            Some("localhost" | "127.0.0.1" | "::1" | "[::1]")
        ),
        Err(_) => true,
    }
}

/// Ask the CLI for gateway health, falling back to a plain HTTP GET for
/// remote gateways the CLI cannot reach
pub async fn probe_gateway(cli: &CliRunner, http: &reqwest::Client, gateway: &str) -> Value {
    let local = is_local_gateway(gateway);
    let result = if local {
        cli.gateway_health(None).await
    } else {
        cli.gateway_health(Some(gateway)).await
    };

    match result {
        Ok(data) => {
            let ok = data.get("ok").map(is_truthy).unwrap_or(false);
            json!({ "ok": ok, "data": data })
        }
        Err(e) if local => json!({ "ok": false, "error": e.to_string() }),
        Err(e) => {
            debug!(error = %e, gateway, "CLI probe failed, trying HTTP");
            http_probe(http, gateway)
                .await
                .unwrap_or_else(|_| json!({ "ok": false, "error": e.to_string() }))
        }
    }
}

/// Plain GET of the gateway's base URL
pub async fn http_probe(http: &reqwest::Client, gateway: &str) -> Result<Value, reqwest::Error> {
    let response = http
        .get(gateway)
        .header(header::ACCEPT.as_str(), "text/html")
        .timeout(HTTP_PROBE_TIMEOUT)
        .send()
        .await?;
    let status = response.status();
    Ok(json!({ "ok": status.is_success(), "status": status.as_u16() }))
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    #[test]
    fn test_is_local_gateway() {
        assert!(is_local_gateway("http://localhost:18789"));
        assert!(is_local_gateway("http://127.0.0.1:18789"));
        assert!(is_local_gateway("http://[::1]:18789"));
        assert!(is_local_gateway("not a url"));
        assert!(!is_local_gateway("https://gw.example.net"));
    }

    #[test]
    fn test_settings_response_masks_token() {
        let response =
            SettingsResponse::from(&GatewaySettings::new("ws://x", Some("abcdefgh1234")));
        assert!(response.has_token);
        assert_eq!(response.token, "********1234");
    }

    #[tokio::test]
    async fn test_http_probe_reports_status() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/")
            .match_header("accept", "text/html")
            .with_status(503)
            .create_async()
            .await;

        let client = reqwest::Client::new();
        let result = http_probe(&client, &server.url()).await.unwrap();
        assert_eq!(result, json!({"ok": false, "status": 503}));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_local_probe_reports_cli_failure() {
        let cli = CliRunner::new("nonexistent-command-that-does-not-exist-12345", 5);
        let client = reqwest::Client::new();
        let result = probe_gateway(&cli, &client, "http://localhost:18789").await;
        assert_eq!(result["ok"], false);
        assert!(result["error"]
            .as_str()
            .unwrap()
            .contains("Failed to spawn process"));
    }

    #[tokio::test]
    async fn test_remote_probe_falls_back_to_http_error() {
        let cli = CliRunner::new("nonexistent-command-that-does-not-exist-12345", 5);
        let client = reqwest::Client::new();
        // Unresolvable host: both the CLI and the HTTP fallback fail
        let result = probe_gateway(&cli, &client, "http://gateway.invalid:1").await;
        assert_eq!(result["ok"], false);
        assert!(result["error"].is_string());
    }

    #[tokio::test]
    async fn test_gateway_http_check_connected() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/health")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ok":true}"#)
            .create_async()
            .await;

        let client = reqwest::Client::new();
        let gateway = format!("{}/", server.url());
        let (status, body) = check_gateway_http(&client, &gateway).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "connected");
        assert_eq!(body["data"], json!({"ok": true}));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_gateway_http_check_error_status() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/health")
            .with_status(500)
            .create_async()
            .await;

        let client = reqwest::Client::new();
        let (status, body) = check_gateway_http(&client, &server.url()).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["status"], "error");
        assert_eq!(body["error"], "HTTP 500");
        assert_eq!(body["gateway"], server.url());
    }

    #[tokio::test]
    async fn test_gateway_http_check_unreachable() {
        let client = reqwest::Client::new();
        let (status, body) = check_gateway_http(&client, "http://gateway.invalid:1").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["status"], "disconnected");
        assert!(body["error"].is_string());
    }

    #[test]
    fn test_truthiness() {
        assert!(is_truthy(&json!(true)));
        assert!(is_truthy(&json!(1)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&Value::Null));
    }
}
