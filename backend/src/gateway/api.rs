//! Typed call surface
//!
//! Thin wrappers over `health`, `status` and `cron.list`, plus the
//! throwaway-client connection probe used by the settings screen.

use super::client::GatewayClient;
use super::error::GatewayError;
use super::registry::GatewayRegistry;
use super::settings::GatewaySettings;
use super::transport::Connector;
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Number, Value};
use std::sync::Arc;
use tracing::debug;

/// Response of `health`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HealthSnapshot {
    /// Overall liveness
    #[serde(deserialize_with = "null_as_default")]
    pub ok: bool,
    /// Per-channel probe results, passed through untouched
    #[serde(deserialize_with = "null_as_default")]
    pub channels: Map<String, Value>,
    /// Configured agents
    #[serde(deserialize_with = "null_as_default")]
    pub agents: Vec<HealthAgent>,
}

/// One agent as reported by `health`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HealthAgent {
    /// Agent id
    #[serde(deserialize_with = "null_as_default")]
    pub agent_id: String,
    /// Display name
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    /// Whether this is the default agent
    #[serde(deserialize_with = "null_as_default")]
    pub is_default: bool,
    /// Session totals
    #[serde(deserialize_with = "null_as_default")]
    pub sessions: SessionSummary,
}

/// Session count and most recent sessions of one agent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSummary {
    /// Number of sessions
    #[serde(deserialize_with = "lenient_count")]
    pub count: u64,
    /// Most recent sessions
    #[serde(deserialize_with = "null_as_default")]
    pub recent: Vec<RecentSession>,
}

/// A recent session in `health`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecentSession {
    /// Session key
    #[serde(deserialize_with = "null_as_default")]
    pub key: String,
    /// Last update, ms since the epoch
    #[serde(deserialize_with = "lenient_millis")]
    pub updated_at: Option<i64>,
    /// Age in ms
    pub age: Option<f64>,
}

/// Response of `status`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatusSnapshot {
    /// Heartbeat configuration
    #[serde(deserialize_with = "null_as_default")]
    pub heartbeat: HeartbeatConfig,
    /// Session usage
    #[serde(deserialize_with = "null_as_default")]
    pub sessions: SessionsStatus,
}

/// Heartbeat section of `status`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HeartbeatConfig {
    /// Agent used when none is named
    pub default_agent_id: Option<String>,
    /// Per-agent heartbeat settings
    #[serde(deserialize_with = "null_as_default")]
    pub agents: Vec<HeartbeatAgent>,
}

/// Heartbeat settings of one agent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HeartbeatAgent {
    /// Agent id
    #[serde(deserialize_with = "null_as_default")]
    pub agent_id: String,
    /// Whether heartbeats run
    #[serde(deserialize_with = "null_as_default")]
    pub enabled: bool,
    /// Interval as written in the config, e.g. `30m`
    pub every: Option<String>,
}

/// Sessions section of `status`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionsStatus {
    /// Number of sessions
    #[serde(deserialize_with = "lenient_count")]
    pub count: u64,
    /// Most recent sessions across agents, newest first
    #[serde(deserialize_with = "null_as_default")]
    pub recent: Vec<SessionStatus>,
    /// The same, grouped by agent
    #[serde(deserialize_with = "null_as_default")]
    pub by_agent: Vec<AgentSessions>,
}

/// One recent session with its context usage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionStatus {
    /// Owning agent
    #[serde(deserialize_with = "null_as_default")]
    pub agent_id: String,
    /// Session key
    #[serde(deserialize_with = "null_as_default")]
    pub key: String,
    /// Session id
    pub session_id: Option<String>,
    /// Last update, ms since the epoch
    #[serde(deserialize_with = "lenient_millis")]
    pub updated_at: Option<i64>,
    /// Age in ms
    pub age: Option<f64>,
    /// Tokens used so far
    #[serde(deserialize_with = "lenient_opt_count")]
    pub total_tokens: Option<u64>,
    /// Share of the context window used, 0-100
    pub percent_used: Option<f64>,
    /// Model name
    pub model: Option<String>,
}

/// Sessions of one agent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentSessions {
    /// Agent id
    #[serde(deserialize_with = "null_as_default")]
    pub agent_id: String,
    /// Number of sessions
    #[serde(deserialize_with = "lenient_count")]
    pub count: u64,
    /// Recent sessions, passed through untouched
    #[serde(deserialize_with = "null_as_default")]
    pub recent: Vec<Value>,
}

/// Response of `cron.list`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CronList {
    /// Scheduled jobs
    #[serde(deserialize_with = "null_as_default")]
    pub jobs: Vec<CronJob>,
}

/// One scheduled job
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CronJob {
    /// Job id
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    /// Agent the job runs as
    #[serde(deserialize_with = "null_as_default")]
    pub agent_id: String,
    /// Display name
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    /// Whether the job is scheduled
    #[serde(deserialize_with = "null_as_default")]
    pub enabled: bool,
    /// When it runs
    #[serde(deserialize_with = "null_as_default")]
    pub schedule: CronSchedule,
    /// Run history
    #[serde(deserialize_with = "null_as_default")]
    pub state: CronState,
}

/// Job schedule: `kind` is `every` (with `everyMs`) or `cron` (with `expr`, `tz`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CronSchedule {
    /// `every` or `cron`; anything else is shown as unknown
    #[serde(deserialize_with = "null_as_default")]
    pub kind: String,
    /// Interval of an `every` schedule
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_opt_count"
    )]
    pub every_ms: Option<u64>,
    /// Expression of a `cron` schedule
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expr: Option<String>,
    /// Time zone of a `cron` schedule
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tz: Option<String>,
}

/// Run history of one job
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CronState {
    /// Start of the last run, ms since the epoch
    #[serde(deserialize_with = "lenient_millis")]
    pub last_run_at_ms: Option<i64>,
    /// Outcome of the last run
    pub last_status: Option<String>,
    /// Duration of the last run
    #[serde(deserialize_with = "lenient_millis")]
    pub last_duration_ms: Option<i64>,
    /// Failures in a row
    #[serde(deserialize_with = "lenient_opt_count")]
    pub consecutive_errors: Option<u64>,
    /// Next scheduled run, ms since the epoch
    #[serde(deserialize_with = "lenient_millis")]
    pub next_run_at_ms: Option<i64>,
}

/// `null` reads as the field's default
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A JSON number (or `null`); other types are rejected
fn number<'de, D>(deserializer: D) -> Result<Option<Number>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(Some(n)),
        Some(other) => Err(D::Error::custom(format!(
            "invalid type: {}, expected a number",
            other
        ))),
    }
}

fn as_count(n: &Number) -> Option<u64> {
    n.as_u64()
        .or_else(|| n.as_f64().map(|f| f.max(0.0) as u64))
}

/// Counts may arrive as floats or `null` (read as zero)
fn lenient_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(number(deserializer)?.as_ref().and_then(as_count).unwrap_or(0))
}

fn lenient_opt_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(number(deserializer)?.as_ref().and_then(as_count))
}

/// Timestamps and durations may arrive as floats
fn lenient_millis<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(number(deserializer)?
        .and_then(|n| n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))))
}

/// Call `method` and decode its payload as `T`; a missing payload reads as `{}`
async fn call_typed<T: DeserializeOwned>(
    client: &GatewayClient,
    method: &str,
) -> Result<T, GatewayError> {
    let payload = match client.call(method, None).await? {
        Value::Null => Value::Object(Map::new()),
        other => other,
    };
    serde_json::from_value(payload).map_err(|e| GatewayError::Decode {
        method: method.to_string(),
        reason: e.to_string(),
    })
}

impl GatewayClient {
    /// Agent liveness and channel probes
    pub async fn fetch_health(&self) -> Result<HealthSnapshot, GatewayError> {
        call_typed(self, "health").await
    }

    /// Heartbeat configuration and recent sessions
    pub async fn fetch_status(&self) -> Result<StatusSnapshot, GatewayError> {
        call_typed(self, "status").await
    }

    /// Scheduled jobs
    pub async fn fetch_crons(&self) -> Result<CronList, GatewayError> {
        call_typed(self, "cron.list").await
    }
}

impl GatewayRegistry {
    /// `health` through the shared client
    pub async fn fetch_health(&self) -> Result<HealthSnapshot, GatewayError> {
        self.get().fetch_health().await
    }

    /// `status` through the shared client
    pub async fn fetch_status(&self) -> Result<StatusSnapshot, GatewayError> {
        self.get().fetch_status().await
    }

    /// `cron.list` through the shared client
    pub async fn fetch_crons(&self) -> Result<CronList, GatewayError> {
        self.get().fetch_crons().await
    }

    /// Probe an endpoint without touching the shared client
    pub async fn test_connection(&self, url: &str, token: Option<&str>) -> bool {
        test_connection(self.connector(), url, token).await
    }
}

/// Disconnects the wrapped client however the owning future ends
struct DisconnectOnDrop(GatewayClient);

impl Drop for DisconnectOnDrop {
    fn drop(&mut self) {
        self.0.disconnect();
    }
}

/// Whether `url` accepts a handshake and answers `health`
///
/// Uses a private client that is always disconnected before returning.
pub async fn test_connection(
    connector: Arc<dyn Connector>,
    url: &str,
    token: Option<&str>,
) -> bool {
    let guard = DisconnectOnDrop(GatewayClient::new(
        GatewaySettings::new(url, token),
        connector,
    ));
    let client = &guard.0;

    let result = async {
        client.connect().await?;
        client.call("health", None).await
    }
    .await;
    drop(guard);

    match result {
        Ok(_) => true,
        Err(e) => {
            debug!(error = %e, "Gateway connection test failed");
            false
        }
    }
}
