//! Dashboard view model
//!
//! Pure derivation of the dashboard's agent and cron views from the three
//! gateway responses.

use crate::gateway::api::{CronJob, CronList, CronSchedule, HealthSnapshot, StatusSnapshot};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const HOUR_MS: f64 = 3_600_000.0;
const MINUTE_MS: f64 = 60_000.0;

/// How recently an agent did something
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentActivity {
    /// Activity within the idle threshold
    Active,
    /// Known activity, but older than the threshold
    Idle,
    /// No recorded activity
    Offline,
}

impl AgentActivity {
    /// Classify `last_active` (ms since the epoch) relative to `now_ms`
    pub fn classify(last_active: Option<i64>, now_ms: i64, idle_threshold: Duration) -> Self {
        match last_active {
            Some(at) if now_ms.saturating_sub(at) < idle_threshold.as_millis() as i64 => {
                AgentActivity::Active
            }
            Some(_) => AgentActivity::Idle,
            None => AgentActivity::Offline,
        }
    }
}

/// One agent row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentView {
    /// Agent id
    pub agent_id: String,
    /// Display name
    pub name: String,
    /// Whether this is the default agent
    pub is_default: bool,
    /// Number of sessions
    pub session_count: u64,
    /// Last session update, ms since the epoch
    pub last_active: Option<i64>,
    /// Context window used by the latest session, 0-100
    pub percent_used: Option<f64>,
    /// Model of the latest session
    pub model: Option<String>,
    /// Activity derived from `last_active`
    pub status: AgentActivity,
}

/// One scheduled job row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronView {
    /// Job id
    pub id: String,
    /// Agent the job runs as
    pub agent_id: String,
    /// Display name
    pub name: String,
    /// Whether the job is scheduled
    pub enabled: bool,
    /// Human-readable schedule, empty when unknown
    pub schedule: String,
    /// Start of the last run, ms since the epoch
    pub last_run: Option<i64>,
    /// Outcome of the last run
    pub last_status: Option<String>,
    /// Next scheduled run, ms since the epoch
    pub next_run: Option<i64>,
    /// Duration of the last run
    pub last_duration_ms: Option<i64>,
}

/// Everything the dashboard shows
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    /// Whether the last refresh reached the gateway
    pub connected: bool,
    /// A refresh is running without a live connection
    pub connecting: bool,
    /// Message of the last failed refresh
    pub error: Option<String>,
    /// One row per agent
    pub agents: Vec<AgentView>,
    /// One row per scheduled job
    pub crons: Vec<CronView>,
    /// When the last successful refresh finished (ms since the epoch)
    pub last_updated: Option<i64>,
}

impl DashboardSnapshot {
    /// Snapshot of a successful refresh
    pub fn from_responses(
        health: &HealthSnapshot,
        status: &StatusSnapshot,
        crons: &CronList,
        now_ms: i64,
        idle_threshold: Duration,
    ) -> Self {
        Self {
            connected: true,
            connecting: false,
            error: None,
            agents: agent_views(health, status, now_ms, idle_threshold),
            crons: crons.jobs.iter().map(cron_view).collect(),
            last_updated: Some(now_ms),
        }
    }

    /// Mark a failed refresh, keeping the last known agents and jobs
    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.connected = false;
        self.connecting = false;
        self.error = Some(error.into());
    }
}

/// Agent rows, one per agent id, in first-seen order
pub fn agent_views(
    health: &HealthSnapshot,
    status: &StatusSnapshot,
    now_ms: i64,
    idle_threshold: Duration,
) -> Vec<AgentView> {
    let mut views: Vec<AgentView> = Vec::with_capacity(health.agents.len());

    for agent in &health.agents {
        let recent = status
            .sessions
            .recent
            .iter()
            .find(|s| s.agent_id == agent.agent_id);

        let last_active = recent.and_then(|s| non_zero(s.updated_at));
        let view = AgentView {
            agent_id: agent.agent_id.clone(),
            name: agent.name.clone(),
            is_default: agent.is_default,
            session_count: agent.sessions.count,
            last_active,
            percent_used: recent
                .and_then(|s| s.percent_used)
                .filter(|p| *p != 0.0),
            model: recent
                .and_then(|s| s.model.clone())
                .filter(|m| !m.is_empty()),
            status: AgentActivity::classify(last_active, now_ms, idle_threshold),
        };

        match views.iter_mut().find(|v| v.agent_id == view.agent_id) {
            Some(existing) => *existing = view,
            None => views.push(view),
        }
    }

    views
}

/// Job row for one scheduled job
pub fn cron_view(job: &CronJob) -> CronView {
    CronView {
        id: job.id.clone(),
        agent_id: job.agent_id.clone(),
        name: job.name.clone(),
        enabled: job.enabled,
        schedule: format_schedule(&job.schedule),
        last_run: non_zero(job.state.last_run_at_ms),
        last_status: job.state.last_status.clone().filter(|s| !s.is_empty()),
        next_run: non_zero(job.state.next_run_at_ms),
        last_duration_ms: non_zero(job.state.last_duration_ms),
    }
}

/// `Every 2h`, `Every 30m`, `0 9 * * * (Asia/Tokyo)`, or empty
pub fn format_schedule(schedule: &CronSchedule) -> String {
    match schedule.kind.as_str() {
        "every" => match schedule.every_ms.filter(|ms| *ms > 0) {
            Some(ms) => {
                let hours = ms as f64 / HOUR_MS;
                if hours >= 1.0 {
                    format!("Every {}h", hours)
                } else {
                    format!("Every {}m", ms as f64 / MINUTE_MS)
                }
            }
            None => String::new(),
        },
        "cron" => match schedule.expr.as_deref().filter(|e| !e.is_empty()) {
            Some(expr) => {
                let tz = schedule
                    .tz
                    .as_deref()
                    .filter(|tz| !tz.is_empty())
                    .unwrap_or("UTC");
                format!("{} ({})", expr, tz)
            }
            None => String::new(),
        },
        _ => String::new(),
    }
}

fn non_zero(value: Option<i64>) -> Option<i64> {
    value.filter(|v| *v != 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::api::{CronState, HealthAgent, SessionStatus, SessionSummary};

    const NOW: i64 = 1_700_000_000_000;
    const TEN_MINUTES: Duration = Duration::from_secs(600);

    fn every(ms: u64) -> CronSchedule {
        CronSchedule {
            kind: "every".to_string(),
            every_ms: Some(ms),
            ..Default::default()
        }
    }

    fn cron(expr: &str, tz: Option<&str>) -> CronSchedule {
        CronSchedule {
            kind: "cron".to_string(),
            expr: Some(expr.to_string()),
            tz: tz.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_format_schedule() {
        assert_eq!(format_schedule(&every(3_600_000)), "Every 1h");
        assert_eq!(format_schedule(&every(5_400_000)), "Every 1.5h");
        assert_eq!(format_schedule(&every(86_400_000)), "Every 24h");
        assert_eq!(format_schedule(&every(1_800_000)), "Every 30m");
        assert_eq!(format_schedule(&every(0)), "");
        assert_eq!(
            format_schedule(&cron("0 9 * * *", Some("Asia/Tokyo"))),
            "0 9 * * * (Asia/Tokyo)"
        );
        assert_eq!(format_schedule(&cron("*/5 * * * *", None)), "*/5 * * * * (UTC)");
        assert_eq!(format_schedule(&cron("", None)), "");
        assert_eq!(format_schedule(&CronSchedule::default()), "");
    }

    #[test]
    fn test_activity_classification() {
        let recent = Some(NOW - 60_000);
        let stale = Some(NOW - 11 * 60_000);
        assert_eq!(AgentActivity::classify(recent, NOW, TEN_MINUTES), AgentActivity::Active);
        assert_eq!(AgentActivity::classify(stale, NOW, TEN_MINUTES), AgentActivity::Idle);
        assert_eq!(AgentActivity::classify(None, NOW, TEN_MINUTES), AgentActivity::Offline);
    }

    fn health_agent(id: &str, count: u64) -> HealthAgent {
        HealthAgent {
            agent_id: id.to_string(),
            name: id.to_uppercase(),
            is_default: id == "main",
            sessions: SessionSummary {
                count,
                recent: Vec::new(),
            },
        }
    }

    #[test]
    fn test_agent_views_join_recent_sessions() {
        let health = HealthSnapshot {
            ok: true,
            agents: vec![health_agent("main", 3), health_agent("coder", 0)],
            ..Default::default()
        };
        let mut status = StatusSnapshot::default();
        status.sessions.recent = vec![
            SessionStatus {
                agent_id: "main".to_string(),
                updated_at: Some(NOW - 1_000),
                percent_used: Some(12.5),
                model: Some("opus".to_string()),
                ..Default::default()
            },
            SessionStatus {
                agent_id: "main".to_string(),
                updated_at: Some(NOW - 999_999),
                ..Default::default()
            },
            SessionStatus {
                agent_id: "coder".to_string(),
                updated_at: Some(0),
                percent_used: Some(0.0),
                model: Some(String::new()),
                ..Default::default()
            },
        ];

        let views = agent_views(&health, &status, NOW, TEN_MINUTES);
        assert_eq!(views.len(), 2);

        assert_eq!(views[0].agent_id, "main");
        assert!(views[0].is_default);
        assert_eq!(views[0].session_count, 3);
        assert_eq!(views[0].last_active, Some(NOW - 1_000));
        assert_eq!(views[0].percent_used, Some(12.5));
        assert_eq!(views[0].model.as_deref(), Some("opus"));
        assert_eq!(views[0].status, AgentActivity::Active);

        assert_eq!(views[1].last_active, None);
        assert_eq!(views[1].percent_used, None);
        assert_eq!(views[1].model, None);
        assert_eq!(views[1].status, AgentActivity::Offline);
    }

    #[test]
    fn test_duplicate_agents_collapse() {
        let health = HealthSnapshot {
            agents: vec![health_agent("main", 1), health_agent("main", 2)],
            ..Default::default()
        };
        let views = agent_views(&health, &StatusSnapshot::default(), NOW, TEN_MINUTES);
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].session_count, 2);
    }

    #[test]
    fn test_cron_view_drops_zero_values() {
        let job = CronJob {
            id: "digest".to_string(),
            agent_id: "main".to_string(),
            name: "Daily digest".to_string(),
            enabled: true,
            schedule: every(7_200_000),
            state: CronState {
                last_run_at_ms: Some(0),
                last_status: Some("ok".to_string()),
                last_duration_ms: Some(0),
                consecutive_errors: Some(0),
                next_run_at_ms: Some(NOW),
            },
        };
        let view = cron_view(&job);
        assert_eq!(view.schedule, "Every 2h");
        assert_eq!(view.last_run, None);
        assert_eq!(view.last_duration_ms, None);
        assert_eq!(view.next_run, Some(NOW));
        assert_eq!(view.last_status.as_deref(), Some("ok"));
    }

    #[test]
    fn test_failure_keeps_previous_rows() {
        let health = HealthSnapshot {
            agents: vec![health_agent("main", 1)],
            ..Default::default()
        };
        let mut snapshot = DashboardSnapshot::from_responses(
            &health,
            &StatusSnapshot::default(),
            &CronList::default(),
            NOW,
            TEN_MINUTES,
        );
        assert!(snapshot.connected);

        snapshot.record_failure("Connection closed");
        assert!(!snapshot.connected);
        assert_eq!(snapshot.error.as_deref(), Some("Connection closed"));
        assert_eq!(snapshot.agents.len(), 1);
        assert_eq!(snapshot.last_updated, Some(NOW));
    }
}
