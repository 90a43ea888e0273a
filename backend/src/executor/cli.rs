//! Gateway CLI runner
//!
//! Shells out to the gateway's command-line tool for the views the socket
//! protocol does not cover (logs, CLI-side health and cron listings).

use crate::executor::error::CliError;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, error, warn};

/// Upper bound on log lines fetched per request
pub const MAX_LOG_LIMIT: usize = 200;

/// Runs gateway CLI subcommands with a timeout
#[derive(Debug, Clone)]
pub struct CliRunner {
    program: PathBuf,
    /// Arguments placed before every subcommand
    prefix_args: Vec<String>,
    timeout: Duration,
}

impl CliRunner {
    /// Create a runner for `program`
    pub fn new(program: impl Into<PathBuf>, timeout_secs: u64) -> Self {
        Self {
            program: program.into(),
            prefix_args: Vec::new(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// Put `args` in front of every subcommand
    pub fn with_prefix_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prefix_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Run a subcommand and return its stdout
    pub async fn run(&self, args: &[&str]) -> Result<String, CliError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.prefix_args)
            .args(args)
            .env("NO_COLOR", "1")
            .kill_on_drop(true);

        debug!(program = %self.program.display(), args = ?args, "Running gateway CLI");

        match timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => {
                if output.status.success() {
                    String::from_utf8(output.stdout).map_err(|e| {
                        CliError::InvalidEncoding(format!("Failed to decode stdout: {}", e))
                    })
                } else {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    let exit_code = output.status.code().unwrap_or(-1);

                    warn!(
                        exit_code = exit_code,
                        stderr = %stderr.trim(),
                        "Gateway CLI failed"
                    );

                    Err(CliError::ProcessFailed(format!(
                        "Process exited with code {}: {}",
                        exit_code,
                        stderr.trim()
                    )))
                }
            }
            Ok(Err(e)) => {
                error!(
                    program = %self.program.display(),
                    error = %e,
                    "Failed to spawn gateway CLI"
                );
                Err(CliError::SpawnFailed(e))
            }
            Err(_) => {
                warn!(
                    timeout_secs = self.timeout.as_secs(),
                    args = ?args,
                    "Gateway CLI timed out"
                );
                Err(CliError::Timeout(self.timeout.as_secs()))
            }
        }
    }

    /// Run a subcommand whose stdout is one JSON document
    pub async fn run_json(&self, args: &[&str]) -> Result<Value, CliError> {
        let out = self.run(args).await?;
        Ok(serde_json::from_str(out.trim())?)
    }

    /// `cron list --json`
    pub async fn cron_list(&self) -> Result<Value, CliError> {
        self.run_json(&["cron", "list", "--json"]).await
    }

    /// `health --json`
    pub async fn health(&self) -> Result<Value, CliError> {
        self.run_json(&["health", "--json"]).await
    }

    /// Most recent log entries, at most [`MAX_LOG_LIMIT`]
    ///
    /// Output is JSON lines; a line that does not parse is kept as
    /// `{"type": "parse-error", "raw": line}`.
    pub async fn logs(&self, limit: usize) -> Result<Vec<Value>, CliError> {
        let limit = limit.min(MAX_LOG_LIMIT).to_string();
        let out = self
            .run(&["logs", "--json", "--limit", &limit, "--no-color"])
            .await?;
        Ok(parse_log_lines(&out))
    }

    /// `gateway call health --json`, optionally against a remote endpoint
    pub async fn gateway_health(&self, url: Option<&str>) -> Result<Value, CliError> {
        match url {
            Some(url) => {
                let ws_url = to_ws_url(url);
                self.run_json(&["gateway", "call", "health", "--json", "--url", &ws_url])
                    .await
            }
            None => self.run_json(&["gateway", "call", "health", "--json"]).await,
        }
    }

    /// CLI health plus the cron job list
    ///
    /// Failures are folded into the result instead of being returned: health
    /// becomes `{"error": ...}` and the job list becomes empty.
    pub async fn agent_status(&self) -> Value {
        let (health, crons) = tokio::join!(self.health(), self.cron_list());

        let health = health.unwrap_or_else(|e| json!({ "error": e.to_string() }));
        let cron_jobs = match crons {
            Ok(mut data) => data
                .get_mut("jobs")
                .map(Value::take)
                .filter(Value::is_array)
                .unwrap_or_else(|| json!([])),
            Err(_) => json!([]),
        };

        json!({ "health": health, "cronJobs": cron_jobs })
    }
}

fn parse_log_lines(out: &str) -> Vec<Value> {
    out.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            serde_json::from_str(line)
                .unwrap_or_else(|_| json!({ "type": "parse-error", "raw": line }))
        })
        .collect()
}

fn to_ws_url(url: &str) -> String {
    match url.strip_prefix("http") {
        Some(rest) => format!("ws{}", rest),
        None => url.to_string(),
    }
}
