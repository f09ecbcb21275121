//! `ping`: single reachability ping against a host.
//!
//! Unreachability is data, not failure: a dead host, a timed-out ping or a
//! missing `ping` binary all produce a completed result with `alive: false`.

use std::process::Stdio;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use toolchat_core::error::ToolError;
use toolchat_core::tool::{ParamSpec, ToolDescriptor, ToolOutput, TypedTool};
use tracing::{debug, warn};

pub const NAME: &str = "ping";

/// Connectivity data from one ping. Times are milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PingReport {
    pub host: String,
    pub numeric_host: Option<String>,
    pub alive: bool,
    /// Round-trip time of the first reply
    pub time_ms: Option<f64>,
    pub times: Vec<f64>,
    pub min_ms: Option<f64>,
    pub max_ms: Option<f64>,
    pub avg_ms: Option<f64>,
    pub stddev_ms: Option<f64>,
    pub packet_loss_percent: Option<f64>,
    /// Raw ping output or the reason no ping happened
    pub output: String,
}

impl PingReport {
    /// A report for a ping that produced no replies.
    pub fn unreachable(host: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            numeric_host: None,
            alive: false,
            time_ms: None,
            times: Vec::new(),
            min_ms: None,
            max_ms: None,
            avg_ms: None,
            stddev_ms: None,
            packet_loss_percent: Some(100.0),
            output: output.into(),
        }
    }
}

/// The reachability capability.
#[async_trait]
pub trait Pinger: Send + Sync {
    /// Ping `host` once. Must return within the pinger's own time budget.
    async fn ping(&self, host: &str) -> PingReport;
}

/// Runs the operating system's `ping` binary.
pub struct SystemPinger {
    command: String,
    timeout: Duration,
}

impl SystemPinger {
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            timeout,
        }
    }

    fn args(&self, host: &str) -> Vec<String> {
        let secs = self.timeout.as_secs().max(1).to_string();
        if cfg!(target_os = "windows") {
            let ms = self.timeout.as_millis().to_string();
            vec!["-n".into(), "1".into(), "-w".into(), ms, host.into()]
        } else if cfg!(target_os = "macos") {
            vec!["-n".into(), "-c".into(), "1".into(), "-t".into(), secs, host.into()]
        } else {
            vec!["-n".into(), "-c".into(), "1".into(), "-W".into(), secs, host.into()]
        }
    }
}

impl Default for SystemPinger {
    fn default() -> Self {
        Self::new("ping", Duration::from_secs(10))
    }
}

#[async_trait]
impl Pinger for SystemPinger {
    async fn ping(&self, host: &str) -> PingReport {
        debug!(host, command = %self.command, "Pinging host");

        // The binary gets its own deadline; this outer one also covers DNS
        // resolution and process start-up.
        let budget = self.timeout + Duration::from_secs(2);
        let run = Command::new(&self.command)
            .args(self.args(host))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        match tokio::time::timeout(budget, run).await {
            Err(_) => PingReport::unreachable(
                host,
                format!("ping timed out after {}s", budget.as_secs()),
            ),
            Ok(Err(e)) => {
                warn!(command = %self.command, error = %e, "Failed to run ping");
                PingReport::unreachable(host, format!("failed to run {}: {e}", self.command))
            }
            Ok(Ok(output)) => {
                let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
                let stderr = String::from_utf8_lossy(&output.stderr);
                if !stderr.trim().is_empty() {
                    text.push_str(&stderr);
                }
                parse_ping_output(host, &text, output.status.success())
            }
        }
    }
}

static NUMERIC_HOST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(?:PING|Pinging) \S+ [\(\[]([^\)\]]+)[\)\]]").expect("valid regex")
});
static REPLY_TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"time[=<]\s*([\d.]+)\s*ms").expect("valid regex"));
static PACKET_LOSS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([\d.]+)% (?:packet )?loss").expect("valid regex")
});
static UNIX_STATS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:rtt|round-trip) min/avg/max/(?:mdev|stddev) = ([\d.]+)/([\d.]+)/([\d.]+)/([\d.]+)",
    )
    .expect("valid regex")
});
static WINDOWS_STATS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Minimum = (\d+)ms, Maximum = (\d+)ms, Average = (\d+)ms").expect("valid regex")
});

/// Extract connectivity data from `ping` output.
pub fn parse_ping_output(host: &str, output: &str, exit_ok: bool) -> PingReport {
    let number = |caps: &regex::Captures<'_>, i: usize| {
        caps.get(i).and_then(|m| m.as_str().parse::<f64>().ok())
    };

    let times: Vec<f64> = REPLY_TIME
        .captures_iter(output)
        .filter_map(|c| number(&c, 1))
        .collect();

    let packet_loss_percent = PACKET_LOSS.captures(output).and_then(|c| number(&c, 1));

    let (min_ms, avg_ms, max_ms, stddev_ms) = if let Some(c) = UNIX_STATS.captures(output) {
        (number(&c, 1), number(&c, 2), number(&c, 3), number(&c, 4))
    } else if let Some(c) = WINDOWS_STATS.captures(output) {
        (number(&c, 1), number(&c, 3), number(&c, 2), None)
    } else {
        (None, None, None, None)
    };

    // Only a timed echo reply counts; Windows exits 0 with 0% loss when a
    // router answers "Destination host unreachable".
    let alive = !times.is_empty()
        && (exit_ok || packet_loss_percent.is_some_and(|loss| loss < 100.0));

    PingReport {
        host: host.to_string(),
        numeric_host: NUMERIC_HOST
            .captures(output)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string()),
        alive,
        time_ms: times.first().copied(),
        times,
        min_ms,
        max_ms,
        avg_ms,
        stddev_ms,
        packet_loss_percent,
        output: output.to_string(),
    }
}

#[derive(Debug, Deserialize)]
pub struct PingArgs {
    pub host: String,
}

/// Hostnames and IP literals only; nothing `ping` could read as a flag.
fn validate_host(host: &str) -> Result<(), ToolError> {
    if host.is_empty() {
        return Err(ToolError::InvalidArguments("host must not be empty".into()));
    }
    if host.starts_with('-') {
        return Err(ToolError::InvalidArguments(format!(
            "host '{host}' must not start with '-'"
        )));
    }
    if host.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(ToolError::InvalidArguments(format!(
            "host '{host}' contains whitespace or control characters"
        )));
    }
    Ok(())
}

pub struct PingTool {
    pinger: Arc<dyn Pinger>,
}

impl PingTool {
    pub fn new(pinger: Arc<dyn Pinger>) -> Self {
        Self { pinger }
    }
}

impl Default for PingTool {
    fn default() -> Self {
        Self::new(Arc::new(SystemPinger::default()))
    }
}

#[async_trait]
impl TypedTool for PingTool {
    type Args = PingArgs;

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            NAME,
            "ping some host on the internet. Returns connectivity information including whether \
             the host is alive, response time in milliseconds, packet loss percentage, and network \
             statistics (min/max/avg/stddev).",
        )
        .param(ParamSpec::required("host", "hostname or IP address"))
    }

    async fn run(&self, args: PingArgs) -> Result<ToolOutput, ToolError> {
        let host = args.host.trim();
        validate_host(host)?;

        let report = self.pinger.ping(host).await;
        debug!(host, alive = report.alive, "Ping finished");

        let data = serde_json::to_value(&report).map_err(|e| ToolError::ExecutionFailed {
            tool_name: NAME.into(),
            reason: e.to_string(),
        })?;
        Ok(ToolOutput::completed(data.to_string()).with_data(data))
    }
}
