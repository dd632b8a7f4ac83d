//! `pharmguard health`: can we submit an analysis, and can we save its JSON?

use std::path::Path;
use std::time::{Duration, Instant};

use reqwest::Method;
use reqwest::header::ALLOW;
use serde::Serialize;

use crate::config::Settings;
use crate::error::PharmGuardError;
use crate::utils::download::write_new;

const CHECK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Ok { detail: String },
    Failed { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthCheck {
    pub name: &'static str,
    pub target: String,
    #[serde(flatten)]
    pub outcome: Outcome,
    pub elapsed_ms: u128,
}

impl HealthCheck {
    fn finish(name: &'static str, target: String, started: Instant, outcome: Outcome) -> Self {
        Self {
            name,
            target,
            outcome,
            elapsed_ms: started.elapsed().as_millis(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.outcome, Outcome::Ok { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub healthy: bool,
    pub checks: Vec<HealthCheck>,
}

impl HealthReport {
    fn new(checks: Vec<HealthCheck>) -> Self {
        Self {
            healthy: checks.iter().all(HealthCheck::is_ok),
            checks,
        }
    }

    pub fn to_markdown(&self) -> String {
        let mut out = String::from("# PharmGuard Health\n\n");
        for check in &self.checks {
            let (mark, text) = match &check.outcome {
                Outcome::Ok { detail } => ("ok", detail),
                Outcome::Failed { reason } => ("FAIL", reason),
            };
            out.push_str(&format!(
                "- [{mark}] {}: {} ({text}, {}ms)\n",
                check.name, check.target, check.elapsed_ms
            ));
        }
        out.push_str(if self.healthy {
            "\nReady to submit analyses.\n"
        } else {
            "\nNot ready: fix the failed checks above.\n"
        });
        out
    }
}

/// Asks the analysis endpoint which methods it serves without uploading anything.
async fn check_analysis_endpoint(client: &reqwest::Client, url: String) -> HealthCheck {
    let started = Instant::now();
    let outcome = match client.request(Method::OPTIONS, &url).send().await {
        Ok(resp) if !resp.status().is_success() => Outcome::Failed {
            reason: format!("HTTP {}", resp.status().as_u16()),
        },
        Ok(resp) => match resp.headers().get(ALLOW).and_then(|v| v.to_str().ok()) {
            Some(allow) if !allow.split(',').any(|m| m.trim().eq_ignore_ascii_case("POST")) => {
                Outcome::Failed {
                    reason: format!("POST not allowed (Allow: {allow})"),
                }
            }
            Some(_) => Outcome::Ok {
                detail: "accepts POST".into(),
            },
            None => Outcome::Ok {
                detail: "reachable".into(),
            },
        },
        Err(err) if err.is_timeout() => Outcome::Failed {
            reason: "timed out".into(),
        },
        Err(err) if err.is_connect() => Outcome::Failed {
            reason: "connection refused".into(),
        },
        Err(err) => Outcome::Failed {
            reason: err.to_string(),
        },
    };
    HealthCheck::finish("Analysis endpoint", url, started, outcome)
}

async fn check_download_dir(dir: &Path) -> HealthCheck {
    let started = Instant::now();
    let marker = dir.join(format!(".pharmguard-health-{}.json", std::process::id()));
    let written = match write_new(&marker, b"{}").await {
        Ok(()) => tokio::fs::remove_file(&marker).await.map_err(PharmGuardError::from),
        Err(err) => Err(err),
    };
    let outcome = match written {
        Ok(()) => Outcome::Ok {
            detail: "writable".into(),
        },
        Err(err) => Outcome::Failed {
            reason: err.to_string(),
        },
    };
    HealthCheck::finish("Download dir", dir.display().to_string(), started, outcome)
}

/// Runs both checks concurrently. Failed checks are reported, not returned as errors.
///
/// # Errors
///
/// Returns an error when the HTTP client cannot be created.
pub async fn check(settings: &Settings) -> Result<HealthReport, PharmGuardError> {
    let mut quick = settings.clone();
    quick.timeout = Some(settings.timeout.map_or(CHECK_TIMEOUT, |t| t.min(CHECK_TIMEOUT)));
    let client = crate::sources::http_client(&quick)?;
    let download_dir = super::resolve_download_dir(settings, None);

    let (endpoint, downloads) = tokio::join!(
        check_analysis_endpoint(&client, settings.endpoint("api/analysis")),
        check_download_dir(&download_dir),
    );
    Ok(HealthReport::new(vec![endpoint, downloads]))
}
