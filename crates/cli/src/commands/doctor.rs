use shopmate_core::catalog::CatalogIndex;
use shopmate_core::config::{AppConfig, LlmProvider, LoadOptions};
use shopmate_index::connect_with_settings;
use serde::Serialize;

use super::block_on;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
pub struct DoctorCheck {
    pub name: &'static str,
    pub status: CheckStatus,
    pub details: String,
}

#[derive(Debug, Serialize)]
pub struct DoctorReport {
    pub overall_status: CheckStatus,
    pub summary: String,
    pub checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report(AppConfig::load(LoadOptions::default()).map_err(|e| e.to_string()));

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

/// Warnings do not fail the report; the server runs degraded without them.
pub fn build_report(config: Result<AppConfig, String>) -> DoctorReport {
    let mut checks = Vec::new();

    match config {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_llm(&config));
            checks.push(check_upstream(&config));
            checks.push(check_search_index(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error,
            });
            for name in ["llm_readiness", "upstream_endpoint", "search_index_connectivity"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let all_pass =
        checks.iter().all(|check| matches!(check.status, CheckStatus::Pass | CheckStatus::Warn));
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_llm(config: &AppConfig) -> DoctorCheck {
    let details = match config.llm.provider {
        LlmProvider::OpenAi => format!("openai model `{}` with api key configured", config.llm.model),
        LlmProvider::Ollama => format!(
            "ollama model `{}` at `{}`",
            config.llm.model,
            config.llm.base_url.as_deref().unwrap_or_default()
        ),
    };
    DoctorCheck { name: "llm_readiness", status: CheckStatus::Pass, details }
}

fn check_upstream(config: &AppConfig) -> DoctorCheck {
    match config.upstream.endpoint.as_deref().filter(|endpoint| !endpoint.trim().is_empty()) {
        Some(_) => DoctorCheck {
            name: "upstream_endpoint",
            status: CheckStatus::Pass,
            details: "catalog endpoint configured".to_string(),
        },
        None => DoctorCheck {
            name: "upstream_endpoint",
            status: CheckStatus::Warn,
            details: "no catalog endpoint configured; sync and refresh will fail".to_string(),
        },
    }
}

fn check_search_index(config: &AppConfig) -> DoctorCheck {
    let ping = block_on(async {
        let index = connect_with_settings(&config.index.url, config.index.timeout_secs)
            .map_err(|error| error.to_string())?;
        index.ping().await.map_err(|error| error.to_string())
    });

    match ping {
        Ok(Ok(())) => DoctorCheck {
            name: "search_index_connectivity",
            status: CheckStatus::Pass,
            details: format!("cluster health reachable at `{}`", config.index.url),
        },
        Ok(Err(error)) => DoctorCheck {
            name: "search_index_connectivity",
            status: CheckStatus::Fail,
            details: format!("search index unreachable: {error}"),
        },
        Err(error) => DoctorCheck {
            name: "search_index_connectivity",
            status: CheckStatus::Fail,
            details: format!("{error:#}"),
        },
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Warn => "warn",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
