use std::time::Instant;

use hoops_agent::PromptRenderer;
use hoops_core::config::{AppConfig, LlmProvider, LoadOptions};
use hoops_core::domain::{AnalysisRequest, MediaDataUri};
use serde::Serialize;

use crate::commands::{block_on, build_runtime, correlation_id, CommandResult};

const EXIT_DOCTOR_FAILED: u8 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    elapsed_ms: u64,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Fail { EXIT_DOCTOR_FAILED } else { 0 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let mut checks = vec![check_prompt_templates()];

    let started = Instant::now();
    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                elapsed_ms: elapsed_ms(started),
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_model_readiness(&config));
            checks.push(check_fixture_round_trip(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                elapsed_ms: elapsed_ms(started),
                details: error.to_string(),
            });
            checks.push(skipped("model_readiness"));
            checks.push(skipped("fixture_round_trip"));
        }
    }

    let any_failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let overall_status = if any_failed { CheckStatus::Fail } else { CheckStatus::Pass };
    let summary = if any_failed {
        "doctor: one or more readiness checks failed".to_string()
    } else {
        "doctor: all readiness checks passed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_prompt_templates() -> DoctorCheck {
    let started = Instant::now();
    match PromptRenderer::new() {
        Ok(_) => DoctorCheck {
            name: "prompt_templates",
            status: CheckStatus::Pass,
            elapsed_ms: elapsed_ms(started),
            details: "all prompt templates compiled".to_string(),
        },
        Err(error) => DoctorCheck {
            name: "prompt_templates",
            status: CheckStatus::Fail,
            elapsed_ms: elapsed_ms(started),
            details: error.to_string(),
        },
    }
}

fn check_model_readiness(config: &AppConfig) -> DoctorCheck {
    let started = Instant::now();
    let (status, details) = match config.llm.provider {
        LlmProvider::Gemini => match build_runtime(config) {
            Ok(runtime) => (
                CheckStatus::Pass,
                format!(
                    "gemini model `{}` configured at {} (key present)",
                    runtime.model_name(),
                    config.llm.base_url
                ),
            ),
            Err(error) => (CheckStatus::Fail, error),
        },
        LlmProvider::Fixture => match config.llm.fixture_path.as_deref() {
            Some(path) if path.is_file() => {
                (CheckStatus::Pass, format!("fixture `{}` is readable", path.display()))
            }
            Some(path) => (CheckStatus::Fail, format!("fixture `{}` does not exist", path.display())),
            None => (CheckStatus::Fail, "llm.fixture_path is not set".to_string()),
        },
    };

    DoctorCheck { name: "model_readiness", status, elapsed_ms: elapsed_ms(started), details }
}

/// Runs a synthetic clip through the full orchestrator when a fixture is
/// configured. Gemini is never called from here.
fn check_fixture_round_trip(config: &AppConfig) -> DoctorCheck {
    if config.llm.provider != LlmProvider::Fixture {
        return DoctorCheck {
            name: "fixture_round_trip",
            status: CheckStatus::Skipped,
            elapsed_ms: 0,
            details: "only runs with the fixture provider".to_string(),
        };
    }

    let started = Instant::now();
    let result = build_runtime(config).and_then(|runtime| {
        let clip = MediaDataUri::encode("video/mp4", b"doctor").map_err(|error| error.to_string())?;
        let request = AnalysisRequest::new(clip.to_uri());
        let variant = config.analysis.variant;
        block_on(runtime.analyze_variant(request, variant, &correlation_id("doctor")))
            .map_err(|error| error.to_string())?
            .map_err(|error| error.to_string())
    });

    match result {
        Ok(result) => DoctorCheck {
            name: "fixture_round_trip",
            status: CheckStatus::Pass,
            elapsed_ms: elapsed_ms(started),
            details: format!(
                "{} variant accepted fixture output ({} baskets)",
                config.analysis.variant,
                result.number_of_baskets()
            ),
        },
        Err(error) => DoctorCheck {
            name: "fixture_round_trip",
            status: CheckStatus::Fail,
            elapsed_ms: elapsed_ms(started),
            details: error,
        },
    }
}

fn skipped(name: &'static str) -> DoctorCheck {
    DoctorCheck {
        name,
        status: CheckStatus::Skipped,
        elapsed_ms: 0,
        details: "skipped because configuration did not load".to_string(),
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {} ({}ms): {}", check.name, check.elapsed_ms, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
