use adpilot_core::config::{AppConfig, LlmProvider, LoadOptions};
use adpilot_db::{connect_with_config, migrations};
use secrecy::ExposeSecret;
use serde::Serialize;

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
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

const DEPENDENT_CHECKS: [&str; 3] =
    ["google_ads_credentials", "llm_credentials", "database_connectivity"];

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\
                 \"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_google_ads(&config));
            checks.push(check_llm(&config));
            checks.push(check_database_connectivity(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in DEPENDENT_CHECKS {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_google_ads(config: &AppConfig) -> DoctorCheck {
    let google_ads = &config.google_ads;
    let has_tokens = !google_ads.developer_token.expose_secret().trim().is_empty()
        && !google_ads.access_token.expose_secret().trim().is_empty();

    if !has_tokens {
        return DoctorCheck {
            name: "google_ads_credentials",
            status: CheckStatus::Fail,
            details: "developer token and access token are both required".to_string(),
        };
    }

    let login = match &google_ads.login_customer_id {
        Some(login_customer_id) => format!(", login customer {login_customer_id}"),
        None => String::new(),
    };
    DoctorCheck {
        name: "google_ads_credentials",
        status: CheckStatus::Pass,
        details: format!("tokens present for {}{login}", google_ads.endpoint()),
    }
}

fn check_llm(config: &AppConfig) -> DoctorCheck {
    let llm = &config.llm;
    let details = match llm.provider {
        LlmProvider::Gemini => format!("gemini model `{}` with api key", llm.model),
        LlmProvider::VertexAi => format!(
            "vertex_ai model `{}` in project `{}` ({})",
            llm.model,
            llm.project.as_deref().unwrap_or_default(),
            llm.location
        ),
    };
    DoctorCheck { name: "llm_credentials", status: CheckStatus::Pass, details }
}

fn check_database_connectivity(config: &AppConfig) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| format!("failed to connect to database: {error}"))?;
        let migrated = migrations::run_pending(&pool)
            .await
            .map_err(|error| format!("connected but migrations failed: {error}"));
        pool.close().await;
        migrated
    });

    match result {
        Ok(()) => DoctorCheck {
            name: "database_connectivity",
            status: CheckStatus::Pass,
            details: format!("connected using `{}`", config.database.url),
        },
        Err(error) => {
            DoctorCheck { name: "database_connectivity", status: CheckStatus::Fail, details: error }
        }
    }
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
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
