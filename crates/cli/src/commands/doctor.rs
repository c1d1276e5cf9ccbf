use serde::Serialize;
use taskbot_core::config::{AppConfig, AssetsConfig, LoadOptions};
use taskbot_core::labels::{CommandTable, LabelCatalog};
use taskbot_db::connect_with_config;

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

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into() }
    }

    fn skipped(name: &'static str) -> Self {
        Self {
            name,
            status: CheckStatus::Skipped,
            details: "skipped because configuration did not load".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

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

fn build_report() -> DoctorReport {
    let checks = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => vec![
            DoctorCheck::pass("config_validation", "configuration loaded and validated"),
            check_assets(&config.assets),
            check_database(&config),
        ],
        Err(error) => vec![
            DoctorCheck::fail("config_validation", error.to_string()),
            DoctorCheck::skipped("assets"),
            DoctorCheck::skipped("database_connectivity"),
        ],
    };

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

/// Both documents must load, and every label the command table translates
/// must exist in the catalog.
fn check_assets(assets: &AssetsConfig) -> DoctorCheck {
    let labels = match LabelCatalog::load(&assets.labels_path) {
        Ok(labels) => labels,
        Err(error) => return DoctorCheck::fail("assets", error.to_string()),
    };
    let commands = match CommandTable::load(&assets.commands_path) {
        Ok(commands) => commands,
        Err(error) => return DoctorCheck::fail("assets", error.to_string()),
    };

    let missing: Vec<&str> =
        commands.label_keys().filter(|label_key| labels.get(label_key).is_none()).collect();
    if !missing.is_empty() {
        return DoctorCheck::fail(
            "assets",
            format!(
                "command table references labels missing from the catalog: {}",
                missing.join(", ")
            ),
        );
    }

    DoctorCheck::pass(
        "assets",
        format!("{} labels, {} translated commands", labels.len(), commands.len()),
    )
}

fn check_database(config: &AppConfig) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck::fail(
                "database_connectivity",
                format!("failed to initialize async runtime: {error}"),
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| format!("failed to connect to database: {error}"))?;

        let (schema_ready,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'session_entry'",
        )
        .fetch_one(&pool)
        .await
        .map_err(|error| format!("failed to inspect schema: {error}"))?;

        pool.close().await;
        Ok::<bool, String>(schema_ready > 0)
    });

    match result {
        Ok(true) => DoctorCheck::pass(
            "database_connectivity",
            format!("connected using `{}`", config.database.url),
        ),
        Ok(false) => DoctorCheck::fail(
            "database_connectivity",
            "connected, but migrations have not been applied (run `taskbot migrate`)",
        ),
        Err(error) => DoctorCheck::fail("database_connectivity", error),
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
