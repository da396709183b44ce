use crate::config::EngineConfig;
use crate::executor::OperationCountRunner;
use crate::executor::fallback::{read_memory_traffic, read_operation_count};
use crate::executor::helpers::command::CommandBuilder;
use crate::executor::helpers::privilege::Privilege;
use crate::executor::helpers::run_captured::run_captured;
use crate::prelude::*;
use console::style;
use roofline_shared::units::{format_bytes, format_count};
use std::rc::Rc;
use std::time::Duration;
use tabled::settings::Style;
use tabled::{Table, Tabled};

const VERSION_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Tabled)]
struct CheckRow {
    #[tabled(rename = "Check")]
    name: &'static str,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Details")]
    details: String,
}

impl CheckRow {
    fn new(name: &'static str, ok: bool, details: impl Into<String>) -> Self {
        let status = if ok {
            style("ok").green().to_string()
        } else {
            style("missing").red().to_string()
        };
        Self {
            name,
            status,
            details: details.into(),
        }
    }

    fn info(name: &'static str, details: impl Into<String>) -> Self {
        Self {
            name,
            status: style("info").dim().to_string(),
            details: details.into(),
        }
    }
}

async fn check_build_tool(config: &EngineConfig) -> CheckRow {
    let mut cmd = CommandBuilder::new(&config.build_tool);
    cmd.arg("--version");
    match run_captured(cmd, Some(VERSION_PROBE_TIMEOUT)).await {
        Ok(run) if run.status.success() => {
            let version = run.stdout.lines().next().unwrap_or_default().trim().to_string();
            CheckRow::new("Build tool", true, version)
        }
        Ok(run) => CheckRow::new("Build tool", false, run.failure_reason()),
        Err(err) => CheckRow::new("Build tool", false, err.to_string()),
    }
}

fn check_file(name: &'static str, path: &std::path::Path, dir: bool) -> CheckRow {
    let ok = if dir { path.is_dir() } else { path.is_file() };
    CheckRow::new(name, ok, path.display().to_string())
}

/// Report which measurement channels can run on this machine, and what the persisted logs
/// currently hold.
pub async fn run(config: EngineConfig) -> Result<()> {
    let config = Rc::new(config);
    let mut rows = vec![
        check_file("Repository root", &config.repo_root, true),
        check_file("Source directory", &config.repo_root.join(&config.source_dir), true),
        check_build_tool(&config).await,
    ];

    let privilege = Privilege::probe(config.privilege).await;
    rows.push(match &privilege {
        Ok(privilege) => CheckRow::new("Privilege", true, format!("{privilege:?}")),
        Err(reason) => CheckRow::new("Privilege", false, reason.clone()),
    });
    rows.push(check_file("Instrumentation tool", &config.pin_path, false));
    rows.push(check_file("Instrumentation plugin", &config.pintool_path, false));

    let memory_log = config.memory_traffic_log_path();
    rows.push(CheckRow::info(
        "Memory traffic log",
        match read_memory_traffic(&memory_log) {
            Some(traffic) => format!(
                "{}: {}",
                memory_log.display(),
                format_bytes(traffic.total_bytes)
            ),
            None => format!("{}: nothing usable", memory_log.display()),
        },
    ));
    let ops_log = config.operation_count_log_path();
    rows.push(CheckRow::info(
        "Operation count log",
        match read_operation_count(&ops_log) {
            Some(count) => format!("{}: {} ops", ops_log.display(), format_count(count.total)),
            None => format!("{}: nothing usable", ops_log.display()),
        },
    ));

    let mut table = Table::new(&rows);
    table.with(Style::rounded());
    println!("{table}");

    let memory_available = privilege.is_ok();
    let operations_available =
        memory_available && OperationCountRunner::new(config.clone()).missing_tooling().is_none();
    for (stage, available) in [
        ("latency", true),
        ("memory traffic", memory_available),
        ("operation count", operations_available),
    ] {
        if available {
            info!("The {stage} stage is available");
        } else {
            warn!("The {stage} stage is unavailable");
        }
    }
    Ok(())
}
