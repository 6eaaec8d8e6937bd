//! Host and runtime detection command

use anyhow::Result;
use colored::Colorize;
use kindmgr_lib::kind::{advise, format_network_advice, NetworkAdvice};
use kindmgr_lib::RuntimeInfo;
use serde::Serialize;
use tabled::Tabled;

use crate::output::{print_json, print_table, print_warning, yes_no, OutputFormat};
use crate::session::Session;

#[derive(Tabled)]
struct FieldRow {
    #[tabled(rename = "Field")]
    field: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

impl FieldRow {
    fn new(field: &'static str, value: impl Into<String>) -> Self {
        Self {
            field,
            value: value.into(),
        }
    }
}

#[derive(Serialize)]
struct DetectReport<'a> {
    #[serde(flatten)]
    runtime: &'a RuntimeInfo,
    network_advice: &'a NetworkAdvice,
}

/// Detect the environment and print it
pub async fn detect(session: &Session, format: OutputFormat) -> Result<()> {
    let info = session.detect().await;
    let advice = advise(&info);

    match format {
        OutputFormat::Json => print_json(&DetectReport {
            runtime: &info,
            network_advice: &advice,
        })?,
        OutputFormat::Table => {
            println!("{}", "Environment".bold());
            print_table(&environment_rows(&info), "");

            if !info.available {
                print_warning(&info.error);
            }

            println!();
            println!("{}", "Networking".bold());
            println!("{}", format_network_advice(&advice));
        }
    }

    Ok(())
}

fn environment_rows(info: &RuntimeInfo) -> Vec<FieldRow> {
    vec![
        FieldRow::new("OS", info.os.os.as_str()),
        FieldRow::new("Architecture", info.os.arch.as_str()),
        FieldRow::new("Platform", info.os.platform.as_str()),
        FieldRow::new("Runtime", info.runtime.to_string()),
        FieldRow::new("Backend", info.backend.to_string()),
        FieldRow::new("Version", info.version.as_str()),
        FieldRow::new("Socket", info.socket_path.as_str()),
        FieldRow::new("Available", yes_no(info.available)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use kindmgr_lib::{OsInfo, RuntimeKind};

    #[test]
    fn test_environment_rows_cover_runtime() {
        colored::control::set_override(false);
        let info = RuntimeInfo::for_runtime(RuntimeKind::Podman, OsInfo::for_platform("linux", "amd64"));
        let rows = environment_rows(&info);

        let runtime = rows.iter().find(|r| r.field == "Runtime").unwrap();
        assert_eq!(runtime.value, "podman");
        let available = rows.iter().find(|r| r.field == "Available").unwrap();
        assert_eq!(available.value, "yes");
    }

    #[test]
    fn test_report_flattens_runtime() {
        let info = RuntimeInfo::unavailable(OsInfo::for_platform("darwin", "arm64"));
        let advice = advise(&info);
        let value = serde_json::to_value(DetectReport {
            runtime: &info,
            network_advice: &advice,
        })
        .unwrap();

        assert_eq!(value["available"], false);
        assert_eq!(value["os"]["os"], "darwin");
        assert!(value["network_advice"]["listen_address"].is_string());
    }
}
