//! Registry credential and mirror commands

use anyhow::{bail, Result};
use colored::Colorize;
use kindmgr_lib::registry::{
    apply_mirror_config, find_credentials, generate_mirror_config, CredentialInfo, MirrorConfig,
    RegistryOverride,
};
use serde_json::json;
use tabled::Tabled;
use tracing::warn;

use crate::output::{
    color_status, print_info, print_json, print_success, print_table, print_warning,
    yes_no, OutputFormat,
};
use crate::session::Session;

/// Row for the registries table
#[derive(Tabled)]
struct RegistryRow {
    #[tabled(rename = "Registry")]
    registry: String,
    #[tabled(rename = "Credential helper")]
    helper: String,
}

/// Row for a planned node command
#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "Nodes")]
    nodes: String,
    #[tabled(rename = "Step")]
    description: String,
}

/// Row for an applied node command
#[derive(Tabled)]
struct ResultRow {
    #[tabled(rename = "Result")]
    outcome: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

pub struct MirrorOptions {
    pub include_credentials: bool,
    pub dry_run: bool,
}

/// Parse `REGISTRY=MIRROR` pairs
pub fn parse_overrides(pairs: &[String]) -> Result<Vec<RegistryOverride>> {
    pairs
        .iter()
        .map(|pair| match pair.split_once('=') {
            Some((original, mirror)) if !original.is_empty() && !mirror.is_empty() => {
                Ok(RegistryOverride::new(original.trim(), mirror.trim()))
            }
            _ => bail!("invalid mirror {:?}: expected REGISTRY=MIRROR", pair),
        })
        .collect()
}

/// Locate host registry credentials
pub async fn credentials(session: &Session, format: OutputFormat) -> Result<()> {
    let runtime = session.detect().await;
    let info = find_credentials(&runtime, session.host())?;

    match format {
        OutputFormat::Json => print_json(&info)?,
        OutputFormat::Table => print_credentials(&info),
    }
    Ok(())
}

fn print_credentials(info: &CredentialInfo) {
    println!("{}", "Registry Credentials".bold());
    println!("{}", "=".repeat(50));
    println!("File:          {}", info.file_path.display().to_string().cyan());
    println!("Source:        {}", info.source);
    println!("Inline auth:   {}", yes_no(info.inline_auth));
    println!("Mount path:    {}", info.mount_path);
    if !info.cred_store.is_empty() {
        println!("Credential store: {}", info.cred_store);
    }
    println!();

    print_table(&registry_rows(info), "No registries configured");
    if !info.notes.is_empty() {
        print_info(&info.notes);
    }
}

fn registry_rows(info: &CredentialInfo) -> Vec<RegistryRow> {
    info.registries
        .iter()
        .map(|registry| RegistryRow {
            registry: registry.clone(),
            helper: info
                .cred_helpers
                .get(registry)
                .cloned()
                .unwrap_or_else(|| "-".to_string()),
        })
        .collect()
}

/// Configure registry mirrors on a running cluster
pub async fn mirrors(
    session: &Session,
    cluster: &str,
    overrides: &[RegistryOverride],
    options: MirrorOptions,
    format: OutputFormat,
) -> Result<()> {
    let manager = session.manager().await;

    let credentials = if options.include_credentials {
        match find_credentials(manager.runtime(), session.host()) {
            Ok(info) => Some(info),
            Err(e) => {
                warn!(error = %e, "Credential discovery failed");
                print_warning(&format!("Continuing without credentials: {}", e));
                None
            }
        }
    } else {
        None
    };

    let config = generate_mirror_config(overrides, credentials.as_ref())?;

    if options.dry_run {
        match format {
            OutputFormat::Json => print_json(&config)?,
            OutputFormat::Table => print_plan(cluster, &config),
        }
        return Ok(());
    }

    let results = apply_mirror_config(&manager, cluster, &config).await?;
    let failures = results.iter().filter(|r| r.starts_with("FAILED")).count();

    match format {
        OutputFormat::Json => print_json(&json!({
            "cluster": cluster,
            "results": results,
            "failures": failures,
        }))?,
        OutputFormat::Table => {
            print_table(&result_rows(&results), "No commands were run");
            if failures == 0 {
                print_success(&format!("Registry mirrors configured on {}", cluster.cyan()));
            }
        }
    }

    if failures > 0 {
        bail!("{} mirror step(s) failed on cluster {}", failures, cluster);
    }
    Ok(())
}

fn print_plan(cluster: &str, config: &MirrorConfig) {
    println!("Planned steps for cluster {}:", cluster.cyan());
    let rows: Vec<PlanRow> = config
        .post_create_commands
        .iter()
        .map(|c| PlanRow {
            nodes: c.node_selector.as_str().to_string(),
            description: c.description.clone(),
        })
        .collect();
    print_table(&rows, "No steps");
    print_info("containerd is restarted on every node afterwards");
}

fn result_rows(results: &[String]) -> Vec<ResultRow> {
    results
        .iter()
        .map(|line| {
            let (outcome, detail) = line.split_once(' ').unwrap_or((line.as_str(), ""));
            ResultRow {
                outcome: color_status(outcome),
                detail: detail.to_string(),
            }
        })
        .collect()
}
