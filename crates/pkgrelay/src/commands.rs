// SPDX-FileCopyrightText: 2026 pkgrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `pkgrelay enqueue` and `pkgrelay status`: operational tools working
//! directly against the local database.

use std::io::Read;
use std::path::Path;

use pkgrelay_bus::DeliveryEnvelope;
use pkgrelay_config::model::PkgrelayConfig;
use pkgrelay_core::{Package, PackageEvent, PackageStore, RelayError};
use pkgrelay_storage::queries::queue;
use pkgrelay_storage::{Database, SqlitePackageStore};
use serde::Serialize;

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub package: Package,
    pub events: Vec<PackageEvent>,
}

fn read_input(file: &Path) -> Result<String, RelayError> {
    let mut content = String::new();
    let read = if file == Path::new("-") {
        std::io::stdin().read_to_string(&mut content).map(|_| ())
    } else {
        std::fs::read_to_string(file).map(|c| content = c)
    };
    read.map_err(|e| RelayError::Config(format!("failed to read {}: {e}", file.display())))?;
    Ok(content)
}

/// Validate `payload` as a delivery envelope and push it onto `queue_name`.
pub async fn enqueue_payload(
    db: &Database,
    queue_name: &str,
    payload: &str,
) -> Result<i64, RelayError> {
    DeliveryEnvelope::parse(payload)
        .map_err(|e| RelayError::Config(format!("refusing to enqueue: {e}")))?;
    queue::enqueue(db, queue_name, payload).await
}

/// Runs the `pkgrelay enqueue` command.
pub async fn run_enqueue(
    config: &PkgrelayConfig,
    file: &Path,
    queue_name: Option<&str>,
) -> Result<(), RelayError> {
    let payload = read_input(file)?;
    let queue_name = queue_name.unwrap_or(&config.queue.inbound);
    let db = Database::open_with(&config.storage.database_path, config.storage.wal_mode).await?;

    let id = enqueue_payload(&db, queue_name, &payload).await?;
    println!("enqueued delivery {id} on {queue_name}");
    Ok(())
}

/// Load a package and its events. `NotFound` when the name is unknown.
pub async fn load_report(store: &dyn PackageStore, name: &str) -> Result<StatusReport, RelayError> {
    let package = store
        .find_by_name(name)
        .await?
        .ok_or_else(|| RelayError::NotFound {
            what: format!("package {name}"),
        })?;
    let events = store.list_events(package.id).await?;
    Ok(StatusReport { package, events })
}

/// Render a report for humans.
pub fn format_report(report: &StatusReport) -> String {
    let p = &report.package;
    let mut out = format!(
        "package:     {}\ntype:        {}\nstatus:      {}\ndestination: {}\ncreated:     {}\n",
        p.name, p.package_type, p.status, p.destination_url, p.created_at
    );
    if let Some(err) = &p.error {
        out.push_str(&format!("error:       [{}] {}\n", err.code, err.text));
    }
    out.push_str("events:\n");
    for e in &report.events {
        match &e.description {
            Some(d) => out.push_str(&format!("  {}  {:<10} {d}\n", e.created_at, e.event_type)),
            None => out.push_str(&format!("  {}  {}\n", e.created_at, e.event_type)),
        }
    }
    out
}

/// Runs the `pkgrelay status` command.
pub async fn run_status(config: &PkgrelayConfig, name: &str, json: bool) -> Result<(), RelayError> {
    let store = SqlitePackageStore::open(&config.storage).await?;
    let report = load_report(&store, name).await?;

    if json {
        let text = serde_json::to_string_pretty(&report)
            .map_err(|e| RelayError::Internal(format!("failed to encode status: {e}")))?;
        println!("{text}");
    } else {
        print!("{}", format_report(&report));
    }
    Ok(())
}
