use crate::config::OutputFormat;
use crate::report::{HealthReport, MetricResult};
use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to create {path}: {source}")]
    Create { path: String, source: io::Error },
    #[error("failed to write {path}: {source}")]
    Write { path: String, source: io::Error },
    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to replace {path}: {source}")]
    Persist { path: String, source: io::Error },
}

pub fn render(report: &HealthReport, format: OutputFormat) -> Result<String, SinkError> {
    match format {
        OutputFormat::Json => {
            let mut text = serde_json::to_string_pretty(report)?;
            text.push('\n');
            Ok(text)
        }
        OutputFormat::Text => Ok(render_text(report)),
    }
}

pub fn emit(report: &HealthReport, format: OutputFormat, path: Option<&Path>) -> Result<(), SinkError> {
    let body = render(report, format)?;
    match path {
        Some(path) => replace_file(path, body.as_bytes()),
        None => {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            lock.write_all(body.as_bytes())
                .and_then(|_| lock.flush())
                .map_err(|source| SinkError::Write {
                    path: "<stdout>".to_string(),
                    source,
                })
        }
    }
}

// Writes a sibling temp file and renames it over the target, so a failed
// write never leaves a truncated file behind. Symlinks are followed and the
// target keeps its mode and owner.
pub(crate) fn replace_file(path: &Path, body: &[u8]) -> Result<(), SinkError> {
    let shown = path.display().to_string();
    let target = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let existing = fs::metadata(&target).ok();
    let dir = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let mut tmp = NamedTempFile::new_in(&dir).map_err(|source| SinkError::Create {
        path: shown.clone(),
        source,
    })?;
    let write_err = |source| SinkError::Write {
        path: shown.clone(),
        source,
    };
    if let Some(perms) = existing
        .as_ref()
        .map(|meta| meta.permissions())
        .or_else(fresh_permissions)
    {
        tmp.as_file().set_permissions(perms).map_err(write_err)?;
    }
    if let Some(meta) = &existing {
        keep_owner(tmp.as_file(), meta);
    }
    tmp.write_all(body)
        .and_then(|_| tmp.flush())
        .map_err(write_err)?;
    tmp.persist(&target).map_err(|err| SinkError::Persist {
        path: shown.clone(),
        source: err.error,
    })?;
    Ok(())
}

#[cfg(unix)]
fn fresh_permissions() -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn fresh_permissions() -> Option<fs::Permissions> {
    None
}

#[cfg(unix)]
fn keep_owner(file: &File, meta: &fs::Metadata) {
    use std::os::unix::fs::{fchown, MetadataExt};
    if let Err(err) = fchown(file, Some(meta.uid()), Some(meta.gid())) {
        debug!(error = %err, "could not carry over file owner");
    }
}

#[cfg(not(unix))]
fn keep_owner(_file: &File, _meta: &fs::Metadata) {}

pub fn render_text(report: &HealthReport) -> String {
    let mut out = String::new();
    let host = report.hostname.as_deref().unwrap_or("unknown-host");
    let _ = writeln!(out, "[{}] {} ({})", report.timestamp, host, report.platform);

    let _ = writeln!(
        out,
        "cpu: {}",
        describe(&report.cpu, |c| match (c.usage_percent, &c.load_average) {
            (Some(pct), Some(load)) => format!("{pct:.1}% (load {:.2})", load.one),
            (Some(pct), None) => format!("{pct:.1}%"),
            (None, Some(load)) => format!("{:.2} load", load.one),
            (None, None) => "n/a".to_string(),
        })
    );
    let _ = writeln!(
        out,
        "memory: {}",
        describe(&report.memory, |m| format!(
            "{} / {} MB ({:.1}%)",
            m.used_bytes / MIB,
            m.total_bytes / MIB,
            m.used_percent
        ))
    );
    let _ = writeln!(
        out,
        "disk: {}",
        describe(&report.disk, |d| format!(
            "{} / {} GB ({:.1}%) on {}",
            d.used_bytes / GIB,
            d.total_bytes / GIB,
            d.used_percent,
            d.path
        ))
    );
    let _ = writeln!(out, "uptime: {}", describe(&report.uptime, |u| u.human.clone()));
    let _ = writeln!(
        out,
        "network: {}",
        describe(&report.network, |n| match (&n.endpoint, n.latency_ms) {
            (Some(ep), Some(ms)) if n.reachable => format!("UP via {ep} ({ms} ms)"),
            _ if n.reachable => "UP".to_string(),
            _ => "DOWN".to_string(),
        })
    );
    if let Some(top) = &report.top_processes {
        let _ = writeln!(
            out,
            "top_processes: {}",
            describe(top, |list| {
                if list.is_empty() {
                    return "none".to_string();
                }
                list.iter()
                    .map(|p| {
                        format!(
                            "{}[{}] cpu {:.1}% mem {:.1}%",
                            p.name, p.pid, p.cpu_percent, p.memory_percent
                        )
                    })
                    .collect::<Vec<_>>()
                    .join(", ")
            })
        );
    }
    if let Some(critical) = &report.critical_processes {
        let _ = writeln!(
            out,
            "critical_processes: {}",
            describe(critical, |map| {
                if map.is_empty() {
                    return "none".to_string();
                }
                map.iter()
                    .map(|(name, up)| {
                        format!("{name}={}", if *up { "RUNNING" } else { "NOT_RUNNING" })
                    })
                    .collect::<Vec<_>>()
                    .join(", ")
            })
        );
    }
    out.push('\n');
    out
}

const MIB: u64 = 1024 * 1024;
const GIB: u64 = 1024 * 1024 * 1024;

fn describe<T>(metric: &MetricResult<T>, f: impl FnOnce(&T) -> String) -> String {
    match metric.value() {
        Some(v) => f(v),
        None => format!("unavailable ({})", metric.error().unwrap_or_default()),
    }
}
