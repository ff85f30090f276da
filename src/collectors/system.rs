use crate::collectors::{settle, CollectError};
use crate::platform::{Family, Platform};
use crate::report::{
    percent_of, CpuMethod, CpuUsage, DiskUsage, LoadAverage, MemoryUsage, MetricResult, Uptime,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use sysinfo::{CpuExt, DiskExt, System, SystemExt};
use tracing::debug;

const CPU_SAMPLE_WINDOW: Duration = Duration::from_millis(250);
const PROC_ROOT: &str = "/proc";

pub fn collect_cpu(platform: Platform, system: &mut System) -> MetricResult<CpuUsage> {
    let result = match platform {
        Platform::Linux => read_proc("loadavg")
            .and_then(|text| parse_loadavg(&text))
            .map(|load| cpu_from_load(load, logical_cores(system))),
        Platform::MacOs => {
            let load = system.load_average();
            Ok(cpu_from_load(
                LoadAverage {
                    one: load.one,
                    five: load.five,
                    fifteen: load.fifteen,
                },
                logical_cores(system),
            ))
        }
        Platform::Windows | Platform::Unknown => sample_cpu(system),
    };
    settle("cpu", result)
}

pub fn collect_memory(platform: Platform, system: &mut System) -> MetricResult<MemoryUsage> {
    let result = match platform {
        Platform::Linux => read_proc("meminfo").and_then(|text| parse_meminfo(&text)),
        _ => {
            system.refresh_memory();
            memory_usage(system.total_memory(), system.available_memory())
        }
    };
    settle("memory", result)
}

pub fn collect_disk(platform: Platform, path: &Path, system: &mut System) -> MetricResult<DiskUsage> {
    settle("disk", disk_usage(platform, path, system))
}

pub fn collect_uptime(platform: Platform, system: &mut System) -> MetricResult<Uptime> {
    let result = match platform {
        Platform::Linux => read_proc("uptime")
            .and_then(|text| parse_uptime(&text))
            .map(uptime_from_secs),
        _ => uptime_from_boot(system.boot_time(), now_unix()).map(uptime_from_secs),
    };
    settle("uptime", result)
}

fn logical_cores(system: &mut System) -> usize {
    system.refresh_cpu();
    system.cpus().len()
}

fn sample_cpu(system: &mut System) -> Result<CpuUsage, CollectError> {
    if !System::IS_SUPPORTED {
        return Err(CollectError::Unsupported("cpu sampling"));
    }
    system.refresh_cpu();
    std::thread::sleep(CPU_SAMPLE_WINDOW);
    system.refresh_cpu();
    let cores = system.cpus().len();
    if cores == 0 {
        return Err(CollectError::NotFound("no cpus reported".to_string()));
    }
    let usage = system.global_cpu_info().cpu_usage() as f64;
    Ok(CpuUsage {
        method: CpuMethod::Sampled,
        usage_percent: Some(clamp_percent(usage)),
        load_average: None,
        logical_cores: Some(cores),
        unit: None,
    })
}

pub fn cpu_from_load(load: LoadAverage, cores: usize) -> CpuUsage {
    if cores == 0 {
        return CpuUsage {
            method: CpuMethod::LoadAverage,
            usage_percent: None,
            load_average: Some(load),
            logical_cores: None,
            unit: Some("load".to_string()),
        };
    }
    let usage = load.one / cores as f64 * 100.0;
    CpuUsage {
        method: CpuMethod::LoadAverage,
        usage_percent: Some(clamp_percent(usage)),
        load_average: Some(load),
        logical_cores: Some(cores),
        unit: None,
    }
}

fn clamp_percent(v: f64) -> f64 {
    if v.is_finite() {
        v.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

pub fn parse_loadavg(text: &str) -> Result<LoadAverage, CollectError> {
    let mut fields = text.split_whitespace().map(|f| f.parse::<f64>());
    let mut next = |name: &str| -> Result<f64, CollectError> {
        match fields.next() {
            Some(Ok(v)) if v.is_finite() && v >= 0.0 => Ok(v),
            Some(_) => Err(CollectError::parse("loadavg", format!("bad {name} field"))),
            None => Err(CollectError::parse("loadavg", format!("missing {name} field"))),
        }
    };
    Ok(LoadAverage {
        one: next("1m")?,
        five: next("5m")?,
        fifteen: next("15m")?,
    })
}

pub fn parse_meminfo(text: &str) -> Result<MemoryUsage, CollectError> {
    let mut total = None;
    let mut available = None;
    let mut free = None;
    let mut buffers = None;
    let mut cached = None;

    for line in text.lines() {
        let Some((key, rest)) = line.split_once(':') else {
            continue;
        };
        let slot = match key.trim() {
            "MemTotal" => &mut total,
            "MemAvailable" => &mut available,
            "MemFree" => &mut free,
            "Buffers" => &mut buffers,
            "Cached" => &mut cached,
            _ => continue,
        };
        let value = rest
            .split_whitespace()
            .next()
            .and_then(|v| v.parse::<u64>().ok())
            .ok_or_else(|| CollectError::parse("meminfo", format!("bad value for {}", key.trim())))?;
        *slot = Some(value.saturating_mul(1024));
    }

    let total = total.ok_or_else(|| CollectError::parse("meminfo", "MemTotal missing"))?;
    let available = match (available, free) {
        (Some(v), _) => v,
        (None, Some(free)) => free
            .saturating_add(buffers.unwrap_or(0))
            .saturating_add(cached.unwrap_or(0)),
        (None, None) => {
            return Err(CollectError::parse("meminfo", "MemAvailable and MemFree missing"))
        }
    };
    memory_usage(total, available)
}

pub fn memory_usage(total: u64, available: u64) -> Result<MemoryUsage, CollectError> {
    let used = total.saturating_sub(available);
    let used_percent = percent_of(used, total)
        .ok_or_else(|| CollectError::parse("memory totals", "total memory is zero"))?;
    Ok(MemoryUsage {
        total_bytes: total,
        available_bytes: available.min(total),
        used_bytes: used,
        used_percent,
    })
}

pub fn parse_uptime(text: &str) -> Result<u64, CollectError> {
    let first = text
        .split_whitespace()
        .next()
        .ok_or_else(|| CollectError::parse("uptime", "empty"))?;
    let secs = first
        .parse::<f64>()
        .map_err(|e| CollectError::parse("uptime", e.to_string()))?;
    if !secs.is_finite() {
        return Err(CollectError::parse("uptime", "not a finite number"));
    }
    Ok(secs.max(0.0) as u64)
}

pub fn uptime_from_boot(boot_unix: u64, now_unix: u64) -> Result<u64, CollectError> {
    if boot_unix == 0 {
        return Err(CollectError::NotFound("boot time unavailable".to_string()));
    }
    Ok(now_unix.saturating_sub(boot_unix))
}

pub fn uptime_from_secs(seconds: u64) -> Uptime {
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3_600;
    let minutes = (seconds % 3_600) / 60;
    let human = if seconds < 60 {
        humantime::format_duration(Duration::from_secs(seconds)).to_string()
    } else {
        humantime::format_duration(Duration::from_secs(seconds - seconds % 60)).to_string()
    };
    Uptime {
        seconds,
        days,
        hours,
        minutes,
        human,
    }
}

#[derive(Debug, Clone)]
pub struct MountSpace {
    pub mount_point: PathBuf,
    pub total_bytes: u64,
    pub available_bytes: u64,
}

fn disk_usage(platform: Platform, path: &Path, system: &mut System) -> Result<DiskUsage, CollectError> {
    if !path.exists() {
        return Err(CollectError::NotFound(format!(
            "path {} does not exist",
            path.display()
        )));
    }
    let canonical = path.canonicalize().map_err(|source| CollectError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let canonical = strip_verbatim_prefix(canonical);

    system.refresh_disks_list();
    system.refresh_disks();
    let mounts: Vec<MountSpace> = system
        .disks()
        .iter()
        .map(|d| MountSpace {
            mount_point: d.mount_point().to_path_buf(),
            total_bytes: d.total_space(),
            available_bytes: d.available_space(),
        })
        .collect();
    debug!(mounts = mounts.len(), path = %canonical.display(), "resolving disk");
    let mount = best_mount(&canonical, &mounts);

    let (total, used, free) = match platform.family() {
        Family::Posix => statvfs_space(&canonical)?,
        Family::Windows | Family::Unknown => {
            let m = mount.ok_or_else(|| {
                CollectError::NotFound(format!(
                    "no mounted filesystem contains {}",
                    canonical.display()
                ))
            })?;
            (
                m.total_bytes,
                m.total_bytes.saturating_sub(m.available_bytes),
                m.available_bytes,
            )
        }
    };

    let used_percent = percent_of(used, total).ok_or_else(|| {
        CollectError::NotFound(format!("filesystem at {} reports zero size", canonical.display()))
    })?;
    Ok(DiskUsage {
        path: path.display().to_string(),
        mount_point: mount.map(|m| m.mount_point.display().to_string()),
        total_bytes: total,
        used_bytes: used,
        free_bytes: free,
        used_percent,
    })
}

pub fn best_mount<'a>(path: &Path, mounts: &'a [MountSpace]) -> Option<&'a MountSpace> {
    mounts
        .iter()
        .filter(|m| path.starts_with(&m.mount_point))
        .max_by_key(|m| m.mount_point.components().count())
}

#[cfg(unix)]
fn statvfs_space(path: &Path) -> Result<(u64, u64, u64), CollectError> {
    use nix::sys::statvfs::statvfs;

    let stats = statvfs(path).map_err(|e| CollectError::Io {
        path: path.display().to_string(),
        source: std::io::Error::from(e),
    })?;
    let frsize = stats.fragment_size() as u64;
    let total = (stats.blocks() as u64).saturating_mul(frsize);
    let free = (stats.blocks_free() as u64).saturating_mul(frsize);
    let avail = (stats.blocks_available() as u64).saturating_mul(frsize);
    Ok((total, total.saturating_sub(free), avail))
}

#[cfg(not(unix))]
fn statvfs_space(_path: &Path) -> Result<(u64, u64, u64), CollectError> {
    Err(CollectError::Unsupported("statvfs"))
}

#[cfg(windows)]
fn strip_verbatim_prefix(path: PathBuf) -> PathBuf {
    let text = path.to_string_lossy();
    match text.strip_prefix(r"\\?\") {
        Some(rest) if !rest.starts_with("UNC\\") => PathBuf::from(rest),
        _ => path,
    }
}

#[cfg(not(windows))]
fn strip_verbatim_prefix(path: PathBuf) -> PathBuf {
    path
}

fn read_proc(name: &str) -> Result<String, CollectError> {
    let path = Path::new(PROC_ROOT).join(name);
    fs::read_to_string(&path).map_err(|source| CollectError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
