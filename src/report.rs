use crate::platform::Platform;
use chrono::{Local, SecondsFormat};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricResult<T> {
    Available(T),
    Unavailable { error: String },
}

impl<T> MetricResult<T> {
    pub fn unavailable(reason: impl Display) -> Self {
        let error = reason.to_string();
        let error = if error.trim().is_empty() {
            "unknown error".to_string()
        } else {
            error
        };
        MetricResult::Unavailable { error }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, MetricResult::Available(_))
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            MetricResult::Available(v) => Some(v),
            MetricResult::Unavailable { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            MetricResult::Available(_) => None,
            MetricResult::Unavailable { error } => Some(error),
        }
    }

    pub fn map<U>(&self, f: impl FnOnce(&T) -> U) -> MetricResult<U> {
        match self {
            MetricResult::Available(v) => MetricResult::Available(f(v)),
            MetricResult::Unavailable { error } => MetricResult::Unavailable {
                error: error.clone(),
            },
        }
    }
}

impl<T, E: Display> From<Result<T, E>> for MetricResult<T> {
    fn from(value: Result<T, E>) -> Self {
        match value {
            Ok(v) => MetricResult::Available(v),
            Err(err) => MetricResult::unavailable(err),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CpuMethod {
    LoadAverage,
    Sampled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoadAverage {
    pub one: f64,
    pub five: f64,
    pub fifteen: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CpuUsage {
    pub method: CpuMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_average: Option<LoadAverage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logical_cores: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryUsage {
    pub total_bytes: u64,
    pub available_bytes: u64,
    pub used_bytes: u64,
    pub used_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiskUsage {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_point: Option<String>,
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub free_bytes: u64,
    pub used_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Uptime {
    pub seconds: u64,
    pub days: u64,
    pub hours: u64,
    pub minutes: u64,
    pub human: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkStatus {
    pub reachable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessSample {
    pub pid: u32,
    pub name: String,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub memory_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    pub platform: Platform,
    pub cpu: MetricResult<CpuUsage>,
    pub memory: MetricResult<MemoryUsage>,
    pub disk: MetricResult<DiskUsage>,
    pub uptime: MetricResult<Uptime>,
    pub network: MetricResult<NetworkStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_processes: Option<MetricResult<Vec<ProcessSample>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critical_processes: Option<MetricResult<BTreeMap<String, bool>>>,
}

impl HealthReport {
    #[allow(clippy::too_many_arguments)]
    pub fn assemble(
        platform: Platform,
        hostname: Option<String>,
        cpu: MetricResult<CpuUsage>,
        memory: MetricResult<MemoryUsage>,
        disk: MetricResult<DiskUsage>,
        uptime: MetricResult<Uptime>,
        network: MetricResult<NetworkStatus>,
        top_processes: Option<MetricResult<Vec<ProcessSample>>>,
        critical_processes: Option<MetricResult<BTreeMap<String, bool>>>,
    ) -> Self {
        Self {
            timestamp: now_iso8601(),
            hostname,
            platform,
            cpu,
            memory,
            disk,
            uptime,
            network,
            top_processes,
            critical_processes,
        }
    }

    pub fn unavailable_count(&self) -> usize {
        let mut n = [
            self.cpu.is_available(),
            self.memory.is_available(),
            self.disk.is_available(),
            self.uptime.is_available(),
            self.network.is_available(),
        ]
        .iter()
        .filter(|ok| !**ok)
        .count();
        if matches!(self.top_processes, Some(MetricResult::Unavailable { .. })) {
            n += 1;
        }
        if matches!(
            self.critical_processes,
            Some(MetricResult::Unavailable { .. })
        ) {
            n += 1;
        }
        n
    }
}

pub fn now_iso8601() -> String {
    Local::now().to_rfc3339_opts(SecondsFormat::Secs, false)
}

pub fn percent_of(part: u64, total: u64) -> Option<f64> {
    if total == 0 {
        return None;
    }
    Some(((part as f64 / total as f64) * 100.0).clamp(0.0, 100.0))
}
