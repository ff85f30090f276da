use crate::collectors::processes::SortKey;
use crate::platform::Platform;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub disk_path: Option<PathBuf>,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub processes: ProcessConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Text,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogConfig {
    #[serde(default = "default_log_enabled")]
    pub enabled: bool,
    #[serde(default = "default_log_path")]
    pub path: PathBuf,
    #[serde(default = "default_log_max_lines")]
    pub max_lines: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
    #[serde(default = "default_network_enabled")]
    pub enabled: bool,
    #[serde(default = "default_network_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_tcp_endpoints")]
    pub tcp_endpoints: Vec<TcpEndpointConfig>,
    #[serde(default)]
    pub http_endpoints: Vec<HttpEndpointConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TcpEndpointConfig {
    pub name: String,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpEndpointConfig {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProcessConfig {
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    #[serde(default)]
    pub top_by: SortKey,
    #[serde(default = "default_critical_enabled")]
    pub critical_enabled: bool,
    #[serde(default)]
    pub critical: Option<Vec<String>>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_log_enabled(),
            path: default_log_path(),
            max_lines: default_log_max_lines(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            enabled: default_network_enabled(),
            timeout_ms: default_network_timeout_ms(),
            tcp_endpoints: default_tcp_endpoints(),
            http_endpoints: Vec::new(),
        }
    }
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
            top_by: SortKey::default(),
            critical_enabled: default_critical_enabled(),
            critical: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse YAML in {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("invalid configuration: {0}")]
    Validation(String),
}

impl Config {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let path_display = path_ref.display().to_string();
        let text = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_display.clone(),
            source,
        })?;

        serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path_display,
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.log.enabled {
            if self.log.max_lines < 1 {
                return Err(ConfigError::Validation(
                    "log.max_lines must be >= 1".to_string(),
                ));
            }
            if self.log.path.as_os_str().is_empty() {
                return Err(ConfigError::Validation(
                    "log.path must not be empty".to_string(),
                ));
            }
        }
        if let Some(path) = &self.output.path {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::Validation(
                    "output.path must not be empty".to_string(),
                ));
            }
        }

        validate_network(&self.network)?;
        validate_critical(&self.processes)?;

        Ok(())
    }

    pub fn disk_path(&self, platform: Platform) -> PathBuf {
        self.disk_path
            .clone()
            .unwrap_or_else(|| platform.default_disk_path())
    }

    pub fn critical_names(&self, platform: Platform) -> Vec<String> {
        self.processes
            .critical
            .clone()
            .unwrap_or_else(|| platform.default_critical_processes())
    }

    pub fn example_yaml() -> &'static str {
        include_str!("../config.yaml.example")
    }
}

fn validate_network(cfg: &NetworkConfig) -> Result<(), ConfigError> {
    if !cfg.enabled {
        return Ok(());
    }
    if cfg.timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "network.timeout_ms must be > 0".to_string(),
        ));
    }
    if cfg.tcp_endpoints.is_empty() && cfg.http_endpoints.is_empty() {
        return Err(ConfigError::Validation(
            "network check is enabled but no endpoints are configured".to_string(),
        ));
    }

    let mut names = HashSet::new();
    for endpoint in &cfg.tcp_endpoints {
        if endpoint.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "network.tcp_endpoints[*].name must not be empty".to_string(),
            ));
        }
        if !names.insert(endpoint.name.clone()) {
            return Err(ConfigError::Validation(format!(
                "endpoint name '{}' must be unique",
                endpoint.name
            )));
        }
        if endpoint.host.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "tcp endpoint '{}' host must not be empty",
                endpoint.name
            )));
        }
        if endpoint.port == 0 {
            return Err(ConfigError::Validation(format!(
                "tcp endpoint '{}' port must be in 1..65535",
                endpoint.name
            )));
        }
    }
    for endpoint in &cfg.http_endpoints {
        if endpoint.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "network.http_endpoints[*].name must not be empty".to_string(),
            ));
        }
        if !names.insert(endpoint.name.clone()) {
            return Err(ConfigError::Validation(format!(
                "endpoint name '{}' must be unique",
                endpoint.name
            )));
        }
        if endpoint.url.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "http endpoint '{}' url must not be empty",
                endpoint.name
            )));
        }
    }
    Ok(())
}

fn validate_critical(cfg: &ProcessConfig) -> Result<(), ConfigError> {
    if let Some(names) = &cfg.critical {
        if names.iter().any(|n| n.trim().is_empty()) {
            return Err(ConfigError::Validation(
                "processes.critical entries must not be empty".to_string(),
            ));
        }
    }
    Ok(())
}

const fn default_log_enabled() -> bool {
    true
}

fn default_log_path() -> PathBuf {
    PathBuf::from("system_health.log")
}

const fn default_log_max_lines() -> usize {
    100
}

const fn default_network_enabled() -> bool {
    true
}

const fn default_network_timeout_ms() -> u64 {
    3000
}

fn default_tcp_endpoints() -> Vec<TcpEndpointConfig> {
    vec![
        TcpEndpointConfig {
            name: "google-dns".to_string(),
            host: "8.8.8.8".to_string(),
            port: 53,
        },
        TcpEndpointConfig {
            name: "cloudflare-dns".to_string(),
            host: "1.1.1.1".to_string(),
            port: 53,
        },
    ]
}

const fn default_top_n() -> usize {
    5
}

const fn default_critical_enabled() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = Config::default();
        cfg.validate().expect("defaults must validate");
        assert_eq!(cfg.log.max_lines, 100);
        assert_eq!(cfg.network.timeout_ms, 3000);
        assert_eq!(cfg.processes.top_n, 5);
        assert_eq!(cfg.processes.top_by, SortKey::Memory);
        assert_eq!(cfg.output.format, OutputFormat::Json);
    }

    #[test]
    fn example_yaml_parses_and_validates() {
        let cfg: Config = serde_yaml::from_str(Config::example_yaml()).expect("example parses");
        cfg.validate().expect("example validates");
        assert_eq!(cfg.network.tcp_endpoints.len(), 2);
    }

    #[test]
    fn empty_yaml_document_uses_defaults() {
        let cfg: Config = serde_yaml::from_str("{}").unwrap();
        assert!(cfg.log.enabled);
        assert!(cfg.network.enabled);
        assert_eq!(cfg.critical_names(Platform::MacOs), vec!["launchd".to_string()]);
    }

    #[test]
    fn zero_log_lines_rejected() {
        let mut cfg = Config::default();
        cfg.log.max_lines = 0;
        assert!(matches!(cfg.validate(), Err(ConfigError::Validation(_))));

        cfg.log.enabled = false;
        cfg.validate().expect("max_lines is irrelevant when logging is off");
    }

    #[test]
    fn duplicate_endpoint_names_rejected() {
        let mut cfg = Config::default();
        cfg.network.http_endpoints.push(HttpEndpointConfig {
            name: "google-dns".to_string(),
            url: "https://example.com".to_string(),
        });
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("unique"), "{err}");
    }

    #[test]
    fn enabled_network_needs_endpoints() {
        let mut cfg = Config::default();
        cfg.network.tcp_endpoints.clear();
        assert!(cfg.validate().is_err());
        cfg.network.enabled = false;
        cfg.validate().unwrap();
    }

    #[test]
    fn blank_critical_name_rejected() {
        let mut cfg = Config::default();
        cfg.processes.critical = Some(vec!["sshd".to_string(), " ".to_string()]);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = Config::load_from_file("/no/such/hostcheck.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn bad_yaml_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.yaml");
        fs::write(&path, "log: [unclosed").unwrap();
        let err = Config::load_from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
