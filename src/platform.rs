use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Linux,
    MacOs,
    Windows,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Posix,
    Windows,
    Unknown,
}

impl Platform {
    pub fn detect() -> Self {
        Self::from_os(std::env::consts::OS)
    }

    pub fn from_os(os: &str) -> Self {
        match os {
            "linux" => Platform::Linux,
            "macos" => Platform::MacOs,
            "windows" => Platform::Windows,
            _ => Platform::Unknown,
        }
    }

    pub fn family(self) -> Family {
        match self {
            Platform::Linux | Platform::MacOs => Family::Posix,
            Platform::Windows => Family::Windows,
            Platform::Unknown => Family::Unknown,
        }
    }

    pub fn default_disk_path(self) -> PathBuf {
        match self {
            Platform::Windows => PathBuf::from("C:\\"),
            _ => PathBuf::from("/"),
        }
    }

    pub fn default_critical_processes(self) -> Vec<String> {
        let names: &[&str] = match self {
            Platform::Linux => &["systemd", "sshd"],
            Platform::MacOs => &["launchd"],
            Platform::Windows => &["explorer.exe", "svchost.exe", "lsass.exe"],
            Platform::Unknown => &[],
        };
        names.iter().map(|n| n.to_string()).collect()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Linux => "linux",
            Platform::MacOs => "macos",
            Platform::Windows => "windows",
            Platform::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
