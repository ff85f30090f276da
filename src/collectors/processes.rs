use crate::collectors::{settle, CollectError};
use crate::report::{percent_of, MetricResult, ProcessSample};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use sysinfo::{PidExt, ProcessExt, System, SystemExt};

const PROCESS_SAMPLE_WINDOW: Duration = Duration::from_millis(250);
const KERNEL_NAME_MAX: usize = 15;

pub trait ProcessEnumerator {
    fn snapshot(&mut self) -> Result<Vec<ProcessSample>, CollectError>;
}

impl ProcessEnumerator for System {
    fn snapshot(&mut self) -> Result<Vec<ProcessSample>, CollectError> {
        if !System::IS_SUPPORTED {
            return Err(CollectError::Unsupported("process enumeration"));
        }
        self.refresh_memory();
        self.refresh_cpu();
        self.refresh_processes();
        // Process CPU usage is a delta between two refreshes.
        std::thread::sleep(PROCESS_SAMPLE_WINDOW);
        self.refresh_processes();

        let total_memory = self.total_memory();
        let cores = self.cpus().len().max(1) as f64;
        let mut out: Vec<ProcessSample> = self
            .processes()
            .values()
            .map(|p| {
                let cpu = (p.cpu_usage() as f64 / cores).clamp(0.0, 100.0);
                ProcessSample {
                    pid: p.pid().as_u32(),
                    name: full_name(
                        p.name(),
                        p.exe().file_name().and_then(|n| n.to_str()),
                        p.cmd().first().map(String::as_str),
                    ),
                    cpu_percent: if cpu.is_finite() { cpu } else { 0.0 },
                    memory_percent: percent_of(p.memory(), total_memory).unwrap_or(0.0),
                    memory_bytes: p.memory(),
                }
            })
            .collect();
        if out.is_empty() {
            return Err(CollectError::NotFound("no processes visible".to_string()));
        }
        out.sort_by_key(|p| p.pid);
        Ok(out)
    }
}

// Linux caps the kernel process name at 15 bytes; the executable or argv[0]
// basename restores the rest when it extends the short name.
pub fn full_name(short: &str, exe_name: Option<&str>, argv0: Option<&str>) -> String {
    if short.len() < KERNEL_NAME_MAX {
        return short.to_string();
    }
    let argv0_name = argv0
        .and_then(|a| a.split(|c: char| c.is_whitespace() || c == ':').next())
        .and_then(|a| a.rsplit(['/', '\\']).next());
    [exe_name, argv0_name]
        .into_iter()
        .flatten()
        .find(|candidate| candidate.len() > short.len() && candidate.starts_with(short))
        .unwrap_or(short)
        .to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    Cpu,
    #[default]
    Memory,
}

pub fn collect_process_table(source: &mut impl ProcessEnumerator) -> MetricResult<Vec<ProcessSample>> {
    settle("processes", source.snapshot())
}

pub fn top_processes(table: &[ProcessSample], n: usize, key: SortKey) -> Vec<ProcessSample> {
    let metric = |p: &ProcessSample| match key {
        SortKey::Cpu => p.cpu_percent,
        SortKey::Memory => p.memory_percent,
    };
    let mut sorted: Vec<&ProcessSample> = table.iter().collect();
    sorted.sort_by(|a, b| {
        metric(b)
            .total_cmp(&metric(a))
            .then_with(|| a.pid.cmp(&b.pid))
    });
    sorted.into_iter().take(n).cloned().collect()
}

pub fn critical_processes(table: &[ProcessSample], names: &[String]) -> BTreeMap<String, bool> {
    names
        .iter()
        .map(|name| {
            let present = table.iter().any(|p| p.name.eq_ignore_ascii_case(name.trim()));
            (name.clone(), present)
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) struct FixedProcesses(pub Result<Vec<ProcessSample>, String>);

    impl ProcessEnumerator for FixedProcesses {
        fn snapshot(&mut self) -> Result<Vec<ProcessSample>, CollectError> {
            self.0.clone().map_err(CollectError::NotFound)
        }
    }

    pub(crate) fn sample(pid: u32, name: &str, cpu: f64, mem: f64) -> ProcessSample {
        ProcessSample {
            pid,
            name: name.to_string(),
            cpu_percent: cpu,
            memory_percent: mem,
            memory_bytes: (mem * 1000.0) as u64,
        }
    }

    #[test]
    fn truncated_kernel_name_is_extended() {
        assert_eq!(
            full_name("systemd-journal", Some("systemd-journald"), None),
            "systemd-journald"
        );
        assert_eq!(
            full_name("systemd-resolve", None, Some("/lib/systemd/systemd-resolved")),
            "systemd-resolved"
        );
        assert_eq!(full_name("sh", Some("dash"), Some("sh")), "sh");
        assert_eq!(full_name("python3", Some("python3.11"), None), "python3");
        assert_eq!(full_name("nginx", None, Some("nginx: worker process")), "nginx");
    }

    #[test]
    fn long_critical_name_matches_extended_name() {
        let table = vec![sample(
            300,
            &full_name("systemd-journal", Some("systemd-journald"), None),
            0.2,
            1.0,
        )];
        let names = vec!["systemd-journald".to_string(), "systemd-networkd".to_string()];
        let found = critical_processes(&table, &names);
        assert!(found["systemd-journald"]);
        assert!(!found["systemd-networkd"]);
    }

    fn table() -> Vec<ProcessSample> {
        vec![
            sample(1, "systemd", 0.1, 0.5),
            sample(7, "postgres", 20.0, 12.0),
            sample(9, "nginx", 5.0, 3.0),
            sample(12, "java", 20.0, 30.0),
            sample(30, "cron", 0.0, 0.2),
            sample(44, "bash", 1.0, 3.0),
        ]
    }

    #[test]
    fn top_by_memory_descending() {
        let top = top_processes(&table(), 3, SortKey::Memory);
        let pids: Vec<u32> = top.iter().map(|p| p.pid).collect();
        assert_eq!(pids, vec![12, 7, 9]);
    }

    #[test]
    fn ties_break_on_ascending_pid() {
        let mut t = table();
        t.reverse();
        let top = top_processes(&t, 2, SortKey::Cpu);
        let pids: Vec<u32> = top.iter().map(|p| p.pid).collect();
        assert_eq!(pids, vec![7, 12]);

        for _ in 0..5 {
            assert_eq!(top_processes(&t, 6, SortKey::Cpu), top_processes(&t, 6, SortKey::Cpu));
        }
    }

    #[test]
    fn top_n_handles_zero_and_overflow() {
        assert!(top_processes(&table(), 0, SortKey::Memory).is_empty());
        assert_eq!(top_processes(&table(), 50, SortKey::Memory).len(), 6);
    }

    #[test]
    fn critical_match_is_exact_and_case_insensitive() {
        let names = vec![
            "SYSTEMD".to_string(),
            "sshd".to_string(),
            "post".to_string(),
        ];
        let found = critical_processes(&table(), &names);
        assert_eq!(found["SYSTEMD"], true);
        assert_eq!(found["sshd"], false);
        assert_eq!(found["post"], false, "substrings must not match");
    }

    #[test]
    fn failing_enumerator_is_unavailable() {
        let mut source = FixedProcesses(Err("ps not available".to_string()));
        let table = collect_process_table(&mut source);
        assert_eq!(table.error(), Some("ps not available"));

        let top = table.map(|t| top_processes(t, 5, SortKey::Memory));
        assert!(!top.is_available());
    }

    #[test]
    fn live_snapshot_is_sorted_by_pid() {
        let mut system = System::new();
        match system.snapshot() {
            Ok(procs) => {
                assert!(procs.windows(2).all(|w| w[0].pid < w[1].pid));
                assert!(procs
                    .iter()
                    .all(|p| (0.0..=100.0).contains(&p.cpu_percent)
                        && (0.0..=100.0).contains(&p.memory_percent)));
            }
            Err(err) => assert!(!err.to_string().is_empty()),
        }
    }
}
