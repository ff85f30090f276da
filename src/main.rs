mod collectors;
mod config;
mod logfile;
mod output;
mod platform;
mod report;

use clap::Parser;
use collectors::checks::collect_network;
use collectors::processes::{collect_process_table, critical_processes, top_processes, SortKey};
use collectors::system::{collect_cpu, collect_disk, collect_memory, collect_uptime};
use config::{Config, ConfigError, OutputFormat};
use output::SinkError;
use platform::Platform;
use report::{HealthReport, MetricResult, ProcessSample};
use std::path::PathBuf;
use std::process::ExitCode;
use sysinfo::{System, SystemExt};
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "hostcheck")]
#[command(version, about = "One-shot host health check")]
struct Cli {
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    print_default_config: bool,
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,
    #[arg(long)]
    output: Option<PathBuf>,
    #[arg(long)]
    no_network: bool,
    #[arg(long, value_name = "MS")]
    network_timeout_ms: Option<u64>,
    #[arg(long, value_name = "N")]
    top: Option<usize>,
    #[arg(long, value_enum)]
    top_by: Option<SortKey>,
    #[arg(long = "critical", value_name = "NAME", conflicts_with = "no_critical")]
    critical: Vec<String>,
    #[arg(long)]
    no_critical: bool,
    #[arg(long, value_name = "PATH")]
    disk: Option<PathBuf>,
    #[arg(long, value_name = "PATH", conflicts_with = "no_log")]
    log_file: Option<PathBuf>,
    #[arg(long)]
    no_log: bool,
    #[arg(long, value_name = "N")]
    log_max_lines: Option<usize>,
}

impl Cli {
    fn apply(&self, cfg: &mut Config) {
        if let Some(format) = self.format {
            cfg.output.format = format;
        }
        if let Some(path) = &self.output {
            cfg.output.path = Some(path.clone());
        }
        if self.no_network {
            cfg.network.enabled = false;
        }
        if let Some(ms) = self.network_timeout_ms {
            cfg.network.timeout_ms = ms;
        }
        if let Some(n) = self.top {
            cfg.processes.top_n = n;
        }
        if let Some(key) = self.top_by {
            cfg.processes.top_by = key;
        }
        if !self.critical.is_empty() {
            cfg.processes.critical_enabled = true;
            cfg.processes.critical = Some(self.critical.clone());
        } else if self.no_critical {
            cfg.processes.critical_enabled = false;
        }
        if let Some(path) = &self.disk {
            cfg.disk_path = Some(path.clone());
        }
        if let Some(path) = &self.log_file {
            cfg.log.enabled = true;
            cfg.log.path = path.clone();
        } else if self.no_log {
            cfg.log.enabled = false;
        }
        if let Some(n) = self.log_max_lines {
            cfg.log.max_lines = n;
        }
    }
}

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Sink(#[from] SinkError),
}

impl AppError {
    fn exit_code(&self) -> ExitCode {
        match self {
            AppError::Config(_) => ExitCode::from(2),
            AppError::Sink(_) => ExitCode::from(1),
        }
    }
}

fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();
    if cli.print_default_config {
        print!("{}", Config::example_yaml());
        return ExitCode::SUCCESS;
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "health check failed");
            err.exit_code()
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<(), AppError> {
    let mut cfg = match &cli.config {
        Some(path) => Config::load_from_file(path)?,
        None => Config::default(),
    };
    cli.apply(&mut cfg);
    cfg.validate()?;

    let platform = Platform::detect();
    info!(%platform, "starting health check");

    let mut system = System::new();
    let process_table = wants_process_table(&cfg).then(|| collect_process_table(&mut system));
    let report = build_report(platform, &cfg, &mut system, process_table);
    info!(
        unavailable = report.unavailable_count(),
        "report assembled"
    );

    output::emit(&report, cfg.output.format, cfg.output.path.as_deref())?;
    if cfg.log.enabled {
        logfile::append_with_rotation(
            &cfg.log.path,
            &output::render_text(&report),
            cfg.log.max_lines,
        )?;
    }
    Ok(())
}

fn wants_process_table(cfg: &Config) -> bool {
    cfg.processes.top_n > 0 || cfg.processes.critical_enabled
}

fn build_report(
    platform: Platform,
    cfg: &Config,
    system: &mut System,
    process_table: Option<MetricResult<Vec<ProcessSample>>>,
) -> HealthReport {
    let cpu = collect_cpu(platform, system);
    let memory = collect_memory(platform, system);
    let disk = collect_disk(platform, &cfg.disk_path(platform), system);
    let uptime = collect_uptime(platform, system);
    let network = collect_network(&cfg.network);

    let table = process_table.unwrap_or_else(|| MetricResult::unavailable("process table not collected"));
    let top = (cfg.processes.top_n > 0)
        .then(|| table.map(|t| top_processes(t, cfg.processes.top_n, cfg.processes.top_by)));
    let critical = cfg.processes.critical_enabled.then(|| {
        let names = cfg.critical_names(platform);
        table.map(|t| critical_processes(t, &names))
    });

    HealthReport::assemble(
        platform,
        system.host_name(),
        cpu,
        memory,
        disk,
        uptime,
        network,
        top,
        critical,
    )
}
