use crate::config::{HttpEndpointConfig, NetworkConfig, TcpEndpointConfig};
use crate::report::{MetricResult, NetworkStatus};
use reqwest::Client;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::time;
use tracing::{debug, warn};

pub fn collect_network(cfg: &NetworkConfig) -> MetricResult<NetworkStatus> {
    if !cfg.enabled {
        return MetricResult::unavailable("network check disabled");
    }

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(err) => {
            warn!(error = %err, "could not start network runtime");
            return MetricResult::Available(NetworkStatus {
                reachable: false,
                endpoint: None,
                latency_ms: None,
            });
        }
    };
    MetricResult::Available(runtime.block_on(probe_endpoints(cfg)))
}

pub async fn probe_endpoints(cfg: &NetworkConfig) -> NetworkStatus {
    let timeout = Duration::from_millis(cfg.timeout_ms);

    for endpoint in &cfg.tcp_endpoints {
        if let Some(latency_ms) = run_tcp_check(endpoint, timeout).await {
            return NetworkStatus {
                reachable: true,
                endpoint: Some(endpoint.name.clone()),
                latency_ms: Some(latency_ms),
            };
        }
    }

    if !cfg.http_endpoints.is_empty() {
        let built = Client::builder()
            .user_agent(concat!("hostcheck/", env!("CARGO_PKG_VERSION")))
            .no_proxy()
            .build();
        match built {
            Ok(client) => {
                for endpoint in &cfg.http_endpoints {
                    if let Some(latency_ms) = run_http_check(&client, endpoint, timeout).await {
                        return NetworkStatus {
                            reachable: true,
                            endpoint: Some(endpoint.name.clone()),
                            latency_ms: Some(latency_ms),
                        };
                    }
                }
            }
            Err(err) => warn!(error = %err, "http client unavailable, skipping http endpoints"),
        }
    }

    NetworkStatus {
        reachable: false,
        endpoint: None,
        latency_ms: None,
    }
}

async fn run_tcp_check(cfg: &TcpEndpointConfig, timeout: Duration) -> Option<u64> {
    let start = Instant::now();
    let addr = format!("{}:{}", cfg.host, cfg.port);

    match time::timeout(timeout, TcpStream::connect(&addr)).await {
        Ok(Ok(_stream)) => Some(start.elapsed().as_millis() as u64),
        Ok(Err(err)) => {
            debug!(endpoint = %cfg.name, address = %addr, error = %err, "tcp probe failed");
            None
        }
        Err(_elapsed) => {
            debug!(endpoint = %cfg.name, address = %addr, "tcp probe timeout");
            None
        }
    }
}

async fn run_http_check(client: &Client, cfg: &HttpEndpointConfig, timeout: Duration) -> Option<u64> {
    let start = Instant::now();
    // Any HTTP status proves the host answered.
    match time::timeout(timeout, client.head(&cfg.url).timeout(timeout).send()).await {
        Ok(Ok(resp)) => {
            debug!(endpoint = %cfg.name, status = resp.status().as_u16(), "http probe answered");
            Some(start.elapsed().as_millis() as u64)
        }
        Ok(Err(err)) => {
            debug!(endpoint = %cfg.name, error = %err, "http probe failed");
            None
        }
        Err(_elapsed) => {
            debug!(endpoint = %cfg.name, "http probe timeout");
            None
        }
    }
}
