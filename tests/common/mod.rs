//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use prisma_telemetry::apm::Apm;
use prisma_telemetry::config::{HealthConfig, PrismaConfig};
use prisma_telemetry::correlation::MemoryAnalytics;
use prisma_telemetry::health::{HealthAggregator, HealthProbe, HealthStatus, ProbeError, ProbeReport};
use prisma_telemetry::http::{AppState, HttpServer};
use prisma_telemetry::lifecycle::Shutdown;
use prisma_telemetry::portfolio::PortfolioStore;

/// State wired with in-memory analytics and no exporters.
pub struct TestApp {
    pub state: AppState,
    pub analytics: Arc<MemoryAnalytics>,
}

pub fn test_app(health: HealthAggregator) -> TestApp {
    test_app_with_config(PrismaConfig::default(), health)
}

pub fn test_app_with_config(config: PrismaConfig, health: HealthAggregator) -> TestApp {
    let apm = Arc::new(Apm::new(&config.apm));
    let analytics = Arc::new(MemoryAnalytics::new());
    let state = AppState::new(
        config,
        apm,
        Arc::new(health),
        analytics.clone(),
        PortfolioStore::with_samples(),
    );
    TestApp { state, analytics }
}

pub fn empty_health() -> HealthAggregator {
    HealthAggregator::new(&HealthConfig::default())
}

/// Probe always reporting `status`.
pub fn fixed(status: HealthStatus) -> impl HealthProbe {
    move || async move {
        Ok::<_, ProbeError>(ProbeReport {
            status,
            message: None,
            metadata: None,
        })
    }
}

/// Running server plus the handles needed to drive it.
pub struct RunningServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub config_updates: mpsc::UnboundedSender<PrismaConfig>,
}

impl RunningServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Serve `state` on an ephemeral loopback port.
pub async fn start_server(state: AppState) -> RunningServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let (config_updates, updates_rx) = mpsc::unbounded_channel();

    let server = HttpServer::from_state(state);
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, updates_rx, server_shutdown).await;
    });

    RunningServer {
        addr,
        shutdown,
        config_updates,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Start a programmable mock backend on an ephemeral port.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let mut request = [0u8; 4096];
                        let _ = socket.read(&mut request).await;
                        let (status, body) = f().await;
                        let status_text = match status {
                            200 => "200 OK",
                            401 => "401 Unauthorized",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}
