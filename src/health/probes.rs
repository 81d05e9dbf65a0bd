//! Default dependency probes.
//!
//! | Name          | Checks                                   | Degraded when             |
//! |---------------|------------------------------------------|---------------------------|
//! | `database`    | PostgREST endpoint answers               | slow, or not configured   |
//! | `cache`       | TCP connect to the cache server          | not configured            |
//! | `api_<name>`  | HEAD to an external API                  | 5xx or unreachable        |
//! | `system`      | process resident memory                  | above threshold           |
//! | `generation`  | a sample portfolio assembles             | never (fails unhealthy)   |

use futures_util::future::BoxFuture;
use serde_json::json;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::Instant;

use crate::config::PrismaConfig;
use crate::health::aggregator::HealthAggregator;
use crate::health::types::{HealthProbe, ProbeError, ProbeReport};
use crate::portfolio::{self, fixtures};

const USER_AGENT: &str = concat!("prisma-health/", env!("CARGO_PKG_VERSION"));

/// Register every default probe described by `config`.
pub fn register_defaults(health: &HealthAggregator, config: &PrismaConfig) -> Result<(), ProbeError> {
    let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
    let probes = &config.probes;

    health.register_check(
        "database",
        DatabaseProbe {
            client: client.clone(),
            url: probes.database_url.clone(),
            api_key: probes.database_api_key.clone(),
            slow: Duration::from_millis(probes.slow_response_ms),
        },
    );
    health.register_check(
        "cache",
        CacheProbe {
            address: probes.cache_address.clone(),
        },
    );
    for api in &probes.external_apis {
        health.register_check(
            &format!("api_{}", api.name),
            ExternalApiProbe {
                client: client.clone(),
                url: api.url.clone(),
                timeout: Duration::from_millis(probes.external_timeout_ms),
            },
        );
    }
    health.register_check(
        "system",
        MemoryProbe {
            threshold_mb: config.health.memory_threshold_mb,
        },
    );
    health.register_check(
        "generation",
        GenerationProbe {
            base_domain: config.portfolio.base_domain.clone(),
        },
    );

    tracing::info!(checks = ?health.check_names(), "Default health checks registered");
    Ok(())
}

/// Reachability of the hosted Postgres REST endpoint.
pub struct DatabaseProbe {
    pub client: reqwest::Client,
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub slow: Duration,
}

impl HealthProbe for DatabaseProbe {
    fn check(&self) -> BoxFuture<'static, Result<ProbeReport, ProbeError>> {
        let client = self.client.clone();
        let url = self.url.clone();
        let api_key = self.api_key.clone();
        let slow = self.slow;

        Box::pin(async move {
            let Some(url) = url else {
                return Ok(ProbeReport::degraded("Database not configured"));
            };

            let mut request = client.get(format!("{}/rest/v1/", url.trim_end_matches('/')));
            if let Some(key) = api_key {
                request = request.header("apikey", key);
            }

            let start = Instant::now();
            let response = request.send().await?;
            let elapsed = start.elapsed();
            let status = response.status();
            let metadata = json!({
                "statusCode": status.as_u16(),
                "responseTimeMs": elapsed.as_millis() as u64,
            });

            if status.is_server_error() {
                return Ok(ProbeReport::unhealthy(format!("Database returned {}", status))
                    .with_metadata(metadata));
            }
            if elapsed > slow {
                return Ok(ProbeReport::degraded("Database responding slowly").with_metadata(metadata));
            }
            Ok(ProbeReport::healthy().with_metadata(metadata))
        })
    }
}

/// TCP reachability of the cache server.
pub struct CacheProbe {
    pub address: Option<String>,
}

impl HealthProbe for CacheProbe {
    fn check(&self) -> BoxFuture<'static, Result<ProbeReport, ProbeError>> {
        let address = self.address.clone();
        Box::pin(async move {
            let Some(address) = address else {
                return Ok(ProbeReport::degraded("Cache not configured"));
            };
            TcpStream::connect(&address).await?;
            Ok(ProbeReport::healthy().with_metadata(json!({ "address": address })))
        })
    }
}

/// HEAD request to a third-party API.
///
/// External APIs are never critical: failures degrade rather than fail.
pub struct ExternalApiProbe {
    pub client: reqwest::Client,
    pub url: String,
    pub timeout: Duration,
}

impl HealthProbe for ExternalApiProbe {
    fn check(&self) -> BoxFuture<'static, Result<ProbeReport, ProbeError>> {
        let request = self.client.head(&self.url).timeout(self.timeout);
        let url = self.url.clone();

        Box::pin(async move {
            match request.send().await {
                Ok(response) if response.status().is_server_error() => Ok(ProbeReport::degraded(
                    format!("API returned {}", response.status()),
                )
                .with_metadata(json!({ "url": url }))),
                Ok(response) => Ok(ProbeReport::healthy()
                    .with_metadata(json!({ "url": url, "statusCode": response.status().as_u16() }))),
                Err(e) if e.is_timeout() => Ok(ProbeReport::degraded("API request timed out")),
                Err(e) => Ok(ProbeReport::degraded(format!("API unreachable: {}", e))),
            }
        })
    }
}

/// Resident memory of this process against a threshold.
pub struct MemoryProbe {
    pub threshold_mb: u64,
}

impl HealthProbe for MemoryProbe {
    fn check(&self) -> BoxFuture<'static, Result<ProbeReport, ProbeError>> {
        let threshold_mb = self.threshold_mb;
        Box::pin(async move {
            let status = match tokio::fs::read_to_string("/proc/self/status").await {
                Ok(status) => status,
                Err(_) => return Ok(ProbeReport::healthy().with_message("Memory usage unavailable")),
            };
            let Some(rss_kb) = parse_vm_rss(&status) else {
                return Ok(ProbeReport::healthy().with_message("Memory usage unavailable"));
            };

            let rss_mb = rss_kb / 1024;
            let metadata = json!({ "rssMb": rss_mb, "thresholdMb": threshold_mb });
            if rss_mb > threshold_mb {
                Ok(ProbeReport::degraded(format!("High memory usage: {}MB", rss_mb)).with_metadata(metadata))
            } else {
                Ok(ProbeReport::healthy().with_metadata(metadata))
            }
        })
    }
}

/// Extract `VmRSS` in kB from `/proc/<pid>/status` contents.
pub fn parse_vm_rss(status: &str) -> Option<u64> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("VmRSS:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|kb| kb.parse().ok())
}

/// End-to-end assembly of a sample portfolio.
pub struct GenerationProbe {
    pub base_domain: String,
}

impl HealthProbe for GenerationProbe {
    fn check(&self) -> BoxFuture<'static, Result<ProbeReport, ProbeError>> {
        let base_domain = self.base_domain.clone();
        Box::pin(async move {
            let sample = fixtures::developer();
            match portfolio::assemble(&sample, &base_domain) {
                Ok(page) => Ok(ProbeReport::healthy()
                    .with_metadata(json!({ "template": page.template, "sections": page.sections.len() }))),
                Err(e) => Ok(ProbeReport::unhealthy(format!("Generation pipeline failed: {}", e))),
            }
        })
    }
}
