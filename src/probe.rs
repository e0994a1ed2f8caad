use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use hickory_resolver::config::ResolverConfig;
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::TokioResolver;
use surge_ping::{Client as PingClient, Config as PingConfig, PingIdentifier, PingSequence};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

/// Connect timeout for the internet liveness check.
const INTERNET_TIMEOUT: Duration = Duration::from_millis(1500);
/// ICMP echo timeout for the host probe.
const PING_TIMEOUT: Duration = Duration::from_millis(3000);
/// Timeout for the application-layer fallback probe.
const HTTP_TIMEOUT: Duration = Duration::from_millis(5000);

/// Well-known endpoint used purely as an internet liveness signal, not as
/// a statement about the monitored host.
const INTERNET_PROBE_ADDR: &str = "8.8.8.8:53";

/// Boolean reachability probes consumed by the monitor loop.
///
/// Timeouts and transport errors are ordinary `false` results; a probe
/// never surfaces an error into the loop.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn is_internet_available(&self) -> bool;
    async fn is_host_reachable(&self, host: &str) -> bool;
}

pub struct NetProber {
    ping_client: Option<PingClient>,
    dns_resolver: TokioResolver,
    http_client: reqwest::Client,
}

impl NetProber {
    pub fn new() -> Self {
        // ICMP sockets need elevated privileges on some systems; without
        // one the host probe goes straight to the HTTP fallback.
        let ping_client = match PingClient::new(&PingConfig::default()) {
            Ok(client) => Some(client),
            Err(e) => {
                warn!(error = %e, "ICMP unavailable, host probe will rely on HTTP only");
                None
            }
        };

        let dns_resolver = TokioResolver::builder_with_config(
            ResolverConfig::cloudflare(),
            TokioConnectionProvider::default(),
        )
        .build();

        info!("DNS resolver configured: Cloudflare 1.1.1.1 / 1.0.0.1");

        Self {
            ping_client,
            dns_resolver,
            http_client: reqwest::Client::new(),
        }
    }

    async fn ping(&self, domain: &str) -> bool {
        let Some(client) = &self.ping_client else {
            return false;
        };
        let Some(ip) = self.resolve(domain).await else {
            return false;
        };

        let payload = [0u8; 56];
        let mut pinger = client.pinger(ip, PingIdentifier(rand::random())).await;
        pinger.timeout(PING_TIMEOUT);
        pinger.ping(PingSequence(0), &payload).await.is_ok()
    }

    async fn resolve(&self, domain: &str) -> Option<IpAddr> {
        if let Ok(ip) = domain.parse::<IpAddr>() {
            return Some(ip);
        }
        match self.dns_resolver.lookup_ip(domain).await {
            Ok(lookup) => lookup.iter().next(),
            Err(e) => {
                debug!(host = domain, error = %e, "DNS resolution failed");
                None
            }
        }
    }
}

impl Default for NetProber {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Prober for NetProber {
    async fn is_internet_available(&self) -> bool {
        matches!(
            tokio::time::timeout(INTERNET_TIMEOUT, TcpStream::connect(INTERNET_PROBE_ADDR)).await,
            Ok(Ok(_))
        )
    }

    async fn is_host_reachable(&self, host: &str) -> bool {
        if self.ping(host_domain(host)).await {
            return true;
        }
        // Reachability is judged by connectivity, not response semantics:
        // any HTTP response, including an error status, counts.
        self.http_client
            .head(host)
            .timeout(HTTP_TIMEOUT)
            .send()
            .await
            .is_ok()
    }
}

/// Authority part of a monitored host URL, without scheme or path.
pub fn host_domain(host: &str) -> &str {
    let rest = host.strip_prefix("https://").unwrap_or(host);
    rest.split('/').next().unwrap_or(rest)
}

/// A monitored host must use the secure scheme and name a syntactically
/// valid domain, or `localhost`.
pub fn is_valid_host(host: &str) -> bool {
    let Some(rest) = host.strip_prefix("https://") else {
        return false;
    };
    let domain = rest.split('/').next().unwrap_or("");
    domain == "localhost" || is_valid_domain(domain)
}

fn is_valid_domain(domain: &str) -> bool {
    if domain.is_empty() || domain.len() > 253 {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return false;
    }
    labels.iter().all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn https_domain_is_valid() {
        assert!(is_valid_host("https://example.com"));
        assert!(is_valid_host("https://sub.domain-x.co"));
        assert!(is_valid_host("https://example.com/some/path"));
    }

    #[test]
    fn localhost_is_valid() {
        assert!(is_valid_host("https://localhost"));
    }

    #[test]
    fn insecure_or_unknown_schemes_are_rejected() {
        assert!(!is_valid_host("http://example.com"));
        assert!(!is_valid_host("ftp://x"));
        assert!(!is_valid_host("example.com"));
    }

    #[test]
    fn malformed_domains_are_rejected() {
        assert!(!is_valid_host("https://"));
        assert!(!is_valid_host("https://example"));
        assert!(!is_valid_host("https://-bad.com"));
        assert!(!is_valid_host("https://bad-.com"));
        assert!(!is_valid_host("https://exa mple.com"));
        assert!(!is_valid_host("https://double..dot"));
    }

    #[test]
    fn host_domain_strips_scheme_and_path() {
        assert_eq!(host_domain("https://example.com"), "example.com");
        assert_eq!(host_domain("https://example.com/health"), "example.com");
        assert_eq!(host_domain("localhost"), "localhost");
    }
}
