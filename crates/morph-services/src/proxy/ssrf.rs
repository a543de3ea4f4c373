//! Source URL checks for the download relay.
//!
//! The relay fetches whatever URL the caller names, so without a guard it doubles as a
//! window into the server's own network. Only http(s) URLs are accepted, and hosts that are
//! or resolve to loopback, private, link-local or otherwise internal addresses are refused.

use reqwest::Url;
use std::net::{IpAddr, Ipv6Addr};
use tokio::net::lookup_host;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceUrlError {
    #[error("{0}")]
    Invalid(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Hostname could not be resolved: {0}")]
    Unresolvable(String),
}

/// Parse and vet a caller-supplied source URL.
///
/// With `allow_private_hosts` only the syntax and scheme checks apply. Resolved addresses are
/// checked once here; the HTTP client resolves again when connecting.
pub async fn check_source_url(raw: &str, allow_private_hosts: bool) -> Result<Url, SourceUrlError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| SourceUrlError::Invalid(format!("Invalid URL format: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(SourceUrlError::Invalid(
            "URL must start with http:// or https://".to_string(),
        ));
    }

    let host = url
        .host_str()
        .ok_or_else(|| SourceUrlError::Invalid("URL must have a host".to_string()))?
        .trim_start_matches('[')
        .trim_end_matches(']')
        .to_lowercase();

    if allow_private_hosts {
        return Ok(url);
    }

    if let Ok(ip) = host.parse::<IpAddr>() {
        if is_private_ip(&ip) {
            return Err(SourceUrlError::Forbidden(
                "Private/internal IP addresses are not allowed".to_string(),
            ));
        }
        return Ok(url);
    }

    if is_internal_hostname(&host) {
        return Err(SourceUrlError::Forbidden(
            "Localhost and internal hostnames are not allowed".to_string(),
        ));
    }

    let port = url.port_or_known_default().unwrap_or(80);
    let resolved = lookup_host((host.as_str(), port)).await.map_err(|e| {
        tracing::warn!(host = %host, error = %e, "DNS resolution failed for source URL");
        SourceUrlError::Unresolvable(host.clone())
    })?;

    for addr in resolved {
        if is_private_ip(&addr.ip()) {
            return Err(SourceUrlError::Forbidden(format!(
                "Hostname resolves to private/internal IP address: {}",
                addr.ip()
            )));
        }
    }

    Ok(url)
}

/// Synchronous subset of [`check_source_url`] for redirect targets: literal addresses and
/// internal hostnames only, no DNS.
pub fn is_forbidden_literal(url: &Url) -> bool {
    let Some(host) = url.host_str() else {
        return true;
    };
    let host = host
        .trim_start_matches('[')
        .trim_end_matches(']')
        .to_lowercase();
    match host.parse::<IpAddr>() {
        Ok(ip) => is_private_ip(&ip),
        Err(_) => is_internal_hostname(&host),
    }
}

fn is_internal_hostname(host: &str) -> bool {
    host == "localhost"
        || host.ends_with(".localhost")
        || host.ends_with(".local")
        || host.ends_with(".internal")
        || host.ends_with(".corp")
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            let octets = ipv4.octets();
            octets[0] == 10
                || (octets[0] == 172 && (16..=31).contains(&octets[1]))
                || (octets[0] == 192 && octets[1] == 168)
                || (octets[0] == 100 && (64..=127).contains(&octets[1]))
                || octets[0] == 127
                || (octets[0] == 169 && octets[1] == 254)
                || octets[0] >= 224
                || octets[0] == 0
        }
        IpAddr::V6(ipv6) => {
            // IPv4-mapped addresses (::ffff:a.b.c.d) would otherwise bypass the V4 checks
            if let Some(ipv4) = ipv6.to_ipv4_mapped() {
                return is_private_ip(&IpAddr::V4(ipv4));
            }
            ipv6.is_loopback()
                || ipv6.is_unspecified()
                || ipv6.is_multicast()
                || is_ipv6_link_local(ipv6)
                || is_ipv6_unique_local(ipv6)
        }
    }
}

fn is_ipv6_link_local(ip: &Ipv6Addr) -> bool {
    ip.segments()[0] & 0xffc0 == 0xfe80
}

fn is_ipv6_unique_local(ip: &Ipv6Addr) -> bool {
    ip.segments()[0] & 0xfe00 == 0xfc00
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn rejected(url: &str) -> bool {
        check_source_url(url, false).await.is_err()
    }

    #[tokio::test]
    async fn test_rejects_non_http_schemes() {
        assert!(rejected("ftp://example.com/a.mp4").await);
        assert!(rejected("file:///etc/passwd").await);
        assert!(rejected("javascript:alert(1)").await);
        assert!(rejected("not-a-url").await);
        assert!(rejected("").await);
    }

    #[tokio::test]
    async fn test_rejects_loopback_and_private_literals() {
        assert!(rejected("http://127.0.0.1:3000/video.mp4").await);
        assert!(rejected("http://10.0.0.1/").await);
        assert!(rejected("http://192.168.1.1/").await);
        assert!(rejected("http://172.16.0.1/").await);
        assert!(rejected("http://169.254.169.254/latest/meta-data").await);
        assert!(rejected("http://[::1]/").await);
        assert!(rejected("http://[::ffff:127.0.0.1]/").await);
        assert!(rejected("http://[fd00::1]/").await);
    }

    #[tokio::test]
    async fn test_rejects_internal_hostnames() {
        assert!(rejected("http://localhost/").await);
        assert!(rejected("http://media.internal/a.mp4").await);
        assert!(rejected("http://nas.local/a.mp4").await);
    }

    #[tokio::test]
    async fn test_accepts_public_literal() {
        let url = check_source_url("https://93.184.216.34/video.mp4", false)
            .await
            .unwrap();
        assert_eq!(url.path(), "/video.mp4");
    }

    #[tokio::test]
    async fn test_private_hosts_allowed_when_configured() {
        assert!(check_source_url("http://127.0.0.1:8080/v.mp4", true).await.is_ok());
        // Scheme is still enforced
        assert!(check_source_url("file:///etc/passwd", true).await.is_err());
    }

    #[test]
    fn test_redirect_literal_check() {
        let internal = Url::parse("http://169.254.169.254/latest").unwrap();
        assert!(is_forbidden_literal(&internal));
        let local = Url::parse("http://printer.local/").unwrap();
        assert!(is_forbidden_literal(&local));
        let public = Url::parse("https://cdn.example.com/v.mp4").unwrap();
        assert!(!is_forbidden_literal(&public));
    }

    #[tokio::test]
    async fn test_error_kinds() {
        assert!(matches!(
            check_source_url("gopher://x", false).await,
            Err(SourceUrlError::Invalid(_))
        ));
        assert!(matches!(
            check_source_url("http://10.1.2.3/", false).await,
            Err(SourceUrlError::Forbidden(_))
        ));
    }
}
