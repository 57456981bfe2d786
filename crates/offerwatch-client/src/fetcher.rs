use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::Duration;

use offerwatch_core::error::AppError;
use offerwatch_core::traits::Fetcher;
use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use url::{Host, Url};

/// Desktop browser User-Agent; several hotel sites serve bots an empty shell.
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// HTTP fetcher for source pages.
///
/// Sends browser-like headers and applies the caller's timeout per request.
/// Sources can be added from chat, so addresses resolving to private or
/// reserved ranges are refused unless [`allow_private_urls`](Self::allow_private_urls)
/// is called.
#[derive(Clone)]
pub struct ReqwestFetcher {
    client: Client,
    block_private: bool,
}

impl ReqwestFetcher {
    pub fn new() -> Result<Self, AppError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("zh-TW,zh;q=0.9,en;q=0.8"),
        );

        let client = Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .default_headers(headers)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            block_private: true,
        })
    }

    /// Permit private/reserved destinations (local CLI use).
    pub fn allow_private_urls(mut self) -> Self {
        self.block_private = false;
        self
    }
}

impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<String, AppError> {
        let parsed = Url::parse(url).map_err(|e| AppError::HttpError(format!("Invalid URL: {e}")))?;
        if self.block_private {
            ensure_public(&parsed).await?;
        }

        let response = self
            .client
            .get(parsed)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify_error(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::HttpError(format!(
                "HTTP {} for {url}",
                status.as_u16()
            )));
        }

        response.text().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout(timeout.as_secs())
            } else {
                AppError::HttpError(format!("Failed to read response body: {e}"))
            }
        })
    }
}

fn classify_error(e: reqwest::Error, timeout: Duration) -> AppError {
    if e.is_timeout() {
        AppError::Timeout(timeout.as_secs())
    } else if e.is_connect() {
        AppError::NetworkError(format!("Connection failed: {e}"))
    } else {
        AppError::HttpError(e.to_string())
    }
}

/// Refuse URLs whose host is, or resolves to, a non-public address.
async fn ensure_public(url: &Url) -> Result<(), AppError> {
    if !matches!(url.scheme(), "http" | "https") {
        return Err(AppError::HttpError(format!(
            "URL scheme '{}' is not allowed",
            url.scheme()
        )));
    }

    let domain = match url.host() {
        None => return Err(AppError::HttpError("URL has no host".into())),
        Some(Host::Ipv4(v4)) => return check_ip(IpAddr::V4(v4), url),
        Some(Host::Ipv6(v6)) => return check_ip(IpAddr::V6(v6), url),
        Some(Host::Domain(domain)) => domain,
    };

    let port = url.port_or_known_default().unwrap_or(80);
    let resolved: Vec<IpAddr> = tokio::net::lookup_host((domain, port))
        .await
        .map_err(|e| AppError::NetworkError(format!("DNS lookup failed for {domain}: {e}")))?
        .map(|addr| addr.ip())
        .collect();

    if resolved.is_empty() {
        return Err(AppError::NetworkError(format!(
            "DNS lookup returned nothing for {domain}"
        )));
    }
    resolved.into_iter().try_for_each(|ip| check_ip(ip, url))
}

fn check_ip(ip: IpAddr, url: &Url) -> Result<(), AppError> {
    if is_reserved(ip) {
        tracing::warn!(%url, %ip, "Refusing fetch to reserved address");
        return Err(AppError::HttpError(format!(
            "Blocked non-public address {ip} for {url}"
        )));
    }
    Ok(())
}

fn is_reserved(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_reserved_v4(v4),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => is_reserved_v4(v4),
            None => is_reserved_v6(v6),
        },
    }
}

fn is_reserved_v4(ip: Ipv4Addr) -> bool {
    let [a, b, ..] = ip.octets();
    ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        || ip.is_documentation()
        // carrier-grade NAT, 100.64.0.0/10
        || (a == 100 && (b & 0xC0) == 64)
}

fn is_reserved_v6(ip: Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    ip.is_loopback()
        || ip.is_unspecified()
        || (first & 0xFFC0) == 0xFE80
        || (first & 0xFE00) == 0xFC00
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn reserved_v4_ranges() {
        for addr in [
            "127.0.0.1",
            "10.1.2.3",
            "172.16.0.1",
            "192.168.0.10",
            "169.254.169.254",
            "0.0.0.0",
            "100.64.0.1",
        ] {
            assert!(is_reserved(ip(addr)), "{addr}");
        }
        for addr in ["8.8.8.8", "1.1.1.1", "203.69.81.1"] {
            assert!(!is_reserved(ip(addr)), "{addr}");
        }
    }

    #[test]
    fn reserved_v6_ranges() {
        for addr in ["::1", "::", "fe80::1", "fd00::1", "::ffff:10.0.0.1"] {
            assert!(is_reserved(ip(addr)), "{addr}");
        }
        assert!(!is_reserved(ip("2001:4860:4860::8888")));
    }

    #[tokio::test]
    async fn ip_literal_hosts_are_checked_without_dns() {
        let url = Url::parse("http://192.168.1.1/router").unwrap();
        let err = ensure_public(&url).await.unwrap_err();
        assert!(err.to_string().contains("Blocked non-public address"));

        let url = Url::parse("http://[::1]:8080/").unwrap();
        assert!(ensure_public(&url).await.is_err());

        let url = Url::parse("https://8.8.8.8/").unwrap();
        assert!(ensure_public(&url).await.is_ok());
    }

    #[tokio::test]
    async fn non_http_schemes_are_refused() {
        let url = Url::parse("file:///etc/passwd").unwrap();
        let err = ensure_public(&url).await.unwrap_err();
        assert!(err.to_string().contains("not allowed"));
    }

    #[tokio::test]
    async fn fetch_rejects_private_target_before_connecting() {
        let fetcher = ReqwestFetcher::new().unwrap();
        let err = fetcher
            .fetch("http://127.0.0.1:9/", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::HttpError(_)));
    }
}
