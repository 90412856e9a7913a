//! HTTP banner grabbing and hostname guessing from web responses.

use crate::constants::{HTTP_BANNER_PORTS, HTTP_USER_AGENT};
use crate::errors::ScanError;
use crate::model::HttpBanner;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::HeaderMap;
use reqwest::redirect::Policy;
use reqwest::{Client, Url};
use std::net::Ipv4Addr;
use std::time::Duration;
use tracing::debug;

const MAX_BODY: usize = 64 * 1024;

static TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("static regex"));
static HOSTNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]{0,62}(\.[A-Za-z0-9_-]{1,63})*$").expect("static regex"));
static STATUS_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(HTTP/\d(\.\d)?\s+)?[1-5]\d\d\b").expect("static regex"));

/// Titles that say nothing about the device itself
const GENERIC_TITLES: &[&str] = &[
    "home", "login", "log in", "sign in", "signin", "error", "index", "welcome", "default",
    "untitled", "loading", "redirect", "redirecting", "dashboard", "router", "admin",
    "not found", "forbidden", "unauthorized", "bad request", "document", "web server",
    "page not found", "access denied", "it works!", "it works", "main", "portal",
];

/// Client used for banner probes: no redirects, no certificate checks
pub fn banner_client(wait: Duration) -> Result<Client, ScanError> {
    Ok(Client::builder()
        .redirect(Policy::none())
        .danger_accept_invalid_certs(true)
        .user_agent(HTTP_USER_AGENT)
        .timeout(wait)
        .connect_timeout(wait)
        .build()?)
}

/// Try the usual web ports in order and describe the first server that answers
pub async fn http_banner(ip: Ipv4Addr, wait: Duration) -> Option<HttpBanner> {
    let client = match banner_client(wait) {
        Ok(client) => client,
        Err(e) => {
            debug!(error = %e, "cannot build HTTP client");
            return None;
        }
    };

    for port in HTTP_BANNER_PORTS {
        let scheme = if port == 443 || port == 8443 { "https" } else { "http" };
        let url = format!("{}://{}:{}/", scheme, ip, port);
        let mut response = match client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!(%ip, port, error = %e, "no HTTP answer");
                continue;
            }
        };

        let headers = response.headers().clone();
        let mut body = Vec::new();
        while body.len() < MAX_BODY {
            match response.chunk().await {
                Ok(Some(chunk)) => body.extend_from_slice(&chunk),
                _ => break,
            }
        }
        let banner = banner_from_parts(ip, &headers, &String::from_utf8_lossy(&body));
        if !banner.is_empty() {
            return Some(banner);
        }
    }
    None
}

/// Assemble a banner from response headers and body
pub fn banner_from_parts(ip: Ipv4Addr, headers: &HeaderMap, body: &str) -> HttpBanner {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let title = extract_title(body);
    let hostname_guess = header("location")
        .and_then(|loc| host_from_location(&loc, ip))
        .or_else(|| header("x-forwarded-host").and_then(|h| usable_host(&h, ip)))
        .or_else(|| header("x-original-host").and_then(|h| usable_host(&h, ip)))
        .or_else(|| title.as_deref().and_then(hostname_from_title));

    HttpBanner {
        server: header("server"),
        powered_by: header("x-powered-by"),
        title,
        hostname_guess,
    }
}

pub fn extract_title(body: &str) -> Option<String> {
    let raw = TITLE_RE.captures(body)?.get(1)?.as_str();
    let title = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    (!title.is_empty()).then_some(title)
}

fn host_from_location(location: &str, ip: Ipv4Addr) -> Option<String> {
    let url = Url::parse(location).ok()?;
    usable_host(url.host_str()?, ip)
}

/// A header-supplied host that names something other than the address itself
fn usable_host(host: &str, ip: Ipv4Addr) -> Option<String> {
    let host = host.split(':').next()?.trim().trim_end_matches('.');
    if host.is_empty() || host.parse::<Ipv4Addr>().is_ok() || host == ip.to_string() {
        return None;
    }
    if host.eq_ignore_ascii_case("localhost") || !HOSTNAME_RE.is_match(host) {
        return None;
    }
    Some(host.to_string())
}

/// A page title that looks like a device name rather than a status or a generic word
pub fn hostname_from_title(title: &str) -> Option<String> {
    let title = title.trim();
    let lower = title.to_lowercase();
    if STATUS_LINE_RE.is_match(title) || GENERIC_TITLES.contains(&lower.as_str()) {
        return None;
    }
    if title.len() < 2 || !HOSTNAME_RE.is_match(title) || title.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(title.to_string())
}
