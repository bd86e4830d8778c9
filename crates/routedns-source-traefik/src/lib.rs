// # Traefik Route Source
//
// This crate provides the Traefik-backed RouteSource for routedns.
//
// ## Purpose
//
// Reads the HTTP routers from Traefik's read-only API and turns their
// `Host(...)` rules into the set of hostnames that should resolve to the
// proxy.
//
// ## Architecture
//
// Each call to `collect()` performs one GET against
// `http://<host>:<port>/api/http/routers`. Nothing is cached between
// passes; the engine owns scheduling.
//
// ## Partial Success
//
// A router entry that cannot be decoded is skipped with a warning. Only a
// failed request or a body that is not a JSON array fails the collection.

use routedns_core::config::ProxyConfig;
use routedns_core::hostname;
use routedns_core::traits::RouteSource;
use routedns_core::{Error, Result};

use serde::Deserialize;
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, warn};

/// A Traefik HTTP router as listed by `/api/http/routers`
///
/// Only the fields routedns reads are decoded; the rest are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Router {
    /// Router name, e.g. `whoami@docker`
    pub name: String,

    /// Entry points the router is attached to
    #[serde(default)]
    pub entry_points: Vec<String>,

    /// Match rule, e.g. ``Host(`app.example.com`) && PathPrefix(`/api`)``
    #[serde(default)]
    pub rule: Option<String>,

    /// Backend service
    #[serde(default)]
    pub service: Option<String>,

    /// `enabled`, `disabled` or `warning`
    #[serde(default)]
    pub status: Option<String>,

    /// Configuration provider, e.g. `docker` or `file`
    #[serde(default)]
    pub provider: Option<String>,
}

impl Router {
    /// Whether the router is attached to any of `entry_points`
    pub fn serves(&self, entry_points: &HashSet<String>) -> bool {
        self.entry_points.iter().any(|ep| entry_points.contains(ep))
    }

    /// Whether Traefik reports the router as disabled
    pub fn is_disabled(&self) -> bool {
        self.status.as_deref() == Some("disabled")
    }
}

/// Traefik API route source
pub struct TraefikSource {
    /// Routers listing URL
    url: String,

    /// Entry points whose routers are considered
    entry_points: HashSet<String>,

    /// HTTP client
    client: reqwest::Client,
}

impl TraefikSource {
    /// Create a new Traefik route source
    ///
    /// # Errors
    ///
    /// - `Error::Config`: the HTTP client cannot be built
    pub fn new(config: &ProxyConfig) -> Result<Self> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            url: config.routers_url(),
            entry_points: config.entry_points.iter().cloned().collect(),
            client,
        })
    }

    /// URL queried by `collect()`
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch and decode the routers listing
    async fn fetch_routers(&self) -> Result<Vec<Router>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::upstream(format!("GET {} failed: {}", self.url, e)))?;

        if !response.status().is_success() {
            return Err(Error::upstream(format!(
                "GET {} returned HTTP {}",
                self.url,
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::upstream(format!("Failed to read response: {}", e)))?;

        parse_routers(&body)
    }
}

#[async_trait::async_trait]
impl RouteSource for TraefikSource {
    async fn collect(&self) -> Result<BTreeSet<String>> {
        debug!("Fetching routers from {}", self.url);
        let routers = self.fetch_routers().await?;
        let total = routers.len();

        let mut hostnames = BTreeSet::new();
        let mut considered = 0;

        for router in routers {
            if !router.serves(&self.entry_points) || router.is_disabled() {
                continue;
            }
            considered += 1;

            let Some(rule) = router.rule.as_deref() else {
                debug!(router = %router.name, "Router has no rule, skipping");
                continue;
            };

            for host in extract_hosts(rule) {
                match hostname::validate(&host) {
                    Ok(()) => {
                        debug!(router = %router.name, host = %host, "Hostname routed");
                        hostnames.insert(host);
                    }
                    Err(e) => {
                        warn!(router = %router.name, host = %host, "Skipping invalid hostname: {}", e);
                    }
                }
            }
        }

        debug!(
            routers = total,
            considered,
            hostnames = hostnames.len(),
            "Collected hostnames from Traefik"
        );
        Ok(hostnames)
    }

    fn source_name(&self) -> &'static str {
        "traefik"
    }
}

/// Decode a routers listing
///
/// Entries that do not decode as a [`Router`] are skipped with a warning.
///
/// # Errors
///
/// - `Error::MalformedResponse`: the body is not JSON or not an array
pub fn parse_routers(body: &str) -> Result<Vec<Router>> {
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| Error::malformed(format!("Routers listing is not JSON: {}", e)))?;

    let serde_json::Value::Array(entries) = value else {
        return Err(Error::malformed("Routers listing is not a JSON array"));
    };

    let mut routers = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        match serde_json::from_value::<Router>(entry) {
            Ok(router) => routers.push(router),
            Err(e) => warn!(index, "Skipping malformed router entry: {}", e),
        }
    }
    Ok(routers)
}

/// Extract the hostnames named by `Host(...)` predicates in a router rule
///
/// Handles multiple predicates per rule and multiple names per predicate
/// (``Host(`a.example.com`, `b.example.com`)``). Names may be quoted with
/// backticks or double quotes. `HostRegexp`, `HostSNI` and negated
/// predicates contribute nothing. Negation is tracked through parenthesized
/// groups, so `!(Host(...))` is negated and `!(!Host(...))` is not. Returned
/// names are normalized; duplicates are kept in order of appearance.
pub fn extract_hosts(rule: &str) -> Vec<String> {
    let mut hosts = Vec::new();
    // Negation of each enclosing group, innermost last
    let mut groups: Vec<bool> = Vec::new();
    let mut negate_next = false;
    let mut i = 0;

    while let Some(c) = rule[i..].chars().next() {
        let negated = groups.last().copied().unwrap_or(false);

        match c {
            '!' => {
                negate_next = !negate_next;
                i += 1;
            }
            '(' => {
                groups.push(negated ^ negate_next);
                negate_next = false;
                i += 1;
            }
            ')' => {
                groups.pop();
                negate_next = false;
                i += 1;
            }
            '`' | '"' => {
                // String outside any predicate
                let body = &rule[i + 1..];
                i = match body.find(c) {
                    Some(end) => i + 1 + end + 1,
                    None => rule.len(),
                };
                negate_next = false;
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let len = rule[i..]
                    .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                    .unwrap_or(rule.len() - i);
                let ident = &rule[i..i + len];
                i += len;

                if rule[i..].starts_with('(') {
                    let (names, consumed) = quoted_args(&rule[i + 1..]);
                    i += 1 + consumed;

                    if ident == "Host" && !(negated ^ negate_next) {
                        hosts.extend(names.into_iter().filter_map(hostname::normalize));
                    }
                }
                negate_next = false;
            }
            c if c.is_whitespace() => i += c.len_utf8(),
            c => {
                negate_next = false;
                i += c.len_utf8();
            }
        }
    }

    hosts
}

/// Collect the quoted strings of an argument list up to its closing paren
///
/// Returns the strings and the number of bytes consumed (including the
/// closing paren when present).
fn quoted_args(args: &str) -> (Vec<&str>, usize) {
    let mut names = Vec::new();
    let mut open: Option<(char, usize)> = None;

    for (i, c) in args.char_indices() {
        match open {
            Some((quote, start)) if c == quote => {
                names.push(&args[start..i]);
                open = None;
            }
            Some(_) => {}
            None if c == '`' || c == '"' => open = Some((c, i + c.len_utf8())),
            None if c == ')' => return (names, i + 1),
            None => {}
        }
    }

    // Unterminated predicate: keep what was complete
    (names, args.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn proxy_config(port: u16) -> ProxyConfig {
        ProxyConfig {
            host: "127.0.0.1".to_string(),
            port,
            entry_points: vec!["web".to_string(), "websecure".to_string()],
            timeout_secs: 2,
        }
    }

    /// Serve a single canned HTTP response on a loopback port
    async fn serve_once(status: &'static str, body: String) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });

        port
    }

    #[test]
    fn test_extract_single_host() {
        assert_eq!(extract_hosts("Host(`app.example.com`)"), vec!["app.example.com"]);
    }

    #[test]
    fn test_extract_multiple_predicates_and_names() {
        let rule = "Host(`a.example.com`) || Host(`B.Example.com`, \"c.example.com\") && PathPrefix(`/x`)";
        assert_eq!(
            extract_hosts(rule),
            vec!["a.example.com", "b.example.com", "c.example.com"]
        );
    }

    #[test]
    fn test_extract_ignores_other_matchers() {
        assert!(extract_hosts("HostRegexp(`{sub:[a-z]+}.example.com`)").is_empty());
        assert!(extract_hosts("HostSNI(`*`)").is_empty());
        assert!(extract_hosts("PathPrefix(`/api`)").is_empty());
        assert!(extract_hosts("!Host(`blocked.example.com`)").is_empty());
        assert!(extract_hosts("!(Host(`blocked.example.com`))").is_empty());
        assert!(extract_hosts("!(PathPrefix(`/a`) || Host(`b.example.com`))").is_empty());
        assert!(extract_hosts("").is_empty());
    }

    #[test]
    fn test_extract_tracks_negation_through_groups() {
        assert_eq!(
            extract_hosts("!(!Host(`ok.example.com`))"),
            vec!["ok.example.com"]
        );
        assert_eq!(
            extract_hosts("(Host(`a.example.com`) || !(Host(`b.example.com`))) && Host(`c.example.com`)"),
            vec!["a.example.com", "c.example.com"]
        );
        assert_eq!(
            extract_hosts("XHost(`x.example.com`) || Host(`y.example.com`)"),
            vec!["y.example.com"]
        );
    }

    #[test]
    fn test_extract_unterminated_rule() {
        assert_eq!(extract_hosts("Host(`a.example.com`"), vec!["a.example.com"]);
        assert!(extract_hosts("Host(`a.example.com").is_empty());
    }

    #[test]
    fn test_parse_routers_skips_malformed_entries() {
        let body = r#"[
            {"name": "app@docker", "entryPoints": ["web"], "rule": "Host(`app.example.com`)", "status": "enabled"},
            {"entryPoints": "web"},
            {"name": "api@file", "entryPoints": ["websecure"], "rule": "Host(`api.example.com`)"}
        ]"#;

        let routers = parse_routers(body).unwrap();
        assert_eq!(routers.len(), 2);
        assert_eq!(routers[0].name, "app@docker");
        assert_eq!(routers[1].provider, None);
    }

    #[test]
    fn test_parse_routers_rejects_non_array() {
        assert!(matches!(
            parse_routers(r#"{"message": "not found"}"#),
            Err(Error::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_routers("<html>"),
            Err(Error::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_router_entry_point_filter() {
        let router = Router {
            name: "app@docker".to_string(),
            entry_points: vec!["traefik".to_string()],
            rule: Some("Host(`app.example.com`)".to_string()),
            service: None,
            status: None,
            provider: None,
        };
        let eps: HashSet<String> = ["web".to_string()].into_iter().collect();

        assert!(!router.serves(&eps));
    }

    #[tokio::test]
    async fn test_collect_filters_and_unions() {
        let body = serde_json::json!([
            {"name": "a@docker", "entryPoints": ["web"], "rule": "Host(`a.example.com`)"},
            {"name": "b@docker", "entryPoints": ["websecure"], "rule": "Host(`b.example.com`) || Host(`a.example.com`)"},
            {"name": "dash@internal", "entryPoints": ["traefik"], "rule": "Host(`dash.example.com`)"},
            {"name": "off@docker", "entryPoints": ["web"], "rule": "Host(`off.example.com`)", "status": "disabled"},
            {"name": "norule@docker", "entryPoints": ["web"]},
            {"name": "bad@docker", "entryPoints": ["web"], "rule": "Host(`bad..example.com`)"}
        ])
        .to_string();

        let port = serve_once("200 OK", body).await;
        let source = TraefikSource::new(&proxy_config(port)).unwrap();

        let hosts = source.collect().await.unwrap();
        assert_eq!(
            hosts.into_iter().collect::<Vec<_>>(),
            vec!["a.example.com", "b.example.com"]
        );
    }

    #[tokio::test]
    async fn test_collect_http_error_is_upstream_unavailable() {
        let port = serve_once("503 Service Unavailable", String::new()).await;
        let source = TraefikSource::new(&proxy_config(port)).unwrap();

        assert!(matches!(
            source.collect().await,
            Err(Error::UpstreamUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_collect_closed_port_is_upstream_unavailable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let source = TraefikSource::new(&proxy_config(port)).unwrap();
        assert!(matches!(
            source.collect().await,
            Err(Error::UpstreamUnavailable(_))
        ));
    }

    #[test]
    fn test_url() {
        let source = TraefikSource::new(&proxy_config(8080)).unwrap();
        assert_eq!(source.url(), "http://127.0.0.1:8080/api/http/routers");
    }
}
