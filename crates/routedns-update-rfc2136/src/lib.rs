// # RFC 2136 DNS Updater
//
// This crate provides the dynamic-update DnsUpdater for routedns.
//
// ## Implementation
//
// - One UPDATE message per engine call, sent over UDP to the configured server
// - Add replaces the hostname's RRset of the target's family in a single
//   transaction (delete RRset, then add), so re-adding is idempotent
// - Delete removes the hostname's RRset of the given family
// - A records for IPv4 targets, AAAA records for IPv6 targets
// - ❌ NO retry logic (owned by ReconcileEngine: the next pass retries)
// - ❌ NO TSIG signing (the target server accepts updates by source address)
//
// ## Architectural Constraints
//
// ### Trust Level: Untrusted (DNS Updater)
//
// **Allowed Capabilities**:
// - ✅ Send UPDATE messages to the configured server only
// - ✅ Classify the server's answer
//
// **Forbidden Capabilities**:
// - ❌ Access state store (owned by ReconcileEngine)
// - ❌ Decide what to add or delete (owned by ReconcileEngine)
// - ❌ Cache anything between calls
//
// ## Protocol Reference
//
// - RFC 2136: Dynamic Updates in the Domain Name System
//   - Zone section: the zone name with type SOA
//   - Update section: class ANY with empty RDATA deletes an RRset,
//     class IN adds a record

use async_trait::async_trait;
use hickory_client::client::{Client, SyncClient};
use hickory_client::error::{ClientError, ClientErrorKind};
use hickory_client::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_client::proto::error::ProtoErrorKind;
use hickory_client::rr::{DNSClass, Name, RData, Record, RecordType};
use hickory_client::udp::UdpClientConnection;
use routedns_core::config::DnsConfig;
use routedns_core::hostname::DomainSuffix;
use routedns_core::traits::DnsUpdater;
use routedns_core::{Error, Result};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tracing::debug;

/// Change carried by one UPDATE message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateAction {
    /// Replace the RRset of the address's family with this single address
    Replace(IpAddr),
    /// Delete the RRset of the address's family
    Delete(IpAddr),
}

impl UpdateAction {
    fn record_type(&self) -> RecordType {
        let ip = match self {
            UpdateAction::Replace(ip) | UpdateAction::Delete(ip) => ip,
        };
        if ip.is_ipv4() {
            RecordType::A
        } else {
            RecordType::AAAA
        }
    }
}

/// RFC 2136 dynamic update client
#[derive(Debug, Clone)]
pub struct Rfc2136Updater {
    /// Server accepting updates
    server: SocketAddr,

    /// Zone every update is scoped to
    zone: DomainSuffix,

    /// TTL of added records
    ttl: u32,

    /// Per-transaction timeout
    timeout: Duration,
}

impl Rfc2136Updater {
    /// Create a new updater from DNS configuration
    pub fn new(config: &DnsConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            server: config.server,
            zone: config.domain.clone(),
            ttl: config.ttl,
            timeout: config.timeout(),
        })
    }

    /// Build and send one UPDATE, then classify the answer
    async fn execute(&self, hostname: &str, action: UpdateAction) -> Result<()> {
        let message = build_update(&self.zone, hostname, action, self.ttl)?;

        let server = self.server;
        let timeout = self.timeout;
        let host = hostname.to_string();

        debug!(hostname = %hostname, action = ?action, server = %server, "Sending DNS update");

        // hickory's SyncClient blocks; keep it off the async workers
        tokio::task::spawn_blocking(move || send_update(server, timeout, &host, message))
            .await
            .map_err(|e| Error::Other(format!("DNS update task failed: {}", e)))?
    }
}

#[async_trait]
impl DnsUpdater for Rfc2136Updater {
    async fn add(&self, hostname: &str, ip: IpAddr) -> Result<()> {
        self.execute(hostname, UpdateAction::Replace(ip)).await
    }

    async fn delete(&self, hostname: &str, ip: IpAddr) -> Result<()> {
        self.execute(hostname, UpdateAction::Delete(ip)).await
    }

    fn updater_name(&self) -> &'static str {
        "rfc2136"
    }
}

/// Build the UPDATE message for one hostname
///
/// # Errors
///
/// - `Error::UpdateRejected`: the hostname is not inside `zone` or is not a
///   valid DNS name (sending would only earn a NOTZONE or FORMERR)
pub fn build_update(
    zone: &DomainSuffix,
    hostname: &str,
    action: UpdateAction,
    ttl: u32,
) -> Result<Message> {
    if !zone.matches(hostname) {
        return Err(Error::rejected(
            hostname,
            format!("not inside zone {}", zone),
        ));
    }

    let zone_name = fqdn(zone.as_str()).map_err(|e| Error::rejected(hostname, e))?;
    let name = fqdn(hostname).map_err(|e| Error::rejected(hostname, e))?;
    let record_type = action.record_type();

    let mut zone_query = Query::query(zone_name, RecordType::SOA);
    zone_query.set_query_class(DNSClass::IN);

    let mut message = Message::new();
    message
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Update)
        .set_recursion_desired(false)
        .add_query(zone_query);

    let mut delete_rrset = Record::with(name.clone(), record_type, 0);
    delete_rrset.set_dns_class(DNSClass::ANY);
    message.add_name_server(delete_rrset);

    if let UpdateAction::Replace(ip) = action {
        let rdata = match ip {
            IpAddr::V4(v4) => RData::A(v4.into()),
            IpAddr::V6(v6) => RData::AAAA(v6.into()),
        };
        message.add_name_server(Record::from_rdata(name, ttl, rdata));
    }

    Ok(message)
}

fn fqdn(name: &str) -> std::result::Result<Name, String> {
    Name::from_ascii(format!("{}.", name)).map_err(|e| format!("invalid name '{}': {}", name, e))
}

fn send_update(server: SocketAddr, timeout: Duration, hostname: &str, message: Message) -> Result<()> {
    let conn = UdpClientConnection::with_timeout(server, timeout)
        .map_err(|e| classify(hostname, e))?;
    let client = SyncClient::new(conn);

    let response = client
        .send(message)
        .into_iter()
        .next()
        // SyncClient yields nothing when the server stays silent past the timeout
        .ok_or_else(|| Error::timeout(hostname))?
        .map_err(|e| classify(hostname, e))?;

    match response.response_code() {
        ResponseCode::NoError => Ok(()),
        code => Err(Error::rejected(hostname, format!("{:?}", code))),
    }
}

/// Map a transport failure onto the updater error classes
fn classify(hostname: &str, error: ClientError) -> Error {
    match error.kind() {
        ClientErrorKind::Timeout => Error::timeout(hostname),
        ClientErrorKind::Proto(proto) if matches!(proto.kind(), ProtoErrorKind::Timeout) => {
            Error::timeout(hostname)
        }
        _ => Error::unreachable(hostname, error.to_string()),
    }
}
