//! Network entities: low-level connections plus the DNS and HTTP detail
//! records that specialize them.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{OntologyError, Result};

use super::objectid::ObjectId;
use super::process::{merge_opt_string, Process, ProcessUpdate};

// ============================================================
// Enumerations
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportLayerProtocol {
    Tcp,
    Udp,
}

impl TransportLayerProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportLayerProtocol::Tcp => "tcp",
            TransportLayerProtocol::Udp => "udp",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "tcp" => Ok(TransportLayerProtocol::Tcp),
            "udp" => Ok(TransportLayerProtocol::Udp),
            other => Err(OntologyError::InvalidValue {
                field: "transport_layer_protocol",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for TransportLayerProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionDirection {
    Outbound,
    Inbound,
    Unknown,
}

impl ConnectionDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionDirection::Outbound => "outbound",
            ConnectionDirection::Inbound => "inbound",
            ConnectionDirection::Unknown => "unknown",
        }
    }
}

/// What kind of application-layer traffic the connection carried, when known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    Http,
    Dns,
}

impl ConnectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionType::Http => "http",
            ConnectionType::Dns => "dns",
        }
    }
}

// ============================================================
// Detail records
// ============================================================

/// A DNS request and the addresses it resolved to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkDns {
    pub domain: String,
    pub resolved_ips: Vec<String>,
    pub lookup_type: String,
}

impl NetworkDns {
    pub fn new(domain: &str, resolved_ips: Vec<String>, lookup_type: &str) -> Result<Self> {
        if domain.is_empty() {
            return Err(OntologyError::MissingField("domain"));
        }
        if lookup_type.is_empty() {
            return Err(OntologyError::MissingField("lookup_type"));
        }
        Ok(Self {
            domain: domain.to_string(),
            resolved_ips,
            lookup_type: lookup_type.to_string(),
        })
    }

    pub fn as_primitives(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// An HTTP exchange. The on-disk body paths are working data for artifact
/// extraction and never leave the service, so they are excluded from the
/// serialized form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkHttp {
    pub request_uri: String,
    pub request_headers: HashMap<String, String>,
    pub request_method: String,
    pub request_body: Option<String>,
    pub response_headers: HashMap<String, String>,
    pub response_status_code: Option<u16>,
    pub response_body: Option<String>,
    #[serde(skip)]
    pub request_body_path: Option<String>,
    #[serde(skip)]
    pub response_body_path: Option<String>,
}

impl NetworkHttp {
    pub fn new(request_uri: &str, request_method: &str) -> Result<Self> {
        if request_uri.is_empty() {
            return Err(OntologyError::MissingField("request_uri"));
        }
        if request_method.is_empty() {
            return Err(OntologyError::MissingField("request_method"));
        }
        Ok(Self {
            request_uri: request_uri.to_string(),
            request_method: request_method.to_string(),
            ..Default::default()
        })
    }

    pub fn update(&mut self, update: NetworkHttpUpdate) {
        if self.request_headers.is_empty() {
            if let Some(headers) = update.request_headers {
                self.request_headers = headers;
            }
        }
        if self.response_headers.is_empty() {
            if let Some(headers) = update.response_headers {
                self.response_headers = headers;
            }
        }
        if self.response_status_code.is_none() {
            self.response_status_code = update.response_status_code;
        }
        merge_opt_string(&mut self.request_body, update.request_body.as_deref());
        merge_opt_string(&mut self.response_body, update.response_body.as_deref());
        merge_opt_string(&mut self.request_body_path, update.request_body_path.as_deref());
        merge_opt_string(&mut self.response_body_path, update.response_body_path.as_deref());
    }

    pub fn as_primitives(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[derive(Debug, Clone, Default)]
pub struct NetworkHttpUpdate {
    pub request_headers: Option<HashMap<String, String>>,
    pub request_body: Option<String>,
    pub response_headers: Option<HashMap<String, String>>,
    pub response_status_code: Option<u16>,
    pub response_body: Option<String>,
    pub request_body_path: Option<String>,
    pub response_body_path: Option<String>,
}

// ============================================================
// NetworkConnection
// ============================================================

/// A single observed network flow, optionally attributed to a process and
/// optionally specialized with DNS or HTTP details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConnection {
    pub objectid: ObjectId,
    pub destination_ip: String,
    pub destination_port: u16,
    pub transport_layer_protocol: TransportLayerProtocol,
    pub direction: ConnectionDirection,
    pub source_ip: Option<String>,
    pub source_port: Option<u16>,
    pub process: Option<Process>,
    pub connection_type: Option<ConnectionType>,
    pub http_details: Option<NetworkHttp>,
    pub dns_details: Option<NetworkDns>,
}

impl NetworkConnection {
    pub fn new(
        objectid: ObjectId,
        destination_ip: &str,
        destination_port: u16,
        transport_layer_protocol: TransportLayerProtocol,
        direction: ConnectionDirection,
    ) -> Result<Self> {
        if destination_ip.is_empty() {
            return Err(OntologyError::MissingField("destination_ip"));
        }
        Ok(Self {
            objectid,
            destination_ip: destination_ip.to_string(),
            destination_port,
            transport_layer_protocol,
            direction,
            source_ip: None,
            source_port: None,
            process: None,
            connection_type: None,
            http_details: None,
            dns_details: None,
        })
    }

    /// Attaches application-layer details. The detail record present must
    /// agree with the declared connection type.
    pub fn set_connection_details(
        &mut self,
        connection_type: ConnectionType,
        http_details: Option<NetworkHttp>,
        dns_details: Option<NetworkDns>,
    ) -> Result<()> {
        match connection_type {
            ConnectionType::Http => {
                if http_details.is_none() || dns_details.is_some() {
                    return Err(OntologyError::ConnectionDetailsMismatch(
                        "http connections require http_details and no dns_details".to_string(),
                    ));
                }
            }
            ConnectionType::Dns => {
                if dns_details.is_none() || http_details.is_some() {
                    return Err(OntologyError::ConnectionDetailsMismatch(
                        "dns connections require dns_details and no http_details".to_string(),
                    ));
                }
            }
        }
        self.connection_type = Some(connection_type);
        self.http_details = http_details;
        self.dns_details = dns_details;
        Ok(())
    }

    pub fn set_process(&mut self, process: Process) {
        self.process = Some(process);
    }

    pub fn update_process(&mut self, update: ProcessUpdate) {
        match self.process.as_mut() {
            Some(process) => process.update(update),
            None => log::debug!("You need to set process before updating it"),
        }
    }

    /// Builds the ObjectID tag for a flow. An outbound connection with a
    /// known destination domain is tagged by domain, everything else by IP.
    pub fn create_tag(
        destination_ip: &str,
        destination_port: u16,
        direction: ConnectionDirection,
        destination_domain: Option<&str>,
    ) -> String {
        match (direction, destination_domain) {
            (ConnectionDirection::Outbound, Some(domain)) if !domain.is_empty() => {
                format!("{}:{}", domain, destination_port)
            }
            _ => format!("{}:{}", destination_ip, destination_port),
        }
    }

    pub fn as_primitives(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn objectid(tag: &str) -> ObjectId {
        ObjectId::new(tag, "blah", "blah-service").unwrap()
    }

    fn connection() -> NetworkConnection {
        NetworkConnection::new(
            objectid("10.0.0.1:80"),
            "10.0.0.1",
            80,
            TransportLayerProtocol::Tcp,
            ConnectionDirection::Outbound,
        )
        .unwrap()
    }

    #[test]
    fn test_transport_layer_protocol_parse() {
        assert_eq!(TransportLayerProtocol::parse("tcp").unwrap(), TransportLayerProtocol::Tcp);
        assert_eq!(TransportLayerProtocol::parse("udp").unwrap(), TransportLayerProtocol::Udp);
        assert!(TransportLayerProtocol::parse("icmp").is_err());
    }

    #[test]
    fn test_create_tag_prefers_domain_for_outbound() {
        assert_eq!(
            NetworkConnection::create_tag("10.0.0.1", 443, ConnectionDirection::Outbound, Some("site.com")),
            "site.com:443"
        );
        assert_eq!(
            NetworkConnection::create_tag("10.0.0.1", 443, ConnectionDirection::Inbound, Some("site.com")),
            "10.0.0.1:443"
        );
        assert_eq!(
            NetworkConnection::create_tag("10.0.0.1", 443, ConnectionDirection::Outbound, None),
            "10.0.0.1:443"
        );
    }

    #[test]
    fn test_connection_details_gating() {
        let http = NetworkHttp::new("http://site.com/", "GET").unwrap();
        let dns = NetworkDns::new("site.com", vec!["10.0.0.1".to_string()], "A").unwrap();

        let mut c = connection();
        assert!(c
            .set_connection_details(ConnectionType::Http, Some(http.clone()), None)
            .is_ok());
        assert_eq!(c.connection_type, Some(ConnectionType::Http));

        let mut c = connection();
        assert!(c
            .set_connection_details(ConnectionType::Http, None, Some(dns.clone()))
            .is_err());
        assert!(c
            .set_connection_details(ConnectionType::Dns, Some(http), Some(dns.clone()))
            .is_err());
        assert!(c.set_connection_details(ConnectionType::Dns, None, Some(dns)).is_ok());
    }

    #[test]
    fn test_http_update_fills_empty_only() {
        let mut http = NetworkHttp::new("http://site.com/", "GET").unwrap();
        http.response_status_code = Some(200);
        http.update(NetworkHttpUpdate {
            response_status_code: Some(404),
            request_body: Some("payload".to_string()),
            ..Default::default()
        });
        assert_eq!(http.response_status_code, Some(200));
        assert_eq!(http.request_body.as_deref(), Some("payload"));
    }
}
