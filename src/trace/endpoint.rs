//! Network context of a traced service.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};

/// The service name recorded when none was configured.
pub const UNKNOWN_SERVICE_NAME: &str = "unknown";

/// The network context of a node in the call graph.
///
/// Every span carries the local endpoint of the service that recorded it;
/// client and producer spans may additionally carry the remote endpoint
/// they talked to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    service_name: String,
    ipv4: Option<std::net::Ipv4Addr>,
    ipv6: Option<std::net::Ipv6Addr>,
    port: Option<u16>,
}

impl Endpoint {
    /// Create an endpoint for `service_name`, optionally bound to a socket
    /// address.
    pub fn new(service_name: String, socket_addr: Option<SocketAddr>) -> Self {
        match socket_addr {
            Some(SocketAddr::V4(v4)) => Endpoint {
                service_name,
                ipv4: Some(*v4.ip()),
                ipv6: None,
                port: Some(v4.port()),
            },
            Some(SocketAddr::V6(v6)) => Endpoint {
                service_name,
                ipv4: None,
                ipv6: Some(*v6.ip()),
                port: Some(v6.port()),
            },
            None => Endpoint {
                service_name,
                ipv4: None,
                ipv6: None,
                port: None,
            },
        }
    }

    /// The lowercase label of this node in the service graph.
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// The ip address of this endpoint, if known.
    pub fn ip(&self) -> Option<IpAddr> {
        self.ipv4
            .map(IpAddr::V4)
            .or_else(|| self.ipv6.map(IpAddr::V6))
    }

    /// The ipv4 address of this endpoint, if known.
    pub fn ipv4(&self) -> Option<std::net::Ipv4Addr> {
        self.ipv4
    }

    /// The ipv6 address of this endpoint, if known.
    pub fn ipv6(&self) -> Option<std::net::Ipv6Addr> {
        self.ipv6
    }

    /// The port of this endpoint, if known.
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Returns a copy of this endpoint relabeled with `service_name`.
    pub fn with_service_name(&self, service_name: impl Into<String>) -> Self {
        Endpoint {
            service_name: service_name.into(),
            ..self.clone()
        }
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Endpoint::new(UNKNOWN_SERVICE_NAME.to_owned(), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn from_socket_addr() {
        let endpoint = Endpoint::new(
            "frontend".to_owned(),
            Some(SocketAddr::from((Ipv4Addr::new(192, 168, 0, 1), 8080))),
        );
        assert_eq!(endpoint.service_name(), "frontend");
        assert_eq!(endpoint.ipv4(), Some(Ipv4Addr::new(192, 168, 0, 1)));
        assert_eq!(endpoint.ipv6(), None);
        assert_eq!(endpoint.port(), Some(8080));
    }

    #[test]
    fn default_uses_the_unknown_sentinel() {
        assert_eq!(Endpoint::default().service_name(), UNKNOWN_SERVICE_NAME);
    }

    #[test]
    fn with_service_name_returns_a_relabeled_copy() {
        let endpoint = Endpoint::new("frontend".to_owned(), None);
        let renamed = endpoint.with_service_name("backend");
        assert_eq!(endpoint.service_name(), "frontend");
        assert_eq!(renamed.service_name(), "backend");
    }
}
