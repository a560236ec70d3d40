/// Server address parsing and formatting
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{TopologyError, TopologyResult};

/// Port used when an address string omits one
pub const DEFAULT_PORT: u16 = 27017;

/// Network identity of one monitored server
///
/// Hosts are stored lowercased so `DB1:27017` and `db1:27017` key the same
/// description.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServerAddress {
    host: String,
    port: u16,
}

impl ServerAddress {
    pub fn new<S: Into<String>>(host: S, port: u16) -> Self {
        Self {
            host: host.into().to_ascii_lowercase(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Parse `host`, `host:port`, `[v6]` or `[v6]:port`
    pub fn parse(address: &str) -> TopologyResult<Self> {
        let trimmed = address.trim();
        if trimmed.is_empty() {
            return Err(TopologyError::invalid_address(address, "empty address"));
        }

        let (host, port) = if let Some(rest) = trimmed.strip_prefix('[') {
            let end = rest
                .find(']')
                .ok_or_else(|| TopologyError::invalid_address(address, "unterminated IPv6 literal"))?;
            let host = &rest[..end];
            let port = match &rest[end + 1..] {
                "" => None,
                tail => Some(tail.strip_prefix(':').ok_or_else(|| {
                    TopologyError::invalid_address(address, "expected ':' after IPv6 literal")
                })?),
            };
            (host, port)
        } else {
            match trimmed.rsplit_once(':') {
                Some((host, port)) => (host, Some(port)),
                None => (trimmed, None),
            }
        };

        if host.is_empty() {
            return Err(TopologyError::invalid_address(address, "missing host"));
        }
        if host.contains(':') && !trimmed.starts_with('[') {
            return Err(TopologyError::invalid_address(
                address,
                "IPv6 hosts must be enclosed in brackets",
            ));
        }

        let port = match port {
            None => DEFAULT_PORT,
            Some(port) => match port.parse::<u16>() {
                Ok(0) | Err(_) => {
                    return Err(TopologyError::invalid_address(
                        address,
                        format!("invalid port '{port}'"),
                    ))
                }
                Ok(port) => port,
            },
        };

        Ok(Self::new(host, port))
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for ServerAddress {
    type Err = TopologyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ServerAddress {
    type Error = TopologyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ServerAddress> for String {
    fn from(address: ServerAddress) -> Self {
        address.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_host_and_port() {
        let addr = ServerAddress::parse("DB1.Example.com:27018").unwrap();
        assert_eq!(addr.host(), "db1.example.com");
        assert_eq!(addr.port(), 27018);
        assert_eq!(addr.to_string(), "db1.example.com:27018");
    }

    #[test]
    fn test_parse_default_port() {
        let addr: ServerAddress = "localhost".parse().unwrap();
        assert_eq!(addr.port(), DEFAULT_PORT);
        assert_eq!(addr, ServerAddress::new("localhost", 27017));
    }

    #[test]
    fn test_parse_ipv6() {
        let addr = ServerAddress::parse("[::1]:27019").unwrap();
        assert_eq!(addr.host(), "::1");
        assert_eq!(addr.port(), 27019);
        assert_eq!(addr.to_string(), "[::1]:27019");

        let addr = ServerAddress::parse("[fe80::1]").unwrap();
        assert_eq!(addr.port(), DEFAULT_PORT);
    }

    #[test]
    fn test_parse_rejects_invalid() {
        assert!(ServerAddress::parse("").is_err());
        assert!(ServerAddress::parse(":27017").is_err());
        assert!(ServerAddress::parse("host:notaport").is_err());
        assert!(ServerAddress::parse("host:0").is_err());
        assert!(ServerAddress::parse("host:70000").is_err());
        assert!(ServerAddress::parse("[::1").is_err());
        assert!(ServerAddress::parse("[::1]27017").is_err());
    }

    #[test]
    fn test_serde_as_string() {
        #[derive(Serialize, Deserialize)]
        struct Wrapper {
            address: ServerAddress,
        }

        let parsed: Wrapper = toml::from_str("address = \"db2:27020\"").unwrap();
        assert_eq!(parsed.address, ServerAddress::new("db2", 27020));

        let rendered = toml::to_string(&parsed).unwrap();
        assert!(rendered.contains("\"db2:27020\""));
    }
}
