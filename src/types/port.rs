// ABOUTME: Container port parsing and formatting.
// ABOUTME: Handles "80", "80/tcp" and "53/udp" style port specifications.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PortParseError {
    #[error("port specification cannot be empty")]
    Empty,

    #[error("invalid port number: {0}")]
    InvalidNumber(String),

    #[error("port number must be between 1 and 65535")]
    OutOfRange,

    #[error("unknown port protocol: {0}")]
    UnknownProtocol(String),
}

/// Transport protocol of a container port.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
    Sctp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
            Protocol::Sctp => "sctp",
        }
    }
}

impl FromStr for Protocol {
    type Err = PortParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Protocol::Tcp),
            "udp" => Ok(Protocol::Udp),
            "sctp" => Ok(Protocol::Sctp),
            _ => Err(PortParseError::UnknownProtocol(s.to_string())),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A port inside the container, qualified by protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerPort {
    number: u16,
    protocol: Protocol,
}

impl ContainerPort {
    pub fn new(number: u16, protocol: Protocol) -> Self {
        Self { number, protocol }
    }

    pub fn tcp(number: u16) -> Self {
        Self::new(number, Protocol::Tcp)
    }

    pub fn udp(number: u16) -> Self {
        Self::new(number, Protocol::Udp)
    }

    pub fn parse(input: &str) -> Result<Self, PortParseError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(PortParseError::Empty);
        }

        let (number, protocol) = match input.split_once('/') {
            Some((number, protocol)) => (number, protocol.parse()?),
            None => (input, Protocol::Tcp),
        };

        let number: u16 = number
            .parse()
            .map_err(|_| PortParseError::InvalidNumber(number.to_string()))?;
        if number == 0 {
            return Err(PortParseError::OutOfRange);
        }

        Ok(Self { number, protocol })
    }

    pub fn number(&self) -> u16 {
        self.number
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn is_tcp(&self) -> bool {
        self.protocol == Protocol::Tcp
    }
}

impl FromStr for ContainerPort {
    type Err = PortParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ContainerPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.number, self.protocol)
    }
}

impl Serialize for ContainerPort {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ContainerPort {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // YAML hands us bare numbers for `port: 8080`.
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u16),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(0) => Err(serde::de::Error::custom(PortParseError::OutOfRange)),
            Raw::Number(n) => Ok(ContainerPort::tcp(n)),
            Raw::Text(s) => ContainerPort::parse(&s).map_err(serde::de::Error::custom),
        }
    }
}
