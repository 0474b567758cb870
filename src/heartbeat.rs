//! Heartbeat wire format.
//!
//! One message per line, comma-separated: `<resource-id>,<port>[,<port>...]`.
//! The format has no escaping: a resource id containing a comma cannot be
//! represented. This is a known limitation of the wire format, not something
//! the parser tries to repair.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::MonitorError;

/// One parsed heartbeat message: a resource id and the ports to fence when
/// the resource is down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heartbeat {
    pub resource: String,
    pub ports: BTreeSet<u16>,
}

impl Heartbeat {
    pub fn new(resource: impl Into<String>, ports: impl IntoIterator<Item = u16>) -> Self {
        Self {
            resource: resource.into(),
            ports: ports.into_iter().collect(),
        }
    }
}

impl FromStr for Heartbeat {
    type Err = MonitorError;

    /// Parse one heartbeat line. A line with an empty id, no ports, or any
    /// port that is not a positive 16-bit integer rejects the whole message;
    /// partial acceptance would let a truncated write half-register.
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let mut fields = line.split(',');

        let resource = fields.next().unwrap_or("").trim();
        if resource.is_empty() {
            return Err(MonitorError::MalformedMessage(line.to_string()));
        }

        let mut ports = BTreeSet::new();
        for field in fields {
            match field.trim().parse::<u16>() {
                Ok(port) if port > 0 => {
                    ports.insert(port);
                }
                _ => return Err(MonitorError::MalformedMessage(line.to_string())),
            }
        }
        if ports.is_empty() {
            return Err(MonitorError::MalformedMessage(line.to_string()));
        }

        Ok(Self {
            resource: resource.to_string(),
            ports,
        })
    }
}

impl fmt::Display for Heartbeat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.resource)?;
        for port in &self.ports {
            write!(f, ",{}", port)?;
        }
        Ok(())
    }
}
