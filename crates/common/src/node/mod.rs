//! Node identity and liveness.

mod registry;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use registry::{NodeRegistry, RegistryError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Master,
    Slave,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Master => write!(f, "master"),
            Role::Slave => write!(f, "slave"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "master" => Ok(Role::Master),
            "slave" => Ok(Role::Slave),
            other => Err(format!("unknown node role: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Active,
    Down,
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeStatus::Active => write!(f, "active"),
            NodeStatus::Down => write!(f, "down"),
        }
    }
}

/// One filesystem serving process.
///
/// `hostname` is the registry key. `transport` is the opaque address of
/// the node's RPC server and is only known once that server is bound.
/// `last_heartbeat` is stamped by the registry, never by the reporter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub hostname: String,
    pub role: Role,
    pub transport: Option<String>,
    pub ip: String,
    pub ssh_user: Option<String>,
    pub ssh_password: Option<String>,
    pub last_heartbeat: Option<DateTime<Utc>>,
}

impl Node {
    pub fn new(hostname: impl Into<String>, role: Role, ip: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            role,
            transport: None,
            ip: ip.into(),
            ssh_user: None,
            ssh_password: None,
            last_heartbeat: None,
        }
    }

    pub fn with_transport(mut self, transport: impl Into<String>) -> Self {
        self.transport = Some(transport.into());
        self
    }

    /// Active while the last heartbeat is younger than `alive`. A node
    /// that never reported is down.
    pub fn status(&self, now: DateTime<Utc>, alive: Duration) -> NodeStatus {
        match self.last_heartbeat {
            Some(heartbeat) if is_fresh(now, heartbeat, alive) => NodeStatus::Active,
            _ => NodeStatus::Down,
        }
    }

    pub fn is_active(&self, now: DateTime<Utc>, alive: Duration) -> bool {
        self.status(now, alive) == NodeStatus::Active
    }
}

fn is_fresh(now: DateTime<Utc>, heartbeat: DateTime<Utc>, alive: Duration) -> bool {
    match chrono::Duration::from_std(alive) {
        Ok(alive) => now.signed_duration_since(heartbeat) < alive,
        Err(_) => true,
    }
}

/// A node together with its status, derived at read time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeReport {
    pub node: Node,
    pub status: NodeStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALIVE: Duration = Duration::from_secs(60);

    fn node_seen(ago: i64, now: DateTime<Utc>) -> Node {
        let mut node = Node::new("worker-1", Role::Slave, "10.0.0.2");
        node.last_heartbeat = Some(now - chrono::Duration::seconds(ago));
        node
    }

    #[test]
    fn test_status_thresholds() {
        let now = Utc::now();
        assert_eq!(node_seen(61, now).status(now, ALIVE), NodeStatus::Down);
        assert_eq!(node_seen(60, now).status(now, ALIVE), NodeStatus::Down);
        assert_eq!(node_seen(59, now).status(now, ALIVE), NodeStatus::Active);
    }

    #[test]
    fn test_never_reported_is_down() {
        let node = Node::new("worker-1", Role::Slave, "10.0.0.2");
        assert_eq!(node.status(Utc::now(), ALIVE), NodeStatus::Down);
    }

    #[test]
    fn test_role_parse_and_display() {
        assert_eq!("Master".parse::<Role>().unwrap(), Role::Master);
        assert_eq!(Role::Slave.to_string(), "slave");
        assert!("leader".parse::<Role>().is_err());
    }
}
