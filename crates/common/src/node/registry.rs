use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use super::{Node, NodeReport};
use crate::error::{ErrorKind, Fault};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("node {hostname} is registered with ip {existing_ip}, refusing report from {reported_ip}")]
    ConflictingNode {
        hostname: String,
        existing_ip: String,
        reported_ip: String,
    },
}

impl RegistryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::ConflictingNode { .. } => ErrorKind::ConflictingNode,
        }
    }
}

impl From<RegistryError> for Fault {
    fn from(err: RegistryError) -> Self {
        Fault::new(err.kind(), err.to_string())
    }
}

/// Hostname keyed set of known nodes, held by the master.
///
/// Cheap to clone; clones share the same map. All access goes through one
/// lock so readers always see a consistent snapshot.
///
/// Reports are applied in arrival order. A delayed report can overwrite a
/// newer one (last applied wins); nothing orders reports from one node.
#[derive(Debug, Clone, Default)]
pub struct NodeRegistry {
    nodes: Arc<RwLock<HashMap<String, Node>>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a heartbeat stamped with the current time.
    pub fn report_heartbeat(&self, node: Node) -> Result<Node, RegistryError> {
        self.report_heartbeat_at(node, Utc::now())
    }

    /// Record a heartbeat stamped with `now`. A report whose ip differs
    /// from the stored record for the same hostname is rejected and the
    /// registry is left untouched.
    pub fn report_heartbeat_at(
        &self,
        mut node: Node,
        now: DateTime<Utc>,
    ) -> Result<Node, RegistryError> {
        let mut nodes = self.nodes.write();
        if let Some(existing) = nodes.get(&node.hostname) {
            if existing.ip != node.ip {
                return Err(RegistryError::ConflictingNode {
                    hostname: node.hostname,
                    existing_ip: existing.ip.clone(),
                    reported_ip: node.ip,
                });
            }
        }

        node.last_heartbeat = Some(now);
        nodes.insert(node.hostname.clone(), node.clone());
        Ok(node)
    }

    /// Every known node with its status computed against `now`, sorted by
    /// hostname.
    pub fn list(&self, now: DateTime<Utc>, alive: Duration) -> Vec<NodeReport> {
        let mut reports: Vec<NodeReport> = self
            .nodes
            .read()
            .values()
            .map(|node| NodeReport {
                status: node.status(now, alive),
                node: node.clone(),
            })
            .collect();
        reports.sort_by(|a, b| a.node.hostname.cmp(&b.node.hostname));
        reports
    }

    pub fn get(&self, hostname: &str) -> Option<Node> {
        self.nodes.read().get(hostname).cloned()
    }

    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }

    /// Drop nodes silent for at least `window`, except `keep`. Returns the
    /// evicted hostnames.
    pub fn evict_silent(&self, now: DateTime<Utc>, window: Duration, keep: &str) -> Vec<String> {
        let mut nodes = self.nodes.write();
        let stale: Vec<String> = nodes
            .values()
            .filter(|node| node.hostname != keep && !node.is_active(now, window))
            .map(|node| node.hostname.clone())
            .collect();
        for hostname in &stale {
            nodes.remove(hostname);
        }
        stale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeStatus, Role};

    const ALIVE: Duration = Duration::from_secs(60);

    fn slave(hostname: &str, ip: &str) -> Node {
        Node::new(hostname, Role::Slave, ip).with_transport(format!("http://{ip}:9527"))
    }

    #[test]
    fn test_insert_then_update_is_monotonic() {
        let registry = NodeRegistry::new();
        let t0 = Utc::now();
        let t1 = t0 + chrono::Duration::seconds(10);

        registry.report_heartbeat_at(slave("a", "10.0.0.1"), t0).unwrap();
        let first = registry.get("a").unwrap().last_heartbeat.unwrap();
        registry.report_heartbeat_at(slave("a", "10.0.0.1"), t1).unwrap();
        let second = registry.get("a").unwrap().last_heartbeat.unwrap();

        assert!(second >= first);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_conflicting_ip_leaves_entry_unchanged() {
        let registry = NodeRegistry::new();
        registry.report_heartbeat(slave("a", "10.0.0.1")).unwrap();
        let before = registry.get("a").unwrap();

        let err = registry
            .report_heartbeat_at(slave("a", "10.0.0.9"), Utc::now() + chrono::Duration::seconds(5))
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ConflictingNode);
        assert_eq!(registry.get("a").unwrap(), before);
    }

    #[test]
    fn test_reporter_supplied_heartbeat_is_ignored() {
        let registry = NodeRegistry::new();
        let now = Utc::now();
        let mut node = slave("a", "10.0.0.1");
        node.last_heartbeat = Some(now - chrono::Duration::days(3));

        let stored = registry.report_heartbeat_at(node, now).unwrap();
        assert_eq!(stored.last_heartbeat, Some(now));
    }

    #[test]
    fn test_list_derives_status_at_read_time() {
        let registry = NodeRegistry::new();
        let t0 = Utc::now();
        registry.report_heartbeat_at(slave("b", "10.0.0.2"), t0).unwrap();
        registry.report_heartbeat_at(slave("a", "10.0.0.1"), t0).unwrap();

        let reports = registry.list(t0 + chrono::Duration::seconds(59), ALIVE);
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].node.hostname, "a");
        assert!(reports.iter().all(|r| r.status == NodeStatus::Active));

        let reports = registry.list(t0 + chrono::Duration::seconds(61), ALIVE);
        assert!(reports.iter().all(|r| r.status == NodeStatus::Down));
    }

    #[test]
    fn test_down_node_revives() {
        let registry = NodeRegistry::new();
        let t0 = Utc::now();
        registry.report_heartbeat_at(slave("a", "10.0.0.1"), t0).unwrap();
        let later = t0 + chrono::Duration::seconds(120);
        assert_eq!(registry.list(later, ALIVE)[0].status, NodeStatus::Down);

        registry.report_heartbeat_at(slave("a", "10.0.0.1"), later).unwrap();
        assert_eq!(registry.list(later, ALIVE)[0].status, NodeStatus::Active);
    }

    #[test]
    fn test_evict_silent_keeps_self() {
        let registry = NodeRegistry::new();
        let t0 = Utc::now();
        registry.report_heartbeat_at(slave("master", "10.0.0.1"), t0).unwrap();
        registry.report_heartbeat_at(slave("gone", "10.0.0.2"), t0).unwrap();

        let evicted = registry.evict_silent(
            t0 + chrono::Duration::hours(2),
            Duration::from_secs(3600),
            "master",
        );
        assert_eq!(evicted, vec!["gone".to_string()]);
        assert!(registry.get("master").is_some());
        assert!(registry.get("gone").is_none());
    }
}
