use std::path::PathBuf;
use std::time::Duration;

use common::node::{Node, Role};

use crate::state::AppConfig;

/// Everything a running node needs, with defaults already applied.
#[derive(Debug, Clone)]
pub struct Config {
    pub root: PathBuf,
    pub role: Role,
    pub hostname: String,
    pub ip: String,
    pub ssh_user: Option<String>,
    pub ssh_password: Option<String>,
    pub rpc_driver: String,
    pub rpc_host: String,
    pub rpc_port: u16,
    /// Where a slave sends its heartbeats.
    pub master_rpc: String,
    pub heartbeat_interval: Duration,
    pub heartbeat_alive: Duration,
    pub rpc_timeout: Duration,
    pub node_evict_after: Option<Duration>,
}

impl Config {
    pub fn from_app_config(app: &AppConfig, role: Role) -> Self {
        Self {
            root: app.root.clone(),
            role,
            hostname: app.hostname(),
            ip: app.ip(),
            ssh_user: app.ssh_user.clone(),
            ssh_password: app.ssh_password.clone(),
            rpc_driver: app.rpc_driver.clone(),
            rpc_host: app.rpc_host(),
            rpc_port: app.rpc_port,
            master_rpc: app.master_rpc(),
            heartbeat_interval: Duration::from_secs(app.heartbeat_interval),
            heartbeat_alive: Duration::from_secs(app.heartbeat_alive),
            rpc_timeout: Duration::from_secs(app.rpc_timeout),
            node_evict_after: app.node_evict_after.map(Duration::from_secs),
        }
    }

    /// This node's identity before its RPC server is bound.
    pub fn identity(&self) -> Node {
        let mut node = Node::new(self.hostname.clone(), self.role, self.ip.clone());
        node.ssh_user = self.ssh_user.clone();
        node.ssh_password = self.ssh_password.clone();
        node
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_app_config() {
        let app = AppConfig {
            hostname: Some("box".into()),
            ip: Some("10.1.1.1".into()),
            ssh_user: Some("root".into()),
            node_evict_after: Some(3600),
            ..AppConfig::default()
        };
        let config = Config::from_app_config(&app, Role::Slave);
        assert_eq!(config.heartbeat_interval, Duration::from_secs(10));
        assert_eq!(config.heartbeat_alive, Duration::from_secs(60));
        assert_eq!(config.node_evict_after, Some(Duration::from_secs(3600)));
        assert_eq!(config.master_rpc, "http://10.1.1.1:9527");

        let identity = config.identity();
        assert_eq!(identity.hostname, "box");
        assert_eq!(identity.role, Role::Slave);
        assert_eq!(identity.ssh_user.as_deref(), Some("root"));
        assert!(identity.transport.is_none());
    }
}
