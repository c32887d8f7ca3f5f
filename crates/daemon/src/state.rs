//! On-disk configuration.

use std::net::ToSocketAddrs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::rpc::{BINRPC_DRIVER, DEFAULT_DRIVER};

pub const DEFAULT_RPC_PORT: u16 = 9527;
pub const CONFIG_FILE_NAME: &str = "lhfs.toml";

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("config file not found: {0}")]
    ConfigNotFound(PathBuf),
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Every key is optional; see the field defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory served by this node.
    pub root: PathBuf,
    /// Defaults to the system hostname.
    pub hostname: Option<String>,
    /// Defaults to the first address the hostname resolves to.
    pub ip: Option<String>,
    pub rpc_driver: String,
    /// Bind host of the RPC server, defaults to the node ip.
    pub rpc_host: Option<String>,
    pub rpc_port: u16,
    /// Transport of the master's RPC server. Defaults to this node's own
    /// address, which is right on the master itself.
    pub master_rpc: Option<String>,
    pub ssh_user: Option<String>,
    pub ssh_password: Option<String>,
    /// Seconds between heartbeats.
    pub heartbeat_interval: u64,
    /// Seconds after the last heartbeat before a node counts as down.
    pub heartbeat_alive: u64,
    /// Seconds before a forwarded call is abandoned.
    pub rpc_timeout: u64,
    /// Seconds of silence before the master forgets a node. Unset keeps
    /// nodes forever.
    pub node_evict_after: Option<u64>,
    pub log_file: Option<PathBuf>,
    pub debug: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            hostname: None,
            ip: None,
            rpc_driver: DEFAULT_DRIVER.to_string(),
            rpc_host: None,
            rpc_port: DEFAULT_RPC_PORT,
            master_rpc: None,
            ssh_user: None,
            ssh_password: None,
            heartbeat_interval: 10,
            heartbeat_alive: 60,
            rpc_timeout: 10,
            node_evict_after: None,
            log_file: None,
            debug: false,
        }
    }
}

impl AppConfig {
    pub fn from_toml(path: &Path, text: &str) -> Result<Self, StateError> {
        toml::from_str(text).map_err(|source| StateError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn read(path: &Path) -> Result<Self, StateError> {
        let text = std::fs::read_to_string(path).map_err(|source| StateError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(path, &text)
    }

    pub fn hostname(&self) -> String {
        if let Some(hostname) = &self.hostname {
            return hostname.clone();
        }
        hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "localhost".to_string())
    }

    pub fn ip(&self) -> String {
        if let Some(ip) = &self.ip {
            return ip.clone();
        }
        let resolved = (self.hostname().as_str(), 0)
            .to_socket_addrs()
            .ok()
            .and_then(|mut addrs| addrs.find(|a| a.is_ipv4()));
        match resolved {
            Some(addr) => addr.ip().to_string(),
            None => "127.0.0.1".to_string(),
        }
    }

    pub fn rpc_host(&self) -> String {
        self.rpc_host.clone().unwrap_or_else(|| self.ip())
    }

    pub fn master_rpc(&self) -> String {
        if let Some(master) = &self.master_rpc {
            return master.clone();
        }
        let scheme = if self.rpc_driver == BINRPC_DRIVER {
            "tcp"
        } else {
            "http"
        };
        format!("{scheme}://{}:{}", self.ip(), self.rpc_port)
    }
}

/// Loaded configuration plus where it came from.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config_path: Option<PathBuf>,
    pub config: AppConfig,
}

impl AppState {
    /// Load `explicit` if given (it must exist), otherwise the first of
    /// `/etc/lhfs/lhfs.toml`, `./etc/lhfs.toml` and the user config dir
    /// that exists. No file at all means defaults.
    pub fn load(explicit: Option<PathBuf>) -> Result<Self, StateError> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(StateError::ConfigNotFound(path));
            }
            let config = AppConfig::read(&path)?;
            return Ok(Self {
                config_path: Some(path),
                config,
            });
        }

        for candidate in Self::candidates() {
            if candidate.is_file() {
                let config = AppConfig::read(&candidate)?;
                return Ok(Self {
                    config_path: Some(candidate),
                    config,
                });
            }
        }

        Ok(Self {
            config_path: None,
            config: AppConfig::default(),
        })
    }

    fn candidates() -> Vec<PathBuf> {
        let mut candidates = vec![
            PathBuf::from("/etc/lhfs").join(CONFIG_FILE_NAME),
            PathBuf::from("./etc").join(CONFIG_FILE_NAME),
        ];
        if let Some(dir) = dirs::config_dir() {
            candidates.push(dir.join("lhfs").join(CONFIG_FILE_NAME));
        }
        candidates
    }
}
