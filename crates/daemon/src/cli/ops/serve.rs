use std::fmt;
use std::path::PathBuf;

use clap::Args;
use owo_colors::OwoColorize;

use common::node::Role;
use lhfs_daemon::{spawn_service, ServiceConfig, ServiceError};

#[derive(Args, Debug, Clone)]
pub struct Serve {
    /// Directory to serve (overrides `root` from the config file)
    pub root: Option<PathBuf>,

    /// Run as a slave reporting to the master
    #[arg(long)]
    pub slave: bool,

    /// Hostname to register under (defaults to the system hostname)
    #[arg(long)]
    pub hostname: Option<String>,

    /// Port for the RPC server
    #[arg(long)]
    pub port: Option<u16>,

    /// RPC driver: jsonrpc or binrpc
    #[arg(long)]
    pub driver: Option<String>,

    /// SSH user advertised for file streaming
    #[arg(long)]
    pub ssh_user: Option<String>,

    /// SSH password advertised for file streaming
    #[arg(long, env = "LHFS_SSH_PASSWORD", hide_env_values = true)]
    pub ssh_password: Option<String>,
}

#[derive(Debug)]
pub struct ServeOutput {
    pub hostname: String,
    pub role: Role,
}

impl fmt::Display for ServeOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", "stopped".yellow(), self.hostname.bold(), self.role)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("Service error: {0}")]
    Service(#[from] ServiceError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Serve {
    type Error = ServeError;
    type Output = ServeOutput;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let mut app = ctx.state.config.clone();
        if let Some(root) = &self.root {
            app.root = root.clone();
        }
        if let Some(hostname) = &self.hostname {
            app.hostname = Some(hostname.clone());
        }
        if let Some(port) = self.port {
            app.rpc_port = port;
        }
        if let Some(driver) = &self.driver {
            app.rpc_driver = driver.clone();
        }
        if let Some(user) = &self.ssh_user {
            app.ssh_user = Some(user.clone());
        }
        if let Some(password) = &self.ssh_password {
            app.ssh_password = Some(password.clone());
        }
        if let Some(master) = &ctx.master {
            app.master_rpc = Some(master.clone());
        }

        let role = if self.slave { Role::Slave } else { Role::Master };
        let config = ServiceConfig::from_app_config(&app, role);
        spawn_service(&config).await?;

        Ok(ServeOutput {
            hostname: config.hostname,
            role,
        })
    }
}
