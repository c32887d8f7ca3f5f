use std::fmt;

use clap::Args;
use comfy_table::Table;
use owo_colors::OwoColorize;

use common::node::{NodeReport, NodeStatus};
use lhfs_daemon::{ManagerApi, NodeError};

#[derive(Args, Debug, Clone)]
pub struct Nodes {
    /// Also show transports and ssh users
    #[arg(long, short)]
    pub long: bool,
}

#[derive(Debug)]
pub struct NodesOutput {
    pub nodes: Vec<NodeReport>,
    pub long: bool,
}

impl fmt::Display for NodesOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nodes.is_empty() {
            return write!(f, "No nodes registered");
        }

        let mut table = Table::new();
        let mut header = vec!["HOSTNAME", "ROLE", "IP", "STATUS", "LAST HEARTBEAT"];
        if self.long {
            header.extend(["TRANSPORT", "SSH USER"]);
        }
        table.set_header(header);

        for report in &self.nodes {
            let node = &report.node;
            let status = match report.status {
                NodeStatus::Active => "active".green().to_string(),
                NodeStatus::Down => "down".red().to_string(),
            };
            let heartbeat = node
                .last_heartbeat
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "-".to_string());
            let mut row = vec![
                node.hostname.clone(),
                node.role.to_string(),
                node.ip.clone(),
                status,
                heartbeat,
            ];
            if self.long {
                row.push(node.transport.clone().unwrap_or_else(|| "-".to_string()));
                row.push(node.ssh_user.clone().unwrap_or_else(|| "-".to_string()));
            }
            table.add_row(row);
        }
        write!(f, "{table}")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NodesError {
    #[error("{0}")]
    Node(#[from] NodeError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Nodes {
    type Error = NodesError;
    type Output = NodesOutput;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let nodes = ctx.master()?.list_nodes().await?;
        Ok(NodesOutput {
            nodes,
            long: self.long,
        })
    }
}
