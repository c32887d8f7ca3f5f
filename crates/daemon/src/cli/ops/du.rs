use std::fmt;

use clap::Args;
use owo_colors::OwoColorize;

use common::fs::{human_size, DiskUsage};
use lhfs_daemon::{ManagerApi, NodeError};

#[derive(Args, Debug, Clone)]
pub struct Du {
    /// Node to inspect (defaults to the master)
    #[arg(long)]
    pub host: Option<String>,
}

#[derive(Debug)]
pub struct DuOutput {
    pub host: String,
    pub usage: DiskUsage,
}

impl fmt::Display for DuOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}:", self.host.bold())?;
        writeln!(f, "  {} {}", "total:".dimmed(), human_size(self.usage.total))?;
        writeln!(f, "  {} {}", "used:".dimmed(), human_size(self.usage.used))?;
        writeln!(f, "  {} {}", "free:".dimmed(), human_size(self.usage.free))?;
        let percent = format!("{:.1}%", self.usage.percent);
        let percent = if self.usage.percent >= 90.0 {
            percent.red().to_string()
        } else {
            percent.green().to_string()
        };
        write!(f, "  {} {}", "percent:".dimmed(), percent)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DuError {
    #[error("{0}")]
    Node(#[from] NodeError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Du {
    type Error = DuError;
    type Output = DuOutput;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let dispatcher = ctx.dispatcher()?;
        let usage = dispatcher.on(self.host.as_deref()).disk_usage().await?;
        Ok(DuOutput {
            host: self.host.clone().unwrap_or_else(|| "master".to_string()),
            usage,
        })
    }
}
