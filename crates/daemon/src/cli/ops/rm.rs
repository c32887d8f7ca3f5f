use std::fmt;

use clap::Args;
use owo_colors::OwoColorize;

use lhfs_daemon::{ManagerApi, NodeError};

#[derive(Args, Debug, Clone)]
pub struct Rm {
    /// Logical path to remove
    pub path: String,

    /// Remove non-empty directories recursively
    #[arg(long, short)]
    pub force: bool,

    /// Node to remove it from (defaults to the master)
    #[arg(long)]
    pub host: Option<String>,
}

#[derive(Debug)]
pub struct RmOutput {
    pub path: String,
}

impl fmt::Display for RmOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", "removed".red(), self.path)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RmError {
    #[error("{0}")]
    Node(#[from] NodeError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Rm {
    type Error = RmError;
    type Output = RmOutput;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let dispatcher = ctx.dispatcher()?;
        dispatcher
            .on(self.host.as_deref())
            .rm(&self.path, self.force)
            .await?;
        Ok(RmOutput {
            path: self.path.clone(),
        })
    }
}
