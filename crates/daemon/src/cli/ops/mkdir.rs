use std::fmt;

use clap::Args;
use owo_colors::OwoColorize;

use lhfs_daemon::{ManagerApi, NodeError};

#[derive(Args, Debug, Clone)]
pub struct Mkdir {
    /// Logical path of the directory to create
    pub path: String,

    /// Node to create it on (defaults to the master)
    #[arg(long)]
    pub host: Option<String>,
}

#[derive(Debug)]
pub struct MkdirOutput {
    pub path: String,
}

impl fmt::Display for MkdirOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", "created".green(), self.path)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MkdirError {
    #[error("{0}")]
    Node(#[from] NodeError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Mkdir {
    type Error = MkdirError;
    type Output = MkdirOutput;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let dispatcher = ctx.dispatcher()?;
        dispatcher.on(self.host.as_deref()).mkdir(&self.path).await?;
        Ok(MkdirOutput {
            path: self.path.clone(),
        })
    }
}
