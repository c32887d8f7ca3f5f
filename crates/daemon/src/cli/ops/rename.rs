use std::fmt;

use clap::Args;

use lhfs_daemon::{ManagerApi, NodeError};

#[derive(Args, Debug, Clone)]
pub struct Rename {
    /// Logical path to rename
    pub path: String,

    /// New name within the same directory
    pub new_name: String,

    /// Node holding the path (defaults to the master)
    #[arg(long)]
    pub host: Option<String>,
}

#[derive(Debug)]
pub struct RenameOutput {
    pub from: String,
    pub to: String,
}

impl fmt::Display for RenameOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RenameError {
    #[error("{0}")]
    Node(#[from] NodeError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Rename {
    type Error = RenameError;
    type Output = RenameOutput;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let dispatcher = ctx.dispatcher()?;
        dispatcher
            .on(self.host.as_deref())
            .rename(&self.path, &self.new_name)
            .await?;
        Ok(RenameOutput {
            from: self.path.clone(),
            to: self.new_name.clone(),
        })
    }
}
