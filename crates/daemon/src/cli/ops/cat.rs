use std::fmt;

use clap::Args;

use lhfs_daemon::{ManagerApi, NodeError};

#[derive(Args, Debug, Clone)]
pub struct Cat {
    /// Logical path of the file
    pub path: String,

    /// Node holding the file (defaults to the master)
    #[arg(long)]
    pub host: Option<String>,
}

#[derive(Debug)]
pub struct CatOutput {
    pub content: String,
}

impl fmt::Display for CatOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.content.trim_end_matches('\n'))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatError {
    #[error("{0}")]
    Node(#[from] NodeError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Cat {
    type Error = CatError;
    type Output = CatOutput;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let dispatcher = ctx.dispatcher()?;
        let content = dispatcher
            .on(self.host.as_deref())
            .get_file_content(&self.path)
            .await?;
        Ok(CatOutput { content })
    }
}
