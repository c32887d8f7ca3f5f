use std::fmt;

use clap::Args;

use lhfs_daemon::{ManagerApi, NodeError};

#[derive(Args, Debug, Clone)]
pub struct History {
    /// Node whose search history to show (defaults to the master)
    #[arg(long)]
    pub host: Option<String>,
}

#[derive(Debug)]
pub struct HistoryOutput {
    pub patterns: Vec<String>,
}

impl fmt::Display for HistoryOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.patterns.is_empty() {
            return write!(f, "No searches yet");
        }
        write!(f, "{}", self.patterns.join("\n"))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("{0}")]
    Node(#[from] NodeError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for History {
    type Error = HistoryError;
    type Output = HistoryOutput;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let dispatcher = ctx.dispatcher()?;
        let patterns = dispatcher
            .on(self.host.as_deref())
            .get_search_history()
            .await?;
        Ok(HistoryOutput { patterns })
    }
}
