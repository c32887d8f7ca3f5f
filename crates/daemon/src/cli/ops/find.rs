use std::fmt;

use clap::Args;
use comfy_table::Table;

use common::fs::DirEntry;
use lhfs_daemon::{ManagerApi, NodeError};

#[derive(Args, Debug, Clone)]
pub struct Find {
    /// Glob matched against entry names, e.g. "*.py"
    pub pattern: String,

    /// Node to search (defaults to the master)
    #[arg(long)]
    pub host: Option<String>,
}

#[derive(Debug)]
pub struct FindOutput {
    pub matches: Vec<DirEntry>,
}

impl fmt::Display for FindOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.matches.is_empty() {
            return write!(f, "No matches");
        }

        let mut table = Table::new();
        table.set_header(vec!["DIRECTORY", "NAME", "SIZE"]);
        for item in &self.matches {
            table.add_row(vec![
                item.parent.clone().unwrap_or_default(),
                item.name.clone(),
                item.human_size(),
            ]);
        }
        write!(f, "{table}")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FindError {
    #[error("{0}")]
    Node(#[from] NodeError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Find {
    type Error = FindError;
    type Output = FindOutput;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let dispatcher = ctx.dispatcher()?;
        let matches = dispatcher.on(self.host.as_deref()).find(&self.pattern).await?;
        Ok(FindOutput { matches })
    }
}
