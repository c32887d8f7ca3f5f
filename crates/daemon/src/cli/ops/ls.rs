use std::fmt;

use clap::Args;
use comfy_table::Table;
use owo_colors::OwoColorize;

use common::fs::DirEntry;
use lhfs_daemon::{ManagerApi, NodeError};

#[derive(Args, Debug, Clone)]
pub struct Ls {
    /// Logical path to list (defaults to the node root)
    #[arg(default_value = "/")]
    pub path: String,

    /// Node to list on (defaults to the master)
    #[arg(long)]
    pub host: Option<String>,

    /// Include hidden entries
    #[arg(long, short)]
    pub all: bool,
}

#[derive(Debug)]
pub struct LsOutput {
    pub items: Vec<DirEntry>,
}

impl fmt::Display for LsOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.items.is_empty() {
            return write!(f, "No items found");
        }

        let mut table = Table::new();
        table.set_header(vec!["TYPE", "NAME", "SIZE", "MODIFIED"]);
        for item in &self.items {
            let (type_str, name) = if item.is_dir {
                ("dir", item.name.blue().to_string())
            } else {
                ("file", item.name.clone())
            };
            table.add_row(vec![
                type_str.to_string(),
                name,
                item.human_size(),
                item.modified.format("%Y/%m/%d %H:%M").to_string(),
            ]);
        }
        write!(f, "{table}")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LsError {
    #[error("{0}")]
    Node(#[from] NodeError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Ls {
    type Error = LsError;
    type Output = LsOutput;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let dispatcher = ctx.dispatcher()?;
        let items = dispatcher
            .on(self.host.as_deref())
            .ls(&self.path, self.all)
            .await?;
        Ok(LsOutput { items })
    }
}
