pub mod op;
pub mod ops;

use std::path::PathBuf;

use clap::Parser;

crate::command_enum! {
    (Serve, ops::Serve),
    (Nodes, ops::Nodes),
    (Ls, ops::Ls),
    (Du, ops::Du),
    (Find, ops::Find),
    (History, ops::History),
    (Cat, ops::Cat),
    (Mkdir, ops::Mkdir),
    (Rm, ops::Rm),
    (Rename, ops::Rename),
}

#[derive(Parser, Debug)]
#[command(name = "lhfs", version, about = "Browse and manage files across a fleet of nodes")]
pub struct Cli {
    /// Config file (default: /etc/lhfs/lhfs.toml, ./etc/lhfs.toml)
    #[arg(long, global = true, env = "LHFS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Transport of the master node, e.g. http://10.0.0.1:9527
    #[arg(long, global = true, env = "LHFS_MASTER")]
    pub master: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}
