//! Filesystem side of a node: resolving logical paths under the node root
//! and the value types returned to callers.

mod disk;
mod entry;
mod error;
mod find;
mod logical_path;
mod search_history;

pub use disk::disk_usage;
pub use entry::{human_size, DirEntry, DiskUsage};
pub use error::FsError;
pub use find::find;
pub use logical_path::LogicalPath;
pub use search_history::{SearchHistory, SEARCH_HISTORY_CAPACITY};
