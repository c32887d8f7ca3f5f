pub use crate::error::{ErrorKind, Fault};
pub use crate::fs::{
    human_size, DirEntry, DiskUsage, FsError, LogicalPath, SearchHistory, SEARCH_HISTORY_CAPACITY,
};
pub use crate::node::{Node, NodeRegistry, NodeReport, NodeStatus, RegistryError, Role};
