//! Domain core shared by every lhfs node: logical path resolution over a
//! node root, the node model with derived liveness, the master's node
//! registry, and the failure taxonomy carried across RPC boundaries.

pub mod error;
pub mod fs;
pub mod node;
pub mod prelude;
