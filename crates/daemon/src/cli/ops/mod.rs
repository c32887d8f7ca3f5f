pub mod cat;
pub mod du;
pub mod find;
pub mod history;
pub mod ls;
pub mod mkdir;
pub mod nodes;
pub mod rename;
pub mod rm;
pub mod serve;

pub use cat::Cat;
pub use du::Du;
pub use find::Find;
pub use history::History;
pub use ls::Ls;
pub use mkdir::Mkdir;
pub use nodes::Nodes;
pub use rename::Rename;
pub use rm::Rm;
pub use serve::Serve;
