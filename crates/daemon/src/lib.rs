// Node services
pub mod dispatch;
pub mod error;
pub mod manager;
pub mod process;
pub mod rpc;
pub mod service_config;

// App state (configuration file)
pub mod state;

pub use dispatch::{ClientCache, Dispatcher, HostCall, NodeDirectory};
pub use error::NodeError;
pub use manager::{ManagerApi, NodeManager};
pub use process::{spawn_service, start_service, RunningService, ServiceError, ShutdownHandle};
pub use service_config::Config as ServiceConfig;
pub use state::{AppConfig, AppState, StateError};
