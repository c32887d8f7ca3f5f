use std::path::PathBuf;
use std::sync::Arc;

use lhfs_daemon::rpc::{DriverRegistry, RemoteManager};
use lhfs_daemon::state::AppState;
use lhfs_daemon::{ClientCache, Dispatcher, NodeError};

/// Shared context handed to every command.
#[derive(Debug, Clone)]
pub struct OpContext {
    pub config_path: Option<PathBuf>,
    pub state: AppState,
    pub drivers: DriverRegistry,
    /// Overrides the configured master transport.
    pub master: Option<String>,
}

impl OpContext {
    pub fn master_transport(&self) -> String {
        self.master
            .clone()
            .unwrap_or_else(|| self.state.config.master_rpc())
    }

    /// RPC handle to the master node.
    pub fn master(&self) -> Result<RemoteManager, NodeError> {
        let config = &self.state.config;
        Ok(RemoteManager::connect(
            &self.drivers,
            &config.rpc_driver,
            &self.master_transport(),
            std::time::Duration::from_secs(config.rpc_timeout),
        )?)
    }

    /// Dispatcher with no local manager: calls without a host go to the
    /// master, calls with a host are resolved through the master's
    /// registry and sent straight to that node.
    pub fn dispatcher(&self) -> Result<Dispatcher, NodeError> {
        let config = &self.state.config;
        let master = self.master()?;
        let clients = ClientCache::new(
            self.drivers.client_factory(&config.rpc_driver)?,
            std::time::Duration::from_secs(config.rpc_timeout),
        );
        Ok(Dispatcher::new(
            None,
            Arc::new(master.clone()),
            Arc::new(master),
            clients,
            std::time::Duration::from_secs(config.heartbeat_alive),
        ))
    }
}

#[async_trait::async_trait]
pub trait Op: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;
    type Output: std::fmt::Display + std::fmt::Debug;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error>;
}

/// Generates the `Command` subcommand enum plus `OpOutput`/`OpError`
/// wrappers and forwards `Op::execute` to the selected command.
#[macro_export]
macro_rules! command_enum {
    ($(($variant:ident, $type:ty)),* $(,)?) => {
        #[derive(clap::Subcommand, Debug, Clone)]
        pub enum Command {
            $($variant($type),)*
        }

        #[derive(Debug)]
        pub enum OpOutput {
            $($variant(<$type as $crate::cli::op::Op>::Output),)*
        }

        #[derive(Debug, thiserror::Error)]
        pub enum OpError {
            $(
                #[error(transparent)]
                $variant(<$type as $crate::cli::op::Op>::Error),
            )*
        }

        impl std::fmt::Display for OpOutput {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(OpOutput::$variant(output) => write!(f, "{output}"),)*
                }
            }
        }

        #[async_trait::async_trait]
        impl $crate::cli::op::Op for Command {
            type Error = OpError;
            type Output = OpOutput;

            async fn execute(
                &self,
                ctx: &$crate::cli::op::OpContext,
            ) -> Result<Self::Output, Self::Error> {
                match self {
                    $(
                        Command::$variant(op) => op
                            .execute(ctx)
                            .await
                            .map(OpOutput::$variant)
                            .map_err(OpError::$variant),
                    )*
                }
            }
        }
    };
}
