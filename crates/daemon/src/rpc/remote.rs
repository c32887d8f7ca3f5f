use std::sync::Arc;
use std::time::Duration;

use crate::error::NodeError;
use crate::manager::ManagerApi;

use super::{DriverRegistry, Request, Response, RpcClient, RpcError};

/// A node manager reached through an RPC client.
#[derive(Clone)]
pub struct RemoteManager {
    client: Arc<dyn RpcClient>,
}

impl RemoteManager {
    pub fn new(client: Arc<dyn RpcClient>) -> Self {
        Self { client }
    }

    pub fn connect(
        drivers: &DriverRegistry,
        driver: &str,
        transport: &str,
        timeout: Duration,
    ) -> Result<Self, RpcError> {
        Ok(Self::new(drivers.client(driver, transport, timeout)?))
    }

    pub fn transport(&self) -> &str {
        self.client.transport()
    }
}

impl std::fmt::Debug for RemoteManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteManager")
            .field("transport", &self.client.transport())
            .finish()
    }
}

#[async_trait::async_trait]
impl ManagerApi for RemoteManager {
    async fn call(&self, request: Request) -> Result<Response, NodeError> {
        Ok(self.client.call(request).await?)
    }
}
