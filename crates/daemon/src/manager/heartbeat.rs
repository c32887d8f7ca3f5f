use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::{ManagerApi, NodeManager};

#[derive(Debug, Clone, Copy)]
pub struct HeartbeatConfig {
    pub interval: Duration,
    /// Master only: drop nodes silent for this long. `None` keeps every
    /// node forever.
    pub evict_after: Option<Duration>,
}

/// Report `manager`'s identity to `target` every `interval` until
/// `shutdown` flips to true.
///
/// `target` is the manager itself on the master and an RPC handle to the
/// master on a slave. A failed report is logged and the schedule carries
/// on at the same interval.
pub async fn heartbeat_loop(
    manager: NodeManager,
    target: Arc<dyn ManagerApi>,
    config: HeartbeatConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut tick = tokio::time::interval(config.interval);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = tick.tick() => {},
            changed = shutdown.changed() => {
                // a dropped sender also means shutdown
                if changed.is_err() || *shutdown.borrow() { break; }
                continue;
            }
        }
        if *shutdown.borrow() {
            break;
        }

        let snapshot = manager.snapshot();
        tokio::select! {
            result = target.node_update(snapshot) => match result {
                Ok(()) => debug!(hostname = %manager.hostname(), "heartbeat sent"),
                Err(e) => warn!(hostname = %manager.hostname(), "heartbeat error: {e}"),
            },
            _ = stop_requested(&mut shutdown) => break,
        }

        if let Some(window) = config.evict_after {
            for hostname in manager.evict_silent(window) {
                info!(hostname = %hostname, "evicted silent node");
            }
        }
    }

    info!("heartbeat loop stopped");
}

/// Resolves once shutdown is requested or the sender is gone.
async fn stop_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NodeError;
    use crate::rpc::{Request, Response, RpcError};
    use common::node::{Node, Role};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails every other report.
    struct Flaky {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl ManagerApi for Flaky {
        async fn call(&self, _request: Request) -> Result<Response, NodeError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n % 2 == 0 {
                Err(RpcError::Transport("connection refused".into()).into())
            } else {
                Ok(Response::Done)
            }
        }
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_schedule() {
        let dir = tempfile::TempDir::new().unwrap();
        let manager = NodeManager::new(
            dir.path(),
            Node::new("w", Role::Slave, "10.0.0.5"),
            Duration::from_secs(60),
        )
        .unwrap();
        let flaky = Arc::new(Flaky {
            calls: AtomicUsize::new(0),
        });
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(heartbeat_loop(
            manager,
            flaky.clone(),
            HeartbeatConfig {
                interval: Duration::from_millis(20),
                evict_after: None,
            },
            rx,
        ));
        tokio::time::sleep(Duration::from_millis(150)).await;
        tx.send_replace(true);
        handle.await.unwrap();

        assert!(flaky.calls.load(Ordering::SeqCst) >= 4);
    }

    #[tokio::test]
    async fn test_master_reports_to_itself() {
        let dir = tempfile::TempDir::new().unwrap();
        let master = NodeManager::new(
            dir.path(),
            Node::new("m", Role::Master, "10.0.0.1"),
            Duration::from_secs(60),
        )
        .unwrap();
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(heartbeat_loop(
            master.clone(),
            Arc::new(master.clone()),
            HeartbeatConfig {
                interval: Duration::from_millis(10),
                evict_after: Some(Duration::from_secs(3600)),
            },
            rx,
        ));
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send_replace(true);
        handle.await.unwrap();

        let nodes = master.list_nodes().unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].node.hostname, "m");
    }

    /// Never answers.
    struct Hung {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl ManagerApi for Hung {
        async fn call(&self, _request: Request) -> Result<Response, NodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_hung_report() {
        let dir = tempfile::TempDir::new().unwrap();
        let manager = NodeManager::new(
            dir.path(),
            Node::new("w", Role::Slave, "10.0.0.5"),
            Duration::from_secs(60),
        )
        .unwrap();
        let hung = Arc::new(Hung {
            calls: AtomicUsize::new(0),
        });
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(heartbeat_loop(
            manager,
            hung.clone(),
            HeartbeatConfig {
                interval: Duration::from_millis(10),
                evict_after: None,
            },
            rx,
        ));
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send_replace(true);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("heartbeat loop ignored shutdown")
            .unwrap();

        assert_eq!(hung.calls.load(Ordering::SeqCst), 1);
    }
}
