use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tempfile::TempDir;

use common::error::ErrorKind;
use common::node::{Node, NodeRegistry, Role};
use lhfs_daemon::rpc::{
    ClientFactory, DriverRegistry, HttpRpcClient, RemoteManager, RpcClient, RpcError, RpcServer,
    BINRPC_DRIVER, JSONRPC_DRIVER,
};
use lhfs_daemon::{ClientCache, Dispatcher, ManagerApi, NodeError, NodeManager};

const ALIVE: Duration = Duration::from_secs(60);
const TIMEOUT: Duration = Duration::from_secs(5);

fn manager(dir: &TempDir, hostname: &str, role: Role) -> NodeManager {
    NodeManager::new(dir.path(), Node::new(hostname, role, "127.0.0.1"), ALIVE).unwrap()
}

/// jsonrpc clients that count how often one gets built.
fn counting_factory(created: Arc<AtomicUsize>) -> ClientFactory {
    Arc::new(
        move |transport: &str, timeout: Duration| -> Result<Arc<dyn RpcClient>, RpcError> {
            created.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(HttpRpcClient::new(transport, timeout)?))
        },
    )
}

fn master_dispatcher(
    master: &NodeManager,
    registry: &NodeRegistry,
    factory: ClientFactory,
) -> Dispatcher {
    Dispatcher::new(
        Some(master.hostname().to_string()),
        Arc::new(master.clone()),
        Arc::new(registry.clone()),
        ClientCache::new(factory, TIMEOUT),
        ALIVE,
    )
}

#[tokio::test]
async fn test_own_hostname_runs_locally() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("local.txt"), "hi").unwrap();
    let master = manager(&dir, "master", Role::Master);
    let created = Arc::new(AtomicUsize::new(0));
    let dispatcher = master_dispatcher(
        &master,
        master.registry().unwrap(),
        counting_factory(created.clone()),
    );

    for host in [None, Some(""), Some("master")] {
        let items = dispatcher.on(host).ls("/", false).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "local.txt");
    }
    assert_eq!(created.load(Ordering::SeqCst), 0);
    assert!(dispatcher.clients().is_empty());
}

#[tokio::test]
async fn test_unknown_and_stale_hosts_are_rejected_without_a_client() {
    let dir = TempDir::new().unwrap();
    let master = manager(&dir, "master", Role::Master);
    let registry = master.registry().unwrap().clone();
    let created = Arc::new(AtomicUsize::new(0));
    let dispatcher = master_dispatcher(&master, &registry, counting_factory(created.clone()));

    let err = dispatcher.on(Some("ghost")).ls("/", false).await.unwrap_err();
    assert!(matches!(err, NodeError::NodeNotFound(ref h) if h == "ghost"));
    assert_eq!(err.kind(), ErrorKind::NodeNotFound);

    let stale = Node::new("w1", Role::Slave, "10.0.0.2").with_transport("http://127.0.0.1:1");
    registry
        .report_heartbeat_at(stale, Utc::now() - chrono::Duration::seconds(120))
        .unwrap();
    let err = dispatcher.on(Some("w1")).ls("/", false).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NodeInactive);

    let silent = Node::new("w2", Role::Slave, "10.0.0.3");
    registry.report_heartbeat(silent).unwrap();
    let err = dispatcher.on(Some("w2")).ls("/", false).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NodeInactive);

    assert_eq!(created.load(Ordering::SeqCst), 0);
}

async fn forward_over(driver: &str) {
    let drivers = DriverRegistry::with_defaults();

    let slave_dir = TempDir::new().unwrap();
    std::fs::create_dir(slave_dir.path().join("logs")).unwrap();
    std::fs::write(slave_dir.path().join("logs/app.log"), "line\n").unwrap();
    let slave = manager(&slave_dir, "w1", Role::Slave);
    let server = drivers
        .server(driver, Arc::new(slave.clone()), "127.0.0.1", 0)
        .unwrap();
    server.start(true).await.unwrap();

    let master_dir = TempDir::new().unwrap();
    let master = manager(&master_dir, "master", Role::Master);
    let registry = master.registry().unwrap().clone();
    registry
        .report_heartbeat(
            Node::new("w1", Role::Slave, "127.0.0.1").with_transport(server.transport()),
        )
        .unwrap();
    let dispatcher =
        master_dispatcher(&master, &registry, drivers.client_factory(driver).unwrap());

    let remote = dispatcher.on(Some("w1"));
    let items = remote.ls("/", false).await.unwrap();
    assert_eq!(items.len(), 1);
    assert!(items[0].is_dir);

    assert_eq!(remote.get_file_content("/logs/app.log").await.unwrap(), "line\n");
    remote.mkdir("/made-remotely").await.unwrap();
    assert!(slave_dir.path().join("made-remotely").is_dir());
    assert!(!master_dir.path().join("made-remotely").exists());

    let err = remote.ls("/missing", false).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RemoteCallFailed);
    assert_eq!(err.remote_kind(), Some(ErrorKind::PathNotFound));

    // One client per transport, reused across calls.
    assert_eq!(dispatcher.clients().len(), 1);

    server.stop();
    server.stopped().await;
}

#[tokio::test]
async fn test_forward_over_jsonrpc() {
    forward_over(JSONRPC_DRIVER).await;
}

#[tokio::test]
async fn test_forward_over_binrpc() {
    forward_over(BINRPC_DRIVER).await;
}

#[tokio::test]
async fn test_unreachable_node_fails_without_retry() {
    let dir = TempDir::new().unwrap();
    let master = manager(&dir, "master", Role::Master);
    let registry = master.registry().unwrap().clone();
    let created = Arc::new(AtomicUsize::new(0));
    let dispatcher = master_dispatcher(&master, &registry, counting_factory(created.clone()));

    // Grab a free port and release it so nothing listens there.
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    registry
        .report_heartbeat(
            Node::new("w1", Role::Slave, "127.0.0.1")
                .with_transport(format!("http://127.0.0.1:{port}")),
        )
        .unwrap();

    let err = dispatcher.on(Some("w1")).disk_usage().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RemoteCallFailed);
    assert_eq!(err.remote_kind(), None);
    assert_eq!(created.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_remote_directory_follows_master_liveness() {
    let drivers = DriverRegistry::with_defaults();

    let slave_dir = TempDir::new().unwrap();
    let slave = manager(&slave_dir, "w1", Role::Slave);
    let slave_server = drivers
        .server(JSONRPC_DRIVER, Arc::new(slave), "127.0.0.1", 0)
        .unwrap();
    slave_server.start(true).await.unwrap();

    let master_dir = TempDir::new().unwrap();
    let master = NodeManager::new(
        master_dir.path(),
        Node::new("master", Role::Master, "127.0.0.1"),
        Duration::from_secs(1),
    )
    .unwrap();
    let master_server = drivers
        .server(JSONRPC_DRIVER, Arc::new(master.clone()), "127.0.0.1", 0)
        .unwrap();
    master_server.start(true).await.unwrap();
    master
        .registry()
        .unwrap()
        .report_heartbeat(
            Node::new("w1", Role::Slave, "127.0.0.1").with_transport(slave_server.transport()),
        )
        .unwrap();

    let remote =
        RemoteManager::connect(&drivers, JSONRPC_DRIVER, master_server.transport(), TIMEOUT)
            .unwrap();
    let created = Arc::new(AtomicUsize::new(0));
    let client_side = |alive: Duration| {
        Dispatcher::new(
            None,
            Arc::new(remote.clone()),
            Arc::new(remote.clone()),
            ClientCache::new(counting_factory(created.clone()), TIMEOUT),
            alive,
        )
    };

    // The master reports w1 active; a tiny local threshold does not matter.
    let strict = client_side(Duration::from_nanos(1));
    assert!(strict.on(Some("w1")).ls("/", false).await.unwrap().is_empty());
    assert_eq!(created.load(Ordering::SeqCst), 1);

    tokio::time::sleep(Duration::from_millis(1300)).await;

    // The master now reports w1 down; a generous local threshold does not
    // revive it.
    let lenient = client_side(Duration::from_secs(60));
    let err = lenient.on(Some("w1")).ls("/", false).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NodeInactive);
    assert!(lenient.clients().is_empty());
    assert_eq!(created.load(Ordering::SeqCst), 1);

    master_server.stop();
    slave_server.stop();
    master_server.stopped().await;
    slave_server.stopped().await;
}
