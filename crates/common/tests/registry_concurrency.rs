use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::Utc;
use common::prelude::*;

#[test]
fn concurrent_heartbeats_and_reads_see_consistent_snapshots() {
    let registry = NodeRegistry::new();
    let barrier = Arc::new(std::sync::Barrier::new(9));

    let writers: Vec<_> = (0..8)
        .map(|i| {
            let registry = registry.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..200 {
                    let node = Node::new(format!("node-{i}"), Role::Slave, format!("10.0.0.{i}"));
                    registry.report_heartbeat(node).unwrap();
                }
            })
        })
        .collect();

    barrier.wait();
    for _ in 0..200 {
        let reports = registry.list(Utc::now(), Duration::from_secs(60));
        for report in &reports {
            assert!(report.node.last_heartbeat.is_some());
            assert_eq!(report.status, NodeStatus::Active);
        }
    }

    for writer in writers {
        writer.join().unwrap();
    }
    assert_eq!(registry.len(), 8);
}

#[test]
fn conflicting_reports_from_many_threads_never_replace_owner() {
    let registry = NodeRegistry::new();
    registry
        .report_heartbeat(Node::new("shared", Role::Slave, "10.0.0.1"))
        .unwrap();

    let handles: Vec<_> = (2..10)
        .map(|i| {
            let registry = registry.clone();
            thread::spawn(move || {
                registry.report_heartbeat(Node::new("shared", Role::Slave, format!("10.0.0.{i}")))
            })
        })
        .collect();

    for handle in handles {
        let err = handle.join().unwrap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConflictingNode);
    }
    assert_eq!(registry.get("shared").unwrap().ip, "10.0.0.1");
}
