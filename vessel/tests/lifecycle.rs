//! Integration tests for container lifecycle (boot, fs, spawn, mount/export, teardown).

use vessel::{FsNode, SpawnArgs, VesselOptions};
use vessel_test_utils::TestContainer;

// ============================================================================
// BOOT / TEARDOWN
// ============================================================================

#[tokio::test]
async fn boot_with_initial_filesystem_is_readable() {
    let mut filesystem = std::collections::BTreeMap::new();
    filesystem.insert("hello.txt".to_string(), FsNode::File { contents: b"hi".to_vec() });
    let options = VesselOptions::new("lifecycle-test").with_filesystem(filesystem);
    let ctx = TestContainer::boot_with(options).await.unwrap();

    let content = ctx.container.fs().read_file("/hello.txt").await.unwrap();
    assert_eq!(content, b"hi");

    ctx.teardown().await;
}

#[tokio::test]
async fn teardown_is_idempotent() {
    let ctx = TestContainer::boot().await.unwrap();
    ctx.container.teardown().await;
    ctx.container.teardown().await;
}

// ============================================================================
// FILESYSTEM
// ============================================================================

#[tokio::test]
async fn write_then_read_round_trips() {
    let ctx = TestContainer::boot().await.unwrap();
    ctx.container.fs().mkdir("/src", false).await.unwrap();
    ctx.container.fs().write_file("/src/main.rs", b"fn main() {}".to_vec()).await.unwrap();

    let content = ctx.container.fs().read_file("/src/main.rs").await.unwrap();
    assert_eq!(content, b"fn main() {}");

    ctx.teardown().await;
}

// ============================================================================
// MOUNT / EXPORT
// ============================================================================

#[tokio::test]
async fn mount_then_export_round_trips_tree() {
    let ctx = TestContainer::boot().await.unwrap();

    let mut tree = std::collections::BTreeMap::new();
    tree.insert("app.js".to_string(), FsNode::File { contents: b"console.log(1)".to_vec() });
    let mut nested = std::collections::BTreeMap::new();
    nested.insert("index.html".to_string(), FsNode::File { contents: b"<html></html>".to_vec() });
    tree.insert("public".to_string(), FsNode::Directory { entries: nested });

    ctx.container.mount("/app", &tree).await.unwrap();
    let exported = ctx.container.export("/app").await.unwrap();

    assert_eq!(exported.get("app.js"), Some(&FsNode::File { contents: b"console.log(1)".to_vec() }));
    match exported.get("public") {
        Some(FsNode::Directory { entries }) => {
            assert_eq!(entries.get("index.html"), Some(&FsNode::File { contents: b"<html></html>".to_vec() }));
        }
        other => panic!("expected directory, got {other:?}"),
    }

    ctx.teardown().await;
}

// ============================================================================
// PROCESSES
// ============================================================================

#[tokio::test]
async fn spawn_builtin_echo_produces_expected_output() {
    let ctx = TestContainer::boot().await.unwrap();

    let mut handle = ctx
        .container
        .spawn("echo", &["hi".to_string(), "there".to_string()], SpawnArgs::default())
        .await
        .unwrap();

    let mut collected = Vec::new();
    while let Some(chunk) = handle.next_output().await {
        collected.extend(chunk);
    }
    let exit_code = handle.exit().await;

    assert_eq!(exit_code, 0);
    assert_eq!(String::from_utf8(collected).unwrap(), "hi there\n");

    ctx.teardown().await;
}

#[tokio::test]
async fn processes_lists_spawned_process() {
    let ctx = TestContainer::boot().await.unwrap();
    let handle = ctx.container.spawn("echo", &["x".to_string()], SpawnArgs::default()).await.unwrap();
    let _ = handle.exit().await;

    let processes = ctx.container.processes();
    assert!(processes.iter().any(|p| p.pid.0 == handle.pid()));

    ctx.teardown().await;
}
