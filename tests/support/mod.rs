// Shared helpers for spinning up mock HTTP services in integration tests.
// Each test binary uses a subset of these helpers.
#![allow(dead_code)]

use std::{
    // `Arc` shares the local store between the services under test.
    sync::Arc,
    // Upper bound on how long a test waits for the resolver to settle.
    time::Duration,
};

// Mock services are plain axum routers.
use axum::Router;
use campus_assistant::domain::ports::LocalStore;
use campus_assistant::interface_adapters::local_store::TomlFileStore;
use campus_assistant::use_cases::ResolverState;
use tokio::sync::watch;

// Serve `app` on an ephemeral port inside the current test runtime and return its base URL.
pub async fn spawn_server(app: Router) -> String {
    // Bind to an ephemeral port to avoid collisions with local services.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral test port");
    // Capture the exact address that was assigned by the OS.
    let addr = listener.local_addr().expect("get local addr");
    // The server task lives as long as the test runtime.
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("mock server failed");
    });
    // Base URL the clients under test are pointed at.
    format!("http://{addr}")
}

// Address that refuses connections: bound once, then released.
pub async fn closed_address() -> String {
    // Let the OS pick a free port.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral test port");
    let addr = listener.local_addr().expect("get local addr");
    // Releasing the socket leaves nothing listening on that port.
    drop(listener);
    format!("http://{addr}")
}

// Fresh file-backed local state in its own temp directory.
pub fn temp_store() -> (tempfile::TempDir, Arc<dyn LocalStore>) {
    // The directory is removed when the returned guard drops, so callers keep it alive.
    let dir = tempfile::tempdir().expect("tempdir");
    // Opening a missing file starts from an empty store.
    let store = TomlFileStore::open(dir.path().join("state.toml")).expect("open local state");
    (dir, Arc::new(store))
}

// Wait until the resolver reaches a state matching `predicate`, or fail the test.
pub async fn wait_for_state<F>(states: &mut watch::Receiver<ResolverState>, predicate: F) -> ResolverState
where
    F: FnMut(&ResolverState) -> bool,
{
    // `wait_for` checks the current value first, so an already-settled state returns at once.
    tokio::time::timeout(Duration::from_secs(5), states.wait_for(predicate))
        .await
        // Outer error: the resolver never reached the state in time.
        .expect("resolver state timed out")
        // Inner error: the resolver and its sender were dropped.
        .expect("resolver dropped")
        // Clone out of the watch borrow before returning.
        .clone()
}
