use async_trait::async_trait;
use parlor_session::{ChildWatch, MemoryRelayClient, RelayClient, TransportError};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;

/// Relay client that delegates to an in-memory client but holds every
/// `children` snapshot until the gate opens. Lets a test park a joining
/// session between attaching its observers and reading the room snapshot,
/// so another participant can slip into that window.
pub struct GatedRelayClient {
    inner: Arc<MemoryRelayClient>,
    open: watch::Receiver<bool>,
}

impl GatedRelayClient {
    pub fn new(inner: Arc<MemoryRelayClient>) -> (Arc<Self>, watch::Sender<bool>) {
        let (tx, rx) = watch::channel(false);
        (Arc::new(Self { inner, open: rx }), tx)
    }

    async fn wait_open(&self) {
        let mut rx = self.open.clone();
        while !*rx.borrow() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

#[async_trait]
impl RelayClient for GatedRelayClient {
    async fn put(&self, path: &str, key: &str, value: Value) -> Result<(), TransportError> {
        self.inner.put(path, key, value).await
    }

    async fn push(&self, path: &str, value: Value) -> Result<String, TransportError> {
        self.inner.push(path, value).await
    }

    async fn remove(&self, path: &str, key: &str) -> Result<(), TransportError> {
        self.inner.remove(path, key).await
    }

    async fn children(&self, path: &str) -> Result<Vec<(String, Value)>, TransportError> {
        self.wait_open().await;
        self.inner.children(path).await
    }

    async fn watch(&self, path: &str, replay: bool) -> Result<ChildWatch, TransportError> {
        self.inner.watch(path, replay).await
    }

    async fn watch_matching(
        &self,
        path: &str,
        field: &str,
        equals: Value,
        replay: bool,
    ) -> Result<ChildWatch, TransportError> {
        self.inner.watch_matching(path, field, equals, replay).await
    }

    async fn on_disconnect_remove(&self, path: &str, key: &str) -> Result<(), TransportError> {
        self.inner.on_disconnect_remove(path, key).await
    }

    async fn disconnect(&self) {
        self.inner.disconnect().await
    }
}
