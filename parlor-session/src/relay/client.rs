use crate::error::TransportError;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Change notification for one child of a watched path.
///
/// `Removed` carries the last known value so observers can react to the
/// disappearance of children they never saw added.
#[derive(Debug, Clone)]
pub enum ChildEvent {
    Added { key: String, value: Value },
    Removed { key: String, value: Value },
}

/// Live child-event subscription. Dropping the watch cancels the
/// forwarding task, so no listener outlives its owner.
pub struct ChildWatch {
    rx: mpsc::Receiver<ChildEvent>,
    task: JoinHandle<()>,
}

impl ChildWatch {
    pub(crate) fn new(rx: mpsc::Receiver<ChildEvent>, task: JoinHandle<()>) -> Self {
        Self { rx, task }
    }

    /// Next event, or `None` once the relay connection is gone.
    pub async fn recv(&mut self) -> Option<ChildEvent> {
        self.rx.recv().await
    }
}

impl Drop for ChildWatch {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// One connected client of the signaling relay store.
///
/// The store is addressed as `{path}/{key}` two-level nodes and offers the
/// four primitives the transport needs: append-child, child event streams,
/// query-by-field-equals, and disconnect-triggered cleanup. A networked
/// backend implements this trait; [`super::MemoryRelay`] is the bundled
/// in-process implementation.
#[async_trait]
pub trait RelayClient: Send + Sync {
    /// Writes `value` under an explicit key.
    async fn put(&self, path: &str, key: &str, value: Value) -> Result<(), TransportError>;

    /// Appends `value` under a generated, append-ordered key and returns it.
    async fn push(&self, path: &str, value: Value) -> Result<String, TransportError>;

    /// Removes one child. No-op if absent.
    async fn remove(&self, path: &str, key: &str) -> Result<(), TransportError>;

    /// Snapshot of all children, in key order. Best effort with respect to
    /// concurrent writers.
    async fn children(&self, path: &str) -> Result<Vec<(String, Value)>, TransportError>;

    /// Live child events for `path`. With `replay` the current snapshot is
    /// delivered first as `Added` events, then deltas follow; without it
    /// only deltas are delivered.
    async fn watch(&self, path: &str, replay: bool) -> Result<ChildWatch, TransportError>;

    /// Like [`RelayClient::watch`], restricted to children whose `field`
    /// equals `equals`.
    async fn watch_matching(
        &self,
        path: &str,
        field: &str,
        equals: Value,
        replay: bool,
    ) -> Result<ChildWatch, TransportError>;

    /// Registers `{path}/{key}` for removal when this client's connection
    /// to the relay drops, however it drops.
    async fn on_disconnect_remove(&self, path: &str, key: &str) -> Result<(), TransportError>;

    /// Severs the connection, firing every registered disconnect cleanup.
    async fn disconnect(&self);
}
