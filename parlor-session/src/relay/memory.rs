use crate::error::TransportError;
use crate::relay::client::{ChildEvent, ChildWatch, RelayClient};
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

const EVENT_BUS_CAPACITY: usize = 1024;
const WATCH_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
struct ChildNotification {
    path: String,
    event: ChildEvent,
}

struct RelayShared {
    nodes: DashMap<String, BTreeMap<String, Value>>,
    bus: broadcast::Sender<ChildNotification>,
    next_key: AtomicU64,
}

impl RelayShared {
    fn insert(&self, path: &str, key: &str, value: Value) {
        let prior = self
            .nodes
            .entry(path.to_string())
            .or_default()
            .insert(key.to_string(), value.clone());

        if let Some(old) = prior {
            self.notify(path, ChildEvent::Removed {
                key: key.to_string(),
                value: old,
            });
        }
        self.notify(path, ChildEvent::Added {
            key: key.to_string(),
            value,
        });
    }

    fn delete(&self, path: &str, key: &str) {
        let removed = self
            .nodes
            .get_mut(path)
            .and_then(|mut children| children.remove(key));

        if let Some(value) = removed {
            self.notify(path, ChildEvent::Removed {
                key: key.to_string(),
                value,
            });
        }
    }

    fn notify(&self, path: &str, event: ChildEvent) {
        // Send only fails when nobody is watching.
        let _ = self.bus.send(ChildNotification {
            path: path.to_string(),
            event,
        });
    }
}

/// In-process relay hub. Every [`MemoryRelayClient`] handed out by
/// [`MemoryRelay::client`] shares the same store and event bus, so sessions
/// in one process can signal each other without any network.
#[derive(Clone)]
pub struct MemoryRelay {
    shared: Arc<RelayShared>,
}

impl MemoryRelay {
    pub fn new() -> Self {
        let (bus, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        Self {
            shared: Arc::new(RelayShared {
                nodes: DashMap::new(),
                bus,
                next_key: AtomicU64::new(0),
            }),
        }
    }

    pub fn client(&self) -> Arc<MemoryRelayClient> {
        Arc::new(MemoryRelayClient {
            shared: self.shared.clone(),
            connected: AtomicBool::new(true),
            cleanup: Mutex::new(Vec::new()),
        })
    }
}

impl Default for MemoryRelay {
    fn default() -> Self {
        Self::new()
    }
}

/// One connected client of a [`MemoryRelay`]. Dropping the client counts as
/// losing the connection: registered disconnect cleanups fire, mirroring the
/// presence auto-retraction a hosted relay performs.
pub struct MemoryRelayClient {
    shared: Arc<RelayShared>,
    connected: AtomicBool,
    cleanup: Mutex<Vec<(String, String)>>,
}

impl MemoryRelayClient {
    fn ensure_connected(&self) -> Result<(), TransportError> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(TransportError::Unreachable(
                "relay client disconnected".to_string(),
            ))
        }
    }

    fn disconnect_now(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            let hooks = std::mem::take(&mut *self.cleanup.lock().unwrap_or_else(|e| e.into_inner()));
            for (path, key) in hooks {
                debug!(%path, %key, "running disconnect cleanup");
                self.shared.delete(&path, &key);
            }
        }
    }

    fn spawn_watch(
        &self,
        path: &str,
        filter: Option<(String, Value)>,
        replay: bool,
    ) -> ChildWatch {
        let accept = move |value: &Value| match &filter {
            Some((field, equals)) => value.get(field) == Some(equals),
            None => true,
        };

        // Subscribe before snapshotting so nothing can slip between the two;
        // the `live` set deduplicates the overlap.
        let bus_rx = self.shared.bus.subscribe();
        let snapshot: Vec<(String, Value)> = if replay {
            self.shared
                .nodes
                .get(path)
                .map(|children| {
                    children
                        .iter()
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect()
                })
                .unwrap_or_default()
        } else {
            Vec::new()
        };

        let (tx, rx) = mpsc::channel(WATCH_CHANNEL_CAPACITY);
        let path = path.to_string();

        let task = tokio::spawn(async move {
            let mut bus_rx = bus_rx;
            let mut live: HashSet<String> = HashSet::new();

            for (key, value) in snapshot {
                if accept(&value) {
                    live.insert(key.clone());
                    if tx.send(ChildEvent::Added { key, value }).await.is_err() {
                        return;
                    }
                }
            }

            loop {
                let notification = match bus_rx.recv().await {
                    Ok(n) => n,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(%path, skipped, "relay watcher lagged, events dropped");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                };
                if notification.path != path {
                    continue;
                }

                match notification.event {
                    ChildEvent::Added { key, value } => {
                        if accept(&value) && live.insert(key.clone()) {
                            if tx.send(ChildEvent::Added { key, value }).await.is_err() {
                                return;
                            }
                        }
                    }
                    ChildEvent::Removed { key, value } => {
                        // Forwarded even for children this watcher never saw
                        // added (delta-only watchers still need departures).
                        live.remove(&key);
                        if accept(&value) {
                            if tx.send(ChildEvent::Removed { key, value }).await.is_err() {
                                return;
                            }
                        }
                    }
                }
            }
        });

        ChildWatch::new(rx, task)
    }
}

#[async_trait]
impl RelayClient for MemoryRelayClient {
    async fn put(&self, path: &str, key: &str, value: Value) -> Result<(), TransportError> {
        self.ensure_connected()?;
        self.shared.insert(path, key, value);
        Ok(())
    }

    async fn push(&self, path: &str, value: Value) -> Result<String, TransportError> {
        self.ensure_connected()?;
        // Zero-padded counter keys keep append order under the BTreeMap.
        let key = format!("k{:016}", self.shared.next_key.fetch_add(1, Ordering::SeqCst));
        self.shared.insert(path, &key, value);
        Ok(key)
    }

    async fn remove(&self, path: &str, key: &str) -> Result<(), TransportError> {
        self.ensure_connected()?;
        self.shared.delete(path, key);
        Ok(())
    }

    async fn children(&self, path: &str) -> Result<Vec<(String, Value)>, TransportError> {
        self.ensure_connected()?;
        Ok(self
            .shared
            .nodes
            .get(path)
            .map(|children| {
                children
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn watch(&self, path: &str, replay: bool) -> Result<ChildWatch, TransportError> {
        self.ensure_connected()?;
        Ok(self.spawn_watch(path, None, replay))
    }

    async fn watch_matching(
        &self,
        path: &str,
        field: &str,
        equals: Value,
        replay: bool,
    ) -> Result<ChildWatch, TransportError> {
        self.ensure_connected()?;
        Ok(self.spawn_watch(path, Some((field.to_string(), equals)), replay))
    }

    async fn on_disconnect_remove(&self, path: &str, key: &str) -> Result<(), TransportError> {
        self.ensure_connected()?;
        self.cleanup
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((path.to_string(), key.to_string()));
        Ok(())
    }

    async fn disconnect(&self) {
        self.disconnect_now();
    }
}

impl Drop for MemoryRelayClient {
    fn drop(&mut self) {
        self.disconnect_now();
    }
}
