//! Watch-backed shared informer
//!
//! Maintains an indexed cache of one resource type from a watch stream and
//! delivers add/update/delete notifications to registered handlers. Objects
//! handed out of the cache are shared read-only snapshots; consumers must
//! clone before mutating.
//!
//! A relist can miss delete events. Objects that disappear between relists
//! are delivered as tombstones carrying the last state the cache knew.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::StreamExt;
use kube::api::Api;
use kube::runtime::watcher::{self, watcher, Event};
use kube::{Resource, ResourceExt};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Reports whether a cache has completed its initial list.
pub trait CacheSync: Send + Sync {
    /// True once the cache has been populated at least once.
    fn has_synced(&self) -> bool;
}

/// Read-only keyed access to cached objects.
pub trait ObjectStore<K>: Send + Sync {
    /// Look up an object by its `namespace/name` key.
    fn get_by_key(&self, key: &str) -> Option<Arc<K>>;
}

/// A deleted object as delivered to handlers.
pub enum DeletedObject<K> {
    /// The delete was observed directly; this is the final state.
    Final(Arc<K>),
    /// The delete was inferred from a relist; the final state is unknown.
    Tombstone {
        /// Cache key of the vanished object
        key: String,
        /// Last state the cache held, if any
        last_known: Option<Arc<K>>,
    },
}

/// Receives object lifecycle notifications from an informer.
pub trait EventHandler<K>: Send + Sync {
    /// An object appeared.
    fn on_add(&self, obj: &K);
    /// An object changed; both the previous and current state are given.
    fn on_update(&self, old: &K, new: &K);
    /// An object vanished, possibly as a tombstone.
    fn on_delete(&self, deleted: DeletedObject<K>);
}

/// A cache-maintaining informer for one resource type.
pub struct SharedInformer<K> {
    cache: DashMap<String, Arc<K>>,
    handlers: RwLock<Vec<Arc<dyn EventHandler<K>>>>,
    synced: AtomicBool,
    sync_notify: Notify,
}

impl<K> Default for SharedInformer<K> {
    fn default() -> Self {
        Self {
            cache: DashMap::new(),
            handlers: RwLock::new(Vec::new()),
            synced: AtomicBool::new(false),
            sync_notify: Notify::new(),
        }
    }
}

impl<K> SharedInformer<K>
where
    K: Resource + Clone + Send + Sync + 'static,
{
    /// Create an informer with an empty cache.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a handler for subsequent notifications.
    pub fn add_event_handler(&self, handler: Arc<dyn EventHandler<K>>) {
        self.handlers.write().push(handler);
    }

    /// Stable cache key of an object: `namespace/name`, or `name` for
    /// cluster-scoped resources.
    pub fn object_key(obj: &K) -> String {
        match obj.namespace() {
            Some(ns) => format!("{}/{}", ns, obj.name_any()),
            None => obj.name_any(),
        }
    }

    /// Block until the initial list completed or `shutdown` fired.
    /// Returns false on shutdown.
    pub async fn wait_for_sync(&self, shutdown: &CancellationToken) -> bool {
        loop {
            if self.has_synced() {
                return true;
            }
            let notified = self.sync_notify.notified();
            if self.has_synced() {
                return true;
            }
            tokio::select! {
                _ = shutdown.cancelled() => return false,
                _ = notified => {}
            }
        }
    }

    /// Consume the watch stream of `api` until `shutdown` fires,
    /// maintaining the cache and notifying handlers.
    pub async fn run(
        self: Arc<Self>,
        api: Api<K>,
        config: watcher::Config,
        shutdown: CancellationToken,
    ) where
        K: DeserializeOwned + Debug,
    {
        let mut stream = watcher(api, config).boxed();
        let mut relist: Option<HashMap<String, Arc<K>>> = None;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("informer stopped");
                    return;
                }
                event = stream.next() => match event {
                    Some(Ok(event)) => self.process_event(event, &mut relist),
                    Some(Err(err)) => {
                        warn!(error = %err, "watch stream error, backing off");
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                    None => {
                        warn!("watch stream ended");
                        return;
                    }
                },
            }
        }
    }

    /// Apply one watch event to the cache and dispatch notifications.
    fn process_event(&self, event: Event<K>, relist: &mut Option<HashMap<String, Arc<K>>>) {
        match event {
            Event::Init => {
                *relist = Some(HashMap::new());
            }
            Event::InitApply(obj) => {
                if let Some(buffer) = relist.as_mut() {
                    buffer.insert(Self::object_key(&obj), Arc::new(obj));
                }
            }
            Event::InitDone => {
                if let Some(buffer) = relist.take() {
                    // Objects that vanished while the watch was down: the
                    // final state was missed, deliver tombstones.
                    let stale: Vec<String> = self
                        .cache
                        .iter()
                        .filter(|entry| !buffer.contains_key(entry.key()))
                        .map(|entry| entry.key().clone())
                        .collect();
                    for key in stale {
                        if let Some((_, last_known)) = self.cache.remove(&key) {
                            self.dispatch_delete(DeletedObject::Tombstone {
                                key,
                                last_known: Some(last_known),
                            });
                        }
                    }

                    for (key, obj) in buffer {
                        match self.cache.insert(key, obj.clone()) {
                            Some(old) => self.dispatch_update(&old, &obj),
                            None => self.dispatch_add(&obj),
                        }
                    }
                }
                self.synced.store(true, Ordering::Release);
                self.sync_notify.notify_waiters();
            }
            Event::Apply(obj) => {
                let obj = Arc::new(obj);
                match self.cache.insert(Self::object_key(&obj), obj.clone()) {
                    Some(old) => self.dispatch_update(&old, &obj),
                    None => self.dispatch_add(&obj),
                }
            }
            Event::Delete(obj) => {
                let obj = Arc::new(obj);
                self.cache.remove(&Self::object_key(&obj));
                self.dispatch_delete(DeletedObject::Final(obj));
            }
        }
    }

    fn dispatch_add(&self, obj: &K) {
        for handler in self.handlers.read().iter() {
            handler.on_add(obj);
        }
    }

    fn dispatch_update(&self, old: &K, new: &K) {
        for handler in self.handlers.read().iter() {
            handler.on_update(old, new);
        }
    }

    fn dispatch_delete(&self, deleted: DeletedObject<K>) {
        let handlers = self.handlers.read();
        match deleted {
            DeletedObject::Final(obj) => {
                for handler in handlers.iter() {
                    handler.on_delete(DeletedObject::Final(obj.clone()));
                }
            }
            DeletedObject::Tombstone { key, last_known } => {
                for handler in handlers.iter() {
                    handler.on_delete(DeletedObject::Tombstone {
                        key: key.clone(),
                        last_known: last_known.clone(),
                    });
                }
            }
        }
    }
}

impl<K: Send + Sync> CacheSync for SharedInformer<K> {
    fn has_synced(&self) -> bool {
        self.synced.load(Ordering::Acquire)
    }
}

impl<K: Send + Sync> ObjectStore<K> for SharedInformer<K> {
    fn get_by_key(&self, key: &str) -> Option<Arc<K>> {
        self.cache.get(key).map(|entry| entry.value().clone())
    }
}
