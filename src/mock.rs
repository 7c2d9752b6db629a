//! In-memory collaborators, useful to exercise port lifecycles without an
//! actual bus or kernel RFCOMM channels.

use std::{
    collections::{HashMap, HashSet},
    io,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use futures::future::BoxFuture;
use tokio::sync::broadcast;

use crate::{
    address::BdAddr,
    bus::{Bus, DestroyCallback, Signal},
    error::Error,
    port::{MethodReply, NameResolver, PortMethod, PortObject},
    rfcomm::{ChannelId, ChannelRelease, IoChannel},
};

struct PublishedPort {
    port: PortObject,
    on_destroy: Option<DestroyCallback>,
}

/// An in-memory [`Bus`].
///
/// Tests can call published query methods, drop bus names to fire
/// owner-presence watchers, and observe every broadcast signal.
pub struct MockBus {
    objects: Mutex<HashMap<String, PublishedPort>>,
    signals: broadcast::Sender<Signal>,
    owners: Mutex<HashMap<String, broadcast::Sender<()>>>,
    denied_owners: Mutex<HashSet<String>>,
    destroys: AtomicUsize,
}

impl MockBus {
    /// A fresh bus with nothing published.
    pub fn new() -> Arc<Self> {
        let (signals, _) = broadcast::channel(16);

        Arc::new(Self {
            objects: Mutex::new(HashMap::new()),
            signals,
            owners: Mutex::new(HashMap::new()),
            denied_owners: Mutex::new(HashSet::new()),
            destroys: AtomicUsize::new(0),
        })
    }

    /// Listen to broadcast signals.
    pub fn signals(&self) -> broadcast::Receiver<Signal> {
        self.signals.subscribe()
    }

    /// Whether `path` currently has a published object.
    pub fn is_published(&self, path: &str) -> bool {
        self.objects.lock().unwrap().contains_key(path)
    }

    /// Call a query method on the object published at `path`.
    pub fn call(&self, path: &str, method: PortMethod) -> Result<MethodReply, Error> {
        let objects = self.objects.lock().unwrap();
        let published = objects
            .get(path)
            .ok_or_else(|| Error::NoSuchPort(path.into()))?;

        Ok(published.port.call(method))
    }

    /// Drop a bus name, waking every owner-presence watcher for it.
    pub fn drop_owner(&self, owner: &str) {
        if let Some(watchers) = self.owners.lock().unwrap().get(owner) {
            let _ = watchers.send(());
        }
    }

    /// Refuse owner-presence subscriptions for this name from now on.
    pub fn deny_owner_watch(&self, owner: &str) {
        self.denied_owners.lock().unwrap().insert(owner.into());
    }

    /// How many destroy requests the bus has seen.
    pub fn destroy_count(&self) -> usize {
        self.destroys.load(Ordering::SeqCst)
    }
}

impl Bus for MockBus {
    fn publish(
        &self,
        path: &str,
        port: PortObject,
        on_destroy: DestroyCallback,
    ) -> Result<(), Error> {
        let mut objects = self.objects.lock().unwrap();

        if objects.contains_key(path) {
            return Err(Error::PublishFailed(path.into()));
        }

        objects.insert(
            path.into(),
            PublishedPort {
                port,
                on_destroy: Some(on_destroy),
            },
        );

        Ok(())
    }

    fn destroy(&self, path: &str) -> Result<(), Error> {
        self.destroys.fetch_add(1, Ordering::SeqCst);

        let published = {
            self.objects
                .lock()
                .unwrap()
                .remove(path)
                .ok_or_else(|| Error::NoSuchPort(path.into()))?
        };

        if let Some(on_destroy) = published.on_destroy {
            on_destroy();
        }

        Ok(())
    }

    fn emit(&self, signal: Signal) {
        // Nobody listening is fine.
        let _ = self.signals.send(signal);
    }

    fn owner_vanished(&self, owner: &str) -> Result<BoxFuture<'static, ()>, Error> {
        if self.denied_owners.lock().unwrap().contains(owner) {
            return Err(Error::SubscribeFailed(owner.into()));
        }

        let mut vanished = self
            .owners
            .lock()
            .unwrap()
            .entry(owner.into())
            .or_insert_with(|| broadcast::channel(1).0)
            .subscribe();

        Ok(Box::pin(async move {
            let _ = vanished.recv().await;
        }))
    }
}

/// An [`IoChannel`] whose hangup can be triggered from a test.
///
/// Clones share the same channel,
/// so a test can keep one clone as the trigger.
#[derive(Debug, Clone)]
pub struct MockIo {
    hangup: broadcast::Sender<()>,
    closed: Arc<AtomicBool>,
}

impl MockIo {
    /// An open channel.
    pub fn new() -> Self {
        let (hangup, _) = broadcast::channel(1);

        Self {
            hangup,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Report an error/invalid/hangup condition on the channel.
    pub fn trigger_hangup(&self) {
        let _ = self.hangup.send(());
    }

    /// Whether the channel was closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Default for MockIo {
    fn default() -> Self {
        Self::new()
    }
}

impl IoChannel for MockIo {
    fn hangup(&self) -> BoxFuture<'static, ()> {
        let mut hangup = self.hangup.subscribe();

        Box::pin(async move {
            let _ = hangup.recv().await;
        })
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// A [`ChannelRelease`] which records what was released.
#[derive(Debug, Default)]
pub struct MockChannels {
    released: Mutex<Vec<ChannelId>>,
    fail: AtomicBool,
}

impl MockChannels {
    /// A release primitive with nothing released yet.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Ids released so far, in release order.
    pub fn released(&self) -> Vec<ChannelId> {
        self.released.lock().unwrap().clone()
    }

    /// Make every release from now on fail,
    /// to exercise the best-effort teardown path.
    pub fn fail_releases(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }
}

impl ChannelRelease for MockChannels {
    fn release(&self, id: ChannelId) -> io::Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::NotFound, "no such channel"));
        }

        self.released.lock().unwrap().push(id);
        Ok(())
    }
}

/// A [`NameResolver`] backed by a fixed table of remote names.
#[derive(Debug, Default)]
pub struct MockResolver {
    names: Mutex<HashMap<BdAddr, String>>,
}

impl MockResolver {
    /// A resolver which knows no names.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Set the friendly name reported for a remote address.
    pub fn insert(&self, remote: BdAddr, name: &str) {
        self.names.lock().unwrap().insert(remote, name.into());
    }
}

impl NameResolver for MockResolver {
    fn friendly_name(&self, _local: &BdAddr, remote: &BdAddr) -> Option<String> {
        self.names.lock().unwrap().get(remote).cloned()
    }
}
