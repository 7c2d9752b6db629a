//! The port registry owns both port collections and performs every
//! lifecycle transition on a single task.
//!
//! All termination sources funnel into the same message queue, so the
//! triggers for one port are dispatched serially.
//! Removal from the collection is the linearization point:
//! the first trigger to remove a port performs the full release,
//! and anything dispatched later finds nothing left to do.

use std::{
    fmt::{Debug, Display},
    sync::Arc,
};

use futures::{channel::mpsc, SinkExt, StreamExt};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::{
    address::BdAddr,
    bus::{Bus, Signal},
    config::Config,
    error::Error,
    owner::Owner,
    port::{BoundPort, ConnectedPort, NameResolver, PortObject},
    rfcomm::{ChannelId, ChannelRelease, IoChannel},
};

/// Which of the two port collections to address.
///
/// The collections are independent namespaces:
/// a device identity may appear once in each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    /// Ports created on behalf of a remote requester.
    Connected,

    /// Administrator-registered ports.
    Bound,
}

/// A request to create a connected port.
pub struct AddConnection {
    /// Kernel channel id backing the port.
    pub id: ChannelId,

    /// Remote device address.
    pub dst: BdAddr,

    /// The connected channel, already open.
    pub io: Box<dyn IoChannel>,

    /// Device identity, e.g. `/dev/rfcomm3`.
    pub device: String,

    /// Bus identity of the requester.
    pub owner: Owner,
}

impl Debug for AddConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddConnection")
            .field("id", &self.id)
            .field("dst", &self.dst)
            .field("device", &self.device)
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

/// A request to register a bound port.
#[derive(Debug)]
pub struct RegisterPort {
    /// Kernel channel id backing the port.
    pub id: ChannelId,

    /// Local adapter address.
    pub src: BdAddr,

    /// Remote device address.
    pub dst: BdAddr,

    /// Device identity, e.g. `/dev/rfcomm5`.
    pub device: String,

    /// Service name. The configured default applies when `None`.
    pub service_name: Option<String>,
}

#[derive(Debug)]
enum Action {
    AddConnection(AddConnection),
    RemoveConnection { owner: Owner, device: String },
    RegisterPort(RegisterPort),
    UnregisterPort { path: String },
    ReleaseAll,
    ListDevices(Collection),
}

impl Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::AddConnection(request) => write!(f, "add connection: {}", request.device),
            Action::RemoveConnection { device, .. } => write!(f, "remove connection: {device}"),
            Action::RegisterPort(request) => write!(f, "register port: {}", request.device),
            Action::UnregisterPort { path } => write!(f, "unregister port: {path}"),
            Action::ReleaseAll => write!(f, "release all"),
            Action::ListDevices(collection) => write!(f, "list {collection:?}"),
        }
    }
}

#[derive(Debug)]
enum Reply {
    Done,
    Registered { path: String },
    Devices(Vec<String>),
}

#[derive(Debug)]
struct Request {
    action: Action,
    response: oneshot::Sender<Result<Reply, Error>>,
}

/// Lifecycle events which need no reply.
#[derive(Debug)]
enum Inform {
    /// The channel reported error, invalid descriptor or hangup.
    IoDisconnected { device: String },

    /// The owning bus name is gone.
    OwnerVanished { device: String },

    /// The bus destroyed a published address.
    PathDestroyed { path: String },
}

#[derive(Debug)]
enum RegistryMessage {
    Request(Request),
    Inform(Inform),
}

/// Shared handle to a registry task.
#[derive(Debug, Clone)]
pub struct PortRegistryHandle(mpsc::UnboundedSender<RegistryMessage>);

impl PortRegistryHandle {
    /// Start a registry on its own task.
    pub fn new(
        config: &Config,
        bus: Arc<dyn Bus>,
        channels: Arc<dyn ChannelRelease>,
        resolver: Arc<dyn NameResolver>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded();

        let mut registry = PortRegistry::new(config.clone(), bus, channels, resolver, rx, tx.clone());
        tokio::spawn(async move { registry.run().await });

        Self(tx)
    }

    async fn perform(&mut self, action: Action) -> Result<Reply, Error> {
        let (tx, rx) = oneshot::channel();

        self.0
            .send(RegistryMessage::Request(Request {
                action,
                response: tx,
            }))
            .await
            .expect("Registry task should be running");

        rx.await.expect("Registry always replies")
    }

    /// Create a connected port:
    /// arm the I/O watcher, append it to the connected collection,
    /// and subscribe to the owner's presence.
    ///
    /// Fails only when the owner-presence subscription is rejected,
    /// in which case the port is rolled back entirely.
    pub async fn add_connection(&mut self, request: AddConnection) -> Result<(), Error> {
        self.perform(Action::AddConnection(request)).await?;
        Ok(())
    }

    /// Explicitly disconnect a connected port. Only its owner may.
    pub async fn remove_connection(&mut self, owner: &Owner, device: &str) -> Result<(), Error> {
        self.perform(Action::RemoveConnection {
            owner: owner.clone(),
            device: device.into(),
        })
        .await?;
        Ok(())
    }

    /// Register a bound port and publish its query methods.
    /// Returns the published path.
    pub async fn register_port(&mut self, request: RegisterPort) -> Result<String, Error> {
        match self.perform(Action::RegisterPort(request)).await? {
            Reply::Registered { path } => Ok(path),
            reply => unreachable!("registering replies with a path, got {reply:?}"),
        }
    }

    /// Ask the bus to destroy a bound port's published path.
    ///
    /// Removal and release happen when the bus reports the destruction,
    /// not synchronously here.
    pub async fn unregister_port(&mut self, path: &str) -> Result<(), Error> {
        self.perform(Action::UnregisterPort { path: path.into() })
            .await?;
        Ok(())
    }

    /// Drain and release every connected port.
    /// This is the process-teardown path; no notification is emitted.
    pub async fn release_all(&mut self) {
        self.perform(Action::ReleaseAll)
            .await
            .expect("Draining cannot fail");
    }

    /// Device identities in a collection, in insertion order.
    pub async fn devices(&mut self, collection: Collection) -> Vec<String> {
        match self.perform(Action::ListDevices(collection)).await {
            Ok(Reply::Devices(devices)) => devices,
            reply => unreachable!("listing replies with devices, got {reply:?}"),
        }
    }
}

struct PortRegistry {
    messages: mpsc::UnboundedReceiver<RegistryMessage>,

    // Clones of this go to watcher tasks and destroy callbacks.
    informer: mpsc::UnboundedSender<RegistryMessage>,

    bus: Arc<dyn Bus>,
    channels: Arc<dyn ChannelRelease>,
    resolver: Arc<dyn NameResolver>,
    config: Config,

    connected: Vec<ConnectedPort>,
    bound: Vec<BoundPort>,
}

impl PortRegistry {
    fn new(
        config: Config,
        bus: Arc<dyn Bus>,
        channels: Arc<dyn ChannelRelease>,
        resolver: Arc<dyn NameResolver>,
        messages: mpsc::UnboundedReceiver<RegistryMessage>,
        informer: mpsc::UnboundedSender<RegistryMessage>,
    ) -> Self {
        Self {
            messages,
            informer,
            bus,
            channels,
            resolver,
            config,
            connected: Vec::new(),
            bound: Vec::new(),
        }
    }

    async fn run(&mut self) {
        while let Some(message) = self.messages.next().await {
            match message {
                RegistryMessage::Request(request) => self.handle_request(request),
                RegistryMessage::Inform(inform) => self.handle_inform(inform),
            }
        }
    }

    fn handle_request(&mut self, Request { action, response }: Request) {
        debug!("Got request: `{action}`");

        let reply = match action {
            Action::AddConnection(request) => self.add_connection(request),
            Action::RemoveConnection { owner, device } => self.remove_connection(owner, &device),
            Action::RegisterPort(request) => self.register_port(request),
            Action::UnregisterPort { path } => self.unregister_port(&path),
            Action::ReleaseAll => self.release_all(),
            Action::ListDevices(collection) => Ok(self.list_devices(collection)),
        };

        response
            .send(reply)
            .expect("Response receiver should not drop");
    }

    fn handle_inform(&mut self, inform: Inform) {
        match inform {
            Inform::IoDisconnected { device } => {
                debug!(%device, "RFCOMM channel was disconnected");
                self.teardown_connected(&device);
            }
            Inform::OwnerVanished { device } => {
                debug!(%device, "Connect requestor exited, releasing port");
                self.teardown_connected(&device);
            }
            Inform::PathDestroyed { path } => self.path_destroyed(&path),
        }
    }

    /// Exactly-once teardown of a connected port.
    ///
    /// A device which is already gone means another trigger won the race
    /// for this port, and there is nothing left to reference.
    fn teardown_connected(&mut self, device: &str) {
        let index = match self.connected.iter().position(|port| port.device == device) {
            Some(index) => index,
            None => {
                debug!(%device, "Already released");
                return;
            }
        };

        self.teardown_at(index);
    }

    fn teardown_at(&mut self, index: usize) {
        let port = self.connected.remove(index);

        self.bus.emit(Signal::ServiceDisconnected {
            device: port.device.clone(),
        });

        self.release(port);
    }

    /// Disarm both watchers, close the channel and give the id back.
    ///
    /// Both watcher handles are aborted unconditionally,
    /// whichever trigger brought us here,
    /// so no stale callback can fire against a released port.
    fn release(&self, mut port: ConnectedPort) {
        port.io_watch.abort();
        port.owner_watch.abort();

        port.io.close();

        if let Err(err) = self.channels.release(port.id) {
            warn!(id = %port.id, %err, "Could not release channel id");
        }

        debug!(device = %port.device, "Released connected port");
    }

    fn add_connection(&mut self, request: AddConnection) -> Result<Reply, Error> {
        let AddConnection {
            id,
            dst,
            mut io,
            device,
            owner,
        } = request;

        // Subscribe first: a failure here must leave no trace behind.
        let vanished = match self.bus.owner_vanished(owner.as_str()) {
            Ok(vanished) => vanished,
            Err(err) => {
                warn!(%device, %owner, "Owner-presence subscription rejected");
                io.close();
                if let Err(err) = self.channels.release(id) {
                    warn!(%id, %err, "Could not release channel id");
                }
                return Err(err);
            }
        };

        let informer = self.informer.clone();
        let watched = device.clone();
        let hangup = io.hangup();
        let io_watch = tokio::spawn(async move {
            hangup.await;
            let _ = informer.unbounded_send(RegistryMessage::Inform(Inform::IoDisconnected {
                device: watched,
            }));
        });

        let informer = self.informer.clone();
        let watched = device.clone();
        let owner_watch = tokio::spawn(async move {
            vanished.await;
            let _ = informer.unbounded_send(RegistryMessage::Inform(Inform::OwnerVanished {
                device: watched,
            }));
        });

        info!(%device, %owner, "Listening on connected port");
        self.connected.push(ConnectedPort {
            id,
            dst,
            device,
            owner,
            io,
            io_watch,
            owner_watch,
        });

        Ok(Reply::Done)
    }

    fn remove_connection(&mut self, owner: Owner, device: &str) -> Result<Reply, Error> {
        let index = self
            .connected
            .iter()
            .position(|port| port.device == device)
            .ok_or_else(|| Error::NoSuchPort(device.into()))?;

        if self.connected[index].owner != owner {
            return Err(Error::NotPermitted {
                owner: owner.to_string(),
                device: device.into(),
            });
        }

        self.teardown_at(index);

        Ok(Reply::Done)
    }

    fn register_port(&mut self, request: RegisterPort) -> Result<Reply, Error> {
        let RegisterPort {
            id,
            src,
            dst,
            device,
            service_name,
        } = request;

        let path = format!("{}/rfcomm{}", self.config.manager_path, id);
        let service_name =
            service_name.unwrap_or_else(|| self.config.default_service_name.clone());

        let object = PortObject::new(&device, src, dst, service_name, Arc::clone(&self.resolver));

        let informer = self.informer.clone();
        let destroyed = path.clone();
        let on_destroy = Box::new(move || {
            let _ = informer.unbounded_send(RegistryMessage::Inform(Inform::PathDestroyed {
                path: destroyed,
            }));
        });

        if let Err(err) = self.bus.publish(&path, object, on_destroy) {
            warn!(%path, %err, "Bus rejected the port object");
            if let Err(err) = self.channels.release(id) {
                warn!(%id, %err, "Could not release channel id");
            }
            return Err(Error::PublishFailed(path));
        }

        info!(%device, %path, "Registered RFCOMM port");
        self.bound.push(BoundPort {
            id,
            device,
            path: path.clone(),
        });

        Ok(Reply::Registered { path })
    }

    fn unregister_port(&mut self, path: &str) -> Result<Reply, Error> {
        let id = parse_port_path(&self.config.manager_path, path)
            .ok_or_else(|| Error::NoSuchPort(path.into()))?;
        let device = format!("/dev/rfcomm{id}");

        let port = self
            .bound
            .iter()
            .find(|port| port.device == device)
            .ok_or(Error::NoSuchPort(device))?;

        // Removal and release happen in the destroy callback.
        self.bus.destroy(&port.path)?;

        Ok(Reply::Done)
    }

    fn path_destroyed(&mut self, path: &str) {
        let index = match self.bound.iter().position(|port| port.path == path) {
            Some(index) => index,
            None => return,
        };

        let port = self.bound.remove(index);

        if let Err(err) = self.channels.release(port.id) {
            warn!(id = %port.id, %err, "Could not release channel id");
        }

        debug!(device = %port.device, "Unregistered serial port");
    }

    fn release_all(&mut self) -> Result<Reply, Error> {
        for port in std::mem::take(&mut self.connected) {
            self.release(port);
        }

        Ok(Reply::Done)
    }

    fn list_devices(&self, collection: Collection) -> Reply {
        let ports = match collection {
            Collection::Connected => self
                .connected
                .iter()
                .map(|port| port.device.clone())
                .collect(),
            Collection::Bound => self.bound.iter().map(|port| port.device.clone()).collect(),
        };

        Reply::Devices(ports)
    }
}

/// Parse the channel id out of a published path,
/// which must match `<manager_path>/rfcomm<id>`.
fn parse_port_path(manager_path: &str, path: &str) -> Option<i16> {
    path.strip_prefix(manager_path)?
        .strip_prefix("/rfcomm")?
        .parse()
        .ok()
}
