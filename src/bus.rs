//! The object-bus collaborator.
//!
//! The registry never talks to a concrete bus implementation;
//! everything it needs is behind the [`Bus`] trait:
//! publishing a port's query methods at an address,
//! destroying that address, broadcasting signals,
//! and watching the presence of a bus name.

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::{error::Error, port::PortObject};

/// Invoked by the bus when a previously published address is destroyed.
///
/// Destruction is asynchronous from the registry's point of view:
/// unregistering a port only asks the bus to destroy the address,
/// and the actual removal happens when this callback fires.
pub type DestroyCallback = Box<dyn FnOnce() + Send + 'static>;

/// Broadcast notifications emitted for bus listeners.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Signal {
    /// A connected port was torn down.
    /// Emitted exactly once per teardown, whichever trigger caused it.
    ServiceDisconnected {
        /// Device identity of the released port.
        device: String,
    },
}

/// A connection to the object bus.
pub trait Bus: Send + Sync {
    /// Publish `port`'s query methods at `path`.
    ///
    /// `on_destroy` is invoked when the path is later destroyed.
    fn publish(
        &self,
        path: &str,
        port: PortObject,
        on_destroy: DestroyCallback,
    ) -> Result<(), Error>;

    /// Destroy a previously published path, invoking its destroy callback.
    fn destroy(&self, path: &str) -> Result<(), Error>;

    /// Broadcast a signal to all listeners.
    fn emit(&self, signal: Signal);

    /// Subscribe to the presence of a bus name.
    ///
    /// The returned future resolves when the name's owner leaves the bus.
    /// The subscription is dropped with the future.
    fn owner_vanished(&self, owner: &str) -> Result<BoxFuture<'static, ()>, Error>;
}
