//! Port entities and the query methods published for them.

use std::{fmt::Debug, sync::Arc};

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::{
    address::BdAddr,
    owner::Owner,
    rfcomm::{ChannelId, IoChannel},
};

/// Best-effort lookup of a remote device's friendly name.
pub trait NameResolver: Send + Sync {
    /// The friendly name of `remote` as seen from `local`, if known.
    fn friendly_name(&self, local: &BdAddr, remote: &BdAddr) -> Option<String>;
}

/// A port created on behalf of a remote requester.
///
/// Holds the owner identity which authorizes explicit disconnects,
/// plus both armed watcher tasks.
/// The watchers are aborted explicitly during release,
/// never left to fire against a port that is already gone.
pub(crate) struct ConnectedPort {
    pub(crate) id: ChannelId,
    pub(crate) dst: BdAddr,
    pub(crate) device: String,
    pub(crate) owner: Owner,
    pub(crate) io: Box<dyn IoChannel>,
    pub(crate) io_watch: JoinHandle<()>,
    pub(crate) owner_watch: JoinHandle<()>,
}

impl Debug for ConnectedPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectedPort")
            .field("id", &self.id)
            .field("dst", &self.dst)
            .field("device", &self.device)
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

/// An administrator-registered port,
/// published on the bus until its address is destroyed.
///
/// The query state lives in the published [`PortObject`];
/// this is only what the registry needs for lookup and release.
#[derive(Debug)]
pub(crate) struct BoundPort {
    pub(crate) id: ChannelId,
    pub(crate) device: String,
    pub(crate) path: String,
}

/// The query methods a published port answers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PortMethod {
    /// Remote device address, canonical text form.
    GetAddress,

    /// Device identity, e.g. `/dev/rfcomm3`.
    GetDevice,

    /// Local adapter address, canonical text form.
    GetAdapter,

    /// Remote friendly name. Empty when unavailable.
    GetName,

    /// Configured or default service name.
    GetServiceName,

    /// Ordered map with at least the `device` and `address` keys.
    GetInfo,
}

/// Reply to a [`PortMethod`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum MethodReply {
    /// A single string.
    Text(String),

    /// Key/value pairs, in insertion order.
    Dict(Vec<(String, String)>),
}

/// The state a published port needs to answer queries.
///
/// Captured at publish time, so answering never reaches back
/// into the registry.
pub struct PortObject {
    device: String,
    src: BdAddr,
    dst: BdAddr,
    service_name: String,
    resolver: Arc<dyn NameResolver>,
}

impl Debug for PortObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortObject")
            .field("device", &self.device)
            .field("src", &self.src)
            .field("dst", &self.dst)
            .field("service_name", &self.service_name)
            .finish_non_exhaustive()
    }
}

impl PortObject {
    pub(crate) fn new(
        device: &str,
        src: BdAddr,
        dst: BdAddr,
        service_name: String,
        resolver: Arc<dyn NameResolver>,
    ) -> Self {
        Self {
            device: device.into(),
            src,
            dst,
            service_name,
            resolver,
        }
    }

    /// Answer one query method.
    pub fn call(&self, method: PortMethod) -> MethodReply {
        match method {
            PortMethod::GetAddress => MethodReply::Text(self.dst.to_string()),
            PortMethod::GetDevice => MethodReply::Text(self.device.clone()),
            PortMethod::GetAdapter => MethodReply::Text(self.src.to_string()),
            PortMethod::GetName => MethodReply::Text(
                self.resolver
                    .friendly_name(&self.src, &self.dst)
                    .unwrap_or_default(),
            ),
            PortMethod::GetServiceName => MethodReply::Text(self.service_name.clone()),
            PortMethod::GetInfo => MethodReply::Dict(vec![
                ("device".into(), self.device.clone()),
                ("address".into(), self.dst.to_string()),
            ]),
        }
    }
}
