#![deny(missing_docs)]

//! Lifecycle management for RFCOMM serial-port endpoints exposed over an
//! inter-process object bus.
//!
//! A *connected* port is created on behalf of a remote requester.
//! Three independent sources can terminate it:
//! the channel hanging up, the owner leaving the bus,
//! or an explicit disconnect by the owner.
//! Whichever fires first performs the full teardown, exactly once.
//!
//! A *bound* port is registered by an administrator and published on the
//! bus as a set of query methods,
//! until its published address is destroyed.
//!
//! All bookkeeping happens on a single registry task; see [`registry`].
//! The surrounding service (channel allocation, record management,
//! the bus itself) is consumed through the traits in [`bus`], [`rfcomm`]
//! and [`port`].

/// Bluetooth device addresses.
pub mod address;

/// The object-bus collaborator.
pub mod bus;

/// Registry settings.
pub mod config;

/// Possible errors in this library.
pub mod error;

/// Tracing setup.
pub mod logging;

/// In-memory collaborators, useful to exercise port lifecycles without
/// an actual bus or kernel channels.
pub mod mock;

/// Bus identities of requesting processes.
pub mod owner;

/// Port entities and their published query methods.
pub mod port;

/// The registry task and its handle.
pub mod registry;

/// Kernel channel ids and connected I/O channels.
pub mod rfcomm;
