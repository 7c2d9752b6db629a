//! The kernel side of a port: the RFCOMM channel id,
//! its release primitive, and the connected I/O channel.

use std::{fmt::Display, io};

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

/// Kernel-assigned identifier of an RFCOMM channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub i16);

impl Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Gives kernel channel ids back when a port is torn down.
///
/// Release is best-effort on the teardown path:
/// failures are logged and teardown carries on.
pub trait ChannelRelease: Send + Sync {
    /// Release the channel id.
    fn release(&self, id: ChannelId) -> io::Result<()>;
}

/// A connected RFCOMM channel,
/// watched for error, invalid-descriptor and hangup conditions.
pub trait IoChannel: Send {
    /// Resolves once the channel reports an error, an invalid descriptor
    /// or a hangup. Resolves at most once.
    fn hangup(&self) -> BoxFuture<'static, ()>;

    /// Close the underlying descriptor.
    fn close(&mut self);
}
