use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that may occur in this library.
#[derive(Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum Error {
    /// No port with this device identity (or published path) exists
    /// in the relevant collection.
    #[error("The port `{0}` does not exist")]
    NoSuchPort(String),

    /// A disconnect was requested by someone other than the recorded owner.
    #[error("`{owner}` is not the owner of `{device}`")]
    NotPermitted {
        /// Who asked.
        owner: String,

        /// The port they asked about.
        device: String,
    },

    /// The bus rejected publishing the port at its address.
    /// The port was rolled back and its channel id released.
    #[error("The bus rejected publishing `{0}`")]
    PublishFailed(String),

    /// The bus rejected the owner-presence subscription.
    /// The port was rolled back and its channel id released.
    #[error("Could not subscribe to the presence of `{0}`")]
    SubscribeFailed(String),
}
