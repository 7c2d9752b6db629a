use std::{fmt::Display, sync::Arc};

/// The bus identity of the process which requested a connected port.
///
/// Only the owner may explicitly disconnect its port,
/// and the port is released when the owner leaves the bus.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct Owner {
    name: Arc<String>,
}

impl Owner {
    /// An owner from its bus name.
    pub fn new(name: &str) -> Self {
        Self {
            name: Arc::new(name.into()),
        }
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.name
    }
}

impl Display for Owner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}
