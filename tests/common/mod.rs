#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use color_eyre::Result;
use rfcomm_ports::{
    address::BdAddr,
    config::Config,
    mock::{MockBus, MockChannels, MockResolver},
    registry::{Collection, PortRegistryHandle},
};
use tokio::time::{sleep, timeout};

pub struct Fixture {
    pub handle: PortRegistryHandle,
    pub bus: Arc<MockBus>,
    pub channels: Arc<MockChannels>,
    pub resolver: Arc<MockResolver>,
}

pub fn registry() -> Fixture {
    rfcomm_ports::logging::init();

    let bus = MockBus::new();
    let channels = MockChannels::new();
    let resolver = MockResolver::new();

    let handle = PortRegistryHandle::new(
        &Config::default(),
        bus.clone(),
        channels.clone(),
        resolver.clone(),
    );

    Fixture {
        handle,
        bus,
        channels,
        resolver,
    }
}

pub fn addr(text: &str) -> BdAddr {
    text.parse().expect("test addresses are well-formed")
}

/// Poll until `device` is no longer in `collection`.
/// The watchers report in from their own tasks, so tests must wait.
pub async fn until_released(
    handle: &mut PortRegistryHandle,
    collection: Collection,
    device: &str,
) -> Result<()> {
    timeout(Duration::from_secs(5), async {
        while handle.devices(collection).await.iter().any(|d| d == device) {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await?;

    Ok(())
}
