mod common;

use color_eyre::Result;
use pretty_assertions::assert_eq;
use rfcomm_ports::{
    bus::Bus,
    error::Error,
    port::{MethodReply, PortMethod},
    registry::{Collection, RegisterPort},
    rfcomm::ChannelId,
};

use common::{addr, registry, until_released, Fixture};

fn port(id: i16, device: &str) -> RegisterPort {
    RegisterPort {
        id: ChannelId(id),
        src: addr("11:22:33:44:55:66"),
        dst: addr("AA:BB:CC:DD:EE:FF"),
        device: device.into(),
        service_name: None,
    }
}

#[tokio::test]
async fn registering_publishes_the_query_methods() -> Result<()> {
    let Fixture {
        mut handle,
        bus,
        resolver,
        ..
    } = registry();

    let path = handle.register_port(port(5, "/dev/rfcomm5")).await?;
    assert_eq!(path, "/org/bluez/serial/rfcomm5");
    assert_eq!(
        handle.devices(Collection::Bound).await,
        vec!["/dev/rfcomm5".to_string()]
    );

    assert_eq!(
        bus.call(&path, PortMethod::GetDevice)?,
        MethodReply::Text("/dev/rfcomm5".into())
    );
    assert_eq!(
        bus.call(&path, PortMethod::GetAddress)?,
        MethodReply::Text("AA:BB:CC:DD:EE:FF".into())
    );
    assert_eq!(
        bus.call(&path, PortMethod::GetAdapter)?,
        MethodReply::Text("11:22:33:44:55:66".into())
    );
    assert_eq!(
        bus.call(&path, PortMethod::GetServiceName)?,
        MethodReply::Text("Bluetooth RFCOMM port".into())
    );
    assert_eq!(
        bus.call(&path, PortMethod::GetInfo)?,
        MethodReply::Dict(vec![
            ("device".into(), "/dev/rfcomm5".into()),
            ("address".into(), "AA:BB:CC:DD:EE:FF".into()),
        ])
    );

    // Friendly names are best-effort.
    assert_eq!(bus.call(&path, PortMethod::GetName)?, MethodReply::Text("".into()));
    resolver.insert(addr("AA:BB:CC:DD:EE:FF"), "Car kit");
    assert_eq!(
        bus.call(&path, PortMethod::GetName)?,
        MethodReply::Text("Car kit".into())
    );

    Ok(())
}

#[tokio::test]
async fn a_service_name_can_be_configured() -> Result<()> {
    let Fixture {
        mut handle, bus, ..
    } = registry();

    let path = handle
        .register_port(RegisterPort {
            service_name: Some("Dial-up Networking".into()),
            ..port(2, "/dev/rfcomm2")
        })
        .await?;

    assert_eq!(
        bus.call(&path, PortMethod::GetServiceName)?,
        MethodReply::Text("Dial-up Networking".into())
    );

    Ok(())
}

#[tokio::test]
async fn unregistering_destroys_the_path_and_releases() -> Result<()> {
    let Fixture {
        mut handle,
        bus,
        channels,
        ..
    } = registry();

    let path = handle.register_port(port(5, "/dev/rfcomm5")).await?;

    handle.unregister_port(&path).await?;
    until_released(&mut handle, Collection::Bound, "/dev/rfcomm5").await?;

    assert!(!bus.is_published(&path));
    assert_eq!(channels.released(), vec![ChannelId(5)]);

    Ok(())
}

#[tokio::test]
async fn unregistering_an_unknown_port_destroys_nothing() -> Result<()> {
    let Fixture {
        mut handle, bus, ..
    } = registry();

    let path = handle.register_port(port(5, "/dev/rfcomm5")).await?;

    let err = handle
        .unregister_port("/org/bluez/serial/rfcomm9")
        .await
        .unwrap_err();
    assert_eq!(err, Error::NoSuchPort("/dev/rfcomm9".into()));

    // Paths which do not parse at all are not found either.
    let err = handle.unregister_port("/somewhere/else").await.unwrap_err();
    assert_eq!(err, Error::NoSuchPort("/somewhere/else".into()));

    assert_eq!(bus.destroy_count(), 0);
    assert!(bus.is_published(&path));

    Ok(())
}

#[tokio::test]
async fn external_destruction_removes_the_port() -> Result<()> {
    let Fixture {
        mut handle,
        bus,
        channels,
        ..
    } = registry();

    let path = handle.register_port(port(5, "/dev/rfcomm5")).await?;

    // The bus makes the path go away without us asking.
    bus.destroy(&path)?;
    until_released(&mut handle, Collection::Bound, "/dev/rfcomm5").await?;

    assert_eq!(channels.released(), vec![ChannelId(5)]);

    Ok(())
}

#[tokio::test]
async fn a_channel_id_can_only_be_bound_once() -> Result<()> {
    let Fixture {
        mut handle,
        channels,
        ..
    } = registry();

    handle.register_port(port(5, "/dev/rfcomm5")).await?;

    // Same id means the same published path, which the bus rejects.
    let err = handle
        .register_port(port(5, "/dev/rfcomm5-duplicate"))
        .await
        .unwrap_err();
    assert_eq!(err, Error::PublishFailed("/org/bluez/serial/rfcomm5".into()));

    // The duplicate was rolled back, its id released.
    assert_eq!(
        handle.devices(Collection::Bound).await,
        vec!["/dev/rfcomm5".to_string()]
    );
    assert_eq!(channels.released(), vec![ChannelId(5)]);

    Ok(())
}
