use serde::{Deserialize, Serialize};

/// Settings for a port registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Bus path prefix under which bound ports are published.
    /// A port with channel id `5` ends up at `<manager_path>/rfcomm5`.
    pub manager_path: String,

    /// Service name reported by ports registered without one.
    pub default_service_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            manager_path: "/org/bluez/serial".into(),
            default_service_name: "Bluetooth RFCOMM port".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ron_round_trip() {
        let config = Config::default();

        let text =
            ron::ser::to_string_pretty(&config, ron::ser::PrettyConfig::default()).unwrap();
        let back: Config = ron::from_str(&text).unwrap();

        assert_eq!(back, config);
    }

    #[test]
    fn deserialize() {
        let input = r#"
(
    manager_path: "/org/bluez/serial",
    default_service_name: "Dial-up Networking",
)"#;
        let config: Config = ron::from_str(input).unwrap();

        assert_eq!(config.default_service_name, "Dial-up Networking");
    }
}
