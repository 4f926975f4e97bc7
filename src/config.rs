use core::fmt;

use crate::provisioning::Overrides;
use crate::validate;

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Config<'a> {
    // Wi-Fi SSID to connect to
    pub wifi_ssid: &'a str,

    // Wi-Fi pre-shared key (password), empty for an open network
    pub wifi_password: &'a str,

    // DHCP hostname, what the device shows up as on the network
    pub hostname: &'a str,

    // MQTT broker hostname or IP address
    pub mqtt_hostname: &'a str,

    // MQTT port (usually 1883)
    pub mqtt_port: u16,

    // MQTT username for authentication (optional)
    pub mqtt_username: Option<&'a str>,

    // MQTT password for authentication (optional)
    pub mqtt_password: Option<&'a str>,

    // MQTT client identifier, unique per broker, or "auto"
    pub client_identifier: &'a str,

    // MQTT topic humidity readings are published to
    pub humidity_topic: &'a str,

    // MQTT topic temperature readings are published to
    pub temperature_topic: &'a str,

    // Measurement interval in seconds
    pub measurement_interval_seconds: u16,
}

/// Everything the MQTT client needs to open a session with the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectParams<'a> {
    pub host: &'a str,
    pub port: u16,
    pub username: Option<&'a str>,
    pub password: Option<&'a str>,
    pub client_id: &'a str,
}

impl<'a> Config<'a> {
    pub fn validate(&self) -> Result<(), validate::Error> {
        validate::record(&validate::Record {
            wifi_ssid: self.wifi_ssid,
            wifi_password: self.wifi_password,
            hostname: self.hostname,
            mqtt_hostname: self.mqtt_hostname,
            mqtt_port: self.mqtt_port,
            mqtt_username: self.mqtt_username,
            mqtt_password: self.mqtt_password,
            client_identifier: self.client_identifier,
            humidity_topic: self.humidity_topic,
            temperature_topic: self.temperature_topic,
            measurement_interval_seconds: self.measurement_interval_seconds,
        })
    }

    /// Returns a copy with every field present in `overrides` replaced.
    ///
    /// An empty `mqtt_username`/`mqtt_password` override clears the credential.
    pub fn with_overrides(&self, overrides: &Overrides<'a>) -> Config<'a> {
        let credential = |current: Option<&'a str>, new: Option<&'a str>| match new {
            Some("") => None,
            Some(value) => Some(value),
            None => current,
        };

        Config {
            wifi_ssid: overrides.wifi_ssid.unwrap_or(self.wifi_ssid),
            wifi_password: overrides.wifi_password.unwrap_or(self.wifi_password),
            hostname: overrides.hostname.unwrap_or(self.hostname),
            mqtt_hostname: overrides.mqtt_hostname.unwrap_or(self.mqtt_hostname),
            mqtt_port: overrides.mqtt_port.unwrap_or(self.mqtt_port),
            mqtt_username: credential(self.mqtt_username, overrides.mqtt_username),
            mqtt_password: credential(self.mqtt_password, overrides.mqtt_password),
            client_identifier: overrides
                .client_identifier
                .unwrap_or(self.client_identifier),
            humidity_topic: overrides.humidity_topic.unwrap_or(self.humidity_topic),
            temperature_topic: overrides
                .temperature_topic
                .unwrap_or(self.temperature_topic),
            measurement_interval_seconds: overrides
                .measurement_interval_seconds
                .unwrap_or(self.measurement_interval_seconds),
        }
    }

    /// Broker session parameters. The hostname is not part of them, it only
    /// affects what the device advertises over DHCP.
    pub fn connect_params(&self) -> ConnectParams<'a> {
        ConnectParams {
            host: self.mqtt_hostname,
            port: self.mqtt_port,
            username: self.mqtt_username,
            password: self.mqtt_password,
            client_id: self.client_identifier,
        }
    }

    pub fn dhcp_hostname(&self) -> &'a str {
        self.hostname
    }
}

// Keep secrets out of the logs
impl fmt::Debug for Config<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redacted = |secret: Option<&str>| secret.map(|_| "<redacted>");

        f.debug_struct("Config")
            .field("wifi_ssid", &self.wifi_ssid)
            .field("wifi_password", &"<redacted>")
            .field("hostname", &self.hostname)
            .field("mqtt_hostname", &self.mqtt_hostname)
            .field("mqtt_port", &self.mqtt_port)
            .field("mqtt_username", &redacted(self.mqtt_username))
            .field("mqtt_password", &redacted(self.mqtt_password))
            .field("client_identifier", &self.client_identifier)
            .field("humidity_topic", &self.humidity_topic)
            .field("temperature_topic", &self.temperature_topic)
            .field(
                "measurement_interval_seconds",
                &self.measurement_interval_seconds,
            )
            .finish()
    }
}

// config values are generated at compile time
include!(concat!(env!("OUT_DIR"), "/config.rs"));

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample() -> Config<'static> {
        Config {
            wifi_ssid: "MyRouter123",
            wifi_password: "Hunter2",
            hostname: "attic-temperature",
            mqtt_hostname: "homeassistant.local",
            mqtt_port: 1883,
            mqtt_username: Some("username_here"),
            mqtt_password: Some("password_here"),
            client_identifier: "esp32-attic",
            humidity_topic: "sensor/esp32-attic/humidity",
            temperature_topic: "sensor/esp32-attic/temperature",
            measurement_interval_seconds: 60,
        }
    }

    #[test]
    fn compiled_config_is_valid() {
        assert_eq!(CONFIG.validate(), Ok(()));
    }

    #[test]
    fn hostname_only_changes_network_identity() {
        let before = sample();
        let after = Config {
            hostname: "garage-temperature",
            ..before
        };

        assert_eq!(after.dhcp_hostname(), "garage-temperature");
        assert_ne!(before.dhcp_hostname(), after.dhcp_hostname());
        assert_eq!(before.connect_params(), after.connect_params());
        assert_eq!(before.humidity_topic, after.humidity_topic);
        assert_eq!(before.temperature_topic, after.temperature_topic);
        assert_eq!(before.wifi_ssid, after.wifi_ssid);
        assert_eq!(before.wifi_password, after.wifi_password);
    }

    #[test]
    fn connect_params_carry_broker_settings() {
        let params = sample().connect_params();
        assert_eq!(
            params,
            ConnectParams {
                host: "homeassistant.local",
                port: 1883,
                username: Some("username_here"),
                password: Some("password_here"),
                client_id: "esp32-attic",
            }
        );
    }

    #[test]
    fn empty_overrides_keep_everything() {
        let base = sample();
        assert_eq!(base.with_overrides(&Overrides::default()), base);
    }

    #[test]
    fn overrides_replace_only_present_fields() {
        let base = sample();
        let overrides = Overrides {
            wifi_password: Some("rotated"),
            mqtt_port: Some(8883),
            ..Overrides::default()
        };

        let merged = base.with_overrides(&overrides);
        assert_eq!(merged.wifi_password, "rotated");
        assert_eq!(merged.mqtt_port, 8883);
        assert_eq!(
            merged,
            Config {
                wifi_password: "rotated",
                mqtt_port: 8883,
                ..base
            }
        );
    }

    #[test]
    fn empty_credential_override_clears_it() {
        let overrides = Overrides {
            mqtt_username: Some(""),
            mqtt_password: Some(""),
            ..Overrides::default()
        };

        let merged = sample().with_overrides(&overrides);
        assert_eq!(merged.mqtt_username, None);
        assert_eq!(merged.mqtt_password, None);
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let printed = format!("{:?}", sample());
        assert!(!printed.contains("Hunter2"));
        assert!(!printed.contains("password_here"));
        assert!(!printed.contains("username_here"));
        assert!(printed.contains("MyRouter123"));
        assert!(printed.contains("homeassistant.local"));
    }
}
