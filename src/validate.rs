//! Field checks for the device configuration record.
//!
//! This file only depends on `core`: `build.rs` includes it with `#[path]`
//! so that a bad `cfg.toml` fails the build with the same rules the
//! firmware applies to provisioned records at boot.

use core::fmt;

/// Longest SSID accepted by the WiFi driver
pub const SSID_MAX_LEN: usize = 32;
/// Longest WPA2 passphrase
pub const WIFI_PASSWORD_MAX_LEN: usize = 64;
/// Longest DHCP hostname the network stack will advertise
pub const HOSTNAME_MAX_LEN: usize = 32;
/// Longest client identifier kept in memory
pub const CLIENT_ID_MAX_LEN: usize = 64;
/// MQTT strings are length-prefixed with a u16
pub const TOPIC_MAX_LEN: usize = 65535;
/// Client identifier value that asks the firmware to derive one from the MAC
pub const AUTO_CLIENT_ID: &str = "auto";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    Empty(&'static str),
    TooLong { field: &'static str, max: usize },
    Whitespace(&'static str),
    Wildcard(&'static str),
    InteriorNul(&'static str),
    OutOfRange { field: &'static str, min: i64, max: i64 },
    SameTopic,
    PasswordWithoutUsername,
    DuplicateClientId { first: usize, second: usize },
    MissingConfigFile,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Empty(field) => write!(f, "`{}` must not be empty", field),
            Error::TooLong { field, max } => {
                write!(f, "`{}` must be at most {} bytes", field, max)
            }
            Error::Whitespace(field) => write!(f, "`{}` must not contain whitespace", field),
            Error::Wildcard(field) => {
                write!(f, "`{}` must not contain MQTT wildcards (+ or #)", field)
            }
            Error::InteriorNul(field) => write!(f, "`{}` must not contain NUL bytes", field),
            Error::OutOfRange { field, min, max } => {
                write!(f, "`{}` must be an integer in [{}, {}]", field, min, max)
            }
            Error::SameTopic => write!(
                f,
                "`humidity_topic` and `temperature_topic` must be different"
            ),
            Error::PasswordWithoutUsername => {
                write!(f, "`mqtt_password` is set but `mqtt_username` is not")
            }
            Error::DuplicateClientId { first, second } => write!(
                f,
                "devices #{} and #{} share the same client identifier",
                first, second
            ),
            Error::MissingConfigFile => write!(
                f,
                "`cfg.toml` not found, copy `cfg.toml.example` to `cfg.toml` and fill in the device settings"
            ),
        }
    }
}

/// Borrowed view of every configurable field, in the shape both the
/// build script and the firmware can produce.
pub struct Record<'a> {
    pub wifi_ssid: &'a str,
    pub wifi_password: &'a str,
    pub hostname: &'a str,
    pub mqtt_hostname: &'a str,
    pub mqtt_port: u16,
    pub mqtt_username: Option<&'a str>,
    pub mqtt_password: Option<&'a str>,
    pub client_identifier: &'a str,
    pub humidity_topic: &'a str,
    pub temperature_topic: &'a str,
    pub measurement_interval_seconds: u16,
}

pub fn record(r: &Record<'_>) -> Result<(), Error> {
    required("wifi_ssid", r.wifi_ssid)?;
    max_len("wifi_ssid", r.wifi_ssid, SSID_MAX_LEN)?;
    max_len("wifi_password", r.wifi_password, WIFI_PASSWORD_MAX_LEN)?;

    required("hostname", r.hostname)?;
    max_len("hostname", r.hostname, HOSTNAME_MAX_LEN)?;

    host("mqtt_hostname", r.mqtt_hostname)?;
    port(r.mqtt_port.into())?;

    match (r.mqtt_username, r.mqtt_password) {
        (None, Some(_)) => return Err(Error::PasswordWithoutUsername),
        (Some(username), _) => required("mqtt_username", username)?,
        (None, None) => {}
    }

    required("client_identifier", r.client_identifier)?;
    max_len("client_identifier", r.client_identifier, CLIENT_ID_MAX_LEN)?;

    topic_name("humidity_topic", r.humidity_topic)?;
    topic_name("temperature_topic", r.temperature_topic)?;
    if r.humidity_topic == r.temperature_topic {
        return Err(Error::SameTopic);
    }

    interval(r.measurement_interval_seconds.into())?;

    Ok(())
}

pub fn required(field: &'static str, value: &str) -> Result<(), Error> {
    if value.trim().is_empty() {
        return Err(Error::Empty(field));
    }
    Ok(())
}

pub fn max_len(field: &'static str, value: &str, max: usize) -> Result<(), Error> {
    if value.len() > max {
        return Err(Error::TooLong { field, max });
    }
    Ok(())
}

/// Broker address: a hostname or an IP literal, resolved at runtime
pub fn host(field: &'static str, value: &str) -> Result<(), Error> {
    required(field, value)?;
    if value.chars().any(char::is_whitespace) {
        return Err(Error::Whitespace(field));
    }
    Ok(())
}

pub fn port(raw: i64) -> Result<u16, Error> {
    ranged("mqtt_port", raw)
}

pub fn interval(raw: i64) -> Result<u16, Error> {
    ranged("measurement_interval_seconds", raw)
}

fn ranged(field: &'static str, raw: i64) -> Result<u16, Error> {
    if !(1..=i64::from(u16::MAX)).contains(&raw) {
        return Err(Error::OutOfRange {
            field,
            min: 1,
            max: u16::MAX.into(),
        });
    }
    Ok(raw as u16)
}

/// Topic names used for PUBLISH: no wildcards, no NUL, u16-length.
pub fn topic_name(field: &'static str, value: &str) -> Result<(), Error> {
    if value.is_empty() {
        return Err(Error::Empty(field));
    }
    max_len(field, value, TOPIC_MAX_LEN)?;
    if value.contains(|c: char| c == '+' || c == '#') {
        return Err(Error::Wildcard(field));
    }
    if value.contains('\0') {
        return Err(Error::InteriorNul(field));
    }
    Ok(())
}

/// Deployment-level check: the broker drops the older session when a
/// second device connects with the same identifier.
///
/// `auto` entries are skipped, they resolve to per-device MAC-derived ids.
pub fn unique_client_ids(ids: &[&str]) -> Result<(), Error> {
    for (first, a) in ids.iter().enumerate() {
        if *a == AUTO_CLIENT_ID {
            continue;
        }
        if let Some(offset) = ids[first + 1..].iter().position(|b| b == a) {
            return Err(Error::DuplicateClientId {
                first,
                second: first + 1 + offset,
            });
        }
    }
    Ok(())
}

/// Where the build takes the compiled-in record from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// The operator's `cfg.toml`
    ConfigFile,
    /// `cfg.toml.example`, only for host builds of the library
    Example,
    /// Placeholder values, the decommission image must not carry credentials
    Placeholder,
}

/// Firmware images never fall back to the example credentials.
pub fn source(
    config_file_exists: bool,
    firmware: bool,
    decommission: bool,
) -> Result<Source, Error> {
    match (decommission, config_file_exists, firmware) {
        (true, _, _) => Ok(Source::Placeholder),
        (false, true, _) => Ok(Source::ConfigFile),
        (false, false, false) => Ok(Source::Example),
        (false, false, true) => Err(Error::MissingConfigFile),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Record<'static> {
        Record {
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
    fn sample_record_is_valid() {
        assert_eq!(record(&sample()), Ok(()));
    }

    #[test]
    fn required_fields_must_not_be_blank() {
        let mut r = sample();
        r.wifi_ssid = "";
        assert_eq!(record(&r), Err(Error::Empty("wifi_ssid")));

        let mut r = sample();
        r.hostname = "   ";
        assert_eq!(record(&r), Err(Error::Empty("hostname")));

        let mut r = sample();
        r.mqtt_hostname = "";
        assert_eq!(record(&r), Err(Error::Empty("mqtt_hostname")));

        let mut r = sample();
        r.client_identifier = "";
        assert_eq!(record(&r), Err(Error::Empty("client_identifier")));

        let mut r = sample();
        r.temperature_topic = "";
        assert_eq!(record(&r), Err(Error::Empty("temperature_topic")));
    }

    #[test]
    fn open_network_has_empty_password() {
        let mut r = sample();
        r.wifi_password = "";
        assert_eq!(record(&r), Ok(()));
    }

    #[test]
    fn broker_credentials_are_optional() {
        let mut r = sample();
        r.mqtt_username = None;
        r.mqtt_password = None;
        assert_eq!(record(&r), Ok(()));

        r.mqtt_password = Some("secret");
        assert_eq!(record(&r), Err(Error::PasswordWithoutUsername));
    }

    #[test]
    fn port_range() {
        assert_eq!(port(1883), Ok(1883));
        assert_eq!(port(1), Ok(1));
        assert_eq!(port(65535), Ok(65535));
        assert!(matches!(port(0), Err(Error::OutOfRange { .. })));
        assert!(matches!(port(65536), Err(Error::OutOfRange { .. })));
        assert!(matches!(port(-1883), Err(Error::OutOfRange { .. })));
    }

    #[test]
    fn zero_port_record_is_rejected() {
        let mut r = sample();
        r.mqtt_port = 0;
        assert!(matches!(
            record(&r),
            Err(Error::OutOfRange {
                field: "mqtt_port",
                ..
            })
        ));
    }

    #[test]
    fn topics_reject_wildcards() {
        assert_eq!(
            topic_name("humidity_topic", "sensor/+/humidity"),
            Err(Error::Wildcard("humidity_topic"))
        );
        assert_eq!(
            topic_name("humidity_topic", "sensor/#"),
            Err(Error::Wildcard("humidity_topic"))
        );
        assert_eq!(
            topic_name("humidity_topic", "a\0b"),
            Err(Error::InteriorNul("humidity_topic"))
        );
        assert_eq!(topic_name("humidity_topic", "/"), Ok(()));
    }

    #[test]
    fn topics_must_differ() {
        let mut r = sample();
        r.temperature_topic = r.humidity_topic;
        assert_eq!(record(&r), Err(Error::SameTopic));
    }

    #[test]
    fn broker_host_rejects_whitespace() {
        assert_eq!(
            host("mqtt_hostname", "home assistant.local"),
            Err(Error::Whitespace("mqtt_hostname"))
        );
        assert_eq!(host("mqtt_hostname", "192.168.1.10"), Ok(()));
    }

    #[test]
    fn long_ssid_is_rejected() {
        let mut r = sample();
        r.wifi_ssid = "an-ssid-that-is-way-longer-than-32-bytes";
        assert_eq!(
            record(&r),
            Err(Error::TooLong {
                field: "wifi_ssid",
                max: SSID_MAX_LEN
            })
        );
    }

    #[test]
    fn duplicate_client_ids_are_reported() {
        assert_eq!(unique_client_ids(&["esp32-attic", "esp32-garage"]), Ok(()));
        assert_eq!(
            unique_client_ids(&["esp32-attic", "esp32-garage", "esp32-attic"]),
            Err(Error::DuplicateClientId {
                first: 0,
                second: 2
            })
        );
    }

    #[test]
    fn auto_client_ids_never_collide() {
        assert_eq!(unique_client_ids(&["auto", "auto", "esp32-attic"]), Ok(()));
    }

    #[test]
    fn firmware_build_requires_config_file() {
        assert_eq!(source(false, true, false), Err(Error::MissingConfigFile));
        assert_eq!(source(true, true, false), Ok(Source::ConfigFile));
    }

    #[test]
    fn host_build_falls_back_to_example() {
        assert_eq!(source(false, false, false), Ok(Source::Example));
        assert_eq!(source(true, false, false), Ok(Source::ConfigFile));
    }

    #[test]
    fn decommission_build_ignores_config_file() {
        assert_eq!(source(true, true, true), Ok(Source::Placeholder));
        assert_eq!(source(false, true, true), Ok(Source::Placeholder));
    }
}
