#![cfg_attr(not(test), no_std)]

//! Configuration and publishing core of a WiFi/MQTT temperature & humidity
//! sensor node.
//!
//! The device configuration record is generated from `cfg.toml` at build
//! time ([`config::CONFIG`]) and can be overridden at boot from a
//! provisioning record in flash ([`provisioning`]). The ESP32 firmware
//! modules are behind the `firmware` feature; everything else builds and
//! tests on the host.

pub mod client_id;
pub mod config;
pub mod constants;
pub mod provisioning;
pub mod telemetry;
pub mod validate;

#[cfg(feature = "firmware")]
pub mod mqtt;
#[cfg(feature = "firmware")]
pub mod sensor;
#[cfg(feature = "firmware")]
pub mod transport;
#[cfg(feature = "firmware")]
pub mod wifi;
