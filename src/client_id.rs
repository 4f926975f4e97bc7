//! MQTT client identifier resolution.
//!
//! Operators normally pick a unique identifier per device in `cfg.toml`.
//! Setting it to `auto` derives `<prefix>-<mac>` from the station MAC
//! address instead, which is unique across a fleet without bookkeeping.

use core::fmt::Write;
use core::str::FromStr;

use heapless::String;
use log::warn;

use crate::validate::{AUTO_CLIENT_ID, CLIENT_ID_MAX_LEN};

/// Longest identifier every MQTT 3.1.1 broker must accept
pub const PORTABLE_MAX_LEN: usize = 23;

pub type ClientId = String<CLIENT_ID_MAX_LEN>;

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    Empty,
    TooLong,
}

/// Resolves the configured identifier into the one presented in CONNECT.
pub fn resolve(configured: &str, prefix: &str, mac: [u8; 6]) -> Result<ClientId, Error> {
    let id = if configured == AUTO_CLIENT_ID {
        derive(prefix, mac)?
    } else {
        ClientId::from_str(configured).map_err(|_| Error::TooLong)?
    };

    if id.is_empty() {
        return Err(Error::Empty);
    }

    if !is_portable(&id) {
        warn!(
            "Client identifier {:?} is longer than {} characters or not alphanumeric, \
             MQTT 3.1.1 brokers may refuse it",
            id.as_str(),
            PORTABLE_MAX_LEN
        );
    }

    Ok(id)
}

/// `<prefix>-<12 lowercase hex digits>`
pub fn derive(prefix: &str, mac: [u8; 6]) -> Result<ClientId, Error> {
    let mut id = ClientId::new();
    if !prefix.is_empty() {
        write!(id, "{}-", prefix).map_err(|_| Error::TooLong)?;
    }
    for byte in mac {
        write!(id, "{:02x}", byte).map_err(|_| Error::TooLong)?;
    }
    Ok(id)
}

/// MQTT 3.1.1 only guarantees 1-23 characters from `[0-9a-zA-Z]`.
pub fn is_portable(id: &str) -> bool {
    !id.is_empty() && id.len() <= PORTABLE_MAX_LEN && id.bytes().all(|b| b.is_ascii_alphanumeric())
}
