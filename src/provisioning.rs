//! Runtime configuration overrides kept in a dedicated flash region.
//!
//! Record layout:
//!
//! ```text
//! +--------+-------------+---------------------------+---------+
//! | "PRV1" | len: u16 LE | key=value lines (UTF-8)   | 0xFF .. |
//! +--------+-------------+---------------------------+---------+
//! ```
//!
//! Keys are the `cfg.toml` field names. Everything after the first `=` is
//! the value, byte for byte, so passphrases may start or end with spaces.
//! Fields missing from the record keep their compiled-in value, so
//! credentials can be rotated without a rebuild.
//!
//! The `provision` host tool turns a text file into a record image, which is
//! flashed to the `nvs` partition:
//!
//! ```text
//! cargo run --features host-tools --bin provision -- provisioning.txt -o provisioning.bin
//! espflash write-bin 0x9000 provisioning.bin
//! ```

use core::str;

use embedded_storage::nor_flash::{NorFlash, ReadNorFlash};
use heapless::Vec;
use log::{info, warn};

use crate::config::Config;
use crate::constants::PROVISIONING_RECORD_MAX;
use crate::validate;

pub const MAGIC: [u8; 4] = *b"PRV1";
const HEADER_LEN: usize = MAGIC.len() + 2;
const WIPE_CHUNK: usize = 256;

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    Flash,
    BadMagic,
    InvalidLength,
    TooLarge,
    Utf8,
    // Line numbers are 1-based
    MalformedLine(usize),
    UnknownKey(usize),
    DuplicateKey(usize),
    Invalid(validate::Error),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Overrides<'a> {
    pub wifi_ssid: Option<&'a str>,
    pub wifi_password: Option<&'a str>,
    pub hostname: Option<&'a str>,
    pub mqtt_hostname: Option<&'a str>,
    pub mqtt_port: Option<u16>,
    pub mqtt_username: Option<&'a str>,
    pub mqtt_password: Option<&'a str>,
    pub client_identifier: Option<&'a str>,
    pub humidity_topic: Option<&'a str>,
    pub temperature_topic: Option<&'a str>,
    pub measurement_interval_seconds: Option<u16>,
}

impl<'a> Overrides<'a> {
    pub fn parse(text: &'a str) -> Result<Self, Error> {
        let mut overrides = Overrides::default();

        for (index, line) in text.lines().enumerate() {
            let line_no = index + 1;
            let content = line.trim_start();
            if content.is_empty() || content.starts_with('#') {
                continue;
            }

            let (key, value) = content
                .split_once('=')
                .ok_or(Error::MalformedLine(line_no))?;
            let key = key.trim_end();

            let text_field = match key {
                "wifi_ssid" => &mut overrides.wifi_ssid,
                "wifi_password" => &mut overrides.wifi_password,
                "hostname" => &mut overrides.hostname,
                "mqtt_hostname" => &mut overrides.mqtt_hostname,
                "mqtt_username" => &mut overrides.mqtt_username,
                "mqtt_password" => &mut overrides.mqtt_password,
                "client_identifier" => &mut overrides.client_identifier,
                "humidity_topic" => &mut overrides.humidity_topic,
                "temperature_topic" => &mut overrides.temperature_topic,
                "mqtt_port" => {
                    let port = validate::port(parse_int(value, line_no)?).map_err(Error::Invalid)?;
                    set(&mut overrides.mqtt_port, port, line_no)?;
                    continue;
                }
                "measurement_interval_seconds" => {
                    let interval =
                        validate::interval(parse_int(value, line_no)?).map_err(Error::Invalid)?;
                    set(&mut overrides.measurement_interval_seconds, interval, line_no)?;
                    continue;
                }
                _ => return Err(Error::UnknownKey(line_no)),
            };
            set(text_field, value, line_no)?;
        }

        Ok(overrides)
    }

    pub fn is_empty(&self) -> bool {
        *self == Overrides::default()
    }
}

fn parse_int(value: &str, line_no: usize) -> Result<i64, Error> {
    value.trim().parse().map_err(|_| Error::MalformedLine(line_no))
}

fn set<T>(slot: &mut Option<T>, value: T, line_no: usize) -> Result<(), Error> {
    if slot.is_some() {
        return Err(Error::DuplicateKey(line_no));
    }
    *slot = Some(value);
    Ok(())
}

pub type Record = Vec<u8, PROVISIONING_RECORD_MAX>;

/// Builds the record for `text`, padded with `0xFF` to a multiple of
/// `write_size`. The text is parsed first so a malformed record is never
/// produced.
pub fn encode(text: &str, write_size: usize) -> Result<Record, Error> {
    Overrides::parse(text)?;

    let len = u16::try_from(text.len()).map_err(|_| Error::TooLarge)?;
    let mut record = Record::new();
    record
        .extend_from_slice(&MAGIC)
        .map_err(|_| Error::TooLarge)?;
    record
        .extend_from_slice(&len.to_le_bytes())
        .map_err(|_| Error::TooLarge)?;
    record
        .extend_from_slice(text.as_bytes())
        .map_err(|_| Error::TooLarge)?;
    while record.len() % write_size.max(1) != 0 {
        record.push(0xFF).map_err(|_| Error::TooLarge)?;
    }

    Ok(record)
}

pub struct ProvisioningStore<F> {
    flash: F,
    offset: u32,
    size: u32,
}

impl<F: NorFlash> ProvisioningStore<F> {
    /// `offset` and `size` must be aligned to the flash erase size.
    pub fn new(flash: F, offset: u32, size: u32) -> Self {
        Self {
            flash,
            offset,
            size,
        }
    }

    /// Reads the record into `buf`. Erased or wiped flash means no record.
    pub fn load<'a>(
        &mut self,
        buf: &'a mut [u8; PROVISIONING_RECORD_MAX],
    ) -> Result<Option<Overrides<'a>>, Error> {
        self.flash
            .read(self.offset, &mut buf[..])
            .map_err(|_| Error::Flash)?;
        let buf: &'a [u8] = buf;

        let (magic, rest) = buf.split_at(MAGIC.len());
        if magic != MAGIC {
            if magic.iter().all(|&b| b == 0xFF) || magic.iter().all(|&b| b == 0x00) {
                return Ok(None);
            }
            return Err(Error::BadMagic);
        }

        let len = u16::from_le_bytes([rest[0], rest[1]]) as usize;
        let payload = buf
            .get(HEADER_LEN..HEADER_LEN + len)
            .ok_or(Error::InvalidLength)?;
        let text = str::from_utf8(payload).map_err(|_| Error::Utf8)?;

        Overrides::parse(text).map(Some)
    }

    /// Replaces the record. A malformed record never reaches flash.
    pub fn store(&mut self, text: &str) -> Result<(), Error> {
        let record = encode(text, F::WRITE_SIZE)?;

        self.erase()?;
        self.flash
            .write(self.offset, &record)
            .map_err(|_| Error::Flash)?;

        info!("Provisioning record stored ({} bytes)", text.len());
        Ok(())
    }

    /// Erases the region and overwrites it with zeroes, so no credential
    /// survives on a device that leaves the fleet.
    pub fn wipe(&mut self) -> Result<(), Error> {
        self.erase()?;

        let zeroes = [0u8; WIPE_CHUNK];
        let mut offset = self.offset;
        let end = self.offset + self.size;
        while offset < end {
            let chunk = ((end - offset) as usize).min(WIPE_CHUNK);
            self.flash
                .write(offset, &zeroes[..chunk])
                .map_err(|_| Error::Flash)?;
            offset += chunk as u32;
        }

        info!("Provisioning region wiped");
        Ok(())
    }

    fn erase(&mut self) -> Result<(), Error> {
        self.flash
            .erase(self.offset, self.offset + self.size)
            .map_err(|_| Error::Flash)
    }
}

/// Compiled-in configuration overlaid with the provisioning record.
///
/// Any problem with the record is logged and the compiled-in record is
/// used as is.
pub fn resolve<'a, F: NorFlash>(
    base: &Config<'a>,
    store: &mut ProvisioningStore<F>,
    buf: &'a mut [u8; PROVISIONING_RECORD_MAX],
) -> Config<'a> {
    match store.load(buf) {
        Ok(Some(overrides)) if overrides.is_empty() => *base,
        Ok(Some(overrides)) => {
            let merged = base.with_overrides(&overrides);
            match merged.validate() {
                Ok(()) => {
                    info!("Using provisioned configuration");
                    merged
                }
                Err(e) => {
                    warn!("Provisioned configuration rejected: {}", e);
                    *base
                }
            }
        }
        Ok(None) => {
            info!("No provisioning record, using compiled-in configuration");
            *base
        }
        Err(e) => {
            warn!("Failed to load provisioning record: {:?}", e);
            *base
        }
    }
}
