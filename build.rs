use std::{env, error::Error, fs, path::Path};

use serde::Deserialize;

#[allow(dead_code)]
#[path = "src/validate.rs"]
mod validate;

const CONFIG_FILE: &str = "cfg.toml";
const EXAMPLE_CONFIG_FILE: &str = "cfg.toml.example";

const DEFAULT_MQTT_PORT: i64 = 1883;
const DEFAULT_MEASUREMENT_INTERVAL_SECONDS: i64 = 60;

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    wifi_ssid: String,
    #[serde(default)]
    wifi_password: String,
    hostname: String,
    mqtt_hostname: String,
    mqtt_port: Option<i64>,
    mqtt_username: Option<String>,
    mqtt_password: Option<String>,
    client_identifier: String,
    humidity_topic: String,
    temperature_topic: String,
    measurement_interval_seconds: Option<i64>,
}

fn read(path: &str) -> Result<RawConfig, Box<dyn Error>> {
    let toml_str = fs::read_to_string(path)?;
    Ok(toml::from_str(&toml_str)?)
}

// Valid but useless: the decommission image never joins a network
fn placeholder() -> RawConfig {
    RawConfig {
        wifi_ssid: "decommissioned".into(),
        wifi_password: String::new(),
        hostname: "decommissioned".into(),
        mqtt_hostname: "localhost".into(),
        mqtt_port: None,
        mqtt_username: None,
        mqtt_password: None,
        client_identifier: "auto".into(),
        humidity_topic: "decommissioned/humidity".into(),
        temperature_topic: "decommissioned/temperature".into(),
        measurement_interval_seconds: None,
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    // Tell Cargo to rerun if toml changes
    println!("cargo:rerun-if-changed={}", CONFIG_FILE);
    println!("cargo:rerun-if-changed={}", EXAMPLE_CONFIG_FILE);
    println!("cargo:rerun-if-changed=src/validate.rs");

    let source = validate::source(
        Path::new(CONFIG_FILE).exists(),
        env::var_os("CARGO_FEATURE_FIRMWARE").is_some(),
        env::var_os("CARGO_FEATURE_DECOMMISSION").is_some(),
    )
    .map_err(|e| e.to_string())?;

    let (path, raw) = match source {
        validate::Source::ConfigFile => (CONFIG_FILE, read(CONFIG_FILE)?),
        validate::Source::Example => {
            println!(
                "cargo:warning={} not found, building with placeholder values from {}",
                CONFIG_FILE, EXAMPLE_CONFIG_FILE
            );
            (EXAMPLE_CONFIG_FILE, read(EXAMPLE_CONFIG_FILE)?)
        }
        validate::Source::Placeholder => ("decommission placeholder", placeholder()),
    };

    // Reject the build on invalid values rather than at runtime
    let invalid = |e: validate::Error| format!("{}: {}", path, e);

    let mqtt_port = validate::port(raw.mqtt_port.unwrap_or(DEFAULT_MQTT_PORT)).map_err(invalid)?;
    let interval = validate::interval(
        raw.measurement_interval_seconds
            .unwrap_or(DEFAULT_MEASUREMENT_INTERVAL_SECONDS),
    )
    .map_err(invalid)?;

    validate::record(&validate::Record {
        wifi_ssid: &raw.wifi_ssid,
        wifi_password: &raw.wifi_password,
        hostname: &raw.hostname,
        mqtt_hostname: &raw.mqtt_hostname,
        mqtt_port,
        mqtt_username: raw.mqtt_username.as_deref(),
        mqtt_password: raw.mqtt_password.as_deref(),
        client_identifier: &raw.client_identifier,
        humidity_topic: &raw.humidity_topic,
        temperature_topic: &raw.temperature_topic,
        measurement_interval_seconds: interval,
    })
    .map_err(invalid)?;

    // Generate Rust code
    let out_dir = env::var("OUT_DIR")?;
    let dest_path = Path::new(&out_dir).join("config.rs");
    let code = format!(
        r#"
        pub const CONFIG: Config<'static> = Config {{
            wifi_ssid: {ssid:?},
            wifi_password: {psk:?},
            hostname: {host:?},
            mqtt_hostname: {mh:?},
            mqtt_port: {mp},
            mqtt_username: {mu:?},
            mqtt_password: {mpw:?},
            client_identifier: {cid:?},
            humidity_topic: {ht:?},
            temperature_topic: {tt:?},
            measurement_interval_seconds: {intv},
        }};
    "#,
        ssid = raw.wifi_ssid,
        psk = raw.wifi_password,
        host = raw.hostname,
        mh = raw.mqtt_hostname,
        mp = mqtt_port,
        mu = raw.mqtt_username,
        mpw = raw.mqtt_password,
        cid = raw.client_identifier,
        ht = raw.humidity_topic,
        tt = raw.temperature_topic,
        intv = interval
    );

    fs::write(dest_path, code)?;
    Ok(())
}
