/// Current firmware version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Size of the heap in DRAM (internal memory)
pub const HEAP_SIZE: usize = 72 * 1024;

/// Size of the TCP socket receive buffer
pub const RX_BUFFER_SIZE: usize = 4096;
/// Size of the TCP socket transmit buffer
pub const TX_BUFFER_SIZE: usize = 4096;

/// Size of the MQTT client receive buffer for application data
pub const MQTT_RX_BUFFER_SIZE: usize = 1024;
/// Size of the MQTT client transmit buffer for application data
pub const MQTT_TX_BUFFER_SIZE: usize = 1024;
/// MQTT keep alive announced in CONNECT
pub const MQTT_KEEP_ALIVE_SECS: u16 = 30;
/// Maximum number of MQTT v5 properties per packet
pub const MQTT_MAX_PROPERTIES: usize = 5;

/// Prefix of client identifiers derived from the WiFi MAC address
pub const CLIENT_ID_PREFIX: &str = "climate";

/// Offset of the provisioning record in flash (the `nvs` partition)
pub const PROVISIONING_FLASH_OFFSET: u32 = 0x9000;
/// Size of the flash region reserved for the provisioning record
pub const PROVISIONING_REGION_SIZE: u32 = 0x1000;
/// Largest provisioning record, header included
pub const PROVISIONING_RECORD_MAX: usize = 1024;

/// Delay before retrying a failed WiFi association
pub const WIFI_RECONNECT_DELAY_MS: u64 = 5000;
/// Upper bound for a single WiFi association attempt
pub const WIFI_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Timeout applied to the broker TCP socket
pub const SOCKET_TIMEOUT_SECS: u64 = 30;
