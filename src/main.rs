#![no_std]
#![no_main]

use embassy_executor::Spawner;
use embassy_time::{Duration, Timer};

use esp_alloc as _;
use esp_backtrace as _;
use esp_hal::{self as hal};
use esp_println::logger::init_logger;
use esp_storage::FlashStorage;

use hal::timer::timg::TimerGroup;

use esp32_climate_node::{constants::*, provisioning::ProvisioningStore};

#[cfg(not(feature = "decommission"))]
use static_cell::StaticCell;

#[cfg(not(feature = "decommission"))]
use hal::{
    efuse::Efuse,
    i2c::master::{BusTimeout, I2c},
    rng::Rng,
    time::Rate,
    Async,
};

#[cfg(not(feature = "decommission"))]
use esp32_climate_node::{
    client_id::{self, ClientId},
    config::{Config, CONFIG},
    mqtt::BrokerConnector,
    provisioning,
    sensor::Bme280,
    telemetry,
    wifi::Wifi,
};

esp_bootloader_esp_idf::esp_app_desc!();

#[cfg(not(feature = "decommission"))]
static PROVISIONING_BUF: StaticCell<[u8; PROVISIONING_RECORD_MAX]> = StaticCell::new();
#[cfg(not(feature = "decommission"))]
static CLIENT_ID: StaticCell<ClientId> = StaticCell::new();

#[cfg(not(feature = "decommission"))]
static RX_BUF: StaticCell<[u8; RX_BUFFER_SIZE]> = StaticCell::new();
#[cfg(not(feature = "decommission"))]
static TX_BUF: StaticCell<[u8; TX_BUFFER_SIZE]> = StaticCell::new();
#[cfg(not(feature = "decommission"))]
static MQTT_RX_BUF: StaticCell<[u8; MQTT_RX_BUFFER_SIZE]> = StaticCell::new();
#[cfg(not(feature = "decommission"))]
static MQTT_TX_BUF: StaticCell<[u8; MQTT_TX_BUFFER_SIZE]> = StaticCell::new();

fn provisioning_store() -> ProvisioningStore<FlashStorage> {
    ProvisioningStore::new(
        FlashStorage::new(),
        PROVISIONING_FLASH_OFFSET,
        PROVISIONING_REGION_SIZE,
    )
}

// Built with placeholder values only, the device configuration is never
// compiled into this image.
#[cfg(feature = "decommission")]
#[esp_hal_embassy::main]
async fn main(_spawner: Spawner) {
    init_logger(log::LevelFilter::Info);
    log::info!("esp32_climate_node v{} (decommission)", VERSION);

    let peripherals = esp_hal::init(esp_hal::Config::default());

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_hal_embassy::init(timg0.timer0);

    match provisioning_store().wipe() {
        Ok(()) => log::info!("Device decommissioned, flash a new image to reuse it"),
        Err(e) => log::error!("Failed to wipe provisioning region: {:?}", e),
    }

    loop {
        Timer::after(Duration::from_secs(3600)).await;
    }
}

#[cfg(not(feature = "decommission"))]
#[esp_hal_embassy::main]
async fn main(spawner: Spawner) {
    init_logger(log::LevelFilter::Info);
    log::info!("esp32_climate_node v{}", VERSION);

    let peripherals = esp_hal::init(esp_hal::Config::default());

    let rng = Rng::new(peripherals.RNG);

    esp_alloc::heap_allocator!(size: HEAP_SIZE);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    let timg1 = TimerGroup::new(peripherals.TIMG1);

    esp_hal_embassy::init(timg0.timer0);

    let provisioning_buf = PROVISIONING_BUF.init([0; PROVISIONING_RECORD_MAX]);
    let mut config = provisioning::resolve(&CONFIG, &mut provisioning_store(), provisioning_buf);

    let mac = Efuse::mac_address();
    let client_id = match client_id::resolve(config.client_identifier, CLIENT_ID_PREFIX, mac) {
        Ok(id) => id,
        Err(e) => {
            log::error!(
                "Unusable client identifier {:?}: {:?}, using compiled-in configuration",
                config.client_identifier,
                e
            );
            config = CONFIG;
            client_id::resolve(CONFIG.client_identifier, CLIENT_ID_PREFIX, mac)
                .expect("compiled-in client identifier is checked by build.rs")
        }
    };
    let client_id: &'static ClientId = CLIENT_ID.init(client_id);
    config.client_identifier = client_id.as_str();

    log::info!("Configuration: {:?}", config);

    // possibly high transient required at init
    // https://github.com/esp-rs/esp-hal/issues/1626
    Timer::after(Duration::from_millis(1000)).await;

    let i2c_config = hal::i2c::master::Config::default()
        .with_frequency(Rate::from_khz(100))
        .with_timeout(BusTimeout::BusCycles(24));

    let i2c = I2c::new(peripherals.I2C0, i2c_config)
        .unwrap()
        .with_sda(peripherals.GPIO21)
        .with_scl(peripherals.GPIO22)
        .into_async();

    let sensor = Bme280::new(i2c).await.unwrap();

    let wifi = Wifi::new(
        peripherals.WIFI,
        timg1.timer0,
        peripherals.RADIO_CLK,
        rng,
        spawner,
        config,
    )
    .await
    .unwrap();

    wifi.connect().await.unwrap();

    let connector = BrokerConnector::new(
        wifi.stack,
        RX_BUF.init([0; RX_BUFFER_SIZE]),
        TX_BUF.init([0; TX_BUFFER_SIZE]),
        MQTT_RX_BUF.init([0; MQTT_RX_BUFFER_SIZE]),
        MQTT_TX_BUF.init([0; MQTT_TX_BUFFER_SIZE]),
    );

    spawner.spawn(main_task(sensor, connector, config)).ok();
}

#[cfg(not(feature = "decommission"))]
#[embassy_executor::task]
async fn main_task(
    mut sensor: Bme280<I2c<'static, Async>>,
    mut connector: BrokerConnector,
    config: Config<'static>,
) {
    let interval = Duration::from_secs(config.measurement_interval_seconds.into());

    loop {
        match sensor.measure().await {
            Ok(reading) => {
                log::debug!("Sensor data received: {:?}", reading);
                if let Err(e) = telemetry::publish_reading(&mut connector, &config, &reading).await
                {
                    log::error!("Measurement error: {:?}", e);
                }
            }
            Err(e) => log::error!("Sensor error: {:?}", e),
        }

        Timer::after(interval).await;
    }
}
