use bme280_rs::{AsyncBme280, Oversampling, SensorMode};
use embassy_time::Delay;
use embedded_hal_async::i2c::I2c;
use log::info;

use crate::telemetry::Reading;

#[derive(Debug)]
pub enum Error {
    InitFailure,
    MeasurementFailure,
    NoTemperatureData,
    NoHumidityData,
}

pub struct Bme280<I2C> {
    sensor: AsyncBme280<I2C, Delay>,
}

impl<I2C: I2c> Bme280<I2C> {
    pub async fn new(i2c: I2C) -> Result<Self, Error> {
        info!("Initialising BME280...");
        let mut sensor = AsyncBme280::new(i2c, Delay);
        sensor.init().await.map_err(|_| Error::InitFailure)?;

        // Pressure is not published, skip it
        sensor
            .set_sampling_configuration(
                bme280_rs::Configuration::default()
                    .with_temperature_oversampling(Oversampling::Oversample1)
                    .with_pressure_oversampling(Oversampling::Skip)
                    .with_humidity_oversampling(Oversampling::Oversample1)
                    .with_sensor_mode(SensorMode::Normal),
            )
            .await
            .map_err(|_| Error::InitFailure)?;

        info!("Initialised BME280");

        Ok(Self { sensor })
    }

    pub async fn measure(&mut self) -> Result<Reading, Error> {
        let sample = self
            .sensor
            .read_sample()
            .await
            .map_err(|_| Error::MeasurementFailure)?;

        Ok(Reading {
            temperature: sample.temperature.ok_or(Error::NoTemperatureData)?,
            humidity: sample.humidity.ok_or(Error::NoHumidityData)?,
        })
    }
}
