use embassy_net::Stack;
use rust_mqtt::{
    client::{
        client::MqttClient,
        client_config::{ClientConfig, MqttVersion},
    },
    packet::v5::publish_packet::QualityOfService,
    utils::rng_generator::CountingRng,
};

use crate::config::ConnectParams;
use crate::constants::*;
use crate::telemetry::{MqttConnector, MqttSession};
use crate::transport::Transport;

#[derive(Debug)]
pub enum Error {
    Transport,
    ConnectionFailed,
    PublishMessageFailed,
}

pub struct Mqtt<'a> {
    client: MqttClient<'a, Transport<'a>, MQTT_MAX_PROPERTIES, CountingRng>,
}

impl<'a> Mqtt<'a> {
    pub async fn new(
        transport: Transport<'a>,
        tx_buffer: &'a mut [u8],
        rx_buffer: &'a mut [u8],
        params: &ConnectParams<'a>,
    ) -> Result<Self, Error> {
        let mut config = ClientConfig::new(MqttVersion::MQTTv5, CountingRng(20000));
        config.add_max_subscribe_qos(QualityOfService::QoS1);
        config.add_client_id(params.client_id);
        config.keep_alive = MQTT_KEEP_ALIVE_SECS;
        config.max_packet_size = MQTT_TX_BUFFER_SIZE as u32;

        if let Some(username) = params.username {
            config.add_username(username);
        }
        if let Some(password) = params.password {
            config.add_password(password);
        }

        let tx_len = tx_buffer.len();
        let rx_len = rx_buffer.len();
        let mut client = MqttClient::<_, MQTT_MAX_PROPERTIES, _>::new(
            transport, tx_buffer, tx_len, rx_buffer, rx_len, config,
        );

        match client.connect_to_broker().await {
            Ok(()) => {
                log::info!(
                    "MQTT connected to broker as {:?} successfully",
                    params.client_id
                );
            }
            Err(e) => {
                log::error!("MQTT connect_to_broker failed: {:?}", e);
                return Err(Error::ConnectionFailed);
            }
        }

        Ok(Self { client })
    }
}

impl MqttSession for Mqtt<'_> {
    type Error = Error;

    async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), Error> {
        match self
            .client
            .send_message(topic, payload, QualityOfService::QoS1, false)
            .await
        {
            Ok(()) => {
                log::debug!("Message published and acknowledged");
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to publish message: {:?}", e);
                Err(Error::PublishMessageFailed)
            }
        }
    }

    async fn disconnect(mut self) {
        let _ = self.client.disconnect().await;
    }
}

/// Opens a fresh TCP + MQTT session for every measurement cycle
pub struct BrokerConnector {
    stack: Stack<'static>,
    rx_buf: &'static mut [u8; RX_BUFFER_SIZE],
    tx_buf: &'static mut [u8; TX_BUFFER_SIZE],
    mqtt_rx_buf: &'static mut [u8; MQTT_RX_BUFFER_SIZE],
    mqtt_tx_buf: &'static mut [u8; MQTT_TX_BUFFER_SIZE],
}

impl BrokerConnector {
    pub fn new(
        stack: Stack<'static>,
        rx_buf: &'static mut [u8; RX_BUFFER_SIZE],
        tx_buf: &'static mut [u8; TX_BUFFER_SIZE],
        mqtt_rx_buf: &'static mut [u8; MQTT_RX_BUFFER_SIZE],
        mqtt_tx_buf: &'static mut [u8; MQTT_TX_BUFFER_SIZE],
    ) -> Self {
        Self {
            stack,
            rx_buf,
            tx_buf,
            mqtt_rx_buf,
            mqtt_tx_buf,
        }
    }
}

impl MqttConnector for BrokerConnector {
    type Error = Error;
    type Session<'s> = Mqtt<'s>;

    async fn connect<'s>(&'s mut self, params: &ConnectParams<'s>) -> Result<Mqtt<'s>, Error> {
        let transport = Transport::new(
            self.stack,
            &mut self.rx_buf[..],
            &mut self.tx_buf[..],
            params.host,
            params.port,
        )
        .await
        .map_err(|e| {
            log::error!("Transport to {}:{} failed: {:?}", params.host, params.port, e);
            Error::Transport
        })?;

        Mqtt::new(
            transport,
            &mut self.mqtt_tx_buf[..],
            &mut self.mqtt_rx_buf[..],
            params,
        )
        .await
    }
}
