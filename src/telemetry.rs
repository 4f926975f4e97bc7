#![allow(async_fn_in_trait)]

use core::fmt::{Debug, Write};

use heapless::String;

use crate::config::{Config, ConnectParams};

/// Room for a formatted reading such as "-12.34"
pub const PAYLOAD_MAX_LEN: usize = 16;

pub type Payload = String<PAYLOAD_MAX_LEN>;

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    InvalidReading,
    Format,
    Connect,
    Publish,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    // Degrees Celsius
    pub temperature: f32,
    // Relative humidity, percent
    pub humidity: f32,
}

impl Reading {
    /// Sensors report NaN on a failed read; those never get published.
    pub fn is_valid(&self) -> bool {
        self.temperature.is_finite()
            && self.humidity.is_finite()
            && (0.0..=100.0).contains(&self.humidity)
    }
}

#[derive(Debug, PartialEq)]
pub struct Publication<'a> {
    pub topic: &'a str,
    pub payload: Payload,
}

pub fn format_value(value: f32) -> Result<Payload, Error> {
    let mut payload = Payload::new();
    write!(payload, "{:.2}", value).map_err(|_| Error::Format)?;
    Ok(payload)
}

/// Humidity first, then temperature.
pub fn publications<'a>(
    config: &Config<'a>,
    reading: &Reading,
) -> Result<[Publication<'a>; 2], Error> {
    if !reading.is_valid() {
        return Err(Error::InvalidReading);
    }

    Ok([
        Publication {
            topic: config.humidity_topic,
            payload: format_value(reading.humidity)?,
        },
        Publication {
            topic: config.temperature_topic,
            payload: format_value(reading.temperature)?,
        },
    ])
}

/// An open, authenticated session with the broker.
pub trait MqttSession {
    type Error: Debug;

    async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), Self::Error>;

    async fn disconnect(self);
}

/// Opens broker sessions: resolves the host, connects and authenticates.
pub trait MqttConnector {
    type Error: Debug;
    type Session<'s>: MqttSession
    where
        Self: 's;

    async fn connect<'s>(
        &'s mut self,
        params: &ConnectParams<'s>,
    ) -> Result<Self::Session<'s>, Self::Error>;
}

/// One measurement cycle on the wire: CONNECT (with credentials), PUBLISH
/// humidity, PUBLISH temperature, DISCONNECT.
pub async fn publish_reading<C: MqttConnector>(
    connector: &mut C,
    config: &Config<'_>,
    reading: &Reading,
) -> Result<(), Error> {
    // Format before touching the network
    let publications = publications(config, reading)?;

    let params = config.connect_params();
    let mut session = connector.connect(&params).await.map_err(|e| {
        log::error!(
            "Failed to connect to MQTT broker {}:{}: {:?}",
            params.host,
            params.port,
            e
        );
        Error::Connect
    })?;

    for publication in publications.iter() {
        log::debug!(
            "Publishing {} to {}",
            publication.payload.as_str(),
            publication.topic
        );
        if let Err(e) = session
            .publish(publication.topic, publication.payload.as_bytes())
            .await
        {
            log::error!("Failed to publish to {}: {:?}", publication.topic, e);
            session.disconnect().await;
            return Err(Error::Publish);
        }
    }

    session.disconnect().await;

    log::info!(
        "Published temperature={} humidity={}",
        publications[1].payload.as_str(),
        publications[0].payload.as_str()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use embassy_futures::block_on;
    use std::string::String;

    use super::*;
    use crate::config::tests::sample;

    #[derive(Debug, PartialEq)]
    enum Event {
        Connect {
            host: String,
            port: u16,
            username: Option<String>,
            password: Option<String>,
            client_id: String,
        },
        Publish {
            topic: String,
            payload: String,
        },
        Disconnect,
    }

    #[derive(Default)]
    struct RecordingConnector {
        events: Vec<Event>,
        refuse_connect: bool,
        fail_publish_after: Option<usize>,
    }

    struct RecordingSession<'s> {
        events: &'s mut Vec<Event>,
        remaining: Option<usize>,
    }

    impl MqttSession for RecordingSession<'_> {
        type Error = &'static str;

        async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), Self::Error> {
            if let Some(remaining) = self.remaining.as_mut() {
                if *remaining == 0 {
                    return Err("broker closed the connection");
                }
                *remaining -= 1;
            }
            self.events.push(Event::Publish {
                topic: topic.to_string(),
                payload: String::from_utf8(payload.to_vec()).unwrap(),
            });
            Ok(())
        }

        async fn disconnect(self) {
            self.events.push(Event::Disconnect);
        }
    }

    impl MqttConnector for RecordingConnector {
        type Error = &'static str;
        type Session<'s> = RecordingSession<'s>;

        async fn connect<'s>(
            &'s mut self,
            params: &ConnectParams<'s>,
        ) -> Result<Self::Session<'s>, Self::Error> {
            if self.refuse_connect {
                return Err("connection refused: not authorized");
            }
            self.events.push(Event::Connect {
                host: params.host.to_string(),
                port: params.port,
                username: params.username.map(str::to_string),
                password: params.password.map(str::to_string),
                client_id: params.client_id.to_string(),
            });
            Ok(RecordingSession {
                events: &mut self.events,
                remaining: self.fail_publish_after,
            })
        }
    }

    fn publish(topic: &str, payload: &str) -> Event {
        Event::Publish {
            topic: topic.to_string(),
            payload: payload.to_string(),
        }
    }

    const READING: Reading = Reading {
        temperature: 21.456,
        humidity: 48.2,
    };

    #[test]
    fn values_have_two_decimals() {
        assert_eq!(format_value(21.456).unwrap().as_str(), "21.46");
        assert_eq!(format_value(-3.0).unwrap().as_str(), "-3.00");
        assert_eq!(format_value(100.0).unwrap().as_str(), "100.00");
    }

    #[test]
    fn oversized_value_does_not_fit() {
        assert_eq!(format_value(1.0e20), Err(Error::Format));
    }

    #[test]
    fn failed_sensor_reads_are_rejected() {
        let config = sample();
        let nan = Reading {
            temperature: f32::NAN,
            humidity: 40.0,
        };
        assert_eq!(publications(&config, &nan), Err(Error::InvalidReading));

        let saturated = Reading {
            temperature: 20.0,
            humidity: 120.0,
        };
        assert_eq!(publications(&config, &saturated), Err(Error::InvalidReading));
    }

    #[test]
    fn connects_with_credentials_before_publishing() {
        let config = sample();
        let mut connector = RecordingConnector::default();

        block_on(publish_reading(&mut connector, &config, &READING)).unwrap();

        assert_eq!(
            connector.events,
            [
                Event::Connect {
                    host: "homeassistant.local".to_string(),
                    port: 1883,
                    username: Some("username_here".to_string()),
                    password: Some("password_here".to_string()),
                    client_id: "esp32-attic".to_string(),
                },
                publish("sensor/esp32-attic/humidity", "48.20"),
                publish("sensor/esp32-attic/temperature", "21.46"),
                Event::Disconnect,
            ]
        );
    }

    #[test]
    fn anonymous_broker_gets_no_credentials() {
        let config = Config {
            mqtt_username: None,
            mqtt_password: None,
            ..sample()
        };
        let mut connector = RecordingConnector::default();

        block_on(publish_reading(&mut connector, &config, &READING)).unwrap();

        assert!(matches!(
            &connector.events[0],
            Event::Connect {
                username: None,
                password: None,
                ..
            }
        ));
    }

    #[test]
    fn nothing_is_published_when_connect_fails() {
        let config = sample();
        let mut connector = RecordingConnector {
            refuse_connect: true,
            ..RecordingConnector::default()
        };

        let result = block_on(publish_reading(&mut connector, &config, &READING));
        assert_eq!(result, Err(Error::Connect));
        assert!(connector.events.is_empty());
    }

    #[test]
    fn invalid_reading_never_opens_a_session() {
        let config = sample();
        let mut connector = RecordingConnector::default();
        let reading = Reading {
            temperature: f32::NAN,
            humidity: f32::NAN,
        };

        let result = block_on(publish_reading(&mut connector, &config, &reading));
        assert_eq!(result, Err(Error::InvalidReading));
        assert!(connector.events.is_empty());
    }

    #[test]
    fn failed_publish_still_disconnects() {
        let config = sample();
        let mut connector = RecordingConnector {
            fail_publish_after: Some(1),
            ..RecordingConnector::default()
        };

        let result = block_on(publish_reading(&mut connector, &config, &READING));
        assert_eq!(result, Err(Error::Publish));
        assert_eq!(connector.events.len(), 3);
        assert_eq!(
            connector.events[1],
            publish("sensor/esp32-attic/humidity", "48.20")
        );
        assert_eq!(connector.events[2], Event::Disconnect);
    }

    #[test]
    fn hostname_change_leaves_the_wire_untouched() {
        let before = sample();
        let after = Config {
            hostname: "garage-temperature",
            ..before
        };

        let mut first = RecordingConnector::default();
        let mut second = RecordingConnector::default();
        block_on(publish_reading(&mut first, &before, &READING)).unwrap();
        block_on(publish_reading(&mut second, &after, &READING)).unwrap();

        assert_eq!(first.events, second.events);
    }
}
