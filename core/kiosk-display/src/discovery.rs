//! One-shot Home Assistant discovery publisher.

use crate::client::{mqtt_error, options};
use kiosk_core::mqtt::{discovery_messages, MqttConfig, DISCOVERY_CLIENT_ID};
use kiosk_core::{KioskError, Result};
use rumqttc::{Client, Event, Outgoing, Packet, QoS, RecvTimeoutError};
use std::time::{Duration, Instant};

const KEEP_ALIVE: Duration = Duration::from_secs(30);
const ACK_TIMEOUT: Duration = Duration::from_secs(10);

/// Publishes every discovery config with QoS 1 + retain and waits for the
/// broker to acknowledge all of them. Returns the published topics.
pub fn run(config: &MqttConfig) -> Result<Vec<String>> {
    let mut mqtt_options = options(config, DISCOVERY_CLIENT_ID)?;
    mqtt_options.set_keep_alive(KEEP_ALIVE).set_clean_session(true);
    let (client, mut connection) = Client::new(mqtt_options, 10);

    let messages = discovery_messages();
    let mut topics = Vec::with_capacity(messages.len());
    for message in messages {
        let payload = serde_json::to_vec(&message.payload).map_err(|e| KioskError::Json {
            context: format!("Failed to encode discovery payload for {}", message.topic),
            source: e,
        })?;
        client
            .publish(message.topic.as_str(), QoS::AtLeastOnce, true, payload)
            .map_err(|e| mqtt_error("publish discovery", e))?;
        topics.push(message.topic);
    }

    let mut acked = 0;
    let deadline = Instant::now() + ACK_TIMEOUT;
    while acked < topics.len() {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(mqtt_error(
                "discovery",
                format!("only {} of {} configs acknowledged", acked, topics.len()),
            ));
        }
        match connection.recv_timeout(remaining) {
            Ok(Ok(Event::Incoming(Packet::PubAck(_)))) => acked += 1,
            Ok(Ok(_)) | Err(RecvTimeoutError::Timeout) => {}
            Ok(Err(e)) => return Err(mqtt_error("connect", e)),
            Err(RecvTimeoutError::Disconnected) => {
                return Err(mqtt_error("discovery", "request channel closed"))
            }
        }
    }

    client
        .disconnect()
        .map_err(|e| mqtt_error("disconnect", e))?;
    loop {
        match connection.recv_timeout(Duration::from_secs(1)) {
            Ok(Ok(Event::Outgoing(Outgoing::Disconnect))) => break,
            Ok(Ok(_)) => {}
            Ok(Err(_)) | Err(_) => break,
        }
    }

    tracing::info!(count = topics.len(), "Published discovery configs");
    Ok(topics)
}
