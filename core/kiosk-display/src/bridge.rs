//! Long-running MQTT listener for display commands.
//!
//! ## Lifecycle
//!
//! 1. Connect with a retained `offline` last will on the availability topic
//! 2. On every CONNACK: subscribe, publish `online`, publish current status
//! 3. On each command: dispatch to the display, publish the resulting status
//! 4. On SIGTERM/SIGINT: publish `offline`, disconnect, exit 0
//!
//! Connection errors are logged and retried; the client reconnects on the
//! next poll.

use crate::client::{mqtt_error, options};
use crate::signals;
use kiosk_core::mqtt::{
    DisplayDispatcher, MqttConfig, AVAILABILITY_OFFLINE, AVAILABILITY_ONLINE, LISTENER_CLIENT_ID,
    TOPIC_AVAILABILITY, TOPIC_COMMAND, TOPIC_STATUS,
};
use kiosk_core::{DisplayBackend, DisplayPower, Result, WlopmDisplay};
use rumqttc::{Client, Connection, Event, LastWill, Packet, QoS, RecvTimeoutError};
use std::time::{Duration, Instant};
use tracing::{info, warn};

const KEEP_ALIVE: Duration = Duration::from_secs(60);
const POLL_INTERVAL: Duration = Duration::from_secs(1);
const RECONNECT_DELAY: Duration = Duration::from_secs(5);
const SHUTDOWN_DRAIN: Duration = Duration::from_secs(2);
const CHANNEL_CAPACITY: usize = 16;

pub fn run(config: &MqttConfig) -> Result<()> {
    signals::install();
    info!("Starting MQTT display control listener");

    let mut mqtt_options = options(config, LISTENER_CLIENT_ID)?;
    mqtt_options
        .set_keep_alive(KEEP_ALIVE)
        .set_clean_session(false)
        .set_last_will(LastWill::new(
            TOPIC_AVAILABILITY,
            AVAILABILITY_OFFLINE,
            QoS::AtLeastOnce,
            true,
        ));

    info!(broker = %config.broker, port = config.port, "Connecting to MQTT broker");
    let (client, mut connection) = Client::new(mqtt_options, CHANNEL_CAPACITY);
    let dispatcher = DisplayDispatcher::new(WlopmDisplay::default());

    while !signals::shutdown_requested() {
        match connection.recv_timeout(POLL_INTERVAL) {
            Ok(Ok(Event::Incoming(Packet::ConnAck(_)))) => on_connect(&client, &dispatcher)?,
            Ok(Ok(Event::Incoming(Packet::Publish(publish)))) if publish.topic == TOPIC_COMMAND => {
                if let Some(power) = dispatcher.handle_payload(&publish.payload) {
                    publish_status(&client, power)?;
                }
            }
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                warn!(error = %e, "MQTT connection error, will attempt reconnect");
                signals::sleep_unless_shutdown(RECONNECT_DELAY);
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                return Err(mqtt_error("MQTT event loop", "request channel closed"));
            }
        }
    }

    info!("Shutdown requested");
    shutdown(&client, &mut connection);
    info!("Shutdown complete");
    Ok(())
}

fn on_connect<B: DisplayBackend>(client: &Client, dispatcher: &DisplayDispatcher<B>) -> Result<()> {
    info!("Connected to MQTT broker");
    client
        .subscribe(TOPIC_COMMAND, QoS::AtLeastOnce)
        .map_err(|e| mqtt_error("subscribe", e))?;
    info!(topic = TOPIC_COMMAND, "Subscribed");

    client
        .publish(TOPIC_AVAILABILITY, QoS::AtLeastOnce, true, AVAILABILITY_ONLINE)
        .map_err(|e| mqtt_error("publish availability", e))?;
    publish_status(client, dispatcher.current_status())
}

fn publish_status(client: &Client, power: DisplayPower) -> Result<()> {
    client
        .publish(TOPIC_STATUS, QoS::AtLeastOnce, true, power.as_str())
        .map_err(|e| mqtt_error("publish status", e))?;
    info!(status = %power, "Published status");
    Ok(())
}

/// Best effort: the broker also has the last will if this does not get out.
fn shutdown(client: &Client, connection: &mut Connection) {
    if let Err(e) = client.publish(
        TOPIC_AVAILABILITY,
        QoS::AtLeastOnce,
        true,
        AVAILABILITY_OFFLINE,
    ) {
        warn!(error = %e, "Failed to queue offline availability");
    }
    if let Err(e) = client.disconnect() {
        warn!(error = %e, "Failed to queue disconnect");
    }

    let deadline = Instant::now() + SHUTDOWN_DRAIN;
    while Instant::now() < deadline {
        match connection.recv_timeout(Duration::from_millis(200)) {
            Ok(Ok(Event::Outgoing(rumqttc::Outgoing::Disconnect))) => break,
            Ok(Ok(_)) | Err(RecvTimeoutError::Timeout) => {}
            Ok(Err(_)) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}
