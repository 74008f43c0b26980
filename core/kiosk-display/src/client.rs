//! MQTT client options built from the broker config file.

use fs_err as fs;
use kiosk_core::mqtt::MqttConfig;
use kiosk_core::{KioskError, Result};
use rumqttc::{MqttOptions, TlsConfiguration, Transport};

pub fn options(config: &MqttConfig, client_id: &str) -> Result<MqttOptions> {
    let mut options = MqttOptions::new(client_id, config.broker.as_str(), config.port);
    if let Some((username, password)) = config.credentials() {
        options.set_credentials(username, password);
    }
    if config.tls {
        options.set_transport(tls_transport(config)?);
    }
    Ok(options)
}

/// System roots unless a CA file is configured.
fn tls_transport(config: &MqttConfig) -> Result<Transport> {
    let Some(cafile) = &config.cafile else {
        return Ok(Transport::tls_with_default_config());
    };

    let ca = fs::read(cafile).map_err(|e| KioskError::io("Failed to read MQTT CA file", e))?;
    let client_auth = match config.client_auth_paths() {
        Some((cert, key)) => Some((
            fs::read(cert).map_err(|e| KioskError::io("Failed to read MQTT client cert", e))?,
            fs::read(key).map_err(|e| KioskError::io("Failed to read MQTT client key", e))?,
        )),
        None => None,
    };

    Ok(Transport::tls_with_config(TlsConfiguration::Simple {
        ca,
        alpn: None,
        client_auth,
    }))
}

pub fn mqtt_error(context: &str, err: impl std::fmt::Display) -> KioskError {
    KioskError::Mqtt(format!("{}: {}", context, err))
}
