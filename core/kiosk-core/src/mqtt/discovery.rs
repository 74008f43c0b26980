//! Home Assistant MQTT discovery payloads.
//!
//! Both entities share one device block so Home Assistant groups them under
//! a single "Raspberry Pi Dashboard" device.

use super::{TOPIC_AVAILABILITY, TOPIC_COMMAND, TOPIC_STATUS};
use serde_json::{json, Value};

pub const DISCOVERY_PREFIX: &str = "homeassistant";

const DEVICE_IDENTIFIER: &str = "raspi-dashboard-1";
const DEVICE_NAME: &str = "Raspberry Pi Dashboard";
const DEVICE_MODEL: &str = "Pi + HDMI Display";
const DEVICE_MANUFACTURER: &str = "Raspberry Pi";
const UNIQUE_SWITCH: &str = "dashboard_display_switch";
const UNIQUE_BUTTON: &str = "dashboard_display_status_button";

/// Anything other than on/off renders as `unknown` in Home Assistant.
const STATUS_VALUE_TEMPLATE: &str =
    "{% if value == 'on' %}on{% elif value == 'off' %}off{% else %}unknown{% endif %}";

/// A retained config message to publish.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryMessage {
    pub topic: String,
    pub payload: Value,
}

fn device_block() -> Value {
    json!({
        "identifiers": [DEVICE_IDENTIFIER],
        "name": DEVICE_NAME,
        "manufacturer": DEVICE_MANUFACTURER,
        "model": DEVICE_MODEL,
    })
}

/// The display switch and the refresh-status button.
pub fn discovery_messages() -> Vec<DiscoveryMessage> {
    let switch = json!({
        "name": "Dashboard Display",
        "unique_id": UNIQUE_SWITCH,
        "command_topic": TOPIC_COMMAND,
        "state_topic": TOPIC_STATUS,
        "availability_topic": TOPIC_AVAILABILITY,
        "payload_on": "on",
        "payload_off": "off",
        "state_on": "on",
        "state_off": "off",
        "value_template": STATUS_VALUE_TEMPLATE,
        "device": device_block(),
    });

    let button = json!({
        "name": "Dashboard Display: Refresh Status",
        "unique_id": UNIQUE_BUTTON,
        "command_topic": TOPIC_COMMAND,
        "payload_press": "status",
        "availability_topic": TOPIC_AVAILABILITY,
        "device": device_block(),
    });

    vec![
        DiscoveryMessage {
            topic: format!("{}/switch/dashboard_display/config", DISCOVERY_PREFIX),
            payload: switch,
        },
        DiscoveryMessage {
            topic: format!("{}/button/dashboard_display_status/config", DISCOVERY_PREFIX),
            payload: button,
        },
    ]
}
