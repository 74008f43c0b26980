//! MQTT control surface for the display.
//!
//! ```text
//! Home Assistant ──command──▶ dashboard/display/command ──▶ DisplayDispatcher ──▶ wlopm
//!        ▲                                                        │
//!        └────── dashboard/display/status, /availability ◀────────┘
//! ```
//!
//! This module holds the transport-independent parts: broker config, topic
//! names, command parsing, dispatch decisions and discovery payloads. The
//! network client lives in the `kiosk-display` binary.

mod config;
mod discovery;
mod dispatch;

pub use config::MqttConfig;
pub use discovery::{discovery_messages, DiscoveryMessage, DISCOVERY_PREFIX};
pub use dispatch::{DisplayCommand, DisplayDispatcher};

pub const TOPIC_COMMAND: &str = "dashboard/display/command";
pub const TOPIC_STATUS: &str = "dashboard/display/status";
pub const TOPIC_AVAILABILITY: &str = "dashboard/display/availability";

pub const AVAILABILITY_ONLINE: &str = "online";
pub const AVAILABILITY_OFFLINE: &str = "offline";

pub const LISTENER_CLIENT_ID: &str = "dashboard-display-pi";
pub const DISCOVERY_CLIENT_ID: &str = "dashboard-display-discovery-pub";
