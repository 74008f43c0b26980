//! Compiled-in appliance configuration and path helpers.
//!
//! The kiosk has exactly one touchscreen, one sentinel and one Wayland
//! session, so these are constants rather than config files. The MQTT broker
//! settings are the exception and live under the dashboard project directory.

use crate::usb::UsbDeviceId;
use std::path::PathBuf;
use std::time::Duration;

/// ILITEK multi-touch controller on the kiosk panel (`222a:0001`).
pub const TOUCHSCREEN_DEVICE: UsbDeviceId = UsbDeviceId::new(0x222a, 0x0001);

/// Zero-byte flag that survives the warm reboot.
pub const SENTINEL_PATH: &str = "/var/lib/kiosk/touchscreen-reboot.flag";

pub const SETTLE_WAIT: Duration = Duration::from_secs(10);

/// Identifier attached to every recovery guard log line.
pub const GUARD_LOG_TARGET: &str = "touch-guard";

pub const WAYLAND_DISPLAY: &str = "wayland-0";
pub const DISPLAY_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

pub const LOG_DIR_ENV: &str = "KIOSK_LOG_DIR";
pub const DEBUG_LOG_ENV: &str = "KIOSK_DEBUG_LOG";

/// Returns the dashboard project directory (~/dashboard-project).
pub fn dashboard_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join("dashboard-project"))
}

/// Returns the path to the MQTT broker configuration file.
pub fn mqtt_config_path() -> Option<PathBuf> {
    dashboard_dir().map(|d| d.join("config").join("mqtt.json"))
}

/// `/run/user/<uid>` for the invoking user.
pub fn xdg_runtime_dir() -> PathBuf {
    // SAFETY: getuid() has no failure modes.
    #[allow(unsafe_code)]
    let uid = unsafe { libc::getuid() };
    PathBuf::from(format!("/run/user/{}", uid))
}

/// True when the named env var holds a truthy flag value.
pub fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false)
}
