//! # kiosk-core
//!
//! Shared logic for the dashboard kiosk appliance: a Raspberry Pi that boots
//! into a fullscreen Home Assistant dashboard.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime. Every operation is a short, blocking
//!   call into the OS or an external tool.
//! - **Seams at the OS boundary**: USB probing, rebooting, sleeping and display
//!   power sit behind traits so the decision logic runs in tests without
//!   hardware.
//! - **Compiled-in defaults**: The appliance has one touchscreen, one sentinel
//!   path and one display. Only the MQTT broker settings live in a file.
//!
//! ## Modules
//!
//! - [`recovery`]: The boot-time touchscreen recovery guard
//! - [`sentinel`]: Persisted "already rebooted once" flag
//! - [`usb`]: USB enumeration queries (`lsusb`, sysfs)
//! - [`display`]: HDMI power control through `wlopm`
//! - [`mqtt`]: Broker config, command dispatch, Home Assistant discovery

pub mod config;
pub mod display;
pub mod error;
pub mod logging;
pub mod mqtt;
pub mod process;
pub mod recovery;
pub mod sentinel;
pub mod usb;

pub use display::{DisplayBackend, DisplayPower, WlopmDisplay};
pub use error::{KioskError, Result};
pub use recovery::{
    GuardConfig, RecoveryGuard, RecoveryOutcome, Rebooter, Sleeper, SystemctlRebooter,
    ThreadSleeper,
};
pub use sentinel::{Sentinel, SentinelState};
pub use usb::{SystemUsbProbe, UsbDeviceId, UsbProbe};
