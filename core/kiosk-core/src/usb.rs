//! USB enumeration queries.
//!
//! The touchscreen counts as present once the host has enumerated its
//! vendor:product pair. `lsusb` is the primary source (it is what an operator
//! runs by hand); sysfs is the fallback for images without `usbutils`.

use crate::error::{KioskError, Result};
use crate::process::run_with_timeout;
use fs_err as fs;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::str::FromStr;
use std::time::Duration;
use walkdir::WalkDir;

const SYSFS_USB_DEVICES: &str = "/sys/bus/usb/devices";
const LSUSB_TIMEOUT: Duration = Duration::from_secs(10);

/// `Bus 001 Device 004: ID 222a:0001 ILITEK Multi-Touch-V5100`
static RE_LSUSB_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bID ([0-9a-fA-F]{4}):([0-9a-fA-F]{4})\b").unwrap());

/// A USB `vendor:product` identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UsbDeviceId {
    pub vendor: u16,
    pub product: u16,
}

impl UsbDeviceId {
    pub const fn new(vendor: u16, product: u16) -> Self {
        Self { vendor, product }
    }
}

impl FromStr for UsbDeviceId {
    type Err = KioskError;

    fn from_str(value: &str) -> Result<Self> {
        let invalid = |reason: &str| KioskError::InvalidDeviceId {
            value: value.to_string(),
            reason: reason.to_string(),
        };

        let (vendor, product) = value
            .trim()
            .split_once(':')
            .ok_or_else(|| invalid("expected vendor:product"))?;
        let parse_half = |half: &str| {
            if half.is_empty() || half.len() > 4 {
                return Err(invalid("each half must be 1-4 hex digits"));
            }
            u16::from_str_radix(half, 16).map_err(|_| invalid("not hexadecimal"))
        };

        Ok(Self {
            vendor: parse_half(vendor)?,
            product: parse_half(product)?,
        })
    }
}

impl fmt::Display for UsbDeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vendor, self.product)
    }
}

/// Answers "is this device enumerated right now?".
pub trait UsbProbe {
    fn is_present(&self, id: UsbDeviceId) -> Result<bool>;
}

/// Extracts every `ID vvvv:pppp` pair from `lsusb` output.
pub fn parse_lsusb(output: &str) -> Vec<UsbDeviceId> {
    output
        .lines()
        .filter_map(|line| RE_LSUSB_ID.captures(line))
        .filter_map(|caps| {
            let vendor = u16::from_str_radix(&caps[1], 16).ok()?;
            let product = u16::from_str_radix(&caps[2], 16).ok()?;
            Some(UsbDeviceId::new(vendor, product))
        })
        .collect()
}

/// Reads `idVendor`/`idProduct` from each device directory under `root`.
pub fn scan_sysfs(root: &Path) -> Result<Vec<UsbDeviceId>> {
    if !root.is_dir() {
        return Err(KioskError::io(
            format!("USB sysfs directory unavailable: {}", root.display()),
            std::io::Error::from(ErrorKind::NotFound),
        ));
    }

    let mut devices = Vec::new();
    for entry in WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let dir = entry.path();
        let vendor = read_hex_attr(&dir.join("idVendor"));
        let product = read_hex_attr(&dir.join("idProduct"));
        if let (Some(vendor), Some(product)) = (vendor, product) {
            devices.push(UsbDeviceId::new(vendor, product));
        }
    }
    Ok(devices)
}

fn read_hex_attr(path: &Path) -> Option<u16> {
    let raw = fs::read_to_string(path).ok()?;
    u16::from_str_radix(raw.trim(), 16).ok()
}

/// Production probe: `lsusb`, falling back to sysfs when `lsusb` is missing.
#[derive(Debug, Clone)]
pub struct SystemUsbProbe {
    lsusb: PathBuf,
    sysfs_root: PathBuf,
}

impl Default for SystemUsbProbe {
    fn default() -> Self {
        Self {
            lsusb: PathBuf::from("lsusb"),
            sysfs_root: PathBuf::from(SYSFS_USB_DEVICES),
        }
    }
}

impl SystemUsbProbe {
    /// Uses a custom `lsusb` program and sysfs root.
    /// Used for testing the fallback against temp directories.
    pub fn with_paths(lsusb: PathBuf, sysfs_root: PathBuf) -> Self {
        Self { lsusb, sysfs_root }
    }

    fn list_via_lsusb(&self) -> Result<Vec<UsbDeviceId>> {
        let output = run_with_timeout(&mut Command::new(&self.lsusb), LSUSB_TIMEOUT)?;
        if !output.success() {
            return Err(KioskError::CommandFailed {
                command: self.lsusb.display().to_string(),
                details: output.stderr.trim().to_string(),
            });
        }
        Ok(parse_lsusb(&output.stdout))
    }
}

impl UsbProbe for SystemUsbProbe {
    fn is_present(&self, id: UsbDeviceId) -> Result<bool> {
        let devices = match self.list_via_lsusb() {
            Ok(devices) => devices,
            Err(KioskError::Io { source, .. }) if source.kind() == ErrorKind::NotFound => {
                tracing::debug!(
                    root = %self.sysfs_root.display(),
                    "lsusb not installed; scanning sysfs"
                );
                scan_sysfs(&self.sysfs_root)?
            }
            Err(e) => return Err(e),
        };
        Ok(devices.contains(&id))
    }
}
