//! HDMI display power control through `wlopm`.
//!
//! `wlopm` talks to the compositor over the Wayland output-power-management
//! protocol, so it needs the session's `WAYLAND_DISPLAY` and
//! `XDG_RUNTIME_DIR` even when invoked from a system service.

use crate::config::{xdg_runtime_dir, DISPLAY_COMMAND_TIMEOUT, WAYLAND_DISPLAY};
use crate::error::{KioskError, Result};
use crate::process::{describe, run_with_timeout};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::process::Command;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayPower {
    On,
    Off,
    Unknown,
}

impl DisplayPower {
    pub fn as_str(self) -> &'static str {
        match self {
            DisplayPower::On => "on",
            DisplayPower::Off => "off",
            DisplayPower::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DisplayPower {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DisplayPower {
    type Err = KioskError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "on" => Ok(DisplayPower::On),
            "off" => Ok(DisplayPower::Off),
            "unknown" => Ok(DisplayPower::Unknown),
            other => Err(KioskError::CommandFailed {
                command: "display power".to_string(),
                details: format!("unrecognised power state {:?}", other),
            }),
        }
    }
}

/// Switches and reports display power.
pub trait DisplayBackend {
    fn set_power(&self, power: DisplayPower) -> Result<()>;
    fn query_power(&self) -> Result<DisplayPower>;
}

/// Folds `wlopm` listing output (`<output> <on|off>` per line) into one state.
///
/// All outputs on → `On`, all off → `Off`; anything else is `Unknown`.
pub fn parse_wlopm_status(output: &str) -> DisplayPower {
    let states: Vec<&str> = output
        .lines()
        .filter_map(|line| line.split_whitespace().last())
        .collect();

    if states.is_empty() {
        DisplayPower::Unknown
    } else if states.iter().all(|s| s.eq_ignore_ascii_case("on")) {
        DisplayPower::On
    } else if states.iter().all(|s| s.eq_ignore_ascii_case("off")) {
        DisplayPower::Off
    } else {
        DisplayPower::Unknown
    }
}

#[derive(Debug, Clone)]
pub struct WlopmDisplay {
    wayland_display: String,
    runtime_dir: PathBuf,
    timeout: Duration,
}

impl Default for WlopmDisplay {
    fn default() -> Self {
        Self {
            wayland_display: WAYLAND_DISPLAY.to_string(),
            runtime_dir: xdg_runtime_dir(),
            timeout: DISPLAY_COMMAND_TIMEOUT,
        }
    }
}

impl WlopmDisplay {
    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new("wlopm");
        cmd.args(args)
            .env("WAYLAND_DISPLAY", &self.wayland_display)
            .env("XDG_RUNTIME_DIR", &self.runtime_dir);
        cmd
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        let mut cmd = self.command(args);
        let label = describe(&cmd);
        let output = run_with_timeout(&mut cmd, self.timeout)?;
        if !output.success() {
            return Err(KioskError::CommandFailed {
                command: label,
                details: output.stderr.trim().to_string(),
            });
        }
        Ok(output.stdout)
    }
}

impl DisplayBackend for WlopmDisplay {
    fn set_power(&self, power: DisplayPower) -> Result<()> {
        let flag = match power {
            DisplayPower::On => "--on",
            DisplayPower::Off => "--off",
            DisplayPower::Unknown => {
                return Err(KioskError::CommandFailed {
                    command: "wlopm".to_string(),
                    details: "cannot set display power to unknown".to_string(),
                })
            }
        };
        self.run(&[flag, "*"])?;
        tracing::info!(power = %power, "Display power set");
        Ok(())
    }

    fn query_power(&self) -> Result<DisplayPower> {
        let stdout = self.run(&[])?;
        Ok(parse_wlopm_status(&stdout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_all_on() {
        assert_eq!(parse_wlopm_status("HDMI-A-1 on\n"), DisplayPower::On);
        assert_eq!(
            parse_wlopm_status("HDMI-A-1 on\nHDMI-A-2 ON\n"),
            DisplayPower::On
        );
    }

    #[test]
    fn parse_all_off() {
        assert_eq!(parse_wlopm_status("HDMI-A-1 off"), DisplayPower::Off);
    }

    #[test]
    fn parse_mixed_or_empty_is_unknown() {
        assert_eq!(
            parse_wlopm_status("HDMI-A-1 on\nHDMI-A-2 off\n"),
            DisplayPower::Unknown
        );
        assert_eq!(parse_wlopm_status(""), DisplayPower::Unknown);
        assert_eq!(parse_wlopm_status("\n\n"), DisplayPower::Unknown);
    }

    #[test]
    fn power_wire_format() {
        assert_eq!(DisplayPower::On.to_string(), "on");
        assert_eq!(DisplayPower::Unknown.as_str(), "unknown");
        assert_eq!(" OFF ".parse::<DisplayPower>().unwrap(), DisplayPower::Off);
        assert!("dim".parse::<DisplayPower>().is_err());
        assert_eq!(
            serde_json::to_string(&DisplayPower::Off).unwrap(),
            "\"off\""
        );
    }

    #[test]
    fn wlopm_command_carries_session_env() {
        let display = WlopmDisplay {
            wayland_display: "wayland-1".to_string(),
            runtime_dir: PathBuf::from("/run/user/1000"),
            timeout: Duration::from_secs(1),
        };
        let cmd = display.command(&["--off", "*"]);
        assert_eq!(describe(&cmd), "wlopm --off *");

        let envs: Vec<(String, String)> = cmd
            .get_envs()
            .filter_map(|(k, v)| {
                Some((
                    k.to_string_lossy().to_string(),
                    v?.to_string_lossy().to_string(),
                ))
            })
            .collect();
        assert!(envs.contains(&("WAYLAND_DISPLAY".to_string(), "wayland-1".to_string())));
        assert!(envs.contains(&("XDG_RUNTIME_DIR".to_string(), "/run/user/1000".to_string())));
    }
}
