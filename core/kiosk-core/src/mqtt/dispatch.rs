use crate::display::{DisplayBackend, DisplayPower};
use std::str::FromStr;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayCommand {
    On,
    Off,
    Status,
}

impl FromStr for DisplayCommand {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "on" => Ok(DisplayCommand::On),
            "off" => Ok(DisplayCommand::Off),
            "status" => Ok(DisplayCommand::Status),
            _ => Err(()),
        }
    }
}

/// Turns command payloads into display actions and the status to publish.
///
/// Returns `None` when nothing should be published: unknown commands and
/// failed `on`/`off` switches leave the retained status untouched.
pub struct DisplayDispatcher<B> {
    backend: B,
}

impl<B: DisplayBackend> DisplayDispatcher<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn handle_payload(&self, payload: &[u8]) -> Option<DisplayPower> {
        let text = match std::str::from_utf8(payload) {
            Ok(text) => text.trim(),
            Err(e) => {
                error!(error = %e, "Command payload is not UTF-8");
                return None;
            }
        };
        info!(command = %text, "Received command");

        match text.parse::<DisplayCommand>() {
            Ok(command) => self.handle_command(command),
            Err(()) => {
                warn!(command = %text, "Unknown command");
                None
            }
        }
    }

    pub fn handle_command(&self, command: DisplayCommand) -> Option<DisplayPower> {
        let target = match command {
            DisplayCommand::On => DisplayPower::On,
            DisplayCommand::Off => DisplayPower::Off,
            DisplayCommand::Status => return Some(self.current_status()),
        };

        match self.backend.set_power(target) {
            Ok(()) => {
                info!(command = ?command, "Command executed successfully");
                Some(target)
            }
            Err(e) => {
                error!(command = ?command, error = %e, "Command failed");
                None
            }
        }
    }

    /// Queries the display, degrading to `Unknown` on any failure.
    pub fn current_status(&self) -> DisplayPower {
        match self.backend.query_power() {
            Ok(power) => power,
            Err(e) => {
                error!(error = %e, "Failed to get display status");
                DisplayPower::Unknown
            }
        }
    }
}
