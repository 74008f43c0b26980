//! Boot-time touchscreen recovery guard.
//!
//! The panel's USB controller sometimes fails to enumerate on a cold boot but
//! always comes up after a warm reboot. The guard spends at most one reboot
//! per failure streak on that, gated by the [`Sentinel`].
//!
//! ## Decision Table
//!
//! ```text
//! device   sentinel   action                         outcome
//! present  any        clear sentinel                 DeviceReady       (exit 0)
//! missing  absent     mark sentinel, reboot          RebootRequested   (no exit)
//! missing  present    log fatal, leave sentinel      RecoveryExhausted (exit 1)
//! ```
//!
//! There is exactly one settle wait and one check per run. Adding a retry
//! loop here would break the one-reboot bound.

use crate::config::{GUARD_LOG_TARGET, SENTINEL_PATH, SETTLE_WAIT, TOUCHSCREEN_DEVICE};
use crate::error::{KioskError, Result};
use crate::process::run_with_timeout;
use crate::sentinel::{Sentinel, SentinelState};
use crate::usb::{UsbDeviceId, UsbProbe};
use std::path::PathBuf;
use std::process::Command;
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};

const REBOOT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct GuardConfig {
    pub device: UsbDeviceId,
    pub sentinel_path: PathBuf,
    pub settle_wait: Duration,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            device: TOUCHSCREEN_DEVICE,
            sentinel_path: PathBuf::from(SENTINEL_PATH),
            settle_wait: SETTLE_WAIT,
        }
    }
}

/// Issues the warm reboot.
pub trait Rebooter {
    fn request_reboot(&self) -> Result<()>;
}

/// Blocks for the settle interval.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// Device enumerated. `cleared_stale_sentinel` is true when a flag from a
    /// previous recovery was removed.
    DeviceReady { cleared_stale_sentinel: bool },
    /// Sentinel written and reboot accepted by the init system.
    RebootRequested,
    /// Device still missing after the one allowed reboot.
    RecoveryExhausted,
}

impl RecoveryOutcome {
    /// Process exit status, or `None` when the machine is going down.
    pub fn exit_code(self) -> Option<i32> {
        match self {
            RecoveryOutcome::DeviceReady { .. } => Some(0),
            RecoveryOutcome::RebootRequested => None,
            RecoveryOutcome::RecoveryExhausted => Some(1),
        }
    }
}

pub struct RecoveryGuard<P, R, S> {
    config: GuardConfig,
    probe: P,
    rebooter: R,
    sleeper: S,
}

impl<P: UsbProbe, R: Rebooter, S: Sleeper> RecoveryGuard<P, R, S> {
    pub fn new(config: GuardConfig, probe: P, rebooter: R, sleeper: S) -> Self {
        Self {
            config,
            probe,
            rebooter,
            sleeper,
        }
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    pub fn run(&self) -> Result<RecoveryOutcome> {
        let sentinel = Sentinel::new(&self.config.sentinel_path);
        let prior = self.prior_state(&sentinel);
        info!(
            target: GUARD_LOG_TARGET,
            device = %self.config.device,
            sentinel = %sentinel.path().display(),
            prior_attempt = prior.is_present(),
            settle_secs = self.config.settle_wait.as_secs_f32(),
            "Waiting for USB bus to settle"
        );

        self.sleeper.sleep(self.config.settle_wait);

        if self.device_present() {
            return Ok(self.on_device_ready(&sentinel));
        }

        match prior {
            SentinelState::Absent => self.attempt_recovery(&sentinel),
            SentinelState::Present => {
                error!(
                    target: GUARD_LOG_TARGET,
                    device = %self.config.device,
                    sentinel = %sentinel.path().display(),
                    "Touchscreen still missing after automatic reboot; recovery already failed once. \
                     Check the USB cable and panel power, then power-cycle the kiosk"
                );
                Ok(RecoveryOutcome::RecoveryExhausted)
            }
        }
    }

    /// An unreadable sentinel counts as present: it blocks the reboot but
    /// still lets a detected device clear it and exit cleanly.
    fn prior_state(&self, sentinel: &Sentinel) -> SentinelState {
        match sentinel.state() {
            Ok(state) => state,
            Err(e) => {
                warn!(
                    target: GUARD_LOG_TARGET,
                    error = %e,
                    sentinel = %sentinel.path().display(),
                    "Sentinel state unreadable; assuming a reboot was already attempted"
                );
                SentinelState::Present
            }
        }
    }

    fn device_present(&self) -> bool {
        match self.probe.is_present(self.config.device) {
            Ok(present) => present,
            Err(e) => {
                warn!(
                    target: GUARD_LOG_TARGET,
                    device = %self.config.device,
                    error = %e,
                    "USB query failed; treating touchscreen as missing"
                );
                false
            }
        }
    }

    fn on_device_ready(&self, sentinel: &Sentinel) -> RecoveryOutcome {
        let cleared_stale_sentinel = match sentinel.clear() {
            Ok(removed) => removed,
            Err(e) => {
                warn!(
                    target: GUARD_LOG_TARGET,
                    error = %e,
                    sentinel = %sentinel.path().display(),
                    "Touchscreen detected but sentinel could not be removed"
                );
                false
            }
        };
        info!(
            target: GUARD_LOG_TARGET,
            device = %self.config.device,
            cleared_stale_sentinel,
            "Touchscreen detected"
        );
        RecoveryOutcome::DeviceReady {
            cleared_stale_sentinel,
        }
    }

    fn attempt_recovery(&self, sentinel: &Sentinel) -> Result<RecoveryOutcome> {
        // No durable flag, no reboot.
        sentinel.mark()?;
        warn!(
            target: GUARD_LOG_TARGET,
            device = %self.config.device,
            sentinel = %sentinel.path().display(),
            "Touchscreen not detected; rebooting once to retry enumeration"
        );
        self.rebooter.request_reboot()?;
        Ok(RecoveryOutcome::RebootRequested)
    }
}

/// Flushes filesystems and asks systemd for a reboot.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemctlRebooter;

impl Rebooter for SystemctlRebooter {
    fn request_reboot(&self) -> Result<()> {
        // SAFETY: sync() takes no arguments and cannot fail.
        #[allow(unsafe_code)]
        unsafe {
            libc::sync()
        };

        let output = run_with_timeout(
            Command::new("systemctl").arg("reboot"),
            REBOOT_COMMAND_TIMEOUT,
        )
        .map_err(|e| KioskError::RebootFailed(e.to_string()))?;
        if !output.success() {
            return Err(KioskError::RebootFailed(format!(
                "systemctl reboot exited with {}: {}",
                output.status,
                output.stderr.trim()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}


#[cfg(test)]
mod tests {
    use super::test_utils::*;
    use super::*;
    use fs_err as fs;
    use tempfile::TempDir;

    fn config(temp: &TempDir) -> GuardConfig {
        GuardConfig {
            sentinel_path: temp.path().join("touchscreen-reboot.flag"),
            settle_wait: Duration::from_secs(10),
            ..GuardConfig::default()
        }
    }

    fn guard(
        temp: &TempDir,
        probe: FakeProbe,
    ) -> RecoveryGuard<FakeProbe, CountingRebooter, RecordingSleeper> {
        RecoveryGuard::new(
            config(temp),
            probe,
            CountingRebooter::default(),
            RecordingSleeper::default(),
        )
    }

    #[test]
    fn default_config_targets_touchscreen() {
        let config = GuardConfig::default();
        assert_eq!(config.device.to_string(), "222a:0001");
        assert_eq!(
            config.sentinel_path,
            PathBuf::from("/var/lib/kiosk/touchscreen-reboot.flag")
        );
    }

    #[test]
    fn sleeps_once_before_single_probe() {
        let temp = TempDir::new().unwrap();
        let guard = guard(&temp, FakeProbe::present(true));

        guard.run().unwrap();

        assert_eq!(*guard.sleeper.slept.borrow(), vec![Duration::from_secs(10)]);
        assert_eq!(guard.probe.queries.get(), 1);
    }

    #[test]
    fn device_present_without_sentinel_exits_zero() {
        let temp = TempDir::new().unwrap();
        let guard = guard(&temp, FakeProbe::present(true));

        let outcome = guard.run().unwrap();

        assert_eq!(
            outcome,
            RecoveryOutcome::DeviceReady {
                cleared_stale_sentinel: false
            }
        );
        assert_eq!(outcome.exit_code(), Some(0));
        assert!(!guard.config().sentinel_path.exists());
        assert_eq!(guard.rebooter.requests.get(), 0);
    }

    #[test]
    fn device_present_clears_stale_sentinel() {
        let temp = TempDir::new().unwrap();
        let guard = guard(&temp, FakeProbe::present(true));
        fs::write(&guard.config().sentinel_path, "").unwrap();

        let outcome = guard.run().unwrap();

        assert_eq!(
            outcome,
            RecoveryOutcome::DeviceReady {
                cleared_stale_sentinel: true
            }
        );
        assert!(!guard.config().sentinel_path.exists());
    }

    #[test]
    fn device_missing_first_time_marks_and_reboots_once() {
        let temp = TempDir::new().unwrap();
        let guard = guard(&temp, FakeProbe::present(false));

        let outcome = guard.run().unwrap();

        assert_eq!(outcome, RecoveryOutcome::RebootRequested);
        assert_eq!(outcome.exit_code(), None);
        assert!(guard.config().sentinel_path.exists());
        assert_eq!(guard.rebooter.requests.get(), 1);
    }

    #[test]
    fn device_missing_after_reboot_is_exhausted() {
        let temp = TempDir::new().unwrap();
        let guard = guard(&temp, FakeProbe::present(false));
        fs::write(&guard.config().sentinel_path, "").unwrap();

        let outcome = guard.run().unwrap();

        assert_eq!(outcome, RecoveryOutcome::RecoveryExhausted);
        assert_eq!(outcome.exit_code(), Some(1));
        assert!(guard.config().sentinel_path.exists());
        assert_eq!(guard.rebooter.requests.get(), 0);
    }

    #[test]
    fn probe_error_counts_as_missing() {
        let temp = TempDir::new().unwrap();
        let guard = guard(&temp, FakeProbe::failing());

        let outcome = guard.run().unwrap();

        assert_eq!(outcome, RecoveryOutcome::RebootRequested);
        assert_eq!(guard.rebooter.requests.get(), 1);
    }

    fn blocked_sentinel_config(temp: &TempDir) -> GuardConfig {
        // Parent "directory" is a regular file, so the sentinel cannot be stat'ed.
        let blocker = temp.path().join("blocker");
        fs::write(&blocker, "").unwrap();
        GuardConfig {
            sentinel_path: blocker.join("flag"),
            ..config(temp)
        }
    }

    #[test]
    fn unreadable_sentinel_with_device_present_exits_zero() {
        let temp = TempDir::new().unwrap();
        let guard = RecoveryGuard::new(
            blocked_sentinel_config(&temp),
            FakeProbe::present(true),
            CountingRebooter::default(),
            RecordingSleeper::default(),
        );

        let outcome = guard.run().unwrap();

        assert!(matches!(outcome, RecoveryOutcome::DeviceReady { .. }));
        assert_eq!(outcome.exit_code(), Some(0));
        assert_eq!(guard.probe.queries.get(), 1);
        assert_eq!(guard.sleeper.slept.borrow().len(), 1);
    }

    #[test]
    fn unreadable_sentinel_with_device_missing_never_reboots() {
        let temp = TempDir::new().unwrap();
        let guard = RecoveryGuard::new(
            blocked_sentinel_config(&temp),
            FakeProbe::present(false),
            CountingRebooter::default(),
            RecordingSleeper::default(),
        );

        assert_eq!(guard.run().unwrap(), RecoveryOutcome::RecoveryExhausted);
        assert_eq!(guard.rebooter.requests.get(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn sentinel_write_failure_never_reboots() {
        let temp = TempDir::new().unwrap();
        // Dangling symlink as the parent: stat says NotFound, mkdir hits EEXIST.
        let dangling = temp.path().join("state");
        std::os::unix::fs::symlink(temp.path().join("missing-target"), &dangling).unwrap();
        let guard = RecoveryGuard::new(
            GuardConfig {
                sentinel_path: dangling.join("flag"),
                ..config(&temp)
            },
            FakeProbe::present(false),
            CountingRebooter::default(),
            RecordingSleeper::default(),
        );

        let err = guard.run().unwrap_err();

        match err {
            KioskError::Io { context, .. } => assert!(
                context.starts_with("Failed to create sentinel"),
                "unexpected context: {context}"
            ),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(guard.rebooter.requests.get(), 0);
    }

    #[test]
    fn failed_reboot_request_is_an_error_but_keeps_sentinel() {
        let temp = TempDir::new().unwrap();
        let guard = RecoveryGuard::new(
            config(&temp),
            FakeProbe::present(false),
            CountingRebooter {
                fail: true,
                ..CountingRebooter::default()
            },
            RecordingSleeper::default(),
        );

        let err = guard.run().unwrap_err();

        assert!(matches!(err, KioskError::RebootFailed(_)));
        assert!(guard.config().sentinel_path.exists());
    }
}
