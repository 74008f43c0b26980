//! Boot-cycle scenarios for the touchscreen recovery guard, run against a
//! real sentinel file in a temp directory.

use kiosk_core::{
    GuardConfig, Rebooter, RecoveryGuard, RecoveryOutcome, Result, Sleeper, UsbDeviceId, UsbProbe,
};
use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;
use tempfile::TempDir;

struct Bus {
    enumerated: Vec<UsbDeviceId>,
}

impl UsbProbe for Bus {
    fn is_present(&self, id: UsbDeviceId) -> Result<bool> {
        Ok(self.enumerated.contains(&id))
    }
}

#[derive(Clone, Default)]
struct RebootLog(Rc<Cell<usize>>);

impl Rebooter for RebootLog {
    fn request_reboot(&self) -> Result<()> {
        self.0.set(self.0.get() + 1);
        Ok(())
    }
}

struct NoWait;

impl Sleeper for NoWait {
    fn sleep(&self, _duration: Duration) {}
}

fn touchscreen() -> UsbDeviceId {
    "222a:0001".parse().unwrap()
}

fn sentinel_path(temp: &TempDir) -> PathBuf {
    temp.path().join("var/lib/kiosk/touchscreen-reboot.flag")
}

fn boot(sentinel: &Path, touchscreen_present: bool, reboots: &RebootLog) -> RecoveryOutcome {
    let mut enumerated = vec![UsbDeviceId::new(0x1d6b, 0x0002)];
    if touchscreen_present {
        enumerated.push(touchscreen());
    }
    let config = GuardConfig {
        device: touchscreen(),
        sentinel_path: sentinel.to_path_buf(),
        settle_wait: Duration::ZERO,
    };
    RecoveryGuard::new(config, Bus { enumerated }, reboots.clone(), NoWait)
        .run()
        .expect("guard run")
}

fn mark(path: &Path) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, "").unwrap();
}

#[test]
fn absent_device_without_sentinel_creates_sentinel_and_reboots() {
    let temp = TempDir::new().unwrap();
    let sentinel = sentinel_path(&temp);
    let reboots = RebootLog::default();

    let outcome = boot(&sentinel, false, &reboots);

    assert_eq!(outcome, RecoveryOutcome::RebootRequested);
    assert!(sentinel.exists());
    assert_eq!(reboots.0.get(), 1);
}

#[test]
fn absent_device_with_sentinel_exits_one_without_reboot() {
    let temp = TempDir::new().unwrap();
    let sentinel = sentinel_path(&temp);
    mark(&sentinel);
    let reboots = RebootLog::default();

    let outcome = boot(&sentinel, false, &reboots);

    assert_eq!(outcome.exit_code(), Some(1));
    assert!(sentinel.exists());
    assert_eq!(reboots.0.get(), 0);
}

#[test]
fn present_device_removes_stale_sentinel() {
    let temp = TempDir::new().unwrap();
    let sentinel = sentinel_path(&temp);
    mark(&sentinel);
    let reboots = RebootLog::default();

    let outcome = boot(&sentinel, true, &reboots);

    assert_eq!(outcome.exit_code(), Some(0));
    assert!(!sentinel.exists());
    assert_eq!(reboots.0.get(), 0);
}

#[test]
fn repeated_successful_boots_never_create_sentinel() {
    let temp = TempDir::new().unwrap();
    let sentinel = sentinel_path(&temp);
    let reboots = RebootLog::default();

    for _ in 0..2 {
        assert_eq!(boot(&sentinel, true, &reboots).exit_code(), Some(0));
        assert!(!sentinel.exists());
    }
    assert_eq!(reboots.0.get(), 0);
}

#[test]
fn warm_reboot_that_fixes_enumeration_resets_for_next_power_cycle() {
    let temp = TempDir::new().unwrap();
    let sentinel = sentinel_path(&temp);
    let reboots = RebootLog::default();

    // Cold boot: controller missed enumeration.
    assert_eq!(
        boot(&sentinel, false, &reboots),
        RecoveryOutcome::RebootRequested
    );
    // Warm boot: controller comes up.
    assert_eq!(
        boot(&sentinel, true, &reboots),
        RecoveryOutcome::DeviceReady {
            cleared_stale_sentinel: true
        }
    );
    // Next cold boot fails again: one more reboot is allowed.
    assert_eq!(
        boot(&sentinel, false, &reboots),
        RecoveryOutcome::RebootRequested
    );
    assert_eq!(reboots.0.get(), 2);
}

#[test]
fn persistent_failure_reboots_exactly_once() {
    let temp = TempDir::new().unwrap();
    let sentinel = sentinel_path(&temp);
    let reboots = RebootLog::default();

    let outcomes: Vec<RecoveryOutcome> = (0..4).map(|_| boot(&sentinel, false, &reboots)).collect();

    assert_eq!(outcomes[0], RecoveryOutcome::RebootRequested);
    assert!(outcomes[1..]
        .iter()
        .all(|o| *o == RecoveryOutcome::RecoveryExhausted));
    assert_eq!(reboots.0.get(), 1);
    assert!(sentinel.exists());
}
