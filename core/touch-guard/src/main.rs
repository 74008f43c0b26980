//! touch-guard: boot-time touchscreen recovery guard.
//!
//! Run once per boot by systemd after the graphical target. Waits for the USB
//! bus to settle, then checks that the touchscreen controller enumerated.
//! A missing controller gets one warm reboot; a second miss is reported and
//! left for an operator.
//!
//! ## Exit Status
//!
//! - `0`: touchscreen present
//! - `1`: touchscreen still missing after the automatic reboot, or the guard
//!   itself failed
//! - no exit: a reboot was requested and the machine is going down

use clap::Parser;
use kiosk_core::config::GUARD_LOG_TARGET;
use kiosk_core::{
    logging, GuardConfig, RecoveryGuard, SystemUsbProbe, SystemctlRebooter, ThreadSleeper,
};
use std::thread;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "touch-guard")]
#[command(about = "Reboot once if the USB touchscreen failed to enumerate")]
#[command(version)]
struct Cli {}

fn main() {
    let _cli = Cli::parse();
    let logging_guard = logging::init("touch-guard");

    let guard = RecoveryGuard::new(
        GuardConfig::default(),
        SystemUsbProbe::default(),
        SystemctlRebooter,
        ThreadSleeper,
    );

    let code = match guard.run() {
        Ok(outcome) => match outcome.exit_code() {
            Some(code) => code,
            None => {
                drop(logging_guard);
                park_until_shutdown();
            }
        },
        Err(e) => {
            tracing::error!(target: GUARD_LOG_TARGET, error = %e, "touch-guard failed");
            1
        }
    };

    drop(logging_guard);
    std::process::exit(code);
}

/// Waits for systemd to stop us as part of the reboot.
fn park_until_shutdown() -> ! {
    loop {
        thread::sleep(Duration::from_secs(60));
    }
}
