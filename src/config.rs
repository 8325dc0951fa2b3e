//! Application-wide constants and compile-time configuration.
//!
//! The target identity, timing budgets and command sequence live here so
//! they can be tuned in one place. [`Config::DEFAULT`] bundles them for the
//! controller.

use embassy_time::Duration;

use crate::ble::{BdAddr, ScanParams, Uuid128, WriteMode};
use crate::controller::{CommandSequence, TargetDevice};

// Target

/// Address of the peripheral to drive (`f4:12:fa:6e:cf:59`).
pub const TARGET_ADDRESS: BdAddr = BdAddr::new([0xf4, 0x12, 0xfa, 0x6e, 0xcf, 0x59]);

/// Nordic UART Service.
pub const NUS_SERVICE_UUID: Uuid128 = Uuid128::from_u128(0x6E400001_B5A3_F393_E0A9_E50E24DCCA9E);

/// NUS RX characteristic - the peripheral receives what we write here.
pub const NUS_RX_CHAR_UUID: Uuid128 = Uuid128::from_u128(0x6E400002_B5A3_F393_E0A9_E50E24DCCA9E);

/// Op-codes sent once per session, in order.
pub const COMMAND_SEQUENCE: &[u8] = &[1, 2, 8];

// Scanning

/// Duration of one scan window (seconds).
pub const SCAN_DURATION_SECS: u64 = 5;

/// Pause before rescanning when the target was not seen (seconds).
pub const SCAN_RETRY_PAUSE_SECS: u64 = 3;

/// Extra time allowed for the radio to report the end of a scan.
pub const SCAN_COMPLETE_GRACE_MS: u64 = 1_000;

/// Scan interval and window (ms). Equal values mean continuous scanning.
pub const SCAN_INTERVAL_MS: u64 = 30;
pub const SCAN_WINDOW_MS: u64 = 30;

/// Passive scanning - the address is all we need.
pub const SCAN_ACTIVE: bool = false;

// Timeouts

/// Budget for the connected event after a connect request (seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Budget for each discovery phase (seconds).
pub const DISCOVERY_TIMEOUT_SECS: u64 = 10;

/// Budget for the disconnected event at teardown (seconds).
pub const DISCONNECT_TIMEOUT_SECS: u64 = 5;

/// Settle time after each command (seconds).
pub const INTER_COMMAND_DELAY_SECS: u64 = 2;

/// Settle time between discovery and the first command (seconds).
pub const STABILIZE_DELAY_SECS: u64 = 2;

// Indicator

/// Toggle period of the activity LED while waiting (ms).
pub const BLINK_PERIOD_MS: u64 = 200;

// Link layer (used by the SoftDevice radio task)

/// BLE connection interval range (in 1.25 ms units). 24..40 = 30..50 ms.
pub const BLE_CONN_INTERVAL_MIN: u16 = 24;
pub const BLE_CONN_INTERVAL_MAX: u16 = 40;

/// BLE slave latency (number of connection events the peripheral can skip).
pub const BLE_SLAVE_LATENCY: u16 = 0;

/// BLE supervision timeout (in 10 ms units). 400 = 4 s.
pub const BLE_SUP_TIMEOUT: u16 = 400;

/// How often the radio task checks a live link for loss (ms).
pub const LINK_POLL_MS: u64 = 100;

// GPIO pin assignments (nRF52840 Dongle defaults)
//
//   Status LED     → P0.06
//
// Actual `embassy_nrf::peripherals::*` types are selected in `main.rs`.

/// Wait budgets of the sequencing driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timing {
    pub scan_retry_pause: Duration,
    pub scan_complete_grace: Duration,
    pub connect_timeout: Duration,
    pub discovery_timeout: Duration,
    pub stabilize_delay: Duration,
    pub inter_command_delay: Duration,
    pub disconnect_timeout: Duration,
    pub blink_period: Duration,
}

impl Timing {
    pub const DEFAULT: Timing = Timing {
        scan_retry_pause: Duration::from_secs(SCAN_RETRY_PAUSE_SECS),
        scan_complete_grace: Duration::from_millis(SCAN_COMPLETE_GRACE_MS),
        connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
        discovery_timeout: Duration::from_secs(DISCOVERY_TIMEOUT_SECS),
        stabilize_delay: Duration::from_secs(STABILIZE_DELAY_SECS),
        inter_command_delay: Duration::from_secs(INTER_COMMAND_DELAY_SECS),
        disconnect_timeout: Duration::from_secs(DISCONNECT_TIMEOUT_SECS),
        blink_period: Duration::from_millis(BLINK_PERIOD_MS),
    };
}

/// Everything the controller needs to know about one run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    pub target: TargetDevice,
    pub scan: ScanParams,
    pub timing: Timing,
    pub commands: CommandSequence,
    pub write_mode: WriteMode,
}

impl Config {
    pub const DEFAULT: Config = Config {
        target: TargetDevice {
            address: TARGET_ADDRESS,
            service: NUS_SERVICE_UUID,
            characteristic: NUS_RX_CHAR_UUID,
        },
        scan: ScanParams {
            duration: Duration::from_secs(SCAN_DURATION_SECS),
            interval: Duration::from_millis(SCAN_INTERVAL_MS),
            window: Duration::from_millis(SCAN_WINDOW_MS),
            active: SCAN_ACTIVE,
        },
        timing: Timing::DEFAULT,
        commands: CommandSequence::new(COMMAND_SEQUENCE),
        write_mode: WriteMode::WithoutResponse,
    };
}

impl Default for Config {
    fn default() -> Self {
        Self::DEFAULT
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = Config::default();
        assert_eq!(cfg.scan.duration, Duration::from_secs(5));
        assert_eq!(cfg.timing.scan_retry_pause, Duration::from_secs(3));
        assert_eq!(cfg.timing.connect_timeout, Duration::from_secs(10));
        assert_eq!(cfg.timing.discovery_timeout, Duration::from_secs(10));
        assert_eq!(cfg.timing.inter_command_delay, Duration::from_secs(2));
        assert_eq!(cfg.timing.stabilize_delay, Duration::from_secs(2));
        assert_eq!(cfg.timing.disconnect_timeout, Duration::from_secs(5));
        assert_eq!(cfg.commands.op_codes(), &[1, 2, 8]);
        assert_eq!(cfg.write_mode, WriteMode::WithoutResponse);
        assert!(!cfg.scan.active);
    }

    #[test]
    fn target_is_the_nus_rx_characteristic() {
        let target = Config::DEFAULT.target;
        assert_eq!(target.address.to_string(), "f4:12:fa:6e:cf:59");
        assert_eq!(target.service, NUS_SERVICE_UUID);
        assert_eq!(target.characteristic, NUS_RX_CHAR_UUID);
    }
}
