//! Bluetooth Low Energy vocabulary and the radio contract.
//!
//! The controller never talks to a BLE stack directly. It drives a
//! [`Radio`] in **Central** role:
//!
//! 1. **Commands** - `start_scan`, `connect`, `discover_services`, ... are
//!    fire-and-forget requests; they must not block.
//! 2. **Events** - results come back later, out of band, as
//!    [`RadioEvent`]s pulled with [`Radio::next_event`].
//!
//! On target the radio is a pair of Embassy channels to the SoftDevice
//! task ([`channel::ChannelRadio`]); on the host it is
//! [`crate::sim::SimRadio`].

pub mod address;
pub mod adv_parser;
#[cfg(feature = "embedded")]
pub mod channel;
pub mod uuid;

pub use address::{AddrType, BdAddr};
pub use uuid::Uuid128;

use embassy_time::{Duration, Instant};
use heapless::{String, Vec};

/// Advertised local name (truncated to 32 bytes for `heapless::String`).
pub type DeviceName = String<32>;

/// Largest single write payload (default ATT MTU minus the 3-byte header).
pub const MAX_PAYLOAD: usize = 20;

/// Bytes of one characteristic write.
pub type Payload = Vec<u8, MAX_PAYLOAD>;

/// Connection handle assigned by the stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnHandle(pub u16);

/// Inclusive attribute handle range of a service.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HandleRange {
    pub start: u16,
    pub end: u16,
}

impl HandleRange {
    /// Every handle a GATT server can expose.
    pub const ALL: HandleRange = HandleRange {
        start: 0x0001,
        end: 0xFFFF,
    };

    pub const fn contains(&self, handle: u16) -> bool {
        handle >= self.start && handle <= self.end
    }
}

/// GATT write flavour.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WriteMode {
    /// Write Command: no acknowledgment, no [`RadioEvent::WriteComplete`].
    WithoutResponse,
    /// Write Request: exactly one [`RadioEvent::WriteComplete`] follows.
    WithResponse,
}

/// Scan timing handed to [`Radio::start_scan`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ScanParams {
    /// The radio reports [`RadioEvent::ScanComplete`] once this elapses.
    pub duration: Duration,
    pub interval: Duration,
    pub window: Duration,
    /// Request scan responses from advertisers.
    pub active: bool,
}

impl ScanParams {
    /// Scan interval in 0.625 ms controller units.
    pub fn interval_units(&self) -> u32 {
        units_625us(self.interval)
    }

    /// Scan window in 0.625 ms controller units.
    pub fn window_units(&self) -> u32 {
        units_625us(self.window)
    }

    /// Scan timeout in 10 ms controller units. Saturates at `u16::MAX`
    /// (about 655 s).
    pub fn timeout_units(&self) -> u16 {
        u16::try_from(self.duration.as_millis() / 10).unwrap_or(u16::MAX)
    }
}

fn units_625us(d: Duration) -> u32 {
    u32::try_from(d.as_micros() / 625).unwrap_or(u32::MAX)
}

/// Something the radio reports, out of band.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RadioEvent {
    /// One advertisement was received.
    ScanResult {
        addr_type: AddrType,
        addr: BdAddr,
        rssi: i8,
        name: Option<DeviceName>,
    },
    /// Scanning stopped, by timeout or on request.
    ScanComplete,
    /// A link is up.
    Connected {
        conn: ConnHandle,
        addr_type: AddrType,
        addr: BdAddr,
    },
    /// The link is gone. `reason` is the HCI disconnect reason.
    Disconnected { conn: ConnHandle, reason: u8 },
    /// Primary service discovery produced one service.
    ServiceFound {
        conn: ConnHandle,
        uuid: Uuid128,
        range: HandleRange,
    },
    /// Characteristic discovery produced one characteristic.
    CharacteristicFound {
        conn: ConnHandle,
        uuid: Uuid128,
        decl_handle: u16,
        value_handle: u16,
        properties: u8,
    },
    /// A write request finished. `status` 0 means success.
    WriteComplete {
        conn: ConnHandle,
        value_handle: u16,
        status: u16,
    },
}

/// A request to the radio. Mirrors the [`Radio`] command methods so it
/// can travel over a channel or be recorded.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RadioCommand {
    StartScan(ScanParams),
    StopScan,
    Connect { addr_type: AddrType, addr: BdAddr },
    Disconnect(ConnHandle),
    DiscoverServices(ConnHandle),
    DiscoverCharacteristics { conn: ConnHandle, range: HandleRange },
    Write {
        conn: ConnHandle,
        value_handle: u16,
        payload: Payload,
        mode: WriteMode,
    },
}

/// The BLE stack as the controller sees it.
///
/// Command methods queue work and return at once. Their outcome arrives
/// later through [`Radio::next_event`], possibly never: callers bound
/// every wait with their own deadline.
#[allow(async_fn_in_trait)]
pub trait Radio {
    /// Queue one command. Must not block.
    fn submit(&mut self, command: RadioCommand);

    /// Wait for the next event, giving up at `deadline`.
    ///
    /// Returns `None` once `deadline` has passed with nothing delivered.
    async fn next_event(&mut self, deadline: Instant) -> Option<RadioEvent>;

    fn start_scan(&mut self, params: ScanParams) {
        self.submit(RadioCommand::StartScan(params));
    }

    fn stop_scan(&mut self) {
        self.submit(RadioCommand::StopScan);
    }

    fn connect(&mut self, addr_type: AddrType, addr: BdAddr) {
        self.submit(RadioCommand::Connect { addr_type, addr });
    }

    fn disconnect(&mut self, conn: ConnHandle) {
        self.submit(RadioCommand::Disconnect(conn));
    }

    fn discover_services(&mut self, conn: ConnHandle) {
        self.submit(RadioCommand::DiscoverServices(conn));
    }

    fn discover_characteristics(&mut self, conn: ConnHandle, range: HandleRange) {
        self.submit(RadioCommand::DiscoverCharacteristics { conn, range });
    }

    /// Payloads longer than [`MAX_PAYLOAD`] are truncated.
    fn write_characteristic(
        &mut self,
        conn: ConnHandle,
        value_handle: u16,
        payload: &[u8],
        mode: WriteMode,
    ) {
        let len = payload.len().min(MAX_PAYLOAD);
        let mut bytes = Payload::new();
        // Cannot fail: `len` is within capacity.
        let _ = bytes.extend_from_slice(&payload[..len]);
        self.submit(RadioCommand::Write {
            conn,
            value_handle,
            payload: bytes,
            mode,
        });
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn params(duration: Duration, interval_ms: u64) -> ScanParams {
        ScanParams {
            duration,
            interval: Duration::from_millis(interval_ms),
            window: Duration::from_millis(interval_ms),
            active: false,
        }
    }

    #[test]
    fn default_scan_in_controller_units() {
        let p = params(Duration::from_secs(5), 30);
        assert_eq!(p.interval_units(), 48);
        assert_eq!(p.window_units(), 48);
        assert_eq!(p.timeout_units(), 500);
    }

    #[test]
    fn long_scan_timeout_saturates() {
        assert_eq!(params(Duration::from_secs(655), 30).timeout_units(), 65_500);
        assert_eq!(params(Duration::from_secs(656), 30).timeout_units(), u16::MAX);
        assert_eq!(params(Duration::from_secs(86_400), 30).timeout_units(), u16::MAX);
    }

    #[test]
    fn huge_interval_saturates() {
        // 40 days, far past what the controller can encode.
        let p = params(Duration::from_secs(5), 3_456_000_000);
        assert_eq!(p.interval_units(), u32::MAX);
    }
}
