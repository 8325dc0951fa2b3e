//! Simulated radio, clock and indicator for host runs and tests.
//!
//! [`SimRadio`] answers commands the way a cooperative BLE stack would,
//! with events stamped [`SimRadio::latency`] after the command. Time only
//! moves when the driver waits: [`SimRadio::next_event`] jumps the
//! [`SimClock`] straight to the next due event or to the deadline.

use core::cell::Cell;

use embassy_time::{Duration, Instant};
use heapless::Vec;

use crate::ble::{
    AddrType, BdAddr, ConnHandle, DeviceName, HandleRange, Radio, RadioCommand, RadioEvent,
    Uuid128, WriteMode,
};
use crate::config::{NUS_RX_CHAR_UUID, NUS_SERVICE_UUID};
use crate::indicator::Indicator;
use crate::time::Clock;

/// Pending events the simulation can hold.
pub const MAX_PENDING: usize = 32;

/// Commands kept in the log. Later ones are dropped.
pub const MAX_LOGGED: usize = 64;

/// HCI reason: connection terminated by local host.
const REASON_LOCAL_TERMINATED: u8 = 0x16;
/// HCI reason: connection timeout (supervision timeout).
const REASON_SUPERVISION_TIMEOUT: u8 = 0x08;

/// Manually advanced millisecond clock.
#[derive(Debug, Default)]
pub struct SimClock {
    now_ms: Cell<u64>,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move forward to `at`. Never moves backwards.
    pub fn advance_to(&self, at: Instant) {
        if at.as_millis() > self.now_ms.get() {
            self.now_ms.set(at.as_millis());
        }
    }
}

impl Clock for SimClock {
    fn now(&self) -> Instant {
        Instant::from_millis(self.now_ms.get())
    }
}

/// Records the indicator line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SimIndicator {
    pub on: bool,
    pub toggles: u32,
}

impl Indicator for SimIndicator {
    fn set(&mut self, on: bool) {
        self.on = on;
    }

    fn toggle(&mut self) {
        self.on = !self.on;
        self.toggles += 1;
    }
}

/// One characteristic exposed by a simulated peripheral.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SimCharacteristic {
    pub uuid: Uuid128,
    pub decl_handle: u16,
    pub value_handle: u16,
    pub properties: u8,
}

/// The peripheral the controller hunts for, and how it behaves.
#[derive(Clone, Debug, PartialEq)]
pub struct SimPeripheral {
    pub addr_type: AddrType,
    pub addr: BdAddr,
    pub name: Option<DeviceName>,
    /// First scan cycle (1-based) in which it advertises.
    pub visible_from_scan: u32,
    /// First connect attempt (1-based) it accepts; earlier ones go silent.
    pub accepts_from_attempt: u32,
    pub services: Vec<(Uuid128, HandleRange), 4>,
    pub characteristics: Vec<SimCharacteristic, 8>,
    /// Drop the link this long after connecting.
    pub link_drop_after: Option<Duration>,
    /// Never confirm a disconnect request.
    pub ignores_disconnect: bool,
    /// ATT status returned for confirmed writes.
    pub write_status: u16,
}

impl SimPeripheral {
    /// A peripheral exposing the Nordic UART Service.
    pub fn nus(addr: BdAddr) -> Self {
        let mut services = Vec::new();
        let _ = services.push((
            NUS_SERVICE_UUID,
            HandleRange {
                start: 0x000A,
                end: 0x000F,
            },
        ));
        let mut characteristics = Vec::new();
        // RX: write | write without response.
        let _ = characteristics.push(SimCharacteristic {
            uuid: NUS_RX_CHAR_UUID,
            decl_handle: 0x000B,
            value_handle: 0x000C,
            properties: 0x0C,
        });
        // TX: notify.
        let _ = characteristics.push(SimCharacteristic {
            uuid: Uuid128::from_u128(0x6E400003_B5A3_F393_E0A9_E50E24DCCA9E),
            decl_handle: 0x000D,
            value_handle: 0x000E,
            properties: 0x10,
        });
        Self {
            addr_type: AddrType::Public,
            addr,
            name: None,
            visible_from_scan: 1,
            accepts_from_attempt: 1,
            services,
            characteristics,
            link_drop_after: None,
            ignores_disconnect: false,
            write_status: 0,
        }
    }

    pub fn visible_from_scan(mut self, scan: u32) -> Self {
        self.visible_from_scan = scan;
        self
    }

    pub fn accepts_from_attempt(mut self, attempt: u32) -> Self {
        self.accepts_from_attempt = attempt;
        self
    }

    pub fn without_services(mut self) -> Self {
        self.services.clear();
        self
    }

    pub fn without_characteristics(mut self) -> Self {
        self.characteristics.clear();
        self
    }

    pub fn drops_link_after(mut self, after: Duration) -> Self {
        self.link_drop_after = Some(after);
        self
    }

    pub fn ignores_disconnect(mut self) -> Self {
        self.ignores_disconnect = true;
        self
    }

    pub fn write_status(mut self, status: u16) -> Self {
        self.write_status = status;
        self
    }
}

/// Scripted radio. See the module docs.
pub struct SimRadio<'a> {
    clock: &'a SimClock,
    /// Delay between a command and the events it causes.
    pub latency: Duration,
    advertisers: Vec<(AddrType, BdAddr), 4>,
    target: Option<SimPeripheral>,
    pending: Vec<(Instant, RadioEvent), MAX_PENDING>,
    log: Vec<(Instant, RadioCommand), MAX_LOGGED>,
    scans_started: u32,
    silent_scans: u32,
    connect_attempts: u32,
    scanning: bool,
    link: Option<ConnHandle>,
    next_handle: u16,
}

impl<'a> SimRadio<'a> {
    pub fn new(clock: &'a SimClock) -> Self {
        Self {
            clock,
            latency: Duration::from_millis(10),
            advertisers: Vec::new(),
            target: None,
            pending: Vec::new(),
            log: Vec::new(),
            scans_started: 0,
            silent_scans: 0,
            connect_attempts: 0,
            scanning: false,
            link: None,
            next_handle: 0,
        }
    }

    /// Add a bystander that shows up in every scan. At most four are kept.
    pub fn with_advertiser(mut self, addr: BdAddr) -> Self {
        let _ = self.advertisers.push((AddrType::RandomStatic, addr));
        self
    }

    pub fn with_target(mut self, target: SimPeripheral) -> Self {
        self.target = Some(target);
        self
    }

    /// The first `scans` scans hear nothing and never report completion.
    /// Only `StopScan` ends them.
    pub fn with_silent_scans(mut self, scans: u32) -> Self {
        self.silent_scans = scans;
        self
    }

    /// Every command received, stamped with the time it arrived.
    pub fn commands(&self) -> &[(Instant, RadioCommand)] {
        &self.log
    }

    pub fn scans_started(&self) -> u32 {
        self.scans_started
    }

    pub fn connect_attempts(&self) -> u32 {
        self.connect_attempts
    }

    fn schedule(&mut self, at: Instant, event: RadioEvent) {
        let index = self
            .pending
            .iter()
            .position(|(due, _)| *due > at)
            .unwrap_or(self.pending.len());
        if self.pending.insert(index, (at, event)).is_err() {
            warn!("simulated event queue full; event dropped");
        }
    }

    fn soon(&self) -> Instant {
        self.clock.now() + self.latency
    }

    fn on_start_scan(&mut self, duration: Duration) {
        self.scans_started += 1;
        self.scanning = true;
        if self.scans_started <= self.silent_scans {
            return;
        }
        let now = self.clock.now();

        let advertisers = self.advertisers.clone();
        for (addr_type, addr) in advertisers {
            self.schedule(
                now + self.latency,
                RadioEvent::ScanResult {
                    addr_type,
                    addr,
                    rssi: -70,
                    name: None,
                },
            );
        }
        if let Some(target) = &self.target {
            if self.scans_started >= target.visible_from_scan {
                let event = RadioEvent::ScanResult {
                    addr_type: target.addr_type,
                    addr: target.addr,
                    rssi: -55,
                    name: target.name.clone(),
                };
                self.schedule(now + self.latency + self.latency, event);
            }
        }
        self.schedule(now + duration, RadioEvent::ScanComplete);
    }

    fn on_stop_scan(&mut self) {
        if !self.scanning {
            return;
        }
        self.pending.retain(|(_, e)| {
            !matches!(e, RadioEvent::ScanResult { .. } | RadioEvent::ScanComplete)
        });
        let now = self.clock.now();
        self.schedule(now, RadioEvent::ScanComplete);
    }

    fn on_connect(&mut self, addr: BdAddr) {
        self.connect_attempts += 1;
        let Some(target) = &self.target else {
            return;
        };
        if target.addr != addr
            || self.connect_attempts < target.accepts_from_attempt
            || self.link.is_some()
        {
            return;
        }
        let (addr_type, drop_after) = (target.addr_type, target.link_drop_after);

        let conn = ConnHandle(self.next_handle);
        self.next_handle += 1;
        self.link = Some(conn);

        let at = self.soon();
        self.schedule(
            at,
            RadioEvent::Connected {
                conn,
                addr_type,
                addr,
            },
        );
        if let Some(after) = drop_after {
            self.schedule(
                at + after,
                RadioEvent::Disconnected {
                    conn,
                    reason: REASON_SUPERVISION_TIMEOUT,
                },
            );
        }
    }

    fn on_disconnect(&mut self, conn: ConnHandle) {
        if self.link != Some(conn) {
            return;
        }
        if self.target.as_ref().is_some_and(|t| t.ignores_disconnect) {
            return;
        }
        self.link = None;
        self.pending
            .retain(|(_, e)| !matches!(e, RadioEvent::Disconnected { .. }));
        let at = self.soon();
        self.schedule(
            at,
            RadioEvent::Disconnected {
                conn,
                reason: REASON_LOCAL_TERMINATED,
            },
        );
    }

    fn on_discover_services(&mut self, conn: ConnHandle) {
        if self.link != Some(conn) {
            return;
        }
        let Some(target) = &self.target else {
            return;
        };
        let services = target.services.clone();
        let at = self.soon();
        for (uuid, range) in services {
            self.schedule(at, RadioEvent::ServiceFound { conn, uuid, range });
        }
    }

    fn on_discover_characteristics(&mut self, conn: ConnHandle, range: HandleRange) {
        if self.link != Some(conn) {
            return;
        }
        let Some(target) = &self.target else {
            return;
        };
        let characteristics = target.characteristics.clone();
        let at = self.soon();
        for c in characteristics.iter().filter(|c| range.contains(c.decl_handle)) {
            self.schedule(
                at,
                RadioEvent::CharacteristicFound {
                    conn,
                    uuid: c.uuid,
                    decl_handle: c.decl_handle,
                    value_handle: c.value_handle,
                    properties: c.properties,
                },
            );
        }
    }

    fn on_write(&mut self, conn: ConnHandle, value_handle: u16, mode: WriteMode) {
        if self.link != Some(conn) || mode == WriteMode::WithoutResponse {
            return;
        }
        let status = self.target.as_ref().map_or(0, |t| t.write_status);
        let at = self.soon();
        self.schedule(
            at,
            RadioEvent::WriteComplete {
                conn,
                value_handle,
                status,
            },
        );
    }
}

impl Radio for SimRadio<'_> {
    fn submit(&mut self, command: RadioCommand) {
        let _ = self.log.push((self.clock.now(), command.clone()));
        match command {
            RadioCommand::StartScan(params) => self.on_start_scan(params.duration),
            RadioCommand::StopScan => self.on_stop_scan(),
            RadioCommand::Connect { addr, .. } => self.on_connect(addr),
            RadioCommand::Disconnect(conn) => self.on_disconnect(conn),
            RadioCommand::DiscoverServices(conn) => self.on_discover_services(conn),
            RadioCommand::DiscoverCharacteristics { conn, range } => {
                self.on_discover_characteristics(conn, range)
            }
            RadioCommand::Write {
                conn,
                value_handle,
                mode,
                ..
            } => self.on_write(conn, value_handle, mode),
        }
    }

    async fn next_event(&mut self, deadline: Instant) -> Option<RadioEvent> {
        let due = matches!(self.pending.first(), Some((at, _)) if *at <= deadline);
        if !due {
            self.clock.advance_to(deadline);
            return None;
        }
        let (at, event) = self.pending.remove(0);
        self.clock.advance_to(at);
        match event {
            RadioEvent::ScanComplete => self.scanning = false,
            RadioEvent::Disconnected { conn, .. } if self.link == Some(conn) => self.link = None,
            _ => {}
        }
        Some(event)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, TARGET_ADDRESS};
    use embassy_futures::block_on;

    #[test]
    fn clock_never_moves_back() {
        let clock = SimClock::new();
        clock.advance_to(Instant::from_secs(2));
        clock.advance_to(Instant::from_millis(500));
        assert_eq!(clock.now(), Instant::from_millis(2_000));
    }

    #[test]
    fn empty_air_only_advances_time() {
        let clock = SimClock::new();
        let mut radio = SimRadio::new(&clock);
        let deadline = Instant::from_secs(3);
        assert_eq!(block_on(radio.next_event(deadline)), None);
        assert_eq!(clock.now(), deadline);
    }

    #[test]
    fn scan_reports_then_completes() {
        let clock = SimClock::new();
        let mut radio = SimRadio::new(&clock).with_target(SimPeripheral::nus(TARGET_ADDRESS));
        radio.start_scan(Config::DEFAULT.scan);

        let far = Instant::from_secs(60);
        assert!(matches!(
            block_on(radio.next_event(far)),
            Some(RadioEvent::ScanResult { addr, .. }) if addr == TARGET_ADDRESS
        ));
        assert_eq!(block_on(radio.next_event(far)), Some(RadioEvent::ScanComplete));
        assert_eq!(clock.now(), Instant::from_secs(5));
    }

    #[test]
    fn stop_scan_completes_now() {
        let clock = SimClock::new();
        let mut radio = SimRadio::new(&clock).with_target(SimPeripheral::nus(TARGET_ADDRESS));
        radio.start_scan(Config::DEFAULT.scan);
        radio.stop_scan();

        let far = Instant::from_secs(60);
        assert_eq!(block_on(radio.next_event(far)), Some(RadioEvent::ScanComplete));
        assert_eq!(block_on(radio.next_event(Instant::from_secs(1))), None);
    }

    #[test]
    fn events_wait_for_their_time() {
        let clock = SimClock::new();
        let mut radio = SimRadio::new(&clock).with_target(SimPeripheral::nus(TARGET_ADDRESS));
        radio.latency = Duration::from_millis(40);
        radio.connect(AddrType::Public, TARGET_ADDRESS);
        assert_eq!(block_on(radio.next_event(Instant::from_millis(25))), None);
        assert!(matches!(
            block_on(radio.next_event(Instant::from_secs(1))),
            Some(RadioEvent::Connected { .. })
        ));
        assert_eq!(clock.now(), Instant::from_millis(40));
    }

    #[test]
    fn connect_to_unknown_address_is_silent() {
        let clock = SimClock::new();
        let mut radio = SimRadio::new(&clock).with_target(SimPeripheral::nus(TARGET_ADDRESS));
        radio.connect(AddrType::Public, BdAddr::new([0; 6]));
        assert_eq!(block_on(radio.next_event(Instant::from_secs(30))), None);
        assert_eq!(radio.connect_attempts(), 1);
    }

    #[test]
    fn silent_scan_ends_only_on_stop() {
        let clock = SimClock::new();
        let mut radio = SimRadio::new(&clock)
            .with_target(SimPeripheral::nus(TARGET_ADDRESS))
            .with_silent_scans(1);
        radio.start_scan(Config::DEFAULT.scan);
        assert_eq!(block_on(radio.next_event(Instant::from_secs(60))), None);

        radio.stop_scan();
        assert_eq!(
            block_on(radio.next_event(Instant::from_secs(61))),
            Some(RadioEvent::ScanComplete)
        );

        radio.start_scan(Config::DEFAULT.scan);
        assert!(matches!(
            block_on(radio.next_event(Instant::from_secs(120))),
            Some(RadioEvent::ScanResult { addr, .. }) if addr == TARGET_ADDRESS
        ));
        assert_eq!(radio.scans_started(), 2);
    }
}
