//! Radio event handler.
//!
//! [`Controller::handle_event`] runs for every event the radio delivers,
//! one at a time and in arrival order. It only updates the session and
//! queues radio commands; anything that has to wait belongs to the
//! sequencer.

use crate::ble::{
    AddrType, BdAddr, ConnHandle, HandleRange, Radio, RadioEvent, ScanParams, WriteMode,
};
use crate::controller::{ConnectionSession, State, TargetDevice};
use crate::error::Error;

/// Connection controller: owns the [`ConnectionSession`] and the
/// [`State`] of the run.
///
/// Never waits. Every call either updates state or queues radio commands
/// and returns.
pub struct Controller {
    target: TargetDevice,
    session: ConnectionSession,
    state: State,
}

impl Controller {
    pub fn new(target: TargetDevice) -> Self {
        Self {
            target,
            session: ConnectionSession::new(),
            state: State::Idle,
        }
    }

    pub fn target(&self) -> &TargetDevice {
        &self.target
    }

    pub fn session(&self) -> &ConnectionSession {
        &self.session
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Start a fresh scan cycle.
    ///
    /// A new session replaces the old one; scanning while connected is
    /// refused.
    pub fn begin_scan<R: Radio>(&mut self, radio: &mut R, params: ScanParams) {
        if self.session.is_connected() {
            warn!("scan requested while connected; ignored");
            return;
        }
        self.session = ConnectionSession::new();
        self.state = State::Scanning;
        radio.start_scan(params);
    }

    /// Stop a scan whose completion never arrived.
    pub fn cancel_scan<R: Radio>(&mut self, radio: &mut R) {
        if self.state == State::Scanning {
            radio.stop_scan();
        }
    }

    /// Give up on a connect request that never completed.
    pub fn abandon_connect(&mut self) {
        self.session.set_target_found(false);
        if self.state == State::ConnectRequested {
            self.state = State::Idle;
        }
    }

    /// Look for the writable characteristic inside the discovered service.
    pub fn start_characteristic_discovery<R: Radio>(&mut self, radio: &mut R) -> Result<(), Error> {
        let conn = self.session.connection().ok_or(Error::NotConnected)?;
        let range = self.session.service_range().unwrap_or(HandleRange::ALL);
        info!(
            "discovering characteristics in {=u16:#06x}..={=u16:#06x}",
            range.start,
            range.end
        );
        self.state = State::CharacteristicDiscovery;
        radio.discover_characteristics(conn, range);
        Ok(())
    }

    /// Write one op-code to the RX characteristic.
    pub fn send_command<R: Radio>(
        &mut self,
        radio: &mut R,
        op_code: u8,
        mode: WriteMode,
    ) -> Result<(), Error> {
        let Some(conn) = self.session.connection() else {
            warn!("cannot send {=u8}: not connected", op_code);
            return Err(Error::NotConnected);
        };
        let Some(handle) = self.session.write_handle() else {
            warn!("cannot send {=u8}: RX characteristic unknown", op_code);
            return Err(Error::WriteHandleUnknown);
        };
        info!("sending command {=u8} ({})", op_code, mode);
        radio.write_characteristic(conn, handle, &[op_code], mode);
        Ok(())
    }

    /// Ask the radio to drop the link. Returns `false` if there is none.
    pub fn request_disconnect<R: Radio>(&mut self, radio: &mut R) -> bool {
        let Some(conn) = self.session.connection() else {
            return false;
        };
        self.state = State::Disconnecting;
        radio.disconnect(conn);
        true
    }

    /// Apply one radio event.
    pub fn handle_event<R: Radio>(&mut self, event: RadioEvent, radio: &mut R) {
        match event {
            RadioEvent::ScanResult {
                addr_type,
                addr,
                rssi,
                name,
            } => self.on_scan_result(radio, addr_type, addr, rssi, name.as_deref()),
            RadioEvent::ScanComplete => {
                if self.state == State::Scanning {
                    if !self.session.target_found() {
                        info!("scan complete, {} not seen", self.target.address);
                    }
                    self.state = State::Idle;
                }
            }
            RadioEvent::Connected {
                conn,
                addr_type: _,
                addr,
            } => self.on_connected(radio, conn, addr),
            RadioEvent::Disconnected { conn, reason } => {
                info!("disconnected, handle {} reason {=u8:#04x}", conn.0, reason);
                self.session.detach();
                self.state = State::Idle;
            }
            RadioEvent::ServiceFound { conn, uuid, range } => {
                if Some(conn) != self.session.connection() || uuid != self.target.service {
                    trace!("ignoring service {}", uuid);
                    return;
                }
                if self.session.record_service(range) {
                    info!("service {} found", uuid);
                }
            }
            RadioEvent::CharacteristicFound {
                conn,
                uuid,
                decl_handle: _,
                value_handle,
                properties: _,
            } => {
                if Some(conn) != self.session.connection() || uuid != self.target.characteristic {
                    trace!("ignoring characteristic {}", uuid);
                    return;
                }
                if self.session.record_write_handle(value_handle) {
                    info!("RX characteristic found, value handle {=u16:#06x}", value_handle);
                    self.state = State::Ready;
                }
            }
            RadioEvent::WriteComplete {
                conn: _,
                value_handle,
                status,
            } => {
                if status == 0 {
                    info!("write to {=u16:#06x} confirmed", value_handle);
                } else {
                    warn!("{}", Error::WriteFailed { status });
                }
                self.session.record_write_status(status);
            }
        }
    }

    fn on_scan_result<R: Radio>(
        &mut self,
        radio: &mut R,
        addr_type: AddrType,
        addr: BdAddr,
        rssi: i8,
        name: Option<&str>,
    ) {
        debug!(
            "seen {} ({}) rssi {=i8} name {}",
            addr,
            addr_type,
            rssi,
            name.unwrap_or("-")
        );
        if addr != self.target.address {
            return;
        }
        if self.state != State::Scanning || self.session.target_found() {
            return;
        }
        info!("target {} found", addr);
        self.session.set_target_found(true);
        self.state = State::ConnectRequested;
        radio.stop_scan();
        radio.connect(addr_type, addr);
    }

    fn on_connected<R: Radio>(&mut self, radio: &mut R, conn: ConnHandle, addr: BdAddr) {
        if let Some(current) = self.session.connection() {
            warn!(
                "connected event for handle {} while on handle {}; ignored",
                conn.0,
                current.0
            );
            return;
        }
        info!("connected to {}, handle {}", addr, conn.0);
        self.session.attach(conn);
        self.state = State::Connected;
        radio.discover_services(conn);
        self.state = State::ServiceDiscovery;
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests (run on host, not embedded)
// ═══════════════════════════════════════════════════════════════════════════
