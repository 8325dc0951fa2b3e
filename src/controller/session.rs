//! State of the current connection attempt.

use crate::ble::{ConnHandle, HandleRange};

/// Mutable state of one scan → connect → discover → send → disconnect
/// cycle.
///
/// Mutated only by the event handler; read by the sequencer. The write
/// handle can only be set while connected and after the service was seen,
/// and [`ConnectionSession::detach`] clears all three together.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConnectionSession {
    connection: Option<ConnHandle>,
    service_found: bool,
    service_range: Option<HandleRange>,
    write_handle: Option<u16>,
    target_found: bool,
    writes_confirmed: u32,
    writes_failed: u32,
}

impl ConnectionSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection(&self) -> Option<ConnHandle> {
        self.connection
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn service_found(&self) -> bool {
        self.service_found
    }

    pub fn service_range(&self) -> Option<HandleRange> {
        self.service_range
    }

    pub fn write_handle(&self) -> Option<u16> {
        self.write_handle
    }

    pub fn target_found(&self) -> bool {
        self.target_found
    }

    pub fn writes_confirmed(&self) -> u32 {
        self.writes_confirmed
    }

    pub fn writes_failed(&self) -> u32 {
        self.writes_failed
    }

    pub(crate) fn set_target_found(&mut self, found: bool) {
        self.target_found = found;
    }

    pub(crate) fn attach(&mut self, conn: ConnHandle) {
        self.connection = Some(conn);
    }

    /// Latch the target service. Ignored unless connected.
    pub(crate) fn record_service(&mut self, range: HandleRange) -> bool {
        if self.connection.is_none() {
            return false;
        }
        if !self.service_found {
            self.service_found = true;
            self.service_range = Some(range);
        }
        true
    }

    /// Record the RX value handle. Ignored unless connected with the
    /// service found.
    pub(crate) fn record_write_handle(&mut self, handle: u16) -> bool {
        if self.connection.is_none() || !self.service_found {
            return false;
        }
        self.write_handle = Some(handle);
        true
    }

    pub(crate) fn record_write_status(&mut self, status: u16) {
        if status == 0 {
            self.writes_confirmed += 1;
        } else {
            self.writes_failed += 1;
        }
    }

    /// Drop the link and everything discovered over it.
    pub(crate) fn detach(&mut self) {
        self.connection = None;
        self.service_found = false;
        self.service_range = None;
        self.write_handle = None;
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    const RANGE: HandleRange = HandleRange { start: 10, end: 16 };

    #[test]
    fn write_handle_requires_connection_and_service() {
        let mut s = ConnectionSession::new();
        assert!(!s.record_write_handle(12));
        assert_eq!(s.write_handle(), None);

        s.attach(ConnHandle(0));
        assert!(!s.record_write_handle(12));
        assert_eq!(s.write_handle(), None);

        assert!(s.record_service(RANGE));
        assert!(s.record_write_handle(12));
        assert_eq!(s.write_handle(), Some(12));
    }

    #[test]
    fn service_requires_connection() {
        let mut s = ConnectionSession::new();
        assert!(!s.record_service(RANGE));
        assert!(!s.service_found());
    }

    #[test]
    fn first_service_range_is_kept() {
        let mut s = ConnectionSession::new();
        s.attach(ConnHandle(1));
        s.record_service(RANGE);
        s.record_service(HandleRange::ALL);
        assert_eq!(s.service_range(), Some(RANGE));
    }

    #[test]
    fn detach_clears_link_state_together() {
        let mut s = ConnectionSession::new();
        s.set_target_found(true);
        s.attach(ConnHandle(3));
        s.record_service(RANGE);
        s.record_write_handle(12);
        s.record_write_status(0);

        s.detach();
        assert_eq!(s.connection(), None);
        assert!(!s.service_found());
        assert_eq!(s.service_range(), None);
        assert_eq!(s.write_handle(), None);
        // Scan-cycle flag and counters are not link state.
        assert!(s.target_found());
        assert_eq!(s.writes_confirmed(), 1);

        let once = s.clone();
        s.detach();
        assert_eq!(s, once);
    }

    #[test]
    fn write_status_counters() {
        let mut s = ConnectionSession::new();
        s.record_write_status(0);
        s.record_write_status(0);
        s.record_write_status(0x0E);
        assert_eq!(s.writes_confirmed(), 2);
        assert_eq!(s.writes_failed(), 1);
    }
}
