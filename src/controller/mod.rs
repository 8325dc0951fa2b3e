//! Connection Controller.
//!
//! Finds the target peripheral, connects, discovers the NUS RX
//! characteristic and plays the command sequence:
//!
//! - [`handler`] - the event handler. Consumes [`RadioEvent`]s, updates the
//!   [`ConnectionSession`] and issues follow-up radio commands. Never waits.
//! - [`driver`] - the sequencer. Owns the radio, clock and indicator, and
//!   walks the phases with a bounded wait on each.
//! - [`commands`] - the fixed op-code sequence.
//!
//! [`RadioEvent`]: crate::ble::RadioEvent

pub mod commands;
pub mod driver;
pub mod handler;
pub mod session;

pub use commands::CommandSequence;
pub use driver::{RunReport, Sequencer};
pub use handler::Controller;
pub use session::ConnectionSession;

use crate::ble::{BdAddr, Uuid128};

/// Identity of the one peripheral we pursue. Fixed for the process lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TargetDevice {
    pub address: BdAddr,
    pub service: Uuid128,
    pub characteristic: Uuid128,
}

/// Controller state, advanced by radio events and sequencer requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    Idle,
    Scanning,
    ConnectRequested,
    Connected,
    ServiceDiscovery,
    CharacteristicDiscovery,
    Ready,
    Disconnecting,
}
