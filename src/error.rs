//! Unified error type for nus-pilot.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` for efficient on-target logging.

use core::fmt;

/// Where in a run a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    ServiceDiscovery,
    CharacteristicDiscovery,
    Commands,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::ServiceDiscovery => "service discovery",
            Phase::CharacteristicDiscovery => "characteristic discovery",
            Phase::Commands => "command sequence",
        })
    }
}

/// Top-level error type used across the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// A scan finished without a matching advertisement.
    TargetNotFound,

    /// The target was seen but no connected event arrived in time.
    ConnectTimeout,

    /// The expected service or characteristic never showed up.
    DiscoveryTimeout(Phase),

    /// The link dropped outside the intentional teardown.
    LinkLost(Phase),

    /// A write was requested without a live connection.
    NotConnected,

    /// A write was requested before the RX value handle was discovered.
    WriteHandleUnknown,

    /// A confirmed write reported a non-zero ATT status.
    WriteFailed { status: u16 },
}

impl Error {
    /// Recoverable errors are retried or logged in place; the rest end
    /// the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::TargetNotFound | Error::ConnectTimeout | Error::WriteFailed { .. }
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::TargetNotFound => f.write_str("target not found"),
            Error::ConnectTimeout => f.write_str("connection timed out"),
            Error::DiscoveryTimeout(phase) => write!(f, "{phase} timed out"),
            Error::LinkLost(phase) => write!(f, "link lost during {phase}"),
            Error::NotConnected => f.write_str("not connected"),
            Error::WriteHandleUnknown => f.write_str("write handle unknown"),
            Error::WriteFailed { status } => write!(f, "write failed with status {status:#06x}"),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_taxonomy() {
        assert!(Error::TargetNotFound.is_recoverable());
        assert!(Error::ConnectTimeout.is_recoverable());
        assert!(Error::WriteFailed { status: 3 }.is_recoverable());

        assert!(!Error::DiscoveryTimeout(Phase::ServiceDiscovery).is_recoverable());
        assert!(!Error::DiscoveryTimeout(Phase::CharacteristicDiscovery).is_recoverable());
        assert!(!Error::LinkLost(Phase::Commands).is_recoverable());
        assert!(!Error::NotConnected.is_recoverable());
        assert!(!Error::WriteHandleUnknown.is_recoverable());
    }

    #[test]
    fn display() {
        assert_eq!(
            Error::DiscoveryTimeout(Phase::ServiceDiscovery).to_string(),
            "service discovery timed out"
        );
        assert_eq!(
            Error::LinkLost(Phase::CharacteristicDiscovery).to_string(),
            "link lost during characteristic discovery"
        );
        assert_eq!(
            Error::WriteFailed { status: 3 }.to_string(),
            "write failed with status 0x0003"
        );
    }
}
