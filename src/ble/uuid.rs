//! 128-bit GATT UUIDs.

use core::fmt;

/// A 128-bit UUID stored as its big-endian numeric value, so constants
/// read the same as the canonical text form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Uuid128(u128);

impl Uuid128 {
    pub const fn from_u128(value: u128) -> Self {
        Self(value)
    }

    /// Little-endian byte order, as the SoftDevice and the air expect it.
    pub const fn to_le_bytes(self) -> [u8; 16] {
        self.0.to_le_bytes()
    }
}

impl fmt::Display for Uuid128 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.0;
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-{:04x}-{:012x}",
            (v >> 96) as u32,
            (v >> 80) as u16,
            (v >> 64) as u16,
            (v >> 48) as u16,
            v & 0xFFFF_FFFF_FFFF
        )
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Uuid128 {
    fn format(&self, f: defmt::Formatter) {
        let v = self.0;
        defmt::write!(
            f,
            "{=u32:08x}-{=u16:04x}-{=u16:04x}-{=u16:04x}-{=u64:012x}",
            (v >> 96) as u32,
            (v >> 80) as u16,
            (v >> 64) as u16,
            (v >> 48) as u16,
            (v & 0xFFFF_FFFF_FFFF) as u64
        )
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{NUS_RX_CHAR_UUID, NUS_SERVICE_UUID};

    #[test]
    fn canonical_text_form() {
        assert_eq!(
            NUS_SERVICE_UUID.to_string(),
            "6e400001-b5a3-f393-e0a9-e50e24dcca9e"
        );
        assert_eq!(
            NUS_RX_CHAR_UUID.to_string(),
            "6e400002-b5a3-f393-e0a9-e50e24dcca9e"
        );
    }

    #[test]
    fn le_bytes_reverse_the_text_order() {
        let bytes = NUS_SERVICE_UUID.to_le_bytes();
        assert_eq!(bytes[0], 0x9E);
        assert_eq!(bytes[15], 0x6E);
    }

    #[test]
    fn leading_zeros_are_kept() {
        // Battery Service on the SIG base UUID.
        let battery = Uuid128::from_u128(0x0000180F_0000_1000_8000_00805F9B34FB);
        assert_eq!(battery.to_string(), "0000180f-0000-1000-8000-00805f9b34fb");
    }
}
