//! Link-layer device addresses.

use core::fmt;

/// Address type as reported alongside an advertisement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AddrType {
    Public,
    RandomStatic,
    RandomPrivateResolvable,
    RandomPrivateNonResolvable,
    Anonymous,
}

impl AddrType {
    /// Decode the HCI / SoftDevice address type value.
    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0x00 => Some(Self::Public),
            0x01 => Some(Self::RandomStatic),
            0x02 => Some(Self::RandomPrivateResolvable),
            0x03 => Some(Self::RandomPrivateNonResolvable),
            0x7F => Some(Self::Anonymous),
            _ => None,
        }
    }
}

/// A 6-byte device address, most significant byte first
/// (the order it is printed in, `f4:12:fa:6e:cf:59`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BdAddr([u8; 6]);

impl BdAddr {
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// Build from the little-endian order radios put on the wire.
    pub const fn from_le_bytes(le: [u8; 6]) -> Self {
        Self([le[5], le[4], le[3], le[2], le[1], le[0]])
    }

    pub const fn to_le_bytes(self) -> [u8; 6] {
        let b = self.0;
        [b[5], b[4], b[3], b[2], b[1], b[0]]
    }
}

impl fmt::Display for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for BdAddr {
    fn format(&self, f: defmt::Formatter) {
        let [a, b, c, d, e, g] = self.0;
        defmt::write!(
            f,
            "{=u8:02x}:{=u8:02x}:{=u8:02x}:{=u8:02x}:{=u8:02x}:{=u8:02x}",
            a,
            b,
            c,
            d,
            e,
            g
        )
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests
// ═══════════════════════════════════════════════════════════════════════════
