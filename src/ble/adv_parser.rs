//! Advertisement payload parsing.
//!
//! The payload is a sequence of AD structures: `[len, ad_type, data..]`
//! where `len` counts the type byte plus the data.

use crate::ble::DeviceName;

/// AD type: shortened local name.
pub const AD_SHORT_NAME: u8 = 0x08;
/// AD type: complete local name.
pub const AD_COMPLETE_NAME: u8 = 0x09;

/// Iterate the well-formed AD structures of `data` as `(ad_type, payload)`.
///
/// Parsing stops at the first zero length or truncated structure.
pub fn ad_structures(data: &[u8]) -> impl Iterator<Item = (u8, &[u8])> {
    let mut i = 0;
    core::iter::from_fn(move || {
        let len = *data.get(i)? as usize;
        if len == 0 || i + len >= data.len() {
            return None;
        }
        let item = (data[i + 1], &data[i + 2..i + 1 + len]);
        i += len + 1;
        Some(item)
    })
}

/// Extract the complete or shortened local name, truncated to capacity.
pub fn local_name(data: &[u8]) -> Option<DeviceName> {
    let (_, bytes) = ad_structures(data)
        .find(|(ad_type, _)| *ad_type == AD_COMPLETE_NAME || *ad_type == AD_SHORT_NAME)?;

    let mut name = DeviceName::new();
    for &b in bytes {
        if name.push(b as char).is_err() {
            break;
        }
    }
    Some(name)
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structures_are_walked_in_order() {
        let ad = [0x02, 0x01, 0x06, 0x03, 0x19, 0xC1, 0x03];
        let types: Vec<u8> = ad_structures(&ad).map(|(t, _)| t).collect();
        assert_eq!(types, vec![0x01, 0x19]);
    }

    #[test]
    fn truncated_structure_stops_parsing() {
        let ad = [0x02, 0x01, 0x06, 0x09, 0x09, b'N', b'U'];
        assert_eq!(ad_structures(&ad).count(), 1);
        assert_eq!(ad_structures(&[0x00, 0x09]).count(), 0);
        assert_eq!(ad_structures(&[]).count(), 0);
        assert!(local_name(&ad).is_none());
    }

    #[test]
    fn complete_name() {
        let ad = [0x08, 0x09, b'J', b'o', b'y', b'P', b'a', b'd', b'!'];
        assert_eq!(local_name(&ad).unwrap().as_str(), "JoyPad!");
    }

    #[test]
    fn shortened_name() {
        let ad = [0x02, 0x01, 0x06, 0x04, 0x08, b'J', b'o', b'y'];
        assert_eq!(local_name(&ad).unwrap().as_str(), "Joy");
    }

    #[test]
    fn no_name() {
        assert!(local_name(&[0x02, 0x01, 0x06]).is_none());
    }

    #[test]
    fn long_name_is_truncated() {
        let mut ad = [b'X'; 40];
        ad[0] = 39;
        ad[1] = AD_COMPLETE_NAME;
        let name = local_name(&ad).unwrap();
        assert_eq!(name.len(), name.capacity());
    }
}
