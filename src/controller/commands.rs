//! The fixed command sequence.

/// Ordered single-byte op-codes, sent once per session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandSequence {
    op_codes: &'static [u8],
}

impl CommandSequence {
    pub const fn new(op_codes: &'static [u8]) -> Self {
        Self { op_codes }
    }

    pub fn op_codes(&self) -> &'static [u8] {
        self.op_codes
    }

    pub fn len(&self) -> usize {
        self.op_codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.op_codes.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests
// ═══════════════════════════════════════════════════════════════════════════
