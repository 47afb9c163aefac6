//! Conversion between CAN identifiers and the chip's `SIDH`, `SIDL`, `EID8`,
//! `EID0` register quadruple.
//!
//! An extended identifier puts its upper 11 bits in the standard-id fields
//! and its lower 18 bits in `SIDL[1:0]`, `EID8` and `EID0`. A standard
//! identifier only uses `SIDH` and `SIDL[7:5]`.

use embedded_hal::can::{ExtendedId, Id, StandardId};

use crate::regs::{RegBits, Sidl};

/// Largest 29-bit identifier.
pub const EXTENDED_MAX: u32 = 0x1FFF_FFFF;

/// Largest 11-bit identifier.
pub const STANDARD_MAX: u32 = 0x7FF;

/// An identifier as laid out in four consecutive registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IdRegs {
    pub sidh: u8,
    pub sidl: Sidl,
    pub eid8: u8,
    pub eid0: u8,
}

impl IdRegs {
    /// Number of registers an identifier occupies.
    pub const LEN: usize = 4;

    /// Encodes an identifier for a Tx buffer.
    pub fn from_id(id: Id) -> Self {
        match id {
            Id::Standard(id) => Self::standard(id.as_raw()),
            Id::Extended(id) => Self::extended(id.as_raw()),
        }
    }

    /// Encodes an acceptance filter or mask.
    ///
    /// Extended filters are laid out like extended identifiers. For standard
    /// filters, bits 10:0 of `id` form the standard identifier while bits
    /// 26:19 and 18:11 fill `EID8` and `EID0`, which the chip compares
    /// against the first and second data bytes of standard frames.
    ///
    /// Returns [`None`] if `id` does not fit in 29 bits.
    pub fn filter(id: u32, extended: bool) -> Option<Self> {
        if id > EXTENDED_MAX {
            return None;
        }
        if extended {
            return Some(Self::extended(id));
        }
        let mut regs = Self::standard((id & STANDARD_MAX) as u16);
        regs.eid8 = (id >> 19) as u8;
        regs.eid0 = (id >> 11) as u8;
        Some(regs)
    }

    /// Decodes the identifier. The `EXIDE` bit in `SIDL` decides between a
    /// standard and an extended one.
    pub fn to_id(self) -> Id {
        let sid = (u16::from(self.sidh) << 3) | u16::from(self.sidl.sid());
        if self.sidl.exide() {
            let eid = (u32::from(self.sidl.eid()) << 16)
                | (u32::from(self.eid8) << 8)
                | u32::from(self.eid0);
            let raw = (u32::from(sid) << 18) | eid;
            // 11 + 18 bits always fit.
            Id::Extended(ExtendedId::new(raw).unwrap_or(ExtendedId::MAX))
        } else {
            Id::Standard(StandardId::new(sid).unwrap_or(StandardId::MAX))
        }
    }

    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Self {
            sidh: bytes[0],
            sidl: Sidl::read(bytes[1]),
            eid8: bytes[2],
            eid0: bytes[3],
        }
    }

    pub fn into_bytes(self) -> [u8; 4] {
        [self.sidh, self.sidl.write(), self.eid8, self.eid0]
    }

    fn standard(sid: u16) -> Self {
        Self {
            sidh: (sid >> 3) as u8,
            sidl: Sidl::new().with_sid((sid & 0x7) as u8),
            eid8: 0,
            eid0: 0,
        }
    }

    fn extended(raw: u32) -> Self {
        let sid = (raw >> 18) as u16;
        Self {
            sidh: (sid >> 3) as u8,
            sidl: Sidl::new()
                .with_sid((sid & 0x7) as u8)
                .with_exide(true)
                .with_eid(((raw >> 16) & 0x3) as u8),
            eid8: (raw >> 8) as u8,
            eid0: raw as u8,
        }
    }
}

/// Builds an identifier from its integer form.
///
/// Returns [`None`] if `raw` does not fit in 11 (standard) or 29 (extended)
/// bits.
pub fn from_raw(raw: u32, extended: bool) -> Option<Id> {
    if extended {
        ExtendedId::new(raw).map(Id::Extended)
    } else {
        u16::try_from(raw)
            .ok()
            .and_then(StandardId::new)
            .map(Id::Standard)
    }
}

/// Splits an identifier into its integer form and extended flag.
pub fn to_raw(id: Id) -> (u32, bool) {
    match id {
        Id::Standard(id) => (u32::from(id.as_raw()), false),
        Id::Extended(id) => (id.as_raw(), true),
    }
}
