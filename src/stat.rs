//! Quick-poll status bytes returned by the READ STATUS and RX STATUS
//! instructions.

use modular_bitfield::prelude::*;

use crate::{buffer::RxBuf, filter::RxFilter, regs::RegBits};

/// Byte returned by READ STATUS.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Status {
    #[skip(setters)]
    pub rx0if: bool,
    #[skip(setters)]
    pub rx1if: bool,
    #[skip(setters)]
    pub tx0req: bool,
    #[skip(setters)]
    pub tx0if: bool,
    #[skip(setters)]
    pub tx1req: bool,
    #[skip(setters)]
    pub tx1if: bool,
    #[skip(setters)]
    pub tx2req: bool,
    #[skip(setters)]
    pub tx2if: bool,
}

/// Byte returned by RX STATUS.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RxStatus {
    /// Filter that accepted the most recent message.
    #[skip(setters)]
    pub filter_match: FilterMatch,
    /// Frame type of the message in RXB0, or RXB1 if RXB0 is empty.
    #[skip(setters)]
    pub msg_type: MessageType,
    #[skip]
    __: B1,
    /// Which Rx buffers hold a message.
    #[skip(setters)]
    pub rx_msgs: RxMessages,
}

impl RegBits for Status {
    const RESERVED: u8 = 0;

    #[inline]
    fn from_raw(raw: u8) -> Self {
        Self::from_bytes([raw])
    }

    #[inline]
    fn into_raw(self) -> u8 {
        self.into_bytes()[0]
    }
}

impl RegBits for RxStatus {
    const RESERVED: u8 = 0b0010_0000;

    #[inline]
    fn from_raw(raw: u8) -> Self {
        Self::from_bytes([raw])
    }

    #[inline]
    fn into_raw(self) -> u8 {
        self.into_bytes()[0]
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, BitfieldSpecifier)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "ufmt", derive(ufmt::derive::uDebug))]
#[bits = 2]
pub enum RxMessages {
    None,
    Rxb0,
    Rxb1,
    Both,
}

impl RxMessages {
    /// Whether `buf` holds a message.
    pub const fn contains(self, buf: RxBuf) -> bool {
        matches!(
            (self, buf),
            (RxMessages::Both, _)
                | (RxMessages::Rxb0, RxBuf::B0)
                | (RxMessages::Rxb1, RxBuf::B1)
        )
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, BitfieldSpecifier)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "ufmt", derive(ufmt::derive::uDebug))]
#[bits = 2]
pub enum MessageType {
    Standard,
    StandardRemote,
    Extended,
    ExtendedRemote,
}

impl MessageType {
    pub const fn is_extended(self) -> bool {
        matches!(self, MessageType::Extended | MessageType::ExtendedRemote)
    }

    pub const fn is_remote(self) -> bool {
        matches!(self, MessageType::StandardRemote | MessageType::ExtendedRemote)
    }
}

/// Filter that accepted a message.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, BitfieldSpecifier)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "ufmt", derive(ufmt::derive::uDebug))]
#[bits = 3]
pub enum FilterMatch {
    Rxf0,
    Rxf1,
    Rxf2,
    Rxf3,
    Rxf4,
    Rxf5,
    /// RXF0 matched while RXB0 was full; the message rolled over into RXB1.
    Rxf0Rollover,
    /// RXF1 matched while RXB0 was full; the message rolled over into RXB1.
    Rxf1Rollover,
}

impl FilterMatch {
    /// The filter itself, regardless of rollover.
    pub const fn filter(self) -> RxFilter {
        match self {
            FilterMatch::Rxf0 | FilterMatch::Rxf0Rollover => RxFilter::F0,
            FilterMatch::Rxf1 | FilterMatch::Rxf1Rollover => RxFilter::F1,
            FilterMatch::Rxf2 => RxFilter::F2,
            FilterMatch::Rxf3 => RxFilter::F3,
            FilterMatch::Rxf4 => RxFilter::F4,
            FilterMatch::Rxf5 => RxFilter::F5,
        }
    }

    pub const fn is_rollover(self) -> bool {
        matches!(self, FilterMatch::Rxf0Rollover | FilterMatch::Rxf1Rollover)
    }

    /// Decodes `RXB0CTRL.FILHIT0`.
    pub(crate) const fn from_rxb0(filhit0: bool) -> Self {
        if filhit0 {
            FilterMatch::Rxf1
        } else {
            FilterMatch::Rxf0
        }
    }

    /// Decodes `RXB1CTRL.FILHIT`. RXB1 only reports filters 0 and 1 for
    /// frames that rolled over from RXB0.
    pub(crate) const fn from_rxb1(filhit: u8) -> Self {
        match filhit & 0b111 {
            2 => FilterMatch::Rxf2,
            3 => FilterMatch::Rxf3,
            4 => FilterMatch::Rxf4,
            5 => FilterMatch::Rxf5,
            0 | 6 => FilterMatch::Rxf0Rollover,
            _ => FilterMatch::Rxf1Rollover,
        }
    }
}
