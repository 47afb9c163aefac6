use crate::{buffer::RxBuf, regs::Register};

crate::index_def! {
    /// Receive filters.
    RxFilter(sidh) => {
        /// RXF0
        F0 => Register::RXF0SIDH,
        /// RXF1
        F1 => Register::RXF1SIDH,
        /// RXF2
        F2 => Register::RXF2SIDH,
        /// RXF3
        F3 => Register::RXF3SIDH,
        /// RXF4
        F4 => Register::RXF4SIDH,
        /// RXF5
        F5 => Register::RXF5SIDH
    }
}

impl RxFilter {
    /// Rx buffer that frames matching this filter are delivered to (unless
    /// they roll over).
    pub const fn buffer(self) -> RxBuf {
        match self {
            RxFilter::F0 | RxFilter::F1 => RxBuf::B0,
            _ => RxBuf::B1,
        }
    }
}

crate::index_def! {
    /// Receive masks.
    RxMask(sidh) => {
        /// Mask 0, applied to filters 0 and 1.
        Mask0 => Register::RXM0SIDH,
        /// Mask 1, applied to filters 2 to 5.
        Mask1 => Register::RXM1SIDH
    }
}

impl RxMask {
    /// Mask that gates the given Rx buffer.
    pub const fn for_buffer(buf: RxBuf) -> Self {
        match buf {
            RxBuf::B0 => RxMask::Mask0,
            RxBuf::B1 => RxMask::Mask1,
        }
    }
}
