use core::fmt::{self, Debug, Display};

pub type Result<T, SPIE, CSE> = core::result::Result<T, Error<SPIE, CSE>>;

#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "ufmt", derive(ufmt::derive::uDebug))]
pub enum Error<SPIE, CSE> {
    /// SPI transfer failed.
    Spi(SPIE),
    /// Toggling the chip-select pin failed.
    Hal(CSE),
    /// The interrupt pin refused to install or remove a handler.
    Interrupt,
    /// `CANSTAT` did not report the requested operation mode in time.
    NewModeTimeout,
    /// A Tx buffer still had its request pending when the wait ran out.
    TxTimeout,
    /// The Tx buffer still holds a frame waiting for transmission.
    TxBusy,
    /// The requested Rx buffer holds no message.
    NoMessage,
    /// An index or identifier was out of range.
    InvalidParameter,
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "ufmt", derive(ufmt::derive::uDebug))]
pub enum ErrorKind {
    /// The bus or a pin failed; the hardware is unreachable.
    OperationFailed,
    /// The hardware answered but did not reach the wanted state in time.
    TimedOut,
    /// No free Tx buffer or no pending Rx message. Poll again or use another
    /// buffer.
    ResourceExhausted,
    /// Rejected before any bus activity.
    InvalidParameter,
}

impl<SPIE, CSE> Error<SPIE, CSE> {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Spi(_) | Error::Hal(_) | Error::Interrupt => ErrorKind::OperationFailed,
            Error::NewModeTimeout | Error::TxTimeout => ErrorKind::TimedOut,
            Error::TxBusy | Error::NoMessage => ErrorKind::ResourceExhausted,
            Error::InvalidParameter => ErrorKind::InvalidParameter,
        }
    }
}

impl<SPIE: Debug, CSE: Debug> Display for Error<SPIE, CSE> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Spi(e) => write!(f, "SPI transfer failed: {:?}", e),
            Error::Hal(e) => write!(f, "chip select failed: {:?}", e),
            Error::Interrupt => f.write_str("interrupt pin rejected the request"),
            Error::NewModeTimeout => f.write_str("timed out waiting for mode change"),
            Error::TxTimeout => f.write_str("timed out waiting for transmission"),
            Error::TxBusy => f.write_str("tx buffer busy"),
            Error::NoMessage => f.write_str("no message in rx buffer"),
            Error::InvalidParameter => f.write_str("invalid parameter"),
        }
    }
}

impl<SPIE: Debug, CSE: Debug> embedded_hal::can::Error for Error<SPIE, CSE> {
    fn kind(&self) -> embedded_hal::can::ErrorKind {
        // Bus-level error classes (bit, stuff, CRC...) are only visible via
        // EFLG and the error counters, never through a driver call.
        embedded_hal::can::ErrorKind::Other
    }
}

/// A buffer, filter or mask index outside the chip's range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "ufmt", derive(ufmt::derive::uDebug))]
pub struct InvalidIndex(pub u8);

impl<SPIE, CSE> From<InvalidIndex> for Error<SPIE, CSE> {
    fn from(_: InvalidIndex) -> Self {
        Error::InvalidParameter
    }
}
