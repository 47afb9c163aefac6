//! Interrupt enable/flag registers, the error flag register and the
//! asynchronous INT-pin handler.

use core::fmt::Debug;

use bitflags::bitflags;
use embedded_hal::{blocking::spi::Transfer, digital::v2::OutputPin};
use void::Void;

use crate::{
    buffer::{RxBuf, TxBuf},
    error::{Error, Result},
    macros::{log_debug, log_warn},
    regs::{CanStat, IntFlagCode, Register},
    MCP2515,
};

bitflags! {
    /// Bits shared by `CANINTE` (enables) and `CANINTF` (flags).
    pub struct Interrupts: u8 {
        /// Receive buffer 0 full.
        const RX0 = 0x01;
        /// Receive buffer 1 full.
        const RX1 = 0x02;
        /// Transmit buffer 0 empty.
        const TX0 = 0x04;
        /// Transmit buffer 1 empty.
        const TX1 = 0x08;
        /// Transmit buffer 2 empty.
        const TX2 = 0x10;
        /// Any change in `EFLG`.
        const ERR = 0x20;
        /// Bus activity while sleeping.
        const WAK = 0x40;
        /// Error during message reception or transmission.
        const MERR = 0x80;
    }
}

impl Interrupts {
    pub const fn rx(buf: RxBuf) -> Self {
        match buf {
            RxBuf::B0 => Self::RX0,
            RxBuf::B1 => Self::RX1,
        }
    }

    pub const fn tx(buf: TxBuf) -> Self {
        match buf {
            TxBuf::B0 => Self::TX0,
            TxBuf::B1 => Self::TX1,
            TxBuf::B2 => Self::TX2,
        }
    }
}

bitflags! {
    /// `EFLG` bits.
    pub struct ErrorFlags: u8 {
        /// TEC or REC reached the warning limit (96).
        const EWARN = 0x01;
        const RXWAR = 0x02;
        const TXWAR = 0x04;
        /// REC reached 128, receiver is error-passive.
        const RXEP = 0x08;
        /// TEC reached 128, transmitter is error-passive.
        const TXEP = 0x10;
        /// TEC reached 255, the chip is bus-off.
        const TXBO = 0x20;
        /// A frame arrived while RXB0 was full.
        const RX0OVR = 0x40;
        /// A frame arrived while RXB1 was full.
        const RX1OVR = 0x80;
    }
}

impl ErrorFlags {
    /// The only bits software can clear. The rest follow the error
    /// counters and drop once the chip observes the bus recovering.
    pub const CLEARABLE: Self = Self::from_bits_truncate(0xC0);
}

/// An input pin that can run a handler on a falling edge of the MCP2515
/// INT output.
///
/// The handler runs in whatever context the platform's edge detection uses
/// and must not borrow the driver. Have it post to a queue or channel and do
/// the register reads from the owning thread.
pub trait EdgeInterrupt {
    type Error: Debug;

    /// Installs `handler`, replacing any handler already subscribed.
    fn subscribe_falling<F>(&mut self, handler: F) -> core::result::Result<(), Self::Error>
    where
        F: FnMut() + Send + 'static;

    /// Removes the handler. Does nothing when none is installed.
    fn unsubscribe(&mut self) -> core::result::Result<(), Self::Error>;
}

/// Placeholder for drivers that never install a handler. It cannot be
/// constructed.
#[derive(Debug)]
pub enum NoInterrupt {}

impl EdgeInterrupt for NoInterrupt {
    type Error = Void;

    fn subscribe_falling<F>(&mut self, _handler: F) -> core::result::Result<(), Void>
    where
        F: FnMut() + Send + 'static,
    {
        match *self {}
    }

    fn unsubscribe(&mut self) -> core::result::Result<(), Void> {
        match *self {}
    }
}

/// Chip select driven by the SPI peripheral itself. Toggling it is a no-op.
#[derive(Debug, Default, Clone, Copy)]
pub struct HardwareCs;

impl OutputPin for HardwareCs {
    type Error = Void;

    #[inline]
    fn set_low(&mut self) -> core::result::Result<(), Void> {
        Ok(())
    }

    #[inline]
    fn set_high(&mut self) -> core::result::Result<(), Void> {
        Ok(())
    }
}

/// A handler installation that failed, handing back the pins involved.
#[derive(Debug)]
pub struct InstallError<INT, SPIE, CSE> {
    /// The pin the handler was meant for.
    pub pin: INT,
    /// Pin of the handler that was uninstalled before the attempt.
    pub previous: Option<INT>,
    pub error: Error<SPIE, CSE>,
}

impl<SPI, CS, INT, SPIE, CSE> MCP2515<SPI, CS, INT>
where
    SPI: Transfer<u8, Error = SPIE>,
    CS: OutputPin<Error = CSE>,
    INT: EdgeInterrupt,
    SPIE: Debug,
    CSE: Debug,
{
    /// Writes `CANINTE`. Flags not in `enables` stop driving the INT pin
    /// but are still raised in `CANINTF`.
    pub fn set_interrupt_enables(&mut self, enables: Interrupts) -> Result<(), SPIE, CSE> {
        self.write_register(Register::CANINTE, enables.bits())
    }

    pub fn interrupt_enables(&mut self) -> Result<Interrupts, SPIE, CSE> {
        self.read_register(Register::CANINTE)
            .map(Interrupts::from_bits_truncate)
    }

    pub fn interrupt_flags(&mut self) -> Result<Interrupts, SPIE, CSE> {
        self.read_register(Register::CANINTF)
            .map(Interrupts::from_bits_truncate)
    }

    /// Raises `flags` in `CANINTF`, leaving the others untouched. Raising
    /// [`Interrupts::WAK`] wakes a sleeping chip.
    pub fn set_interrupt_flags(&mut self, flags: Interrupts) -> Result<(), SPIE, CSE> {
        self.bit_modify(Register::CANINTF, flags.bits(), 0xFF)
    }

    /// Clears `flags` in `CANINTF`, leaving the others untouched.
    pub fn clear_interrupt_flags(&mut self, flags: Interrupts) -> Result<(), SPIE, CSE> {
        self.bit_modify(Register::CANINTF, flags.bits(), 0)
    }

    pub fn error_flags(&mut self) -> Result<ErrorFlags, SPIE, CSE> {
        self.read_register(Register::EFLG)
            .map(ErrorFlags::from_bits_truncate)
    }

    /// Requests clearing of `flags`. Only the overflow bits in
    /// [`ErrorFlags::CLEARABLE`] are writable; read the flags back to see
    /// what is still set.
    pub fn clear_error_flags(&mut self, flags: ErrorFlags) -> Result<(), SPIE, CSE> {
        self.bit_modify(Register::EFLG, flags.bits(), 0)
    }

    /// Highest priority interrupt source currently pending and enabled.
    pub fn interrupt_code(&mut self) -> Result<IntFlagCode, SPIE, CSE> {
        let stat: CanStat = self.read_reg()?;
        Ok(stat.icod())
    }

    /// Runs `handler` on every falling edge of the chip's INT output.
    ///
    /// A handler installed earlier is uninstalled first and its pin is
    /// returned. The driver does not dispatch on flag type; `handler`
    /// should signal the owning thread, which then reads
    /// [`interrupt_flags`](Self::interrupt_flags) or retrieves messages.
    ///
    /// On failure both pins come back in the [`InstallError`]. If the earlier
    /// handler could not be removed it stays installed and `previous` is
    /// `None`.
    pub fn install_handler<F>(
        &mut self,
        mut pin: INT,
        handler: F,
    ) -> core::result::Result<Option<INT>, InstallError<INT, SPIE, CSE>>
    where
        F: FnMut() + Send + 'static,
    {
        let previous = match self.uninstall_handler() {
            Ok(previous) => previous,
            Err(error) => {
                return Err(InstallError {
                    pin,
                    previous: None,
                    error,
                })
            }
        };
        if pin.subscribe_falling(handler).is_err() {
            log_warn!("interrupt pin refused handler");
            return Err(InstallError {
                pin,
                previous,
                error: Error::Interrupt,
            });
        }
        log_debug!("interrupt handler installed");
        self.int = Some(pin);
        Ok(previous)
    }

    /// Removes the installed handler, handing back its pin.
    pub fn uninstall_handler(&mut self) -> Result<Option<INT>, SPIE, CSE> {
        let mut pin = match self.int.take() {
            Some(pin) => pin,
            None => return Ok(None),
        };
        if pin.unsubscribe().is_err() {
            log_warn!("interrupt pin refused unsubscribe");
            self.int = Some(pin);
            return Err(Error::Interrupt);
        }
        log_debug!("interrupt handler removed");
        Ok(Some(pin))
    }
}
