//! Register-level driver for the Microchip MCP2515 stand-alone CAN
//! controller, built on the `embedded-hal` SPI, GPIO and delay traits.
//!
//! ```ignore
//! let mut can: MCP2515<_, _> = MCP2515::new(spi, cs);
//! can.init(&mut delay, Settings::default())?;
//!
//! let buf = can.find_free_tx_buf()?.ok_or(Error::TxBusy)?;
//! can.load_tx_buffer(buf, id, false, b"hello")?;
//! can.transmit_buffer_blocking(buf, &mut delay)?;
//!
//! if let Ok(message) = can.read_message() {
//!     println!("{}", message);
//! }
//! ```

#![cfg_attr(not(test), no_std)]

pub mod buffer;
pub mod error;
pub mod filter;
pub mod frame;
pub mod id;
pub mod interrupt;
mod macros;
pub mod regs;
pub mod speed;
pub mod stat;

#[cfg(test)]
pub(crate) mod mocks;

use core::fmt::Debug;

use embedded_hal::{
    blocking::{delay::DelayMs, spi::Transfer},
    can::Id,
    digital::v2::OutputPin,
};

use crate::{
    buffer::{Packet, RxBuf, TxBuf},
    error::{Error, Result},
    filter::{RxFilter, RxMask},
    frame::{CanFrame, Message},
    id::IdRegs,
    interrupt::{EdgeInterrupt, Interrupts, NoInterrupt},
    macros::{log_debug, log_trace, log_warn},
    regs::{
        BitModifiable, CanCtrl, CanStat, Cnf3, OpMode, RecvBufOpMode, Reg, RegBits, Register,
        Rxb0Ctrl, Rxb1Ctrl, TxBufPriority, TxbCtrl,
    },
    speed::CanSpeed,
    stat::{FilterMatch, MessageType, RxMessages, RxStatus, Status},
};

/// SPI instruction set.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "ufmt", derive(ufmt::derive::uDebug))]
pub enum Instruction {
    Write = 0x02,
    Read = 0x03,
    BitModify = 0x05,
    LoadTx0 = 0x40,
    LoadTx1 = 0x42,
    LoadTx2 = 0x44,
    Rts0 = 0x81,
    Rts1 = 0x82,
    Rts2 = 0x84,
    ReadRx0 = 0x90,
    ReadRx1 = 0x94,
    ReadStatus = 0xA0,
    RxStatus = 0xB0,
    Reset = 0xC0,
}

/// Longest a mode change or a blocking transmit is waited for.
pub const TIMEOUT_MS: u32 = 5000;

const MODE_POLL_MS: u8 = 10;
const TX_POLL_MS: u8 = 1;
const RESET_SETTLE_MS: u8 = 100;

/// Most argument bytes any instruction takes (BIT MODIFY).
const MAX_ARGS: usize = 3;

/// Settings used to initialize the MCP2515.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "ufmt", derive(ufmt::derive::uDebug))]
pub struct Settings {
    /// Mode to enter once configuration is done.
    pub mode: OpMode,
    /// Device CAN speed.
    pub can_speed: CanSpeed,
    /// Whether to enable the CLKOUT pin.
    pub clkout_en: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mode: OpMode::Normal,
            can_speed: CanSpeed::Kbps50,
            clkout_en: false,
        }
    }
}

/// MCP2515 driver.
///
/// `INT` is the pin type handlers are installed on. Drivers that only poll
/// can leave it at its default: `let can: MCP2515<_, _> = MCP2515::new(..)`.
pub struct MCP2515<SPI, CS, INT = NoInterrupt> {
    /// SPI interface to interact with the MCP2515.
    spi: SPI,
    /// Chip select pin to select the MCP2515.
    cs: CS,
    /// Pin carrying the installed interrupt handler.
    int: Option<INT>,
}

impl<SPI, CS, INT> MCP2515<SPI, CS, INT> {
    /// Creates a new MCP2515 driver. The chip is left untouched until
    /// [`init`](Self::init) is called.
    ///
    /// # Configuration
    ///
    /// As this driver only takes ownership of the SPI interface, it is up to
    /// the user to create and configure the SPI interface. Namely, the MCP2515
    /// requires the following options:
    ///
    /// * **Data Order**: MSB first.
    /// * **Clock**: 10 MHz at most.
    /// * **Mode**: Mode 0 or Mode 3.
    ///
    /// Pass [`HardwareCs`](interrupt::HardwareCs) as `cs` when the SPI
    /// peripheral drives chip select itself.
    pub fn new(spi: SPI, cs: CS) -> Self {
        Self { spi, cs, int: None }
    }
}

impl<SPI, CS, INT, SPIE, CSE> MCP2515<SPI, CS, INT>
where
    SPI: Transfer<u8, Error = SPIE>,
    CS: OutputPin<Error = CSE>,
    INT: EdgeInterrupt,
    SPIE: Debug,
    CSE: Debug,
{
    /// Initializes the MCP2515. This should be called once at the start of
    /// the program.
    ///
    /// Resets the chip, programs the bit timing, opens every filter and
    /// mask, disables all interrupts and finally enters `settings.mode`.
    /// Filters 1, 3 and 5 are programmed as extended filters so that both
    /// frame formats reach both buffers.
    pub fn init(
        &mut self,
        delay: &mut impl DelayMs<u8>,
        settings: Settings,
    ) -> Result<(), SPIE, CSE> {
        log_debug!("initializing: {:?}", settings.can_speed);
        self.cs.set_high().map_err(Error::Hal)?;
        self.reset(delay)?;

        self.set_mode(OpMode::Configuration, delay)?;
        self.set_speed(settings.can_speed)?;
        self.set_clkout(settings.clkout_en)?;

        for filter in RxFilter::ALL {
            self.set_filter(filter, 0, filter.index() % 2 == 1)?;
        }
        for mask in RxMask::ALL {
            self.set_mask(mask, 0, false)?;
        }
        for buf in RxBuf::ALL {
            self.set_rx_buffer_mode(buf, RecvBufOpMode::FilterOn)?;
        }
        self.set_interrupt_enables(Interrupts::empty())?;

        self.set_mode(settings.mode, delay)
    }

    /// Uninstalls any interrupt handler and releases the bus handles.
    pub fn close(mut self) -> Result<(SPI, CS), SPIE, CSE> {
        self.uninstall_handler()?;
        Ok((self.spi, self.cs))
    }

    /// Resets the MCP2515 and waits for it to settle. All registers return
    /// to their power-on values and the chip enters configuration mode.
    pub fn reset(&mut self, delay: &mut impl DelayMs<u8>) -> Result<(), SPIE, CSE> {
        self.transfer(&mut [Instruction::Reset as u8])?;
        delay.delay_ms(RESET_SETTLE_MS);
        Ok(())
    }

    /// Current operation mode, or `None` if `CANSTAT` reports an undefined
    /// one.
    pub fn mode(&mut self) -> Result<Option<OpMode>, SPIE, CSE> {
        let stat: CanStat = self.read_reg()?;
        Ok(stat.opmod_or_err().ok())
    }

    /// Set the operation mode of the device.
    ///
    /// This will wake the device if necessary. The chip only switches once
    /// no frame is in flight, so `CANSTAT` is polled every 10 ms until it
    /// reports `mode` or [`TIMEOUT_MS`] runs out.
    pub fn set_mode(
        &mut self,
        mode: OpMode,
        delay: &mut impl DelayMs<u8>,
    ) -> Result<(), SPIE, CSE> {
        if self.mode()? == Some(OpMode::Sleep) && mode != OpMode::Sleep {
            log_debug!("waking from sleep");
            // The wake-up flag only brings the chip out of sleep while
            // enabled.
            let enables = self.interrupt_enables()?;
            let wak = Interrupts::WAK.bits();
            if !enables.contains(Interrupts::WAK) {
                self.bit_modify(Register::CANINTE, wak, wak)?;
            }
            self.set_interrupt_flags(Interrupts::WAK)?;

            self.request_mode(OpMode::ListenOnly, delay)?;

            if !enables.contains(Interrupts::WAK) {
                self.bit_modify(Register::CANINTE, wak, 0)?;
            }
        }

        self.clear_interrupt_flags(Interrupts::WAK)?;
        self.request_mode(mode, delay)
    }

    /// Requests `mode` without waking the device, then waits for it.
    fn request_mode(
        &mut self,
        mode: OpMode,
        delay: &mut impl DelayMs<u8>,
    ) -> Result<(), SPIE, CSE> {
        log_debug!("requesting mode {:?}", mode);
        self.modify_reg(CanCtrl::new().with_reqop(mode), CanCtrl::MASK_REQOP)?;

        let mut waited = 0;
        loop {
            let stat: CanStat = self.read_reg()?;
            if stat.opmod_or_err() == Ok(mode) {
                return Ok(());
            }
            if waited >= TIMEOUT_MS {
                log_warn!("mode {:?} not reached after {} ms", mode, waited);
                return Err(Error::NewModeTimeout);
            }
            delay.delay_ms(MODE_POLL_MS);
            waited += u32::from(MODE_POLL_MS);
        }
    }

    /// Programs the bit timing registers. Only takes effect in
    /// configuration mode.
    pub fn set_speed(&mut self, speed: CanSpeed) -> Result<(), SPIE, CSE> {
        log_debug!("setting speed {:?}", speed);
        let config = speed.config();
        // CNF3, CNF2 and CNF1 are adjacent, in that order.
        self.write_registers(
            Register::CNF3,
            &[
                config.cnf3().write(),
                config.cnf2().write(),
                config.cnf1().write(),
            ],
        )
    }

    /// Enables/disables the `CLKOUT` pin on the MCP2515. Enabling it also
    /// switches the pin from start-of-frame signalling to the clock.
    pub fn set_clkout(&mut self, enabled: bool) -> Result<(), SPIE, CSE> {
        self.modify_reg(CanCtrl::new().with_clken(enabled), CanCtrl::MASK_CLKEN)?;
        if enabled {
            self.modify_reg(Cnf3::new().with_sof(false), Cnf3::MASK_SOF)?;
        }
        Ok(())
    }

    /// Reads the control register of a Tx buffer.
    ///
    /// After a blocking transmit returns, `abtf`, `mloa` and `txerr` tell an
    /// abort or an error apart from a successful transmission.
    pub fn tx_buffer_ctrl(&mut self, buf: TxBuf) -> Result<TxbCtrl, SPIE, CSE> {
        self.read_register(buf.ctrl()).map(TxbCtrl::read)
    }

    /// Whether a Tx buffer has no transmission pending.
    pub fn is_tx_buffer_free(&mut self, buf: TxBuf) -> Result<bool, SPIE, CSE> {
        Ok(!self.tx_buffer_ctrl(buf)?.txreq())
    }

    /// Attempts to find a free Tx buffer, scanning from buffer 0.
    pub fn find_free_tx_buf(&mut self) -> Result<Option<TxBuf>, SPIE, CSE> {
        for buf in TxBuf::ALL {
            if self.is_tx_buffer_free(buf)? {
                return Ok(Some(buf));
            }
        }
        Ok(None)
    }

    /// Loads a frame into a free Tx buffer. Payloads longer than 8 bytes are
    /// truncated.
    ///
    /// Fails with [`Error::TxBusy`] if the buffer still has a transmission
    /// pending.
    pub fn load_tx_buffer(
        &mut self,
        buf: TxBuf,
        id: Id,
        rtr: bool,
        payload: &[u8],
    ) -> Result<(), SPIE, CSE> {
        if !self.is_tx_buffer_free(buf)? {
            log_debug!("{:?} busy", buf);
            return Err(Error::TxBusy);
        }
        self.load_packet(buf, Packet::new(id, rtr, payload))
    }

    /// Like [`load_tx_buffer`](Self::load_tx_buffer), taking the identifier
    /// in integer form.
    pub fn load_tx_buffer_raw(
        &mut self,
        buf: TxBuf,
        id: u32,
        extended: bool,
        rtr: bool,
        payload: &[u8],
    ) -> Result<(), SPIE, CSE> {
        let id = crate::id::from_raw(id, extended).ok_or(Error::InvalidParameter)?;
        self.load_tx_buffer(buf, id, rtr, payload)
    }

    fn load_packet(&mut self, buf: TxBuf, packet: Packet) -> Result<(), SPIE, CSE> {
        log_trace!("loading {:?}, {} bytes", buf, packet.len());
        self.bus_write(buf.load(), &packet.into_bytes())
    }

    /// Requests transmission of a loaded Tx buffer and returns immediately.
    pub fn transmit_buffer(&mut self, buf: TxBuf) -> Result<(), SPIE, CSE> {
        log_trace!("request to send {:?}", buf);
        self.transfer(&mut [buf.rts() as u8])?;
        Ok(())
    }

    /// Requests transmission of a loaded Tx buffer and polls every 1 ms
    /// until the request clears or [`TIMEOUT_MS`] runs out.
    ///
    /// The request also clears when the chip aborts the transmission; see
    /// [`tx_buffer_ctrl`](Self::tx_buffer_ctrl).
    pub fn transmit_buffer_blocking(
        &mut self,
        buf: TxBuf,
        delay: &mut impl DelayMs<u8>,
    ) -> Result<(), SPIE, CSE> {
        self.transmit_buffer(buf)?;

        let mut waited = 0;
        while !self.is_tx_buffer_free(buf)? {
            if waited >= TIMEOUT_MS {
                log_warn!("{:?} still pending after {} ms", buf, waited);
                return Err(Error::TxTimeout);
            }
            delay.delay_ms(TX_POLL_MS);
            waited += u32::from(TX_POLL_MS);
        }
        Ok(())
    }

    /// Sets the arbitration priority among Tx buffers ready at the same
    /// time. Can be changed until the buffer starts transmitting.
    pub fn set_tx_buffer_priority(
        &mut self,
        buf: TxBuf,
        priority: TxBufPriority,
    ) -> Result<(), SPIE, CSE> {
        self.bit_modify(
            buf.ctrl(),
            TxbCtrl::MASK_TXP.into_raw(),
            TxbCtrl::new().with_txp(priority).write(),
        )
    }

    /// Withdraws a pending transmission. A frame already on the wire is
    /// still sent.
    pub fn abort_tx(&mut self, buf: TxBuf) -> Result<(), SPIE, CSE> {
        self.bit_modify(buf.ctrl(), TxbCtrl::MASK_TXREQ.into_raw(), 0)
    }

    /// Sets a receive filter. Only takes effect in configuration mode.
    ///
    /// For a standard filter, bits 10:0 of `id` hold the identifier and bits
    /// 26:19 and 18:11 are compared against the first two data bytes.
    pub fn set_filter(
        &mut self,
        filter: RxFilter,
        id: u32,
        extended: bool,
    ) -> Result<(), SPIE, CSE> {
        let regs = IdRegs::filter(id, extended).ok_or(Error::InvalidParameter)?;
        self.write_registers(filter.sidh(), &regs.into_bytes())
    }

    /// Sets a receive mask. Only takes effect in configuration mode. A zero
    /// mask accepts every identifier.
    pub fn set_mask(&mut self, mask: RxMask, id: u32, extended: bool) -> Result<(), SPIE, CSE> {
        let regs = IdRegs::filter(id, extended).ok_or(Error::InvalidParameter)?;
        self.write_registers(mask.sidh(), &regs.into_bytes())
    }

    /// Sets which frames an Rx buffer accepts.
    pub fn set_rx_buffer_mode(
        &mut self,
        buf: RxBuf,
        mode: RecvBufOpMode,
    ) -> Result<(), SPIE, CSE> {
        match buf {
            RxBuf::B0 => self.modify_reg(Rxb0Ctrl::new().with_rxm(mode), Rxb0Ctrl::MASK_RXM),
            RxBuf::B1 => self.modify_reg(Rxb1Ctrl::new().with_rxm(mode), Rxb1Ctrl::MASK_RXM),
        }
    }

    /// Lets frames accepted by RXB0 while it is full roll over into RXB1.
    pub fn set_rollover(&mut self, enabled: bool) -> Result<(), SPIE, CSE> {
        self.modify_reg(Rxb0Ctrl::new().with_bukt(enabled), Rxb0Ctrl::MASK_BUKT)
    }

    /// Reads the status register.
    pub fn read_status(&mut self) -> Result<Status, SPIE, CSE> {
        let mut out = [0];
        self.bus_read(Instruction::ReadStatus, &[], &mut out)?;
        Ok(Status::read(out[0]))
    }

    /// Reads the Rx status byte.
    pub fn rx_status(&mut self) -> Result<RxStatus, SPIE, CSE> {
        let mut out = [0];
        self.bus_read(Instruction::RxStatus, &[], &mut out)?;
        Ok(RxStatus::read(out[0]))
    }

    /// Which Rx buffers hold a message.
    pub fn rx_status_messages(&mut self) -> Result<RxMessages, SPIE, CSE> {
        Ok(self.rx_status()?.rx_msgs())
    }

    /// Frame type of the next message to be read.
    pub fn rx_status_message_type(&mut self) -> Result<MessageType, SPIE, CSE> {
        Ok(self.rx_status()?.msg_type())
    }

    /// Filter that accepted the next message to be read.
    pub fn rx_status_filter_match(&mut self) -> Result<FilterMatch, SPIE, CSE> {
        Ok(self.rx_status()?.filter_match())
    }

    /// Retrieves the message held by `buf`, freeing the buffer.
    ///
    /// Fails with [`Error::NoMessage`] if the buffer is empty.
    pub fn get_message(&mut self, buf: RxBuf) -> Result<Message, SPIE, CSE> {
        if !self.rx_status_messages()?.contains(buf) {
            return Err(Error::NoMessage);
        }
        self.read_rx_buffer(buf)
    }

    /// Retrieves a message from whichever Rx buffer holds one, RXB0 first.
    pub fn read_message(&mut self) -> Result<Message, SPIE, CSE> {
        let messages = self.rx_status_messages()?;
        if messages.contains(RxBuf::B0) {
            self.read_rx_buffer(RxBuf::B0)
        } else if messages.contains(RxBuf::B1) {
            self.read_rx_buffer(RxBuf::B1)
        } else {
            Err(Error::NoMessage)
        }
    }

    fn read_rx_buffer(&mut self, buf: RxBuf) -> Result<Message, SPIE, CSE> {
        // Standard frames flag RTR in the control register, extended frames
        // in the DLC byte.
        let ctrl = self.read_register(buf.ctrl())?;
        let (rxrtr, filter) = match buf {
            RxBuf::B0 => {
                let ctrl = Rxb0Ctrl::read(ctrl);
                (ctrl.rxrtr(), FilterMatch::from_rxb0(ctrl.filhit0()))
            }
            RxBuf::B1 => {
                let ctrl = Rxb1Ctrl::read(ctrl);
                (ctrl.rxrtr(), FilterMatch::from_rxb1(ctrl.filhit()))
            }
        };

        // Ending the READ RX BUFFER transaction clears RXnIF.
        let mut bytes = [0; Packet::LEN];
        self.bus_read(buf.read(), &[], &mut bytes)?;
        let packet = Packet::from_bytes(bytes);

        let id = packet.id.to_id();
        let extended = matches!(id, Id::Extended(_));
        let frame = CanFrame {
            id,
            rtr: if extended { packet.dlc.rtr() } else { rxrtr },
            dlc: packet.len() as u8,
            data: packet.data,
        };
        log_trace!("received from {:?} via {:?}", buf, filter);
        Ok(Message {
            frame,
            buffer: buf,
            filter,
        })
    }

    /// Transmit and receive error counters, `(TEC, REC)`.
    pub fn error_counters(&mut self) -> Result<(u8, u8), SPIE, CSE> {
        let mut out = [0; 2];
        self.read_registers(Register::TEC, &mut out)?;
        Ok((out[0], out[1]))
    }

    /// Sends `cmd` and `args`, then clocks in `out.len()` bytes within the
    /// same transaction. At most three argument bytes are accepted.
    pub fn bus_read(
        &mut self,
        cmd: Instruction,
        args: &[u8],
        out: &mut [u8],
    ) -> Result<(), SPIE, CSE> {
        if args.len() > MAX_ARGS {
            return Err(Error::InvalidParameter);
        }
        let mut header = [0; 1 + MAX_ARGS];
        header[0] = cmd as u8;
        header[1..=args.len()].copy_from_slice(args);
        let header = &mut header[..=args.len()];

        self.with_cs(|spi| -> Result<_, _, _> {
            spi.transfer(header).map_err(Error::Spi)?;
            // As the MCP2515 doesn't care what we send it while reading, we
            // can just transfer `out` as it is. The values will be overridden
            // with received data as we transfer the bytes.
            spi.transfer(out).map_err(Error::Spi)?;
            Ok(())
        })?
    }

    /// Sends `cmd` followed by `data` in one transaction.
    pub fn bus_write(&mut self, cmd: Instruction, data: &[u8]) -> Result<(), SPIE, CSE> {
        self.send(&mut [cmd as u8], data)
    }

    /// Reads a single register.
    pub fn read_register(&mut self, reg: Register) -> Result<u8, SPIE, CSE> {
        let mut out = [0];
        self.read_registers(reg, &mut out)?;
        Ok(out[0])
    }

    /// Reads registers starting from `reg` sequentially, moving on to the
    /// next register until `out` is full.
    pub fn read_registers(&mut self, reg: Register, out: &mut [u8]) -> Result<(), SPIE, CSE> {
        self.bus_read(Instruction::Read, &[reg as u8], out)
    }

    /// Writes a single register.
    pub fn write_register(&mut self, reg: Register, value: u8) -> Result<(), SPIE, CSE> {
        self.write_registers(reg, &[value])
    }

    /// Writes to sequential registers. Writing will start at `reg` and
    /// continue sequentially until `data` is empty.
    pub fn write_registers(&mut self, reg: Register, data: &[u8]) -> Result<(), SPIE, CSE> {
        self.send(&mut [Instruction::Write as u8, reg as u8], data)
    }

    /// Updates the bits of `reg` selected by `mask` to those of `value`.
    ///
    /// The chip only honours the mask on registers where
    /// [`Register::supports_bit_modify`] holds; on others it overwrites the
    /// whole register.
    pub fn bit_modify(&mut self, reg: Register, mask: u8, value: u8) -> Result<(), SPIE, CSE> {
        debug_assert!(
            reg.supports_bit_modify(),
            "BIT MODIFY on {:?} writes the whole register",
            reg
        );
        self.bus_write(Instruction::BitModify, &[reg as u8, mask, value])
    }

    /// Read a register via a register object.
    #[inline]
    pub fn read_reg<R: Reg>(&mut self) -> Result<R, SPIE, CSE> {
        self.read_register(R::ADDRESS).map(R::read)
    }

    /// Write to a register using a register object.
    #[inline]
    pub fn write_reg<R: Reg>(&mut self, reg: R) -> Result<(), SPIE, CSE> {
        self.write_register(R::ADDRESS, reg.write())
    }

    /// Modifies a register.
    ///
    /// # Parameters
    ///
    /// * `reg` - New register content.
    /// * `mask` - Mask register. The bits must be 1 in the positions you want
    ///   to modify.
    #[inline]
    pub fn modify_reg<R: BitModifiable>(&mut self, reg: R, mask: R) -> Result<(), SPIE, CSE> {
        self.bit_modify(R::ADDRESS, mask.into_raw(), reg.write())
    }

    /// Sends `header` then `data` in one transaction, discarding whatever
    /// the chip shifts out.
    fn send(&mut self, header: &mut [u8], data: &[u8]) -> Result<(), SPIE, CSE> {
        self.with_cs(|spi| -> Result<_, _, _> {
            spi.transfer(header).map_err(Error::Spi)?;
            let mut chunk = [0; 16];
            for part in data.chunks(chunk.len()) {
                let out = &mut chunk[..part.len()];
                out.copy_from_slice(part);
                spi.transfer(out).map_err(Error::Spi)?;
            }
            Ok(())
        })?
    }

    /// Transfers an array of bytes via SPI, returning the slave response inside
    /// the given mutable bytes array.
    ///
    /// Returns the last element received from the slave. If no bytes were
    /// sent, 0 is returned.
    fn transfer(&mut self, bytes: &mut [u8]) -> Result<u8, SPIE, CSE> {
        self.with_cs(|spi| spi.transfer(bytes))?
            .map_err(Error::Spi)?;
        if let [.., data] = bytes {
            Ok(*data)
        } else {
            Ok(0)
        }
    }

    /// Calls a function `f` after bringing the chip select pin low, restoring
    /// it to high after the function has finished.
    fn with_cs<T>(&mut self, f: impl FnOnce(&mut SPI) -> T) -> Result<T, SPIE, CSE> {
        self.cs.set_low().map_err(Error::Hal)?;
        let result = f(&mut self.spi);
        self.cs.set_high().map_err(Error::Hal)?;
        Ok(result)
    }
}

impl<SPI, CS, INT, SPIE, CSE> embedded_hal::blocking::can::Can for MCP2515<SPI, CS, INT>
where
    SPI: Transfer<u8, Error = SPIE>,
    CS: OutputPin<Error = CSE>,
    INT: EdgeInterrupt,
    SPIE: Debug,
    CSE: Debug,
{
    type Frame = CanFrame;
    type Error = Error<SPIE, CSE>;

    /// Queues `frame` in the first free Tx buffer.
    ///
    /// Does not wait for a buffer to free up: with all three pending this
    /// returns [`Error::TxBusy`] at once, since the trait offers no delay to
    /// bound a poll with. To wait, poll [`MCP2515::find_free_tx_buf`] and
    /// send with [`MCP2515::transmit_buffer_blocking`].
    fn transmit(&mut self, frame: &Self::Frame) -> Result<(), SPIE, CSE> {
        let buf = self.find_free_tx_buf()?.ok_or(Error::TxBusy)?;
        self.load_packet(buf, frame.to_packet())?;
        self.transmit_buffer(buf)
    }

    #[inline]
    fn receive(&mut self) -> Result<Self::Frame, SPIE, CSE> {
        self.read_message().map(|message| message.frame)
    }
}

impl<SPI, CS, INT, SPIE, CSE> embedded_hal::can::nb::Can for MCP2515<SPI, CS, INT>
where
    SPI: Transfer<u8, Error = SPIE>,
    CS: OutputPin<Error = CSE>,
    INT: EdgeInterrupt,
    SPIE: Debug,
    CSE: Debug,
{
    type Frame = CanFrame;
    type Error = Error<SPIE, CSE>;

    /// Queues `frame` in the first free Tx buffer. Never displaces a pending
    /// frame.
    fn transmit(&mut self, frame: &Self::Frame) -> nb::Result<Option<Self::Frame>, Self::Error> {
        match self.find_free_tx_buf()? {
            Some(buf) => {
                self.load_packet(buf, frame.to_packet())?;
                self.transmit_buffer(buf)?;
                Ok(None)
            }
            None => Err(nb::Error::WouldBlock),
        }
    }

    fn receive(&mut self) -> nb::Result<Self::Frame, Self::Error> {
        match self.read_message() {
            Ok(message) => Ok(message.frame),
            Err(Error::NoMessage) => Err(nb::Error::WouldBlock),
            Err(e) => Err(nb::Error::Other(e)),
        }
    }
}
