//! MCP2515 registers.

use modular_bitfield::prelude::*;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "ufmt", derive(ufmt::derive::uDebug))]
pub enum Register {
    RXF0SIDH = 0x00,
    RXF0SIDL = 0x01,
    RXF0EID8 = 0x02,
    RXF0EID0 = 0x03,
    RXF1SIDH = 0x04,
    RXF1SIDL = 0x05,
    RXF1EID8 = 0x06,
    RXF1EID0 = 0x07,
    RXF2SIDH = 0x08,
    RXF2SIDL = 0x09,
    RXF2EID8 = 0x0A,
    RXF2EID0 = 0x0B,
    BFPCTRL = 0x0C,
    TXRTSCTRL = 0x0D,
    CANSTAT = 0x0E,
    CANCTRL = 0x0F,
    RXF3SIDH = 0x10,
    RXF3SIDL = 0x11,
    RXF3EID8 = 0x12,
    RXF3EID0 = 0x13,
    RXF4SIDH = 0x14,
    RXF4SIDL = 0x15,
    RXF4EID8 = 0x16,
    RXF4EID0 = 0x17,
    RXF5SIDH = 0x18,
    RXF5SIDL = 0x19,
    RXF5EID8 = 0x1A,
    RXF5EID0 = 0x1B,
    TEC = 0x1C,
    REC = 0x1D,
    RXM0SIDH = 0x20,
    RXM0SIDL = 0x21,
    RXM0EID8 = 0x22,
    RXM0EID0 = 0x23,
    RXM1SIDH = 0x24,
    RXM1SIDL = 0x25,
    RXM1EID8 = 0x26,
    RXM1EID0 = 0x27,
    CNF3 = 0x28,
    CNF2 = 0x29,
    CNF1 = 0x2A,
    CANINTE = 0x2B,
    CANINTF = 0x2C,
    EFLG = 0x2D,
    TXB0CTRL = 0x30,
    TXB0SIDH = 0x31,
    TXB0SIDL = 0x32,
    TXB0EID8 = 0x33,
    TXB0EID0 = 0x34,
    TXB0DLC = 0x35,
    TXB0DATA = 0x36,
    TXB1CTRL = 0x40,
    TXB1SIDH = 0x41,
    TXB1SIDL = 0x42,
    TXB1EID8 = 0x43,
    TXB1EID0 = 0x44,
    TXB1DLC = 0x45,
    TXB1DATA = 0x46,
    TXB2CTRL = 0x50,
    TXB2SIDH = 0x51,
    TXB2SIDL = 0x52,
    TXB2EID8 = 0x53,
    TXB2EID0 = 0x54,
    TXB2DLC = 0x55,
    TXB2DATA = 0x56,
    RXB0CTRL = 0x60,
    RXB0SIDH = 0x61,
    RXB0SIDL = 0x62,
    RXB0EID8 = 0x63,
    RXB0EID0 = 0x64,
    RXB0DLC = 0x65,
    RXB0DATA = 0x66,
    RXB1CTRL = 0x70,
    RXB1SIDH = 0x71,
    RXB1SIDL = 0x72,
    RXB1EID8 = 0x73,
    RXB1EID0 = 0x74,
    RXB1DLC = 0x75,
    RXB1DATA = 0x76,
}

impl Register {
    /// Whether the BIT MODIFY instruction works on this register. On any other
    /// register the chip treats the mask as `0xFF`.
    pub const fn supports_bit_modify(self) -> bool {
        matches!(
            self,
            Register::BFPCTRL
                | Register::TXRTSCTRL
                | Register::CANCTRL
                | Register::CNF3
                | Register::CNF2
                | Register::CNF1
                | Register::CANINTE
                | Register::CANINTF
                | Register::EFLG
                | Register::TXB0CTRL
                | Register::TXB1CTRL
                | Register::TXB2CTRL
                | Register::RXB0CTRL
                | Register::RXB1CTRL
        )
    }
}

/// A single-byte register layout.
pub trait RegBits: Copy {
    /// Bits the datasheet marks as unimplemented or reserved. They are masked
    /// out of every read and never set by a write.
    const RESERVED: u8;

    fn from_raw(raw: u8) -> Self;

    fn into_raw(self) -> u8;

    /// Decode a byte read from the chip.
    #[inline]
    fn read(byte: u8) -> Self {
        Self::from_raw(byte & !Self::RESERVED)
    }

    /// Encode the register for writing to the chip.
    #[inline]
    fn write(self) -> u8 {
        self.into_raw() & !Self::RESERVED
    }
}

/// A register layout that lives at exactly one address.
pub trait Reg: RegBits {
    const ADDRESS: Register;
}

/// Marker trait implemented on registers which are modifiable.
pub trait BitModifiable: Reg {}

#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CanCtrl {
    /// CLKOUT prescaler.
    pub clkpre: ClkPre,
    /// CLKOUT pin enable.
    pub clken: bool,
    /// One-shot mode: no retransmission after a lost arbitration or error.
    pub osm: bool,
    /// Abort all pending transmissions.
    pub abat: bool,
    /// Requested operation mode, see `CanStat::opmod` for the current one.
    pub reqop: OpMode,
}

impl CanCtrl {
    /// Mask to modify the `reqop` bits.
    pub const MASK_REQOP: Self = Self::from_bytes([0b1110_0000]);
    /// Mask to modify the `clken` bit.
    pub const MASK_CLKEN: Self = Self::from_bytes([0b0000_0100]);
}

impl BitModifiable for CanCtrl {}

#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CanStat {
    #[skip]
    __: B1,
    #[skip(setters)]
    pub icod: IntFlagCode,
    #[skip]
    __: B1,
    #[skip(setters)]
    pub opmod: OpMode,
}

#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Cnf1 {
    pub brp: B6,
    pub sjw: SyncJumpWidth,
}

#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Cnf2 {
    pub prseg: B3,
    pub phseg1: B3,
    pub sam: bool,
    pub btlmode: bool,
}

#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Cnf3 {
    pub phseg2: B3,
    #[skip]
    __: B3,
    pub wakfil: bool,
    pub sof: bool,
}

impl Cnf3 {
    pub const MASK_SOF: Self = Self::from_bytes([0b1000_0000]);
}

impl BitModifiable for Cnf3 {}

#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Rxb0Ctrl {
    /// Filter hit: RXF1 when set, RXF0 otherwise.
    #[skip(setters)]
    pub filhit0: bool,
    /// Read-Only copy of BUKT bit (used internally by MCP2515).
    #[skip(setters)]
    pub bukt1: bool,
    /// Rollover enable.
    pub bukt: bool,
    /// Received remote transfer request.
    #[skip(setters)]
    pub rxrtr: bool,
    #[skip]
    __: B1,
    /// Receive buffer operating mode.
    pub rxm: RecvBufOpMode,
    #[skip]
    __: B1,
}

impl Rxb0Ctrl {
    pub const MASK_RXM: Self = Self::from_bytes([0b0110_0000]);
    pub const MASK_BUKT: Self = Self::from_bytes([0b0000_0100]);
}

impl BitModifiable for Rxb0Ctrl {}

#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Rxb1Ctrl {
    /// Filter hit. Values 0 and 1 are only reported for frames that rolled
    /// over from RXB0.
    #[skip(setters)]
    pub filhit: B3,
    /// Received remote transfer request.
    #[skip(setters)]
    pub rxrtr: bool,
    #[skip]
    __: B1,
    /// Received buffer operating mode.
    pub rxm: RecvBufOpMode,
    #[skip]
    __: B1,
}

impl Rxb1Ctrl {
    pub const MASK_RXM: Self = Self::from_bytes([0b0110_0000]);
}

impl BitModifiable for Rxb1Ctrl {}

/// `TXBnCTRL`, shared layout of the three Tx buffer control registers.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TxbCtrl {
    pub txp: TxBufPriority,
    #[skip]
    __: B1,
    pub txreq: bool,
    #[skip(setters)]
    pub txerr: bool,
    #[skip(setters)]
    pub mloa: bool,
    #[skip(setters)]
    pub abtf: bool,
    #[skip]
    __: B1,
}

impl TxbCtrl {
    pub const MASK_TXP: Self = Self::from_bytes([0b0000_0011]);
    pub const MASK_TXREQ: Self = Self::from_bytes([0b0000_1000]);
}

/// `TXBnDLC` / `RXBnDLC`, the data length code byte of a packet.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Dlc {
    /// Payload length. Values above 8 are sent as-is but only 8 bytes exist.
    pub dlc: B4,
    #[skip]
    __: B2,
    /// Remote transmission request. On reception this is only valid for
    /// extended frames.
    pub rtr: bool,
    #[skip]
    __: B1,
}

/// `SIDL` byte shared by filters, masks and buffers.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Sidl {
    /// Extended identifier bits 17:16.
    pub eid: B2,
    #[skip]
    __: B1,
    /// Extended identifier enable.
    pub exide: bool,
    /// Standard frame remote request (Rx buffers only).
    #[skip(setters)]
    pub srr: bool,
    /// Standard identifier bits 2:0.
    pub sid: B3,
}

/// Arbitration priority among Tx buffers ready at the same time.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, BitfieldSpecifier)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "ufmt", derive(ufmt::derive::uDebug))]
#[bits = 2]
pub enum TxBufPriority {
    Low,
    LowIntermediate,
    HighIntermediate,
    High,
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, BitfieldSpecifier)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "ufmt", derive(ufmt::derive::uDebug))]
#[bits = 2]
pub enum RecvBufOpMode {
    /// Receives all valid messages using either Standard or Extended
    /// Identifiers that meet filter criteria; Extended ID Filter registers,
    /// RXFnEID8:RXFnEID0, are applied to the first two bytes of data in the
    /// messages with standard IDs.
    FilterOn = 0x0,
    /// Receives only standard-identifier messages that meet filter criteria.
    StandardFilterOn = 0x1,
    /// Receives only extended-identifier messages that meet filter criteria.
    ExtendedFilterOn = 0x2,
    /// Turns masks/filters off; receives any message.
    FilterOff = 0x3,
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, BitfieldSpecifier)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "ufmt", derive(ufmt::derive::uDebug))]
#[bits = 2]
pub enum SyncJumpWidth {
    Tq1,
    Tq2,
    Tq3,
    Tq4,
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, BitfieldSpecifier)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "ufmt", derive(ufmt::derive::uDebug))]
#[bits = 3]
pub enum OpMode {
    Normal,
    Sleep,
    Loopback,
    ListenOnly,
    Configuration,
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, BitfieldSpecifier)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "ufmt", derive(ufmt::derive::uDebug))]
#[bits = 2]
pub enum ClkPre {
    Div1,
    Div2,
    Div4,
    Div8,
}

/// Highest priority interrupt pending, as reported by `CANSTAT.ICOD`.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, BitfieldSpecifier)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "ufmt", derive(ufmt::derive::uDebug))]
#[bits = 3]
pub enum IntFlagCode {
    None,
    Error,
    WakeUp,
    TXB0,
    TXB1,
    TXB2,
    RXB0,
    RXB1,
}

macro_rules! reg_bits {
    ($($s:ty => $reserved:expr),* $(,)?) => {
        $(
            impl RegBits for $s {
                const RESERVED: u8 = $reserved;

                #[inline]
                fn from_raw(raw: u8) -> Self {
                    Self::from_bytes([raw])
                }

                #[inline]
                fn into_raw(self) -> u8 {
                    self.into_bytes()[0]
                }
            }
        )*
    };
}

macro_rules! reg {
    ($($s:ty => $reg:expr),* $(,)?) => {
        $(
            impl Reg for $s {
                const ADDRESS: Register = $reg;
            }
        )*
    };
}

reg_bits! {
    CanCtrl => 0,
    CanStat => 0b0001_0001,
    Cnf1 => 0,
    Cnf2 => 0,
    Cnf3 => 0b0011_1000,
    Rxb0Ctrl => 0b1001_0000,
    Rxb1Ctrl => 0b1001_0000,
    TxbCtrl => 0b1000_0100,
    Dlc => 0b1011_0000,
    Sidl => 0b0000_0100,
}

reg! {
    CanCtrl => Register::CANCTRL,
    CanStat => Register::CANSTAT,
    Cnf1 => Register::CNF1,
    Cnf2 => Register::CNF2,
    Cnf3 => Register::CNF3,
    Rxb0Ctrl => Register::RXB0CTRL,
    Rxb1Ctrl => Register::RXB1CTRL,
}
