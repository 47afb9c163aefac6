use embedded_hal::can::Id;

use crate::{
    id::IdRegs,
    regs::{Dlc, RegBits, Register},
    Instruction,
};

/// Maximum payload of a CAN 2.0 frame.
pub const MAX_PAYLOAD: usize = 8;

/// Identifier, DLC and payload registers of a Tx or Rx buffer, in register
/// order starting at `SIDH`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Packet {
    pub id: IdRegs,
    pub dlc: Dlc,
    pub data: [u8; MAX_PAYLOAD],
}

impl Packet {
    /// Number of registers a packet occupies.
    pub const LEN: usize = IdRegs::LEN + 1 + MAX_PAYLOAD;

    /// Builds a packet for transmission. Payloads longer than 8 bytes are
    /// truncated.
    pub fn new(id: Id, rtr: bool, payload: &[u8]) -> Self {
        let len = payload.len().min(MAX_PAYLOAD);
        let mut data = [0; MAX_PAYLOAD];
        data[..len].copy_from_slice(&payload[..len]);
        Self {
            id: IdRegs::from_id(id),
            dlc: Dlc::new().with_dlc(len as u8).with_rtr(rtr),
            data,
        }
    }

    /// Payload length, capped at 8 even if the DLC says more.
    #[inline]
    pub fn len(&self) -> usize {
        usize::from(self.dlc.dlc()).min(MAX_PAYLOAD)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.len()]
    }

    pub fn from_bytes(bytes: [u8; Self::LEN]) -> Self {
        let mut id = [0; IdRegs::LEN];
        id.copy_from_slice(&bytes[..IdRegs::LEN]);
        let mut data = [0; MAX_PAYLOAD];
        data.copy_from_slice(&bytes[IdRegs::LEN + 1..]);
        Self {
            id: IdRegs::from_bytes(id),
            dlc: Dlc::read(bytes[IdRegs::LEN]),
            data,
        }
    }

    pub fn into_bytes(self) -> [u8; Self::LEN] {
        let mut bytes = [0; Self::LEN];
        bytes[..IdRegs::LEN].copy_from_slice(&self.id.into_bytes());
        bytes[IdRegs::LEN] = self.dlc.write();
        bytes[IdRegs::LEN + 1..].copy_from_slice(&self.data);
        bytes
    }
}

crate::index_def! {
    /// Transmit buffer.
    TxBuf(ctrl) => {
        /// Tx buffer 0.
        B0 => Register::TXB0CTRL,
        /// Tx buffer 1.
        B1 => Register::TXB1CTRL,
        /// Tx buffer 2.
        B2 => Register::TXB2CTRL
    }
}

impl TxBuf {
    /// LOAD TX BUFFER instruction that starts writing at this buffer's `SIDH`.
    pub const fn load(self) -> Instruction {
        match self {
            TxBuf::B0 => Instruction::LoadTx0,
            TxBuf::B1 => Instruction::LoadTx1,
            TxBuf::B2 => Instruction::LoadTx2,
        }
    }

    /// REQUEST TO SEND instruction for this buffer.
    pub const fn rts(self) -> Instruction {
        match self {
            TxBuf::B0 => Instruction::Rts0,
            TxBuf::B1 => Instruction::Rts1,
            TxBuf::B2 => Instruction::Rts2,
        }
    }
}

crate::index_def! {
    /// Receive buffer.
    RxBuf(ctrl) => {
        /// Rx buffer 0, fed by filters 0 and 1.
        B0 => Register::RXB0CTRL,
        /// Rx buffer 1, fed by filters 2 to 5 and by rollover from buffer 0.
        B1 => Register::RXB1CTRL
    }
}

impl RxBuf {
    /// READ RX BUFFER instruction that starts reading at this buffer's `SIDH`.
    /// Ending the transaction clears the buffer's `RXnIF` flag.
    pub const fn read(self) -> Instruction {
        match self {
            RxBuf::B0 => Instruction::ReadRx0,
            RxBuf::B1 => Instruction::ReadRx1,
        }
    }
}
