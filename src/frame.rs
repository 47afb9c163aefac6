use core::fmt;

use embedded_hal::can::{Frame, Id};

use crate::{
    buffer::{Packet, RxBuf, MAX_PAYLOAD},
    id,
    stat::FilterMatch,
};

/// CAN frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanFrame {
    /// ID of CAN frame.
    pub(crate) id: Id,
    /// Whether the frame is an RTR frame.
    pub(crate) rtr: bool,
    /// Length of data in CAN frame.
    pub(crate) dlc: u8,
    /// Data, maximum 8 bytes.
    pub(crate) data: [u8; MAX_PAYLOAD],
}

impl CanFrame {
    /// Packet to load into a Tx buffer. Remote frames keep their DLC.
    pub(crate) fn to_packet(&self) -> Packet {
        Packet::new(self.id, self.rtr, &self.data[..self.dlc()])
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for CanFrame {
    fn format(&self, fmt: defmt::Formatter) {
        // [`Id`] does not implement `defmt::Format`
        let (raw, extended) = id::to_raw(self.id);
        defmt::write!(
            fmt,
            "CanFrame {{ id: {:#X}, ext: {}, rtr: {}, dlc: {}, data: {:#X} }}",
            raw,
            extended,
            self.rtr,
            self.dlc,
            self.data()
        );
    }
}

impl Frame for CanFrame {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        if data.len() > MAX_PAYLOAD {
            return None;
        }
        let mut frame = CanFrame {
            id: id.into(),
            rtr: false,
            dlc: data.len() as u8,
            data: [0; MAX_PAYLOAD],
        };
        frame.data[..data.len()].copy_from_slice(data);
        Some(frame)
    }

    fn new_remote(id: impl Into<Id>, dlc: usize) -> Option<Self> {
        if dlc > MAX_PAYLOAD {
            return None;
        }
        Some(CanFrame {
            id: id.into(),
            rtr: true,
            dlc: dlc as u8,
            data: [0; MAX_PAYLOAD],
        })
    }

    #[inline]
    fn is_extended(&self) -> bool {
        matches!(self.id, Id::Extended(_))
    }

    #[inline]
    fn is_remote_frame(&self) -> bool {
        self.rtr
    }

    #[inline]
    fn id(&self) -> Id {
        self.id
    }

    #[inline]
    fn dlc(&self) -> usize {
        self.dlc as usize
    }

    /// Remote frames carry no data, whatever their DLC.
    #[inline]
    fn data(&self) -> &[u8] {
        if self.rtr {
            &[]
        } else {
            &self.data[..self.dlc()]
        }
    }
}

/// A frame retrieved from one of the Rx buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Message {
    pub frame: CanFrame,
    /// Buffer the frame was read from.
    pub buffer: RxBuf,
    /// Filter that accepted the frame.
    pub filter: FilterMatch,
}

impl Message {
    /// Identifier as an integer.
    #[inline]
    pub fn raw_id(&self) -> u32 {
        id::to_raw(self.frame.id).0
    }

    #[inline]
    pub fn is_extended(&self) -> bool {
        self.frame.is_extended()
    }

    #[inline]
    pub fn rtr(&self) -> bool {
        self.frame.rtr
    }

    /// Payload length from the DLC, at most 8.
    #[inline]
    pub fn len(&self) -> usize {
        self.frame.dlc()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        self.frame.data()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "id: {:#x} ext: {} rtr: {} filter: {:?} len: {} payload:",
            self.raw_id(),
            self.is_extended(),
            self.rtr(),
            self.filter,
            self.len()
        )?;
        for byte in self.data() {
            write!(f, " {:02x}", byte)?;
        }
        Ok(())
    }
}
