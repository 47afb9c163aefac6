//! A simulated MCP2515 decoding the SPI instruction set byte by byte.
//!
//! [`Sim`] hands out SPI, chip-select, delay and INT pin handles that all
//! drive one shared [`Chip`].

use std::{
    cell::{RefCell, RefMut},
    convert::Infallible,
    fmt,
    rc::Rc,
    sync::{Arc, Mutex},
};

use embedded_hal::{
    blocking::{delay::DelayMs, spi::Transfer},
    can::Id,
    digital::v2::OutputPin,
};

use crate::{buffer::Packet, interrupt::EdgeInterrupt, regs::Register};

const CANSTAT: usize = Register::CANSTAT as usize;
const CANCTRL: usize = Register::CANCTRL as usize;
const CANINTE: usize = Register::CANINTE as usize;
const CANINTF: usize = Register::CANINTF as usize;
const EFLG: usize = Register::EFLG as usize;
const TXB0CTRL: usize = Register::TXB0CTRL as usize;
const RXB0CTRL: usize = Register::RXB0CTRL as usize;
const RXB1CTRL: usize = Register::RXB1CTRL as usize;
const RXM0SIDH: usize = Register::RXM0SIDH as usize;
const RXM1SIDH: usize = Register::RXM1SIDH as usize;

const FILTERS: [usize; 6] = [0x00, 0x04, 0x08, 0x10, 0x14, 0x18];

const BIT_MODIFIABLE: [usize; 14] = [
    0x0C, 0x0D, 0x0F, 0x28, 0x29, 0x2A, 0x2B, 0x2C, 0x2D, 0x30, 0x40, 0x50, 0x60, 0x70,
];

const NORMAL: u8 = 0;
const SLEEP: u8 = 1;
const LOOPBACK: u8 = 2;
const LISTEN_ONLY: u8 = 3;
const CONFIGURATION: u8 = 4;

const TXREQ: u8 = 0x08;
const ABTF: u8 = 0x40;
const WAK: u8 = 0x40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimError;

type Handler = Box<dyn FnMut() + Send>;

/// Where the INT pin handler lives.
#[derive(Clone, Default)]
pub struct IntLine(Arc<Mutex<Option<Handler>>>);

impl IntLine {
    fn fire(&self) {
        if let Some(handler) = self.0.lock().unwrap().as_mut() {
            handler();
        }
    }

    pub fn subscribed(&self) -> bool {
        self.0.lock().unwrap().is_some()
    }
}

impl fmt::Debug for IntLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntLine")
            .field("subscribed", &self.subscribed())
            .finish()
    }
}

pub struct Chip {
    regs: [u8; 0x80],
    mode: u8,
    pending_mode: Option<(u8, u32)>,
    /// Simulated milliseconds elapsed.
    pub now_ms: u32,
    /// `CANSTAT` never follows a mode request.
    pub stuck: bool,
    /// Milliseconds `CANSTAT` lags behind a mode request.
    pub defer_ms: u32,
    /// Another node acknowledges frames sent in normal mode.
    pub bus_ack: bool,
    /// Every SPI transfer fails.
    pub spi_fail: bool,
    /// MOSI bytes of each completed transaction.
    pub transactions: Vec<Vec<u8>>,
    /// Frames that left through the bus in normal mode.
    pub sent: Vec<[u8; Packet::LEN]>,
    selected: bool,
    current: Vec<u8>,
    read_rx: Option<usize>,
    /// RX STATUS filter code of the frame held by each Rx buffer.
    filter_code: [u8; 2],
    int_low: bool,
    line: IntLine,
}

impl Chip {
    fn new(line: IntLine) -> Self {
        let mut chip = Self {
            regs: [0; 0x80],
            mode: CONFIGURATION,
            pending_mode: None,
            now_ms: 0,
            stuck: false,
            defer_ms: 0,
            bus_ack: false,
            spi_fail: false,
            transactions: Vec::new(),
            sent: Vec::new(),
            selected: false,
            current: Vec::new(),
            read_rx: None,
            filter_code: [0; 2],
            int_low: false,
            line,
        };
        chip.reset();
        chip
    }

    pub fn reg(&self, reg: Register) -> u8 {
        self.read(reg as usize)
    }

    /// Sets a register bypassing the write protection of the real chip.
    pub fn set_reg(&mut self, reg: Register, value: u8) {
        self.regs[reg as usize] = value;
        self.update_int();
    }

    pub fn last_transaction(&self) -> &[u8] {
        self.transactions.last().map(Vec::as_slice).unwrap_or(&[])
    }

    /// A frame arriving from another node.
    pub fn inject(&mut self, id: Id, rtr: bool, data: &[u8]) {
        if matches!(self.mode, NORMAL | LISTEN_ONLY) {
            self.receive(Packet::new(id, rtr, data).into_bytes());
            self.update_int();
        }
    }

    fn reset(&mut self) {
        self.regs = [0; 0x80];
        self.regs[CANCTRL] = 0x87;
        self.mode = CONFIGURATION;
        self.pending_mode = None;
        self.read_rx = None;
        self.filter_code = [0; 2];
        self.update_int();
    }

    fn select(&mut self) {
        self.selected = true;
        self.current.clear();
    }

    fn deselect(&mut self) {
        if !self.selected {
            return;
        }
        self.selected = false;
        let transaction = std::mem::take(&mut self.current);
        if !transaction.is_empty() {
            self.transactions.push(transaction);
        }
        if let Some(buf) = self.read_rx.take() {
            self.regs[CANINTF] &= !(1 << buf);
        }
        self.complete_pending();
        self.update_int();
    }

    fn advance(&mut self, ms: u32) {
        self.now_ms += ms;
        if let Some((mode, at)) = self.pending_mode {
            if self.now_ms >= at {
                self.mode = mode;
                self.pending_mode = None;
            }
        }
        self.complete_pending();
        self.update_int();
    }

    /// Shifts one byte in and returns the byte shifted out.
    fn clock(&mut self, mosi: u8) -> u8 {
        let pos = self.current.len();
        self.current.push(mosi);
        let instruction = self.current[0];
        if pos == 0 {
            match instruction {
                0xC0 => self.reset(),
                0x81..=0x87 => {
                    for buf in 0..3 {
                        if instruction & (1 << buf) != 0 {
                            self.regs[TXB0CTRL + 0x10 * buf] |= TXREQ;
                        }
                    }
                }
                _ => {}
            }
            return 0;
        }

        let miso = match instruction {
            0x03 if pos >= 2 => self.read((usize::from(self.current[1]) + pos - 2) & 0x7F),
            0x02 if pos >= 2 => {
                self.write((usize::from(self.current[1]) + pos - 2) & 0x7F, mosi);
                0
            }
            0x05 if pos == 3 => {
                self.bit_modify(usize::from(self.current[1]), self.current[2], mosi);
                0
            }
            0xA0 => self.read_status(),
            0xB0 => self.rx_status(),
            0x40 | 0x42 | 0x44 => {
                let buf = usize::from((instruction - 0x40) / 2);
                if pos <= Packet::LEN {
                    self.regs[TXB0CTRL + 0x10 * buf + pos] = mosi;
                }
                0
            }
            0x90 | 0x94 => {
                let buf = usize::from((instruction >> 2) & 1);
                self.read_rx = Some(buf);
                if pos <= Packet::LEN {
                    self.regs[RXB0CTRL + 0x10 * buf + pos]
                } else {
                    0
                }
            }
            _ => 0,
        };
        self.update_int();
        miso
    }

    fn read(&self, addr: usize) -> u8 {
        if addr == CANSTAT {
            (self.mode << 5) | (self.icod() << 1)
        } else {
            self.regs[addr]
        }
    }

    fn write(&mut self, addr: usize, value: u8) {
        let old = self.regs[addr];
        match addr {
            CANSTAT => {}
            CANCTRL => {
                self.regs[addr] = value;
                self.request_mode(value >> 5);
            }
            CANINTF => {
                self.regs[addr] = value;
                if self.mode == SLEEP && value & self.regs[CANINTE] & WAK != 0 {
                    self.mode = LISTEN_ONLY;
                }
            }
            EFLG => self.regs[addr] = (old & 0x3F) | (value & 0xC0),
            0x30 | 0x40 | 0x50 => {
                let mut ctrl = (old & !0x0B) | (value & 0x0B);
                if old & TXREQ != 0 && value & TXREQ == 0 {
                    ctrl |= ABTF;
                }
                self.regs[addr] = ctrl;
            }
            RXB0CTRL => self.regs[addr] = (old & !0x64) | (value & 0x64),
            RXB1CTRL => self.regs[addr] = (old & !0x60) | (value & 0x60),
            _ => self.regs[addr] = value,
        }
    }

    fn bit_modify(&mut self, addr: usize, mask: u8, data: u8) {
        let addr = addr & 0x7F;
        let mask = if BIT_MODIFIABLE.contains(&addr) { mask } else { 0xFF };
        let value = (self.regs[addr] & !mask) | (data & mask);
        self.write(addr, value);
    }

    fn request_mode(&mut self, mode: u8) {
        if self.stuck || (self.mode == SLEEP && mode != SLEEP) {
            return;
        }
        if self.defer_ms > 0 {
            self.pending_mode = Some((mode, self.now_ms + self.defer_ms));
        } else {
            self.mode = mode;
        }
    }

    fn icod(&self) -> u8 {
        // (flag, code) from highest to lowest priority.
        const PRIORITY: [(u8, u8); 7] = [
            (0x20, 1),
            (0x40, 2),
            (0x04, 3),
            (0x08, 4),
            (0x10, 5),
            (0x01, 6),
            (0x02, 7),
        ];
        let pending = self.regs[CANINTF] & self.regs[CANINTE];
        PRIORITY
            .iter()
            .find(|&&(flag, _)| pending & flag != 0)
            .map_or(0, |&(_, code)| code)
    }

    fn read_status(&self) -> u8 {
        let intf = self.regs[CANINTF];
        let txreq = |buf: usize| (self.regs[TXB0CTRL + 0x10 * buf] & TXREQ) >> 3;
        (intf & 0x03)
            | (txreq(0) << 2)
            | (((intf >> 2) & 1) << 3)
            | (txreq(1) << 4)
            | (((intf >> 3) & 1) << 5)
            | (txreq(2) << 6)
            | (((intf >> 4) & 1) << 7)
    }

    fn rx_status(&self) -> u8 {
        let intf = self.regs[CANINTF];
        let buf = if intf & 0x01 != 0 {
            Some(0)
        } else if intf & 0x02 != 0 {
            Some(1)
        } else {
            None
        };
        let (kind, code) = buf.map_or((0, 0), |buf| {
            let ctrl = RXB0CTRL + 0x10 * buf;
            let extended = (self.regs[ctrl + 2] >> 3) & 1;
            let rtr = (self.regs[ctrl] >> 3) & 1;
            ((extended << 1) | rtr, self.filter_code[buf])
        });
        ((intf & 0x03) << 6) | (kind << 3) | code
    }

    /// Finishes every requested transmission the current mode allows.
    fn complete_pending(&mut self) {
        let sends = match self.mode {
            LOOPBACK => true,
            NORMAL => self.bus_ack,
            _ => false,
        };
        if !sends {
            return;
        }
        for buf in 0..3 {
            let ctrl = TXB0CTRL + 0x10 * buf;
            if self.regs[ctrl] & TXREQ == 0 {
                continue;
            }
            self.regs[ctrl] &= !TXREQ;
            self.regs[CANINTF] |= 0x04 << buf;
            let mut packet = [0; Packet::LEN];
            packet.copy_from_slice(&self.regs[ctrl + 1..=ctrl + Packet::LEN]);
            if self.mode == LOOPBACK {
                self.receive(packet);
            } else {
                self.sent.push(packet);
            }
        }
    }

    fn receive(&mut self, packet: [u8; Packet::LEN]) {
        let extended = packet[1] & 0x08 != 0;
        let key = if extended {
            [packet[0], packet[1], packet[2], packet[3]]
        } else {
            [packet[0], packet[1], packet[5], packet[6]]
        };

        if let Some(filter) = self.accepts(0, &key, extended) {
            if self.regs[CANINTF] & 0x01 == 0 {
                self.store(0, packet, filter, filter);
            } else if self.regs[RXB0CTRL] & 0x04 != 0 {
                if self.regs[CANINTF] & 0x02 == 0 {
                    self.store(1, packet, filter, 6 + filter);
                } else {
                    self.overflow(0x80);
                }
            } else {
                self.overflow(0x40);
            }
        } else if let Some(filter) = self.accepts(1, &key, extended) {
            if self.regs[CANINTF] & 0x02 == 0 {
                self.store(1, packet, filter, filter);
            } else {
                self.overflow(0x80);
            }
        }
    }

    /// Index of the first filter of `buf` that accepts the frame.
    fn accepts(&self, buf: usize, key: &[u8; 4], extended: bool) -> Option<u8> {
        let (ctrl, mask, filters) = if buf == 0 {
            (RXB0CTRL, RXM0SIDH, 0..2)
        } else {
            (RXB1CTRL, RXM1SIDH, 2..6)
        };
        match (self.regs[ctrl] >> 5) & 0x03 {
            3 => return Some(filters.start as u8),
            1 if extended => return None,
            2 if !extended => return None,
            _ => {}
        }
        let relevant: [u8; 4] = if extended {
            [0xFF, 0xE3, 0xFF, 0xFF]
        } else {
            [0xFF, 0xE0, 0xFF, 0xFF]
        };
        let mask = &self.regs[mask..mask + 4];
        filters
            .into_iter()
            .find(|&filter| {
                let regs = &self.regs[FILTERS[filter]..FILTERS[filter] + 4];
                let filter_extended = regs[1] & 0x08 != 0;
                filter_extended == extended
                    && (0..4).all(|i| (regs[i] ^ key[i]) & mask[i] & relevant[i] == 0)
            })
            .map(|filter| filter as u8)
    }

    fn store(&mut self, buf: usize, mut packet: [u8; Packet::LEN], filhit: u8, code: u8) {
        let ctrl = RXB0CTRL + 0x10 * buf;
        let extended = packet[1] & 0x08 != 0;
        let rtr = packet[4] & 0x40 != 0;
        if !extended {
            // Standard remote frames report through SRR and RXRTR only.
            packet[4] &= !0x40;
            if rtr {
                packet[1] |= 0x10;
            }
        }
        self.regs[ctrl + 1..=ctrl + Packet::LEN].copy_from_slice(&packet);

        let mut value = if buf == 0 {
            let kept = self.regs[ctrl] & 0x64;
            kept | (filhit & 0x01) | ((kept & 0x04) >> 1)
        } else {
            (self.regs[ctrl] & 0x60) | (filhit & 0x07)
        };
        if rtr {
            value |= 0x08;
        }
        self.regs[ctrl] = value;
        self.filter_code[buf] = code;
        self.regs[CANINTF] |= 1 << buf;
    }

    fn overflow(&mut self, flag: u8) {
        self.regs[EFLG] |= flag;
        self.regs[CANINTF] |= 0x20;
    }

    /// INT is active low while any enabled flag is raised.
    fn update_int(&mut self) {
        let low = self.regs[CANINTF] & self.regs[CANINTE] != 0;
        if low && !self.int_low {
            self.line.fire();
        }
        self.int_low = low;
    }
}

/// Owner of a simulated chip.
#[derive(Clone)]
pub struct Sim {
    chip: Rc<RefCell<Chip>>,
    line: IntLine,
}

impl Sim {
    pub fn new() -> Self {
        let line = IntLine::default();
        Self {
            chip: Rc::new(RefCell::new(Chip::new(line.clone()))),
            line,
        }
    }

    pub fn chip(&self) -> RefMut<'_, Chip> {
        self.chip.borrow_mut()
    }

    pub fn now(&self) -> u32 {
        self.chip.borrow().now_ms
    }

    pub fn line(&self) -> &IntLine {
        &self.line
    }

    pub fn spi(&self) -> SimSpi {
        SimSpi(self.chip.clone())
    }

    pub fn cs(&self) -> SimCs {
        SimCs(self.chip.clone())
    }

    pub fn delay(&self) -> SimDelay {
        SimDelay(self.chip.clone())
    }

    pub fn int_pin(&self) -> SimIntPin {
        SimIntPin {
            line: self.line.clone(),
            refuse: false,
            pinned: false,
        }
    }
}

pub struct SimSpi(Rc<RefCell<Chip>>);

impl Transfer<u8> for SimSpi {
    type Error = SimError;

    fn transfer<'w>(&mut self, words: &'w mut [u8]) -> Result<&'w [u8], SimError> {
        let mut chip = self.0.borrow_mut();
        if chip.spi_fail {
            return Err(SimError);
        }
        assert!(chip.selected, "SPI transfer without chip select");
        for word in words.iter_mut() {
            *word = chip.clock(*word);
        }
        Ok(words)
    }
}

pub struct SimCs(Rc<RefCell<Chip>>);

impl OutputPin for SimCs {
    type Error = Infallible;

    fn set_low(&mut self) -> Result<(), Infallible> {
        self.0.borrow_mut().select();
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.0.borrow_mut().deselect();
        Ok(())
    }
}

pub struct SimDelay(Rc<RefCell<Chip>>);

impl DelayMs<u8> for SimDelay {
    fn delay_ms(&mut self, ms: u8) {
        self.0.borrow_mut().advance(u32::from(ms));
    }
}

#[derive(Debug)]
pub struct SimIntPin {
    line: IntLine,
    /// Reject every subscribe and unsubscribe.
    pub refuse: bool,
    /// Reject unsubscribe only.
    pub pinned: bool,
}

impl EdgeInterrupt for SimIntPin {
    type Error = SimError;

    fn subscribe_falling<F>(&mut self, handler: F) -> Result<(), SimError>
    where
        F: FnMut() + Send + 'static,
    {
        if self.refuse {
            return Err(SimError);
        }
        *self.line.0.lock().unwrap() = Some(Box::new(handler));
        Ok(())
    }

    fn unsubscribe(&mut self) -> Result<(), SimError> {
        if self.refuse || self.pinned {
            return Err(SimError);
        }
        *self.line.0.lock().unwrap() = None;
        Ok(())
    }
}
