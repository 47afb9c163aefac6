//! Precomputed bit timings.

use crate::regs::{Cnf1, Cnf2, Cnf3, RegBits};

/// Speed the CAN bus is operating at. Timings assume a 16 MHz oscillator.
///
/// Discriminants index [`SPEED_TABLE`]; new speeds go at the end of both.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "ufmt", derive(ufmt::derive::uDebug))]
pub enum CanSpeed {
    Kbps5,
    Kbps10,
    Kbps20,
    Kbps25,
    Kbps31_25,
    Kbps33,
    Kbps40,
    Kbps50,
    Kbps80,
    Kbps83,
    Kbps95,
    Kbps100,
    Kbps125,
    Kbps200,
    Kbps250,
    Kbps500,
    Kbps666,
    Kbps1000,
}

impl CanSpeed {
    pub const ALL: [Self; 18] = [
        CanSpeed::Kbps5,
        CanSpeed::Kbps10,
        CanSpeed::Kbps20,
        CanSpeed::Kbps25,
        CanSpeed::Kbps31_25,
        CanSpeed::Kbps33,
        CanSpeed::Kbps40,
        CanSpeed::Kbps50,
        CanSpeed::Kbps80,
        CanSpeed::Kbps83,
        CanSpeed::Kbps95,
        CanSpeed::Kbps100,
        CanSpeed::Kbps125,
        CanSpeed::Kbps200,
        CanSpeed::Kbps250,
        CanSpeed::Kbps500,
        CanSpeed::Kbps666,
        CanSpeed::Kbps1000,
    ];

    /// `CNF1`..`CNF3` values for this speed.
    #[inline]
    pub fn config(self) -> &'static SpeedConfig {
        &SPEED_TABLE[self as usize]
    }
}

/// Contents of the three bit timing registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeedConfig {
    pub cnf1: u8,
    pub cnf2: u8,
    pub cnf3: u8,
}

impl SpeedConfig {
    const fn new(cnf1: u8, cnf2: u8, cnf3: u8) -> Self {
        Self { cnf1, cnf2, cnf3 }
    }

    pub fn cnf1(&self) -> Cnf1 {
        Cnf1::read(self.cnf1)
    }

    pub fn cnf2(&self) -> Cnf2 {
        Cnf2::read(self.cnf2)
    }

    pub fn cnf3(&self) -> Cnf3 {
        Cnf3::read(self.cnf3)
    }
}

/// Sourced from https://github.com/Seeed-Studio/CAN_BUS_Shield/
pub static SPEED_TABLE: [SpeedConfig; 18] = [
    SpeedConfig::new(0x3F, 0xFF, 0x87), // 5 kbps
    SpeedConfig::new(0x1F, 0xFF, 0x87), // 10 kbps
    SpeedConfig::new(0x0F, 0xFF, 0x87), // 20 kbps
    SpeedConfig::new(0x0F, 0xBA, 0x07), // 25 kbps
    SpeedConfig::new(0x0F, 0xF1, 0x85), // 31.25 kbps
    SpeedConfig::new(0x09, 0xBE, 0x07), // 33 kbps
    SpeedConfig::new(0x07, 0xFF, 0x87), // 40 kbps
    SpeedConfig::new(0x07, 0xFA, 0x87), // 50 kbps
    SpeedConfig::new(0x03, 0xFF, 0x87), // 80 kbps
    SpeedConfig::new(0x03, 0xBE, 0x07), // 83 kbps
    SpeedConfig::new(0x03, 0xAD, 0x07), // 95 kbps
    SpeedConfig::new(0x03, 0xFA, 0x87), // 100 kbps
    SpeedConfig::new(0x03, 0xF0, 0x86), // 125 kbps
    SpeedConfig::new(0x01, 0xFA, 0x87), // 200 kbps
    SpeedConfig::new(0x41, 0xF1, 0x85), // 250 kbps
    SpeedConfig::new(0x00, 0xF0, 0x86), // 500 kbps
    SpeedConfig::new(0x00, 0xA0, 0x04), // 666 kbps
    SpeedConfig::new(0x00, 0xD0, 0x82), // 1000 kbps
];
