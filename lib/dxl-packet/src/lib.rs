// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wire format for the servo bus: framing, checksums, and instruction
//! decoding.
//!
//! The bus carries byte-stuffed frames with a `FF FF FD 00` header, a 16-bit
//! length, an instruction byte, an optional error byte (status replies only),
//! a payload, and a trailing CRC-16. See
//! <http://emanual.robotis.com/docs/en/dxl/protocol2/> for the on-wire
//! reference.
//!
//! This crate is observation-only: it turns a noisy incoming byte stream into
//! [`Packet`]s (via [`Parser`]) and packets into typed [`Instruction`]s. It
//! never builds frames for transmission.

#![cfg_attr(not(test), no_std)]

mod crc;
mod instruction;
mod parser;

pub use crc::Crc16;
pub use instruction::{
    BulkReadArgs, BulkWriteArgs, DecodeError, FactoryResetScope, Instruction,
    ReadArgs, ReadEntry, StatusArgs, SyncReadArgs, SyncWriteArgs, WriteArgs,
    WriteEntry,
};
pub use parser::{ParseError, ParseStatus, Parser, Receiver};

use num_derive::FromPrimitive;

/// Upper bound on the payload carried by a single frame.
pub const MAX_PACKET_DATA_LEN: usize = 1024;

/// A 1-byte device address. `0xFE` is reserved for broadcast; a request sent
/// to it is addressed to every device on the bus, and each device answers
/// with its own id in the status reply.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct DeviceId(u8);

impl DeviceId {
    pub const BROADCAST: Self = Self(0xfe);

    /// Number of distinct id values (the id is a full byte).
    pub const NUM_VALUES: usize = 256;

    pub const fn new(id: u8) -> Self {
        Self(id)
    }

    pub const fn as_byte(self) -> u8 {
        self.0
    }

    pub fn is_broadcast(self) -> bool {
        self == Self::BROADCAST
    }
}

/// The error byte of a status reply. All-zero means success; bit 6 is the
/// device's alert flag and may accompany an otherwise successful reply.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct StatusError(u8);

impl StatusError {
    pub const fn new(code: u8) -> Self {
        Self(code)
    }

    pub const fn code(self) -> u8 {
        self.0
    }

    pub fn is_ok(self) -> bool {
        self.0 == 0
    }

    pub fn is_alert(self) -> bool {
        self.0 & 0b0100_0000 != 0
    }
}

/// The instruction byte values the protocol defines.
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive)]
#[repr(u8)]
pub enum InstructionKind {
    Ping = 0x01,
    Read = 0x02,
    Write = 0x03,
    RegWrite = 0x04,
    Action = 0x05,
    FactoryReset = 0x06,
    Reboot = 0x08,
    Clear = 0x10,
    Status = 0x55,
    SyncRead = 0x82,
    SyncWrite = 0x83,
    BulkRead = 0x92,
    BulkWrite = 0x93,
}

impl InstructionKind {
    pub fn from_byte(byte: u8) -> Option<Self> {
        num_traits::FromPrimitive::from_u8(byte)
    }
}

/// A raw frame after de-stuffing and checksum validation.
///
/// `instruction` is the raw byte from the frame; it is only interpreted when
/// the packet is decoded into an [`Instruction`]. `error` is meaningful only
/// when `instruction` is the status byte.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Packet {
    pub device_id: DeviceId,
    pub instruction: u8,
    pub error: StatusError,
    pub data: heapless::Vec<u8, MAX_PACKET_DATA_LEN>,
}

impl Packet {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for DeviceId {
    fn default() -> Self {
        Self(0)
    }
}
