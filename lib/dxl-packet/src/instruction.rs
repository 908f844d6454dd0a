// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Decoding raw packets into typed instructions.
//!
//! The sync and bulk instructions can carry data for hundreds of devices in
//! one frame, so their argument records keep the raw payload in place and
//! hand out per-device views on demand. Group boundaries are validated once,
//! at decode time; the accessors afterwards only ever walk known-good
//! layouts.

use crate::{
    DeviceId, InstructionKind, Packet, StatusError, MAX_PACKET_DATA_LEN,
};
use heapless::Vec;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DecodeError {
    /// The payload length does not match the instruction's layout.
    InvalidPacketLen,
    /// A payload field holds a value outside its legal set.
    InvalidArgument,
    /// The instruction byte is not one the protocol defines.
    UnknownInstruction,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadArgs {
    pub device_id: DeviceId,
    pub start_addr: u16,
    pub len: u16,
}

#[derive(Clone, Debug, PartialEq)]
pub struct WriteArgs {
    pub device_id: DeviceId,
    pub start_addr: u16,
    pub data: Vec<u8, MAX_PACKET_DATA_LEN>,
}

/// What a factory reset leaves untouched.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FactoryResetScope {
    All,
    ExceptId,
    ExceptIdAndBaudRate,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StatusArgs {
    pub device_id: DeviceId,
    pub error: StatusError,
    pub data: Vec<u8, MAX_PACKET_DATA_LEN>,
}

/// A read of `[start_addr, start_addr + len)` from every listed device; each
/// device answers with its own status reply.
#[derive(Clone, Debug, PartialEq)]
pub struct SyncReadArgs {
    pub start_addr: u16,
    pub len: u16,
    ids: Vec<u8, MAX_PACKET_DATA_LEN>,
}

impl SyncReadArgs {
    pub fn devices(&self) -> impl Iterator<Item = DeviceId> + '_ {
        self.ids.iter().map(|&id| DeviceId::new(id))
    }

    pub fn contains(&self, device_id: DeviceId) -> bool {
        self.ids.contains(&device_id.as_byte())
    }
}

/// A write of `len` bytes at `start_addr` to every listed device. The wire
/// interleaves ids and data (`id, bytes[len], id, bytes[len], ...`); the
/// record keeps that region verbatim.
#[derive(Clone, Debug, PartialEq)]
pub struct SyncWriteArgs {
    pub start_addr: u16,
    pub len: u16,
    entries: Vec<u8, MAX_PACKET_DATA_LEN>,
}

impl SyncWriteArgs {
    fn stride(&self) -> usize {
        1 + self.len as usize
    }

    pub fn devices(&self) -> impl Iterator<Item = DeviceId> + '_ {
        self.entries
            .chunks_exact(self.stride())
            .map(|entry| DeviceId::new(entry[0]))
    }

    /// The bytes destined for `device_id`, if it is among the recipients.
    pub fn data_for(&self, device_id: DeviceId) -> Option<&[u8]> {
        self.entries
            .chunks_exact(self.stride())
            .find(|entry| entry[0] == device_id.as_byte())
            .map(|entry| &entry[1..])
    }
}

/// One `(id, start_addr, len)` group of a bulk read.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ReadEntry {
    pub device_id: DeviceId,
    pub start_addr: u16,
    pub len: u16,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BulkReadArgs {
    entries: Vec<u8, MAX_PACKET_DATA_LEN>,
}

const BULK_READ_ENTRY_LEN: usize = 5;

impl BulkReadArgs {
    pub fn reads(&self) -> impl Iterator<Item = ReadEntry> + '_ {
        self.entries
            .chunks_exact(BULK_READ_ENTRY_LEN)
            .map(|entry| ReadEntry {
                device_id: DeviceId::new(entry[0]),
                start_addr: u16::from_le_bytes([entry[1], entry[2]]),
                len: u16::from_le_bytes([entry[3], entry[4]]),
            })
    }

    pub fn read_for(&self, device_id: DeviceId) -> Option<ReadEntry> {
        self.reads().find(|entry| entry.device_id == device_id)
    }
}

/// One `(id, start_addr, data)` group of a bulk write, borrowed from the
/// request payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct WriteEntry<'a> {
    pub device_id: DeviceId,
    pub start_addr: u16,
    pub data: &'a [u8],
}

#[derive(Clone, Debug, PartialEq)]
pub struct BulkWriteArgs {
    entries: Vec<u8, MAX_PACKET_DATA_LEN>,
}

impl BulkWriteArgs {
    pub fn writes(&self) -> BulkWriteIter<'_> {
        BulkWriteIter {
            entries: &self.entries,
        }
    }

    pub fn write_for(&self, device_id: DeviceId) -> Option<WriteEntry<'_>> {
        self.writes().find(|entry| entry.device_id == device_id)
    }
}

pub struct BulkWriteIter<'a> {
    entries: &'a [u8],
}

impl<'a> Iterator for BulkWriteIter<'a> {
    type Item = WriteEntry<'a>;

    fn next(&mut self) -> Option<WriteEntry<'a>> {
        // group layout was validated at decode time
        if self.entries.is_empty() {
            return None;
        }

        let len = u16::from_le_bytes([self.entries[3], self.entries[4]]);
        let (entry, rest) = self.entries.split_at(5 + len as usize);
        self.entries = rest;

        Some(WriteEntry {
            device_id: DeviceId::new(entry[0]),
            start_addr: u16::from_le_bytes([entry[1], entry[2]]),
            data: &entry[5..],
        })
    }
}

/// A decoded instruction or status packet.
#[derive(Clone, Debug, PartialEq)]
pub enum Instruction {
    Ping { device_id: DeviceId },
    Read(ReadArgs),
    Write(WriteArgs),
    RegWrite(WriteArgs),
    Action { device_id: DeviceId },
    FactoryReset { device_id: DeviceId, scope: FactoryResetScope },
    Reboot { device_id: DeviceId },
    Clear { device_id: DeviceId },
    Status(StatusArgs),
    SyncRead(SyncReadArgs),
    SyncWrite(SyncWriteArgs),
    BulkRead(BulkReadArgs),
    BulkWrite(BulkWriteArgs),
}

impl Instruction {
    pub fn kind(&self) -> InstructionKind {
        match self {
            Self::Ping { .. } => InstructionKind::Ping,
            Self::Read(_) => InstructionKind::Read,
            Self::Write(_) => InstructionKind::Write,
            Self::RegWrite(_) => InstructionKind::RegWrite,
            Self::Action { .. } => InstructionKind::Action,
            Self::FactoryReset { .. } => InstructionKind::FactoryReset,
            Self::Reboot { .. } => InstructionKind::Reboot,
            Self::Clear { .. } => InstructionKind::Clear,
            Self::Status(_) => InstructionKind::Status,
            Self::SyncRead(_) => InstructionKind::SyncRead,
            Self::SyncWrite(_) => InstructionKind::SyncWrite,
            Self::BulkRead(_) => InstructionKind::BulkRead,
            Self::BulkWrite(_) => InstructionKind::BulkWrite,
        }
    }

    /// Decodes a parsed packet. `packet.data` must hold exactly the frame's
    /// payload, as produced by the parser.
    pub fn decode(packet: &Packet) -> Result<Self, DecodeError> {
        let kind = InstructionKind::from_byte(packet.instruction)
            .ok_or(DecodeError::UnknownInstruction)?;
        let data = &packet.data;

        match kind {
            InstructionKind::Ping => {
                require_len(data, 0)?;
                Ok(Self::Ping {
                    device_id: packet.device_id,
                })
            }
            InstructionKind::Read => {
                require_len(data, 4)?;
                Ok(Self::Read(ReadArgs {
                    device_id: packet.device_id,
                    start_addr: le16(&data[0..2]),
                    len: le16(&data[2..4]),
                }))
            }
            InstructionKind::Write | InstructionKind::RegWrite => {
                if data.len() < 2 {
                    return Err(DecodeError::InvalidPacketLen);
                }

                let args = WriteArgs {
                    device_id: packet.device_id,
                    start_addr: le16(&data[0..2]),
                    data: Vec::from_slice(&data[2..])
                        .map_err(|()| DecodeError::InvalidPacketLen)?,
                };

                Ok(match kind {
                    InstructionKind::Write => Self::Write(args),
                    _ => Self::RegWrite(args),
                })
            }
            InstructionKind::Action => {
                require_len(data, 0)?;
                Ok(Self::Action {
                    device_id: packet.device_id,
                })
            }
            InstructionKind::FactoryReset => {
                require_len(data, 1)?;

                let scope = match data[0] {
                    0xff => FactoryResetScope::All,
                    0x01 => FactoryResetScope::ExceptId,
                    0x02 => FactoryResetScope::ExceptIdAndBaudRate,
                    _ => return Err(DecodeError::InvalidArgument),
                };

                Ok(Self::FactoryReset {
                    device_id: packet.device_id,
                    scope,
                })
            }
            InstructionKind::Reboot => {
                require_len(data, 0)?;
                Ok(Self::Reboot {
                    device_id: packet.device_id,
                })
            }
            InstructionKind::Clear => {
                require_len(data, 0)?;
                Ok(Self::Clear {
                    device_id: packet.device_id,
                })
            }
            InstructionKind::Status => Ok(Self::Status(StatusArgs {
                device_id: packet.device_id,
                error: packet.error,
                data: data.clone(),
            })),
            InstructionKind::SyncRead => {
                if data.len() < 4 {
                    return Err(DecodeError::InvalidPacketLen);
                }

                Ok(Self::SyncRead(SyncReadArgs {
                    start_addr: le16(&data[0..2]),
                    len: le16(&data[2..4]),
                    ids: Vec::from_slice(&data[4..])
                        .map_err(|()| DecodeError::InvalidPacketLen)?,
                }))
            }
            InstructionKind::SyncWrite => {
                if data.len() < 4 {
                    return Err(DecodeError::InvalidPacketLen);
                }

                let len = le16(&data[2..4]);
                let stride = 1 + len as usize;
                if (data.len() - 4) % stride != 0 {
                    return Err(DecodeError::InvalidPacketLen);
                }

                Ok(Self::SyncWrite(SyncWriteArgs {
                    start_addr: le16(&data[0..2]),
                    len,
                    entries: Vec::from_slice(&data[4..])
                        .map_err(|()| DecodeError::InvalidPacketLen)?,
                }))
            }
            InstructionKind::BulkRead => {
                if data.len() % BULK_READ_ENTRY_LEN != 0 {
                    return Err(DecodeError::InvalidPacketLen);
                }

                Ok(Self::BulkRead(BulkReadArgs {
                    entries: Vec::from_slice(data)
                        .map_err(|()| DecodeError::InvalidPacketLen)?,
                }))
            }
            InstructionKind::BulkWrite => {
                // every group must be complete: 5 fixed bytes plus its own
                // advertised data length
                let mut offset = 0;
                while offset < data.len() {
                    if data.len() - offset < 5 {
                        return Err(DecodeError::InvalidPacketLen);
                    }

                    let len = le16(&data[offset + 3..offset + 5]) as usize;
                    offset += 5 + len;
                }

                if offset != data.len() {
                    return Err(DecodeError::InvalidPacketLen);
                }

                Ok(Self::BulkWrite(BulkWriteArgs {
                    entries: Vec::from_slice(data)
                        .map_err(|()| DecodeError::InvalidPacketLen)?,
                }))
            }
        }
    }
}

fn require_len(data: &[u8], len: usize) -> Result<(), DecodeError> {
    if data.len() == len {
        Ok(())
    } else {
        Err(DecodeError::InvalidPacketLen)
    }
}

fn le16(bytes: &[u8]) -> u16 {
    u16::from_le_bytes([bytes[0], bytes[1]])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet(instruction: InstructionKind, data: &[u8]) -> Packet {
        Packet {
            device_id: DeviceId::new(1),
            instruction: instruction as u8,
            error: StatusError::default(),
            data: Vec::from_slice(data).unwrap(),
        }
    }

    #[test]
    fn ping() {
        let decoded = Instruction::decode(&packet(InstructionKind::Ping, &[]));
        assert_eq!(
            decoded,
            Ok(Instruction::Ping {
                device_id: DeviceId::new(1)
            })
        );

        let decoded =
            Instruction::decode(&packet(InstructionKind::Ping, &[0x00]));
        assert_eq!(decoded, Err(DecodeError::InvalidPacketLen));
    }

    #[test]
    fn read() {
        let decoded = Instruction::decode(&packet(
            InstructionKind::Read,
            &[0x84, 0x00, 0x04, 0x00],
        ));
        assert_eq!(
            decoded,
            Ok(Instruction::Read(ReadArgs {
                device_id: DeviceId::new(1),
                start_addr: 0x0084,
                len: 4,
            }))
        );

        let decoded = Instruction::decode(&packet(
            InstructionKind::Read,
            &[0x84, 0x00, 0x04],
        ));
        assert_eq!(decoded, Err(DecodeError::InvalidPacketLen));
    }

    #[test]
    fn write() {
        let decoded = Instruction::decode(&packet(
            InstructionKind::Write,
            &[0x74, 0x00, 0x00, 0x02, 0x00, 0x00],
        ));

        let Ok(Instruction::Write(args)) = decoded else {
            panic!("expected write, got {decoded:?}");
        };
        assert_eq!(args.device_id, DeviceId::new(1));
        assert_eq!(args.start_addr, 0x0074);
        assert_eq!(&args.data[..], [0x00, 0x02, 0x00, 0x00]);

        let decoded =
            Instruction::decode(&packet(InstructionKind::Write, &[0x74]));
        assert_eq!(decoded, Err(DecodeError::InvalidPacketLen));
    }

    #[test]
    fn factory_reset() {
        for (byte, scope) in [
            (0xff, FactoryResetScope::All),
            (0x01, FactoryResetScope::ExceptId),
            (0x02, FactoryResetScope::ExceptIdAndBaudRate),
        ] {
            let decoded = Instruction::decode(&packet(
                InstructionKind::FactoryReset,
                &[byte],
            ));
            assert_eq!(
                decoded,
                Ok(Instruction::FactoryReset {
                    device_id: DeviceId::new(1),
                    scope,
                })
            );
        }

        let decoded =
            Instruction::decode(&packet(InstructionKind::FactoryReset, &[0x03]));
        assert_eq!(decoded, Err(DecodeError::InvalidArgument));
    }

    #[test]
    fn status_preserves_raw_data() {
        let mut raw = packet(InstructionKind::Status, &[0xa6, 0x00]);
        raw.error = StatusError::new(0x40);

        let Ok(Instruction::Status(args)) = Instruction::decode(&raw) else {
            panic!("expected status");
        };
        assert_eq!(args.device_id, DeviceId::new(1));
        assert_eq!(args.error, StatusError::new(0x40));
        assert_eq!(&args.data[..], [0xa6, 0x00]);
    }

    #[test]
    fn sync_read() {
        let decoded = Instruction::decode(&packet(
            InstructionKind::SyncRead,
            &[0x84, 0x00, 0x04, 0x00, 0x01, 0x03, 0x07],
        ));

        let Ok(Instruction::SyncRead(args)) = decoded else {
            panic!("expected sync read, got {decoded:?}");
        };
        assert_eq!(args.start_addr, 0x0084);
        assert_eq!(args.len, 4);
        assert_eq!(args.devices().count(), 3);
        assert!(args.contains(DeviceId::new(3)));
        assert!(!args.contains(DeviceId::new(4)));

        let decoded = Instruction::decode(&packet(
            InstructionKind::SyncRead,
            &[0x84, 0x00],
        ));
        assert_eq!(decoded, Err(DecodeError::InvalidPacketLen));
    }

    #[test]
    fn sync_write() {
        let decoded = Instruction::decode(&packet(
            InstructionKind::SyncWrite,
            &[
                0x74, 0x00, 0x02, 0x00, // addr 0x74, len 2
                0x01, 0xaa, 0xbb, // device 1
                0x03, 0xcc, 0xdd, // device 3
            ],
        ));

        let Ok(Instruction::SyncWrite(args)) = decoded else {
            panic!("expected sync write, got {decoded:?}");
        };
        assert_eq!(args.start_addr, 0x0074);
        assert_eq!(args.len, 2);
        assert_eq!(
            args.devices().collect::<std::vec::Vec<_>>(),
            [DeviceId::new(1), DeviceId::new(3)]
        );
        assert_eq!(args.data_for(DeviceId::new(1)), Some(&[0xaa, 0xbb][..]));
        assert_eq!(args.data_for(DeviceId::new(3)), Some(&[0xcc, 0xdd][..]));
        assert_eq!(args.data_for(DeviceId::new(2)), None);

        // a truncated final group
        let decoded = Instruction::decode(&packet(
            InstructionKind::SyncWrite,
            &[0x74, 0x00, 0x02, 0x00, 0x01, 0xaa, 0xbb, 0x03, 0xcc],
        ));
        assert_eq!(decoded, Err(DecodeError::InvalidPacketLen));
    }

    #[test]
    fn bulk_read() {
        let decoded = Instruction::decode(&packet(
            InstructionKind::BulkRead,
            &[
                0x01, 0x84, 0x00, 0x04, 0x00, // device 1: addr 0x84, len 4
                0x03, 0x90, 0x00, 0x02, 0x00, // device 3: addr 0x90, len 2
            ],
        ));

        let Ok(Instruction::BulkRead(args)) = decoded else {
            panic!("expected bulk read, got {decoded:?}");
        };
        assert_eq!(
            args.read_for(DeviceId::new(3)),
            Some(ReadEntry {
                device_id: DeviceId::new(3),
                start_addr: 0x0090,
                len: 2,
            })
        );
        assert_eq!(args.read_for(DeviceId::new(2)), None);

        let decoded = Instruction::decode(&packet(
            InstructionKind::BulkRead,
            &[0x01, 0x84, 0x00, 0x04],
        ));
        assert_eq!(decoded, Err(DecodeError::InvalidPacketLen));
    }

    #[test]
    fn bulk_write() {
        let decoded = Instruction::decode(&packet(
            InstructionKind::BulkWrite,
            &[
                0x01, 0x74, 0x00, 0x02, 0x00, 0xaa, 0xbb, // device 1
                0x03, 0x40, 0x00, 0x01, 0x00, 0xcc, // device 3
            ],
        ));

        let Ok(Instruction::BulkWrite(args)) = decoded else {
            panic!("expected bulk write, got {decoded:?}");
        };

        let entries: std::vec::Vec<_> = args.writes().collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].device_id, DeviceId::new(1));
        assert_eq!(entries[0].start_addr, 0x0074);
        assert_eq!(entries[0].data, [0xaa, 0xbb]);
        assert_eq!(entries[1].device_id, DeviceId::new(3));
        assert_eq!(entries[1].data, [0xcc]);

        assert!(args.write_for(DeviceId::new(3)).is_some());
        assert!(args.write_for(DeviceId::new(9)).is_none());

        // final group advertises more data than the payload holds
        let decoded = Instruction::decode(&packet(
            InstructionKind::BulkWrite,
            &[0x01, 0x74, 0x00, 0x05, 0x00, 0xaa, 0xbb],
        ));
        assert_eq!(decoded, Err(DecodeError::InvalidPacketLen));
    }

    #[test]
    fn unknown_instruction() {
        let mut raw = packet(InstructionKind::Ping, &[]);
        raw.instruction = 0x99;
        assert_eq!(
            Instruction::decode(&raw),
            Err(DecodeError::UnknownInstruction)
        );
    }
}
