// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-bus ingestion: pumping receive buffers through the parser into the
//! correlation engine.

use crate::monitor::Monitor;
use crate::recv::ReceiveBuf;
use cursor::Cursor;
use dxl_packet::{Packet, ParseStatus, Parser};

/// The receive side of one bus. Owns the resumable parser and the scratch
/// packet it parses into.
pub struct BusRx {
    bus: usize,
    parser: Parser,
    packet: Packet,
}

impl BusRx {
    pub fn new(bus: usize) -> Self {
        Self {
            bus,
            parser: Parser::new(),
            packet: Packet::new(),
        }
    }

    pub fn bus(&self) -> usize {
        self.bus
    }

    /// Drains every ready buffer half, feeding complete packets into
    /// `monitor`. Packet-level errors land in the monitor's counters; a
    /// frame cut off at the end of a half is resumed on the next drain.
    pub fn drain<const HALF: usize, const BUSES: usize>(
        &mut self,
        buf: &mut ReceiveBuf<HALF>,
        monitor: &mut Monitor<BUSES>,
        now: u64,
    ) {
        while let Some(half) = buf.take_ready() {
            let mut cursor = Cursor::new(half);

            while cursor.remaining() > 0 {
                match self.parser.parse(&mut cursor, &mut self.packet) {
                    Ok(ParseStatus::PacketAvailable) => {
                        // errors are recorded in the monitor's counters
                        let _ =
                            monitor.observe(self.bus, &self.packet, now);
                    }
                    Ok(ParseStatus::NeedMoreData) => break,
                    Err(err) => monitor.note_parse_error(err),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use control_table::Value;
    use dxl_packet::DeviceId;

    // ping reply: device 1, model 321, firmware 42
    const PING_STATUS: [u8; 14] = [
        0xff, 0xff, 0xfd, 0x00, 0x01, 0x07, 0x00, 0x55, 0x00, 0x41, 0x01,
        0x2a, 0x21, 0x46,
    ];

    fn value_at(monitor: &Monitor<1>, device_id: u8, offset: u16) -> Value {
        let device = monitor.device(DeviceId::new(device_id)).unwrap();
        let field = device
            .table
            .fields()
            .iter()
            .find(|f| f.offset == offset)
            .unwrap();
        device.table.value_of(field).unwrap()
    }

    #[test]
    fn frames_flow_from_buffer_to_tables() {
        let mut monitor = Monitor::<1>::new();
        let mut rx = BusRx::new(0);
        let mut buf = ReceiveBuf::<64>::new();

        // ping request + reply, then a read of 4 bytes at 0x0084 + reply
        let mut stream = std::vec::Vec::new();
        stream.extend_from_slice(&[
            0xff, 0xff, 0xfd, 0x00, 0x01, 0x03, 0x00, 0x01, 0x19, 0x4e,
        ]);
        stream.extend_from_slice(&PING_STATUS);
        stream.extend_from_slice(&[
            0xff, 0xff, 0xfd, 0x00, 0x01, 0x07, 0x00, 0x02, 0x84, 0x00,
            0x04, 0x00, 0x1d, 0x15,
        ]);
        stream.extend_from_slice(&[
            0xff, 0xff, 0xfd, 0x00, 0x01, 0x08, 0x00, 0x55, 0x00, 0xa6,
            0x00, 0x00, 0x00, 0x8c, 0xc0,
        ]);

        // deliver the stream split across ready halves at an awkward spot
        buf.publish_front(&stream[..17]);
        rx.drain(&mut buf, &mut monitor, 0);
        buf.publish_back(&stream[17..]);
        rx.drain(&mut buf, &mut monitor, 1);

        let device = monitor.device(DeviceId::new(1)).unwrap();
        assert_eq!(device.table.model_number(), Some(321));
        assert_eq!(value_at(&monitor, 1, 6), Value::U8(42));
        assert_eq!(value_at(&monitor, 1, 0x0084), Value::U32(0xa6));
        assert_eq!(*monitor.counters(), Default::default());
    }

    #[test]
    fn garbage_and_bad_frames_only_bump_counters() {
        let mut monitor = Monitor::<1>::new();
        let mut rx = BusRx::new(0);
        let mut buf = ReceiveBuf::<64>::new();

        // garbage, then a frame with a corrupted checksum
        buf.publish_front(&[
            0x13, 0x37, 0xff, 0xff, 0xfd, 0x00, 0x01, 0x07, 0x00, 0x02,
            0x84, 0x00, 0x04, 0x00, 0x11, 0x15,
        ]);
        rx.drain(&mut buf, &mut monitor, 0);

        assert_eq!(monitor.counters().mismatched_checksum, 1);
        assert!(monitor.device(DeviceId::new(1)).is_none());
    }
}
