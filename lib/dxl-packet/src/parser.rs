// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Frame extraction from the raw byte stream.
//!
//! [`Receiver`] handles the byte-level framing rules: finding the header,
//! removing stuffing bytes, and keeping the CRC up to date. [`Parser`] sits
//! on top as a resumable state machine that assembles whole [`Packet`]s; it
//! can be fed arbitrarily fragmented input and picks up exactly where the
//! previous cursor ran dry.

use crate::{Crc16, DeviceId, InstructionKind, Packet, StatusError};
use cursor::Cursor;
use static_assertions::const_assert;

const HEADER: [u8; 3] = [0xff, 0xff, 0xfd];
const HEADER_TRAILING_BYTE: u8 = 0x00;
const STUFFING_BYTE: u8 = 0xfd;

/// Byte-level receiver: header search, unstuffing, CRC accumulation.
///
/// Stuffing works on a rolling window: whenever the last three bytes on the
/// wire were `FF FF FD`, the next `FD` is a stuffing byte. It is dropped from
/// the output but still feeds the CRC, since the transmitter computed the
/// checksum over the stuffed stream.
#[derive(Default)]
pub struct Receiver {
    last_bytes: [u8; 3],
    crc: Crc16,
}

impl Receiver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes bytes until the 4-byte header sequence has passed by. On a
    /// match the CRC is reset and seeded with the header, and `true` is
    /// returned. `false` means the cursor ran dry first; calling again with
    /// more data resumes the search, including across a header split over
    /// two buffers.
    pub fn wait_for_header(&mut self, cursor: &mut Cursor<'_>) -> bool {
        while let Some(byte) = cursor.read_byte() {
            let is_header =
                byte == HEADER_TRAILING_BYTE && self.last_bytes == HEADER;
            self.push_last_byte(byte);

            if is_header {
                self.crc.reset();
                for header_byte in HEADER {
                    self.crc.update(header_byte);
                }
                self.crc.update(HEADER_TRAILING_BYTE);

                return true;
            }
        }

        false
    }

    /// Reads at most `dst.len()` bytes into `dst` and returns the number of
    /// bytes read. Bytes are counted after stuffing has been removed; all
    /// consumed bytes (stuffing included) update the CRC.
    pub fn read(&mut self, cursor: &mut Cursor<'_>, dst: &mut [u8]) -> usize {
        let mut bytes_read = 0;

        while bytes_read < dst.len() {
            let Some(byte) = cursor.read_byte() else {
                break;
            };

            if !self.is_stuffing_byte(byte) {
                dst[bytes_read] = byte;
                bytes_read += 1;
            }

            self.push_last_byte(byte);
            self.crc.update(byte);
        }

        bytes_read
    }

    /// Like [`Receiver::read`], but bounded by `raw_num_bytes` bytes *on the
    /// wire* rather than after unstuffing. Returns `(raw_bytes_read,
    /// dst_len)` where `dst_len` is the number of de-stuffed bytes written to
    /// `dst`. `dst` must hold at least `raw_num_bytes`.
    pub fn read_raw_counted(
        &mut self,
        cursor: &mut Cursor<'_>,
        dst: &mut [u8],
        raw_num_bytes: usize,
    ) -> (usize, usize) {
        let mut raw_bytes_read = 0;
        let mut dst_len = 0;

        while raw_bytes_read < raw_num_bytes {
            let Some(byte) = cursor.read_byte() else {
                break;
            };

            if !self.is_stuffing_byte(byte) {
                dst[dst_len] = byte;
                dst_len += 1;
            }

            self.push_last_byte(byte);
            self.crc.update(byte);
            raw_bytes_read += 1;
        }

        (raw_bytes_read, dst_len)
    }

    /// Reads wire bytes verbatim: no unstuffing, and no CRC update. Used
    /// only for the trailing checksum, which is excluded from both.
    pub fn read_raw(&mut self, cursor: &mut Cursor<'_>, dst: &mut [u8]) -> usize {
        let mut bytes_read = 0;

        while bytes_read < dst.len() {
            let Some(byte) = cursor.read_byte() else {
                break;
            };

            self.push_last_byte(byte);
            dst[bytes_read] = byte;
            bytes_read += 1;
        }

        bytes_read
    }

    /// Takes the accumulated CRC, resetting the engine.
    pub fn finish_crc(&mut self) -> u16 {
        self.crc.finish()
    }

    fn is_stuffing_byte(&self, byte: u8) -> bool {
        byte == STUFFING_BYTE && self.last_bytes == HEADER
    }

    fn push_last_byte(&mut self, byte: u8) {
        self.last_bytes[0] = self.last_bytes[1];
        self.last_bytes[1] = self.last_bytes[2];
        self.last_bytes[2] = byte;
    }
}

/// Successful outcomes of [`Parser::parse`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ParseStatus {
    /// The output packet is complete and valid until the next call.
    PacketAvailable,
    /// The cursor ran dry mid-frame; parser state is preserved and the call
    /// should be repeated once more data has arrived.
    NeedMoreData,
}

/// Per-frame failures of [`Parser::parse`]. Both drop only the frame at
/// hand; the parser is left hunting for the next header.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ParseError {
    /// The advertised length does not fit the packet buffer (or is shorter
    /// than the frame's fixed overhead).
    BufferOverflow,
    /// The trailing checksum does not match the received bytes.
    MismatchedChecksum,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ParserState {
    Header,
    CommonFields,
    ErrorField,
    Data,
    Checksum,
}

const COMMON_FIELDS_LEN: usize = 4;
const CHECKSUM_LEN: usize = 2;
const SCRATCH_LEN: usize = 4;

// The scratch buffer holds partial reads of the fixed-size fields.
const_assert!(COMMON_FIELDS_LEN <= SCRATCH_LEN);
const_assert!(CHECKSUM_LEN <= SCRATCH_LEN);

/// Resumable packet parser.
///
/// One `Parser` per bus; it owns the in-flight frame state (a word of state,
/// four scratch bytes, and the outstanding raw data length) so a frame split
/// across any number of buffer fills parses identically to one delivered
/// whole. Payload bytes go straight into the caller's [`Packet`].
pub struct Parser {
    // partial reads of the fixed-size fields land here; payload bytes are
    // written into the packet directly
    buf: [u8; SCRATCH_LEN],
    buf_len: usize,
    receiver: Receiver,
    state: ParserState,
    raw_remaining_data_len: usize,
}

impl Parser {
    pub fn new() -> Self {
        Self {
            buf: [0; SCRATCH_LEN],
            buf_len: 0,
            receiver: Receiver::new(),
            state: ParserState::Header,
            raw_remaining_data_len: 0,
        }
    }

    /// Advances the state machine as far as `cursor` allows.
    ///
    /// On `Ok(ParseStatus::PacketAvailable)` the packet has passed its
    /// checksum and `packet` holds the frame's fields; bytes remaining on the
    /// cursor belong to subsequent frames. Errors invalidate only the
    /// current frame.
    pub fn parse(
        &mut self,
        cursor: &mut Cursor<'_>,
        packet: &mut Packet,
    ) -> Result<ParseStatus, ParseError> {
        loop {
            match self.state {
                ParserState::Header => {
                    // the packet's contents are undefined until we report it
                    // available, so clearing here is fine
                    packet.data.clear();
                    packet.error = StatusError::default();

                    if !self.receiver.wait_for_header(cursor) {
                        return Ok(ParseStatus::NeedMoreData);
                    }

                    self.buf_len = 0;
                    self.state = ParserState::CommonFields;
                }
                ParserState::CommonFields => {
                    let dst = &mut self.buf[self.buf_len..COMMON_FIELDS_LEN];
                    self.buf_len += self.receiver.read(cursor, dst);

                    if self.buf_len < COMMON_FIELDS_LEN {
                        return Ok(ParseStatus::NeedMoreData);
                    }

                    packet.device_id = DeviceId::new(self.buf[0]);
                    packet.instruction = self.buf[3];

                    // byte stuffing can be ignored for the subtractions: the
                    // checksum is explicitly outside the stuffing range and
                    // the legal instruction and error values can never
                    // complete a header sequence
                    let advertised_len =
                        u16::from_le_bytes([self.buf[1], self.buf[2]]) as usize;
                    let overhead = 1 // instruction field
                        + usize::from(self.is_status(packet)) // error field
                        + CHECKSUM_LEN;

                    self.raw_remaining_data_len =
                        match advertised_len.checked_sub(overhead) {
                            Some(len) => len,
                            None => {
                                self.state = ParserState::Header;
                                return Err(ParseError::BufferOverflow);
                            }
                        };

                    self.buf_len = 0;
                    self.state = ParserState::ErrorField;
                }
                ParserState::ErrorField => {
                    if self.is_status(packet) {
                        let mut error = [0];
                        if self.receiver.read(cursor, &mut error) == 0 {
                            return Ok(ParseStatus::NeedMoreData);
                        }

                        packet.error = StatusError::new(error[0]);
                    }

                    self.state = ParserState::Data;
                }
                ParserState::Data => {
                    let already_read = packet.data.len();

                    // since there may be stuffing, the raw length is only an
                    // upper bound on the unstuffed data; it is close enough
                    // for reserving space
                    if packet
                        .data
                        .resize_default(
                            already_read + self.raw_remaining_data_len,
                        )
                        .is_err()
                    {
                        self.state = ParserState::Header;
                        return Err(ParseError::BufferOverflow);
                    }

                    let (raw_bytes_read, bytes_read) =
                        self.receiver.read_raw_counted(
                            cursor,
                            &mut packet.data[already_read..],
                            self.raw_remaining_data_len,
                        );

                    packet.data.truncate(already_read + bytes_read);
                    self.raw_remaining_data_len -= raw_bytes_read;

                    if self.raw_remaining_data_len > 0 {
                        return Ok(ParseStatus::NeedMoreData);
                    }

                    self.buf_len = 0;
                    self.state = ParserState::Checksum;
                }
                ParserState::Checksum => {
                    let dst = &mut self.buf[self.buf_len..CHECKSUM_LEN];
                    self.buf_len += self.receiver.read_raw(cursor, dst);

                    if self.buf_len < CHECKSUM_LEN {
                        return Ok(ParseStatus::NeedMoreData);
                    }

                    let checksum =
                        u16::from_le_bytes([self.buf[0], self.buf[1]]);
                    self.buf_len = 0;
                    self.state = ParserState::Header;

                    if checksum == self.receiver.finish_crc() {
                        return Ok(ParseStatus::PacketAvailable);
                    } else {
                        return Err(ParseError::MismatchedChecksum);
                    }
                }
            }
        }
    }

    fn is_status(&self, packet: &Packet) -> bool {
        packet.instruction == InstructionKind::Status as u8
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}
