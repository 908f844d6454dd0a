// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The correlation engine.
//!
//! The bus is half-duplex with at most one request in flight at a time, so
//! observing it means pairing each status reply with the most recent
//! non-status instruction on that bus and deriving which bytes of which
//! device's control table the exchange read or wrote.
//!
//! All timestamps are injected by the caller (milliseconds from the system
//! tick), which keeps this crate platform-independent and host-testable.

use control_table::ControlTable;
use devid_map::DeviceIdMap;
use dxl_packet::{
    DecodeError, DeviceId, Instruction, Packet, ParseError, StatusArgs,
};

/// How long a device may stay silent before it is flagged disconnected.
pub const DEFAULT_DISCONNECT_TIMEOUT_MS: u64 = 2_000;

/// Everything the engine can reject a packet for. All of these are local to
/// the offending packet: the engine's tables are left untouched and the
/// matching counter is incremented.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CommError {
    /// The packet's payload did not decode as its instruction.
    Decode(DecodeError),
    /// A status arrived with no request pending on the bus.
    OrphanStatus,
    /// The status responder is not in the pending request's recipient set
    /// (or a status carried the broadcast id).
    InvalidDeviceId,
    /// The status payload length does not fit the pending request.
    InvalidPacketLen,
    /// The exchange targets addresses outside the device's modeled memory.
    InvalidWrite,
    /// The device reported an error; its data is not applied.
    StatusHasError,
    /// The pending request slot held a status packet.
    InstructionIsStatus,
    /// A non-status packet was handed to status correlation.
    StatusIsInstruction,
}

impl From<DecodeError> for CommError {
    fn from(err: DecodeError) -> Self {
        Self::Decode(err)
    }
}

/// Per-error-kind counters, feeding the diagnostics view.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Counters {
    pub decode: u32,
    pub orphan_status: u32,
    pub invalid_device_id: u32,
    pub invalid_packet_len: u32,
    pub invalid_write: u32,
    pub status_has_error: u32,
    pub instruction_is_status: u32,
    pub status_is_instruction: u32,
    pub buffer_overflow: u32,
    pub mismatched_checksum: u32,
}

impl Counters {
    fn record(&mut self, err: CommError) {
        let counter = match err {
            CommError::Decode(_) => &mut self.decode,
            CommError::OrphanStatus => &mut self.orphan_status,
            CommError::InvalidDeviceId => &mut self.invalid_device_id,
            CommError::InvalidPacketLen => &mut self.invalid_packet_len,
            CommError::InvalidWrite => &mut self.invalid_write,
            CommError::StatusHasError => &mut self.status_has_error,
            CommError::InstructionIsStatus => {
                &mut self.instruction_is_status
            }
            CommError::StatusIsInstruction => {
                &mut self.status_is_instruction
            }
        };
        *counter = counter.wrapping_add(1);
    }

    fn record_parse(&mut self, err: ParseError) {
        let counter = match err {
            ParseError::BufferOverflow => &mut self.buffer_overflow,
            ParseError::MismatchedChecksum => &mut self.mismatched_checksum,
        };
        *counter = counter.wrapping_add(1);
    }
}

/// One tracked device: its reconstructed table plus liveness bookkeeping.
pub struct Device {
    pub table: ControlTable,
    pub last_seen: u64,
    pub is_disconnected: bool,
}

impl Device {
    fn new(table: ControlTable, now: u64) -> Self {
        Self {
            table,
            last_seen: now,
            is_disconnected: false,
        }
    }

    fn mark_seen(&mut self, now: u64) {
        self.last_seen = now;
        self.is_disconnected = false;
    }
}

static DISCONNECTED: ControlTable = ControlTable::Disconnected;

/// The engine: a device map shared by all buses, plus one pending-request
/// slot per bus.
pub struct Monitor<const BUSES: usize> {
    devices: DeviceIdMap<Device>,
    pending: [Option<Instruction>; BUSES],
    counters: Counters,
    disconnect_timeout: u64,
}

impl<const BUSES: usize> Monitor<BUSES> {
    pub fn new() -> Self {
        Self::with_disconnect_timeout(DEFAULT_DISCONNECT_TIMEOUT_MS)
    }

    pub fn with_disconnect_timeout(timeout_ms: u64) -> Self {
        Self {
            devices: DeviceIdMap::new(),
            pending: [const { None }; BUSES],
            counters: Counters::default(),
            disconnect_timeout: timeout_ms,
        }
    }

    /// Feeds one parsed packet from `bus` into the engine.
    ///
    /// Instructions become the bus's pending request; status packets are
    /// correlated against it. Errors are counted and leave all tables
    /// unchanged.
    pub fn observe(
        &mut self,
        bus: usize,
        packet: &Packet,
        now: u64,
    ) -> Result<(), CommError> {
        let result = self.observe_inner(bus, packet, now);
        if let Err(err) = result {
            self.counters.record(err);
        }
        result
    }

    fn observe_inner(
        &mut self,
        bus: usize,
        packet: &Packet,
        now: u64,
    ) -> Result<(), CommError> {
        let instruction = Instruction::decode(packet)?;

        if let Instruction::Status(status) = &instruction {
            let request = self.pending[bus]
                .as_ref()
                .ok_or(CommError::OrphanStatus)?;

            apply_status(&mut self.devices, request, status, now)
        } else {
            note_mentioned_devices(&mut self.devices, &instruction, now);
            self.pending[bus] = Some(instruction);
            Ok(())
        }
    }

    /// Pairs a request with a status reply, both as decoded instructions,
    /// and applies the exchange to the device map. `observe` drives this
    /// internally; it is exposed for consumers replaying captured traffic.
    pub fn correlate(
        &mut self,
        request: &Instruction,
        status: &Instruction,
        now: u64,
    ) -> Result<(), CommError> {
        let result = match status {
            Instruction::Status(status) => {
                apply_status(&mut self.devices, request, status, now)
            }
            _ => Err(CommError::StatusIsInstruction),
        };

        if let Err(err) = result {
            self.counters.record(err);
        }
        result
    }

    /// Records a framing-level parse failure for the diagnostics view.
    pub fn note_parse_error(&mut self, err: ParseError) {
        self.counters.record_parse(err);
    }

    /// Flags devices that have been silent for longer than the disconnect
    /// timeout. Tables are kept; re-observing traffic clears the flag.
    pub fn tick(&mut self, now: u64) {
        for (_, device) in self.devices.iter_mut() {
            if now.saturating_sub(device.last_seen) > self.disconnect_timeout
            {
                device.is_disconnected = true;
            }
        }
    }

    pub fn device(&self, id: DeviceId) -> Option<&Device> {
        self.devices.get(id)
    }

    pub fn devices(&self) -> impl Iterator<Item = (DeviceId, &Device)> {
        self.devices.iter()
    }

    /// The table to render for `id`: the reconstructed one, or the
    /// disconnected placeholder while the device is timed out.
    pub fn display_table(&self, id: DeviceId) -> Option<&ControlTable> {
        self.devices.get(id).map(|device| {
            if device.is_disconnected {
                &DISCONNECTED
            } else {
                &device.table
            }
        })
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }
}

impl<const BUSES: usize> Default for Monitor<BUSES> {
    fn default() -> Self {
        Self::new()
    }
}

/// Touches the liveness clock of every device a request names, creating
/// placeholder entries for ids we have never heard from.
fn note_mentioned_devices(
    devices: &mut DeviceIdMap<Device>,
    instruction: &Instruction,
    now: u64,
) {
    let mut touch = |id: DeviceId| {
        if !id.is_broadcast() {
            devices
                .get_or_insert_with(id, || {
                    Device::new(ControlTable::Unknown, now)
                })
                .mark_seen(now);
        }
    };

    match instruction {
        Instruction::Ping { device_id }
        | Instruction::Action { device_id }
        | Instruction::FactoryReset { device_id, .. }
        | Instruction::Reboot { device_id }
        | Instruction::Clear { device_id } => touch(*device_id),
        Instruction::Read(args) => touch(args.device_id),
        Instruction::Write(args) | Instruction::RegWrite(args) => {
            touch(args.device_id)
        }
        Instruction::SyncRead(args) => args.devices().for_each(&mut touch),
        Instruction::SyncWrite(args) => args.devices().for_each(&mut touch),
        Instruction::BulkRead(args) => {
            args.reads().for_each(|read| touch(read.device_id))
        }
        Instruction::BulkWrite(args) => {
            args.writes().for_each(|write| touch(write.device_id))
        }
        Instruction::Status(_) => {}
    }
}

fn apply_status(
    devices: &mut DeviceIdMap<Device>,
    request: &Instruction,
    status: &StatusArgs,
    now: u64,
) -> Result<(), CommError> {
    if matches!(request, Instruction::Status(_)) {
        return Err(CommError::InstructionIsStatus);
    }

    // an errored reply acknowledges the request but its data is not
    // trustworthy
    if !status.error.is_ok() {
        return Err(CommError::StatusHasError);
    }

    // devices always answer with their own id
    if status.device_id.is_broadcast() {
        return Err(CommError::InvalidDeviceId);
    }

    match request {
        Instruction::Ping { device_id } => {
            check_target(*device_id, status.device_id)?;

            if status.data.len() != 3 {
                return Err(CommError::InvalidPacketLen);
            }

            let model_number =
                u16::from_le_bytes([status.data[0], status.data[1]]);
            let firmware_version = status.data[2];

            let device = devices.get_or_insert_with(status.device_id, || {
                Device::new(ControlTable::for_model(model_number), now)
            });

            // a changed model number means the id was reassigned; start
            // over with fresh defaults
            let table = ControlTable::for_model(model_number);
            if device.table.model_number() != table.model_number() {
                device.table = table;
            }

            device.table.set_firmware_version(firmware_version);
            device.mark_seen(now);
            Ok(())
        }
        Instruction::Read(args) => {
            check_target(args.device_id, status.device_id)?;

            if status.data.len() != args.len as usize {
                return Err(CommError::InvalidPacketLen);
            }

            write_table(
                devices,
                status.device_id,
                args.start_addr,
                &status.data,
                now,
            )
        }
        Instruction::Write(args) => {
            check_target(args.device_id, status.device_id)?;

            if !status.data.is_empty() {
                return Err(CommError::InvalidPacketLen);
            }

            // the written bytes traveled in the request; the status only
            // acknowledges them
            write_table(
                devices,
                status.device_id,
                args.start_addr,
                &args.data,
                now,
            )
        }
        Instruction::RegWrite(args) => {
            // TODO: model the staged write once Action handling exists
            check_target(args.device_id, status.device_id)
        }
        Instruction::Action { device_id }
        | Instruction::FactoryReset { device_id, .. }
        | Instruction::Reboot { device_id }
        | Instruction::Clear { device_id } => {
            // acknowledged, not modeled
            check_target(*device_id, status.device_id)
        }
        Instruction::SyncRead(args) => {
            if !args.contains(status.device_id) {
                return Err(CommError::InvalidDeviceId);
            }

            if status.data.len() != args.len as usize {
                return Err(CommError::InvalidPacketLen);
            }

            write_table(
                devices,
                status.device_id,
                args.start_addr,
                &status.data,
                now,
            )
        }
        Instruction::SyncWrite(args) => {
            let data = args
                .data_for(status.device_id)
                .ok_or(CommError::InvalidDeviceId)?;

            if !status.data.is_empty() {
                return Err(CommError::InvalidPacketLen);
            }

            write_table(devices, status.device_id, args.start_addr, data, now)
        }
        Instruction::BulkRead(args) => {
            let read = args
                .read_for(status.device_id)
                .ok_or(CommError::InvalidDeviceId)?;

            if status.data.len() != read.len as usize {
                return Err(CommError::InvalidPacketLen);
            }

            write_table(
                devices,
                status.device_id,
                read.start_addr,
                &status.data,
                now,
            )
        }
        Instruction::BulkWrite(args) => {
            let write = args
                .write_for(status.device_id)
                .ok_or(CommError::InvalidDeviceId)?;

            if !status.data.is_empty() {
                return Err(CommError::InvalidPacketLen);
            }

            write_table(
                devices,
                status.device_id,
                write.start_addr,
                write.data,
                now,
            )
        }
        Instruction::Status(_) => Err(CommError::InstructionIsStatus),
    }
}

fn check_target(
    request_id: DeviceId,
    status_id: DeviceId,
) -> Result<(), CommError> {
    if request_id == status_id || request_id.is_broadcast() {
        Ok(())
    } else {
        Err(CommError::InvalidDeviceId)
    }
}

fn write_table(
    devices: &mut DeviceIdMap<Device>,
    id: DeviceId,
    start_addr: u16,
    bytes: &[u8],
    now: u64,
) -> Result<(), CommError> {
    let device = devices.get_or_insert_with(id, || {
        Device::new(ControlTable::Unknown, now)
    });
    device.mark_seen(now);

    if device.table.write(start_addr, bytes) {
        Ok(())
    } else {
        Err(CommError::InvalidWrite)
    }
}
