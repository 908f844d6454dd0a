// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The MX-64 servo.
//!
//! Same register layout as the MX-106, with its own model number and limit
//! defaults. See <http://emanual.robotis.com/docs/en/dxl/mx/mx-64-2/>.

use crate::field::{init_defaults, Field, Value};
use crate::fmt::fmt_number;
use crate::segment::{AddressMap, DataSegment};

#[derive(Clone, Debug)]
pub struct Mx64 {
    data: DataSegment<0, 147>,
    addr_map_1: AddressMap<168, 224, 28>,
    addr_map_2: AddressMap<578, 634, 28>,
}

impl Mx64 {
    pub const MODEL_NUMBER: u16 = 311;

    pub const FIELDS: &'static [Field] = &[
        Field::new_u16(0, "Model Number", Self::MODEL_NUMBER, fmt_number),
        Field::new_u32(2, "Model Information", 0, fmt_number),
        Field::new_u8(6, "Firmware Version", 0, fmt_number),
        Field::new_u8(7, "Id", 1, fmt_number),
        Field::new_u8(8, "Baud Rate", 1, fmt_number),
        Field::new_u8(9, "Return Delay Time", 250, fmt_number),
        Field::new_u8(10, "Drive Mode", 0, fmt_number),
        Field::new_u8(11, "Operating Mode", 3, fmt_number),
        Field::new_u8(12, "Secondary Id", 255, fmt_number),
        Field::new_u8(13, "Protocol Type", 2, fmt_number),
        Field::new_u32(20, "Homing Offset", 0, fmt_number),
        Field::new_u32(24, "Moving Threshold", 10, fmt_number),
        Field::new_u8(31, "Temperature Limit", 80, fmt_number),
        Field::new_u16(32, "Max Voltage Limit", 160, fmt_number),
        Field::new_u16(34, "Min Voltage Limit", 95, fmt_number),
        Field::new_u16(36, "PWM Limit", 885, fmt_number),
        Field::new_u16(38, "Current Limit", 1941, fmt_number),
        Field::new_u32(40, "Acceleration Limit", 32767, fmt_number),
        Field::new_u32(44, "Velocity Limit", 435, fmt_number),
        Field::new_u32(48, "Max Position Limit", 4095, fmt_number),
        Field::new_u32(52, "Min Position Limit", 0, fmt_number),
        Field::new_u8(63, "Shutdown", 52, fmt_number),
        Field::new_u8(64, "Torque Enable", 0, fmt_number),
        Field::new_u8(65, "LED", 0, fmt_number),
        Field::new_u8(68, "Status Return Level", 2, fmt_number),
        Field::new_u8(69, "Registered Instruction", 0, fmt_number),
        Field::new_u8(70, "Hardware Error Status", 0, fmt_number),
        Field::new_u16(76, "Velocity I-Gain", 1920, fmt_number),
        Field::new_u16(78, "Velocity P-Gain", 100, fmt_number),
        Field::new_u16(80, "Position D-Gain", 0, fmt_number),
        Field::new_u16(82, "Position I-Gain", 0, fmt_number),
        Field::new_u16(84, "Position P-Gain", 850, fmt_number),
        Field::new_u16(88, "Feedforward 2nd Gain", 0, fmt_number),
        Field::new_u16(90, "Feedforward 1st Gain", 0, fmt_number),
        Field::new_u8(98, "Bus Watchdog", 0, fmt_number),
        Field::new_u16(100, "Goal PWM", 0, fmt_number),
        Field::new_u16(102, "Goal Current", 0, fmt_number),
        Field::new_u32(104, "Goal Velocity", 0, fmt_number),
        Field::new_u32(108, "Profile Acceleration", 0, fmt_number),
        Field::new_u32(112, "Profile Velocity", 0, fmt_number),
        Field::new_u32(116, "Goal Position", 0, fmt_number),
        Field::new_u16(120, "Realtime Tick", 0, fmt_number),
        Field::new_u8(122, "Moving", 0, fmt_number),
        Field::new_u8(123, "Moving Status", 0, fmt_number),
        Field::new_u16(124, "Present PWM", 0, fmt_number),
        Field::new_u16(126, "Present Current", 0, fmt_number),
        Field::new_u32(128, "Present Velocity", 0, fmt_number),
        Field::new_u32(132, "Present Position", 0, fmt_number),
        Field::new_u32(136, "Velocity Trajectory", 0, fmt_number),
        Field::new_u32(140, "Position Trajectory", 0, fmt_number),
        Field::new_u16(144, "Present Input Voltage", 0, fmt_number),
        Field::new_u8(146, "Present Temperature", 0, fmt_number),
    ];

    pub fn new() -> Self {
        let mut table = Self {
            data: DataSegment::new(),
            addr_map_1: AddressMap::new(),
            addr_map_2: AddressMap::new(),
        };

        init_defaults(&mut table.data, Self::FIELDS);

        for i in 0..28 {
            table.addr_map_1.write_u16(168 + 2 * i, 224 + i);
            table.addr_map_2.write_u16(578 + 2 * i, 634 + i);
        }

        table
    }

    pub fn write(&mut self, start_addr: u16, bytes: &[u8]) -> bool {
        let resolved_addr = self
            .addr_map_2
            .resolve(self.addr_map_1.resolve(start_addr));

        self.data.write(resolved_addr, bytes)
            || self.addr_map_1.write(resolved_addr, bytes)
            || self.addr_map_2.write(resolved_addr, bytes)
    }

    pub fn set_firmware_version(&mut self, version: u8) {
        self.data.write_u8(6, version);
    }

    pub fn value_of(&self, field: &Field) -> Option<Value> {
        field.read_from(&self.data)
    }
}

impl Default for Mx64 {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let table = Mx64::new();

        assert_eq!(table.value_of(&Mx64::FIELDS[0]), Some(Value::U16(311)));
        // Current Limit
        assert_eq!(table.value_of(&Mx64::FIELDS[16]), Some(Value::U16(1941)));
    }

    #[test]
    fn straddling_write_is_rejected() {
        let mut table = Mx64::new();

        // crosses the end of the data segment
        assert!(!table.write(145, &[0, 0, 0, 0]));
        assert_eq!(
            table.value_of(&Mx64::FIELDS[50]),
            Some(Value::U16(0)),
            "failed write must not leave partial bytes"
        );
    }
}
