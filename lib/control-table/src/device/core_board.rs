// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The robot's core board: power rails, status LEDs, supply monitoring.

use crate::field::{init_defaults, Field, Value};
use crate::fmt::{
    fmt_bool_on_off, fmt_core_current, fmt_core_power_on, fmt_core_rgb,
    fmt_core_voltage, fmt_number,
};
use crate::segment::DataSegment;

#[derive(Clone, Debug)]
pub struct CoreBoard {
    data: DataSegment<0, 38>,
}

impl CoreBoard {
    pub const MODEL_NUMBER: u16 = 0xabba;

    pub const FIELDS: &'static [Field] = &[
        Field::new_u16(0, "Model Number", Self::MODEL_NUMBER, fmt_number),
        Field::new_u8(2, "Firmware Version", 0, fmt_number),
        Field::new_u16(10, "LED", 0, fmt_bool_on_off),
        Field::new_u16(12, "Power", 0, fmt_number),
        Field::new_u32(14, "RGB LED 1", 0, fmt_core_rgb),
        Field::new_u32(18, "RGB LED 2", 0, fmt_core_rgb),
        Field::new_u32(22, "RGB LED 3", 0, fmt_core_rgb),
        Field::new_u16(26, "VBAT", 0, fmt_core_voltage),
        Field::new_u16(28, "VEXT", 0, fmt_core_voltage),
        Field::new_u16(30, "VCC", 0, fmt_core_voltage),
        Field::new_u16(32, "VDXL", 0, fmt_core_voltage),
        Field::new_u16(34, "Current", 0, fmt_core_current),
        Field::new_u16(36, "Power On", 0, fmt_core_power_on),
    ];

    pub fn new() -> Self {
        let mut table = Self {
            data: DataSegment::new(),
        };

        init_defaults(&mut table.data, Self::FIELDS);
        table
    }

    pub fn write(&mut self, start_addr: u16, bytes: &[u8]) -> bool {
        self.data.write(start_addr, bytes)
    }

    pub fn set_firmware_version(&mut self, version: u8) {
        self.data.write_u8(2, version);
    }

    pub fn value_of(&self, field: &Field) -> Option<Value> {
        field.read_from(&self.data)
    }
}

impl Default for CoreBoard {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_writes() {
        let mut table = CoreBoard::new();
        assert_eq!(
            table.value_of(&CoreBoard::FIELDS[0]),
            Some(Value::U16(0xabba))
        );

        // VBAT at addr 26
        assert!(table.write(26, &[0x39, 0x30]));
        assert_eq!(
            table.value_of(&CoreBoard::FIELDS[7]),
            Some(Value::U16(12_345))
        );

        assert!(!table.write(37, &[0, 0]));
        assert!(!table.write(38, &[0]));
    }
}
