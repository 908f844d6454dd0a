// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The foot pressure sensor: one load cell per corner.

use crate::field::{init_defaults, Field, Value};
use crate::fmt::fmt_number;
use crate::segment::DataSegment;

#[derive(Clone, Debug)]
pub struct FootPressureSensor {
    data: DataSegment<0, 52>,
}

impl FootPressureSensor {
    pub const MODEL_NUMBER: u16 = 0xaffe;

    pub const FIELDS: &'static [Field] = &[
        Field::new_u16(0, "Model Number", Self::MODEL_NUMBER, fmt_number),
        Field::new_u8(2, "Firmware Version", 0, fmt_number),
        Field::new_u32(36, "Front Left", 0, fmt_number),
        Field::new_u32(40, "Front Right", 0, fmt_number),
        Field::new_u32(44, "Back Left", 0, fmt_number),
        Field::new_u32(48, "Back Right", 0, fmt_number),
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

impl Default for FootPressureSensor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_cell_writes() {
        let mut table = FootPressureSensor::new();

        assert!(table.write(36, &1000u32.to_le_bytes()));
        assert_eq!(
            table.value_of(&FootPressureSensor::FIELDS[2]),
            Some(Value::U32(1000))
        );

        assert!(!table.write(50, &[0, 0, 0, 0]));
    }
}
