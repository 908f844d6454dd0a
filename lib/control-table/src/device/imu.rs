// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The inertial measurement unit.

use crate::field::{init_defaults, Field, Value};
use crate::fmt::{
    fmt_imu_accel, fmt_imu_accel_range, fmt_imu_gyro, fmt_imu_gyro_range,
    fmt_number,
};
use crate::segment::DataSegment;

#[derive(Clone, Debug)]
pub struct Imu {
    data: DataSegment<0, 78>,
}

impl Imu {
    pub const MODEL_NUMBER: u16 = 0xbaff;

    pub const FIELDS: &'static [Field] = &[
        Field::new_u16(0, "Model Number", Self::MODEL_NUMBER, fmt_number),
        Field::new_u8(2, "Firmware Version", 0, fmt_number),
        Field::new_f32(36, "Acceleration X", 0.0, fmt_imu_accel),
        Field::new_f32(40, "Acceleration Y", 0.0, fmt_imu_accel),
        Field::new_f32(44, "Acceleration Z", 0.0, fmt_imu_accel),
        Field::new_f32(48, "Gyro X", 0.0, fmt_imu_gyro),
        Field::new_f32(52, "Gyro Y", 0.0, fmt_imu_gyro),
        Field::new_f32(56, "Gyro Z", 0.0, fmt_imu_gyro),
        Field::new_f32(60, "Orientation X", 0.0, fmt_number),
        Field::new_f32(64, "Orientation Y", 0.0, fmt_number),
        Field::new_f32(68, "Orientation Z", 0.0, fmt_number),
        Field::new_f32(72, "Orientation W", 0.0, fmt_number),
        Field::new_u8(76, "Gyro Range", 3, fmt_imu_gyro_range),
        Field::new_u8(77, "Acceleration Range", 3, fmt_imu_accel_range),
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

impl Default for Imu {
    fn default() -> Self {
        Self::new()
    }
}
