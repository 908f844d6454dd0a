// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-firmware mirrors of device register files.
//!
//! Every device on the bus exposes its state as a control table: a flat
//! 16-bit address space holding typed registers. The monitor reconstructs
//! each device's table from observed traffic. This crate provides the
//! storage primitives (segments and indirection maps), the per-model field
//! schemas, and [`ControlTable`], the tagged union over all supported
//! models.

#![cfg_attr(not(test), no_std)]

pub mod device;
mod field;
pub mod fmt;
mod segment;

pub use field::{
    init_defaults, DisplayValue, Field, FieldKind, Formatter, Value,
};
pub use segment::{AddressMap, DataSegment};

use device::core_board::CoreBoard;
use device::foot_pressure_sensor::FootPressureSensor;
use device::imu::Imu;
use device::mx106::Mx106;
use device::mx64::Mx64;
use static_assertions::const_assert_ne;

// model dispatch relies on distinct model numbers
const_assert_ne!(Mx64::MODEL_NUMBER, Mx106::MODEL_NUMBER);
const_assert_ne!(CoreBoard::MODEL_NUMBER, Imu::MODEL_NUMBER);
const_assert_ne!(CoreBoard::MODEL_NUMBER, FootPressureSensor::MODEL_NUMBER);
const_assert_ne!(Imu::MODEL_NUMBER, FootPressureSensor::MODEL_NUMBER);

/// A device's control table, tagged by model.
///
/// `Unknown` stands in for a device whose model has not been revealed by a
/// ping reply (or is not one we support); `Disconnected` is a placeholder
/// for a device that has not been seen recently. Neither accepts writes.
#[derive(Clone, Debug)]
pub enum ControlTable {
    Unknown,
    Disconnected,
    Mx64(Mx64),
    Mx106(Mx106),
    CoreBoard(CoreBoard),
    Imu(Imu),
    FootPressureSensor(FootPressureSensor),
}

impl ControlTable {
    /// Builds a freshly-defaulted table for `model_number`, or `Unknown` if
    /// the model is not recognized.
    pub fn for_model(model_number: u16) -> Self {
        match model_number {
            Mx64::MODEL_NUMBER => Self::Mx64(Mx64::new()),
            Mx106::MODEL_NUMBER => Self::Mx106(Mx106::new()),
            CoreBoard::MODEL_NUMBER => Self::CoreBoard(CoreBoard::new()),
            Imu::MODEL_NUMBER => Self::Imu(Imu::new()),
            FootPressureSensor::MODEL_NUMBER => {
                Self::FootPressureSensor(FootPressureSensor::new())
            }
            _ => Self::Unknown,
        }
    }

    pub fn model_number(&self) -> Option<u16> {
        match self {
            Self::Unknown | Self::Disconnected => None,
            Self::Mx64(_) => Some(Mx64::MODEL_NUMBER),
            Self::Mx106(_) => Some(Mx106::MODEL_NUMBER),
            Self::CoreBoard(_) => Some(CoreBoard::MODEL_NUMBER),
            Self::Imu(_) => Some(Imu::MODEL_NUMBER),
            Self::FootPressureSensor(_) => {
                Some(FootPressureSensor::MODEL_NUMBER)
            }
        }
    }

    pub fn device_name(&self) -> &'static str {
        match self {
            Self::Unknown => "<unknown>",
            Self::Disconnected => "<disconnected>",
            Self::Mx64(_) => "MX-64",
            Self::Mx106(_) => "MX-106",
            Self::CoreBoard(_) => "Core",
            Self::Imu(_) => "IMU",
            Self::FootPressureSensor(_) => "Foot",
        }
    }

    pub fn fields(&self) -> &'static [Field] {
        match self {
            Self::Unknown | Self::Disconnected => &[],
            Self::Mx64(_) => Mx64::FIELDS,
            Self::Mx106(_) => Mx106::FIELDS,
            Self::CoreBoard(_) => CoreBoard::FIELDS,
            Self::Imu(_) => Imu::FIELDS,
            Self::FootPressureSensor(_) => FootPressureSensor::FIELDS,
        }
    }

    /// Applies an observed write. Returns false if the target range is not
    /// backed by the model's memory (placeholder tables back nothing); a
    /// rejected write changes no byte.
    pub fn write(&mut self, start_addr: u16, bytes: &[u8]) -> bool {
        match self {
            Self::Unknown | Self::Disconnected => false,
            Self::Mx64(table) => table.write(start_addr, bytes),
            Self::Mx106(table) => table.write(start_addr, bytes),
            Self::CoreBoard(table) => table.write(start_addr, bytes),
            Self::Imu(table) => table.write(start_addr, bytes),
            Self::FootPressureSensor(table) => {
                table.write(start_addr, bytes)
            }
        }
    }

    pub fn set_firmware_version(&mut self, version: u8) {
        match self {
            Self::Unknown | Self::Disconnected => {}
            Self::Mx64(table) => table.set_firmware_version(version),
            Self::Mx106(table) => table.set_firmware_version(version),
            Self::CoreBoard(table) => table.set_firmware_version(version),
            Self::Imu(table) => table.set_firmware_version(version),
            Self::FootPressureSensor(table) => {
                table.set_firmware_version(version)
            }
        }
    }

    /// Reads a schema field's current value.
    pub fn value_of(&self, field: &Field) -> Option<Value> {
        match self {
            Self::Unknown | Self::Disconnected => None,
            Self::Mx64(table) => table.value_of(field),
            Self::Mx106(table) => table.value_of(field),
            Self::CoreBoard(table) => table.value_of(field),
            Self::Imu(table) => table.value_of(field),
            Self::FootPressureSensor(table) => table.value_of(field),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_factory() {
        assert_eq!(ControlTable::for_model(311).model_number(), Some(311));
        assert_eq!(ControlTable::for_model(321).model_number(), Some(321));
        assert_eq!(
            ControlTable::for_model(0xabba).device_name(),
            "Core"
        );
        assert_eq!(ControlTable::for_model(0xbaff).device_name(), "IMU");
        assert_eq!(ControlTable::for_model(0xaffe).device_name(), "Foot");

        let unknown = ControlTable::for_model(0x1234);
        assert_eq!(unknown.model_number(), None);
        assert_eq!(unknown.device_name(), "<unknown>");
    }

    #[test]
    fn placeholders_reject_writes() {
        for mut table in [ControlTable::Unknown, ControlTable::Disconnected] {
            assert!(!table.write(0, &[1]));
            assert!(table.fields().is_empty());
            table.set_firmware_version(1);
        }
        assert_eq!(
            ControlTable::Disconnected.device_name(),
            "<disconnected>"
        );
    }

    #[test]
    fn writes_and_fields_through_the_enum() {
        let mut table = ControlTable::for_model(321);

        // 0x84 is Present Position on the MX servos
        assert!(table.write(0x0084, &[0xa6, 0x00, 0x00, 0x00]));

        let present_position = table
            .fields()
            .iter()
            .find(|f| f.offset == 0x0084)
            .unwrap();
        assert_eq!(present_position.name, "Present Position");
        assert_eq!(
            table.value_of(present_position),
            Some(Value::U32(0x0000_00a6))
        );
    }

    #[test]
    fn snapshot_is_independent() {
        let mut table = ControlTable::for_model(321);
        let snapshot = table.clone();

        assert!(table.write(64, &[1]));

        let torque = table
            .fields()
            .iter()
            .find(|f| f.offset == 64)
            .unwrap();
        assert_eq!(table.value_of(torque), Some(Value::U8(1)));
        assert_eq!(snapshot.value_of(torque), Some(Value::U8(0)));
    }
}
