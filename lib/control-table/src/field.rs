// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Field schemas.
//!
//! Each device model declares its register layout as a static slice of
//! [`Field`]s. The schema drives default-initialization of the model's
//! memory at construction time and human-readable rendering of live values.

use crate::segment::DataSegment;
use core::fmt;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FieldKind {
    U8,
    U16,
    U32,
    F32,
}

/// A value read out of a control table, tagged with its field kind.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Value {
    U8(u8),
    U16(u16),
    U32(u32),
    F32(f32),
}

/// Renders a value for display; see the `fmt` module for the stock
/// formatters.
pub type Formatter = fn(Value, &mut dyn fmt::Write) -> fmt::Result;

pub struct Field {
    pub offset: u16,
    pub name: &'static str,
    pub kind: FieldKind,
    pub default: Value,
    pub fmt: Formatter,
}

impl Field {
    pub const fn new_u8(
        offset: u16,
        name: &'static str,
        default: u8,
        fmt: Formatter,
    ) -> Self {
        Self {
            offset,
            name,
            kind: FieldKind::U8,
            default: Value::U8(default),
            fmt,
        }
    }

    pub const fn new_u16(
        offset: u16,
        name: &'static str,
        default: u16,
        fmt: Formatter,
    ) -> Self {
        Self {
            offset,
            name,
            kind: FieldKind::U16,
            default: Value::U16(default),
            fmt,
        }
    }

    pub const fn new_u32(
        offset: u16,
        name: &'static str,
        default: u32,
        fmt: Formatter,
    ) -> Self {
        Self {
            offset,
            name,
            kind: FieldKind::U32,
            default: Value::U32(default),
            fmt,
        }
    }

    pub const fn new_f32(
        offset: u16,
        name: &'static str,
        default: f32,
        fmt: Formatter,
    ) -> Self {
        Self {
            offset,
            name,
            kind: FieldKind::F32,
            default: Value::F32(default),
            fmt,
        }
    }

    /// Writes the field's default into `segment`.
    pub fn init_memory<const START: u16, const LEN: usize>(
        &self,
        segment: &mut DataSegment<START, LEN>,
    ) -> bool {
        match self.default {
            Value::U8(v) => segment.write_u8(self.offset, v),
            Value::U16(v) => segment.write_u16(self.offset, v),
            Value::U32(v) => segment.write_u32(self.offset, v),
            Value::F32(v) => segment.write_f32(self.offset, v),
        }
    }

    /// Reads the field's current value from `segment`.
    pub fn read_from<const START: u16, const LEN: usize>(
        &self,
        segment: &DataSegment<START, LEN>,
    ) -> Option<Value> {
        match self.kind {
            FieldKind::U8 => segment.u8_at(self.offset).map(Value::U8),
            FieldKind::U16 => segment.u16_at(self.offset).map(Value::U16),
            FieldKind::U32 => segment.u32_at(self.offset).map(Value::U32),
            FieldKind::F32 => segment.f32_at(self.offset).map(Value::F32),
        }
    }

    /// Wraps `value` for display with this field's formatter.
    pub fn display(&self, value: Value) -> DisplayValue {
        DisplayValue {
            value,
            fmt: self.fmt,
        }
    }
}

/// Adapter implementing [`core::fmt::Display`] via a field's formatter.
pub struct DisplayValue {
    value: Value,
    fmt: Formatter,
}

impl fmt::Display for DisplayValue {
    fn fmt(&self, out: &mut fmt::Formatter<'_>) -> fmt::Result {
        (self.fmt)(self.value, out)
    }
}

/// Writes every field's default into `segment`; returns false if any field
/// lies outside the segment.
pub fn init_defaults<const START: u16, const LEN: usize>(
    segment: &mut DataSegment<START, LEN>,
    fields: &[Field],
) -> bool {
    let mut ok = true;
    for field in fields {
        ok &= field.init_memory(segment);
    }
    ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fmt::fmt_number;

    #[test]
    fn defaults_land_in_memory() {
        let mut segment = DataSegment::<0, 16>::new();
        let fields = [
            Field::new_u16(0, "Model Number", 321, fmt_number),
            Field::new_u8(2, "Firmware Version", 7, fmt_number),
            Field::new_u32(4, "Homing Offset", 0xdead_beef, fmt_number),
            Field::new_f32(8, "Gyro X", 1.25, fmt_number),
        ];

        assert!(init_defaults(&mut segment, &fields));

        assert_eq!(fields[0].read_from(&segment), Some(Value::U16(321)));
        assert_eq!(fields[1].read_from(&segment), Some(Value::U8(7)));
        assert_eq!(
            fields[2].read_from(&segment),
            Some(Value::U32(0xdead_beef))
        );
        assert_eq!(fields[3].read_from(&segment), Some(Value::F32(1.25)));
    }

    #[test]
    fn display_uses_the_field_formatter() {
        let field = Field::new_u16(0, "Goal PWM", 0, fmt_number);
        assert_eq!(
            format!("{}", field.display(Value::U16(885))),
            "885"
        );
    }

    #[test]
    fn out_of_range_field_is_reported() {
        let mut segment = DataSegment::<0, 4>::new();
        let fields = [Field::new_u32(2, "Straddles End", 1, fmt_number)];

        assert!(!init_defaults(&mut segment, &fields));
        assert_eq!(segment.u16_at(2), Some(0));
    }
}
