// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Stock field formatters.
//!
//! Formatters take the tagged value so one function can serve fields of
//! different kinds; a formatter handed a kind it has no special rendering
//! for falls back to plain numbers.

use crate::field::Value;
use core::fmt::{Result, Write};

pub fn fmt_number(value: Value, out: &mut dyn Write) -> Result {
    match value {
        Value::U8(v) => write!(out, "{v}"),
        Value::U16(v) => write!(out, "{v}"),
        Value::U32(v) => write!(out, "{v}"),
        Value::F32(v) => write!(out, "{v}"),
    }
}

pub fn fmt_bool_on_off(value: Value, out: &mut dyn Write) -> Result {
    let raw = match value {
        Value::U8(v) => u32::from(v),
        Value::U16(v) => u32::from(v),
        Value::U32(v) => v,
        Value::F32(_) => return fmt_number(value, out),
    };

    if raw == 0 {
        out.write_str("off")
    } else {
        out.write_str("on")
    }
}

/// Core board voltage rails report millivolts.
pub fn fmt_core_voltage(value: Value, out: &mut dyn Write) -> Result {
    match value {
        Value::U16(mv) => {
            write!(out, "{}.{:03} V", mv / 1000, mv % 1000)
        }
        _ => fmt_number(value, out),
    }
}

/// Core board current is reported in milliamps.
pub fn fmt_core_current(value: Value, out: &mut dyn Write) -> Result {
    match value {
        Value::U16(ma) => write!(out, "{ma} mA"),
        _ => fmt_number(value, out),
    }
}

pub fn fmt_core_rgb(value: Value, out: &mut dyn Write) -> Result {
    match value {
        Value::U32(rgb) => write!(out, "#{:06x}", rgb & 0x00ff_ffff),
        _ => fmt_number(value, out),
    }
}

/// The power-on sense line is analog; anything between the rails is noise.
pub fn fmt_core_power_on(value: Value, out: &mut dyn Write) -> Result {
    match value {
        Value::U16(power_on) => {
            if power_on >= 900 {
                out.write_str("true")
            } else if power_on <= 100 {
                out.write_str("false")
            } else {
                write!(out, "undefined (raw: {power_on})")
            }
        }
        _ => fmt_number(value, out),
    }
}

pub fn fmt_imu_accel(value: Value, out: &mut dyn Write) -> Result {
    match value {
        Value::F32(v) => write!(out, "{v:.2} m/s^2"),
        _ => fmt_number(value, out),
    }
}

pub fn fmt_imu_gyro(value: Value, out: &mut dyn Write) -> Result {
    match value {
        Value::F32(v) => write!(out, "{v:.2} deg/s"),
        _ => fmt_number(value, out),
    }
}

pub fn fmt_imu_gyro_range(value: Value, out: &mut dyn Write) -> Result {
    match value {
        Value::U8(0) => out.write_str("250 deg/s"),
        Value::U8(1) => out.write_str("500 deg/s"),
        Value::U8(2) => out.write_str("1000 deg/s"),
        Value::U8(3) => out.write_str("2000 deg/s"),
        Value::U8(v) => write!(out, "undefined (raw: {v})"),
        _ => fmt_number(value, out),
    }
}

pub fn fmt_imu_accel_range(value: Value, out: &mut dyn Write) -> Result {
    match value {
        Value::U8(0) => out.write_str("2 g"),
        Value::U8(1) => out.write_str("4 g"),
        Value::U8(2) => out.write_str("8 g"),
        Value::U8(3) => out.write_str("16 g"),
        Value::U8(v) => write!(out, "undefined (raw: {v})"),
        _ => fmt_number(value, out),
    }
}
