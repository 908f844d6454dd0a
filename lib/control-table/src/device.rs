// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! One module per supported device model.

pub mod core_board;
pub mod foot_pressure_sensor;
pub mod imu;
pub mod mx106;
pub mod mx64;
