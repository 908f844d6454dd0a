// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The portable core of the bus monitor.
//!
//! Board integration hands this crate a stream of receive-buffer halves (from
//! the DMA engine) and a millisecond clock; everything else — framing,
//! correlation of requests with replies, the per-device control-table model,
//! liveness, diagnostics counters — lives here and runs the same on the
//! target and on the host.
//!
//! The expected wiring per bus:
//!
//! - a [`ReceiveBuf`] written by the DMA ISRs,
//! - a [`BusRx`] polled from the main loop, draining into
//! - the shared [`Monitor`], which owns every device's [`control_table::ControlTable`].

#![cfg_attr(not(test), no_std)]

mod ingest;
mod monitor;
mod recv;
mod shared;

pub use ingest::BusRx;
pub use monitor::{
    CommError, Counters, Device, Monitor, DEFAULT_DISCONNECT_TIMEOUT_MS,
};
pub use recv::ReceiveBuf;
pub use shared::SharedMonitor;
