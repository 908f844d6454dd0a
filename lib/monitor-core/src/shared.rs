// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Sharing the monitor with a UI reader.
//!
//! The ingest loop owns the monitor; a renderer on another task only ever
//! needs short snapshots. Readers clone what they need under the lock and
//! release it before doing any drawing, so the lock is never held across
//! anything slow.

use crate::monitor::{Device, Monitor};
use control_table::ControlTable;
use dxl_packet::DeviceId;
use spin::Mutex;

pub struct SharedMonitor<const BUSES: usize> {
    inner: Mutex<Monitor<BUSES>>,
}

impl<const BUSES: usize> SharedMonitor<BUSES> {
    pub fn new(monitor: Monitor<BUSES>) -> Self {
        Self {
            inner: Mutex::new(monitor),
        }
    }

    /// Runs `body` with the lock held. The ingest side uses this for its
    /// observe/tick calls.
    pub fn with<R>(&self, body: impl FnOnce(&mut Monitor<BUSES>) -> R) -> R {
        let mut guard = self.inner.lock();
        body(&mut guard)
    }

    /// Clones one device's table (and its disconnected flag) out from under
    /// the lock.
    pub fn snapshot_device(
        &self,
        id: DeviceId,
    ) -> Option<(ControlTable, bool)> {
        let guard = self.inner.lock();
        guard
            .device(id)
            .map(|device| (device.table.clone(), device.is_disconnected))
    }

    /// Collects the ids currently known, for iterating snapshots without
    /// holding the lock across rendering.
    pub fn device_ids<const MAX: usize>(&self) -> heapless::Vec<DeviceId, MAX> {
        let guard = self.inner.lock();
        guard.devices().map(|(id, _)| id).take(MAX).collect()
    }

    /// Reads a summary value for every known device under one short lock.
    pub fn for_each_device(&self, mut body: impl FnMut(DeviceId, &Device)) {
        let guard = self.inner.lock();
        for (id, device) in guard.devices() {
            body(id, device);
        }
    }
}
