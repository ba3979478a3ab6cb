// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use sync::Mutex;

use crate::canvas::CanvasAccess;
use crate::canvas::CanvasAllocator;
use crate::canvas::CanvasError;
use crate::format::PlaneLayout;
use crate::memory::MemoryHandle;

/// Number of slots in the hardware canvas table.
pub const CANVAS_TABLE_SIZE: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slot {
    memory_id: u64,
    access: CanvasAccess,
}

/// A canvas table that validates plane placement and hands out the lowest free slot.
pub struct SimCanvasAllocator {
    slots: Mutex<Vec<Option<Slot>>>,
}

impl SimCanvasAllocator {
    pub fn new() -> Self {
        Self::with_capacity(CANVAS_TABLE_SIZE)
    }

    /// A table with only `capacity` slots, to exercise exhaustion.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity <= CANVAS_TABLE_SIZE);
        SimCanvasAllocator {
            slots: Mutex::new(vec![None; capacity]),
        }
    }

    pub fn in_use(&self) -> usize {
        self.slots.lock().iter().filter(|s| s.is_some()).count()
    }

    /// Memory id and access mode `canvas` is configured with, if it is allocated.
    pub fn binding(&self, canvas: u8) -> Option<(u64, CanvasAccess)> {
        self.slots
            .lock()
            .get(canvas as usize)
            .copied()
            .flatten()
            .map(|slot| (slot.memory_id, slot.access))
    }
}

impl Default for SimCanvasAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl CanvasAllocator for SimCanvasAllocator {
    fn allocate(
        &self,
        memory: &MemoryHandle,
        plane: &PlaneLayout,
        access: CanvasAccess,
    ) -> Result<u8, CanvasError> {
        match plane.offset.checked_add(plane.size()) {
            Some(end) if end <= memory.size() => {}
            _ => {
                return Err(CanvasError::PlaneOutOfBounds {
                    offset: plane.offset,
                    size: memory.size(),
                })
            }
        }
        let mut slots = self.slots.lock();
        let index = slots
            .iter()
            .position(Option::is_none)
            .ok_or(CanvasError::TableFull)?;
        slots[index] = Some(Slot {
            memory_id: memory.id(),
            access,
        });
        Ok(index as u8)
    }

    fn free(&self, canvas: u8) {
        let freed = self
            .slots
            .lock()
            .get_mut(canvas as usize)
            .and_then(Option::take);
        assert!(freed.is_some(), "canvas {} freed twice", canvas);
    }
}
