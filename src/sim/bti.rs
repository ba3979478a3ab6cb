// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use sync::Mutex;

use crate::memory::Bti;
use crate::memory::MemoryHandle;
use crate::memory::PinError;
use crate::memory::PinOptions;
use crate::memory::PinnedRegion;

const PAGE_SIZE: u64 = 4096;
const DEFAULT_BASE_ADDRESS: u64 = 0x1000_0000;
// Ids of driver-allocated memory, kept clear of client handle ids.
const ALLOCATION_ID_BASE: u64 = 1 << 48;

struct Pin {
    writable: bool,
}

struct State {
    next_address: u64,
    next_token: u64,
    next_allocation: u64,
    allocations: BTreeSet<u64>,
    pins: BTreeMap<u64, Pin>,
    pin_calls: usize,
    pins_before_failure: Option<usize>,
    fragmented: bool,
}

/// Hands out increasing, page-aligned physical addresses and tracks live pins.
pub struct SimBti {
    state: Mutex<State>,
}

impl SimBti {
    pub fn new() -> Self {
        Self::with_base_address(DEFAULT_BASE_ADDRESS)
    }

    /// Places the first pinned buffer at `base`.
    pub fn with_base_address(base: u64) -> Self {
        SimBti {
            state: Mutex::new(State {
                next_address: base,
                next_token: 1,
                next_allocation: ALLOCATION_ID_BASE,
                allocations: BTreeSet::new(),
                pins: BTreeMap::new(),
                pin_calls: 0,
                pins_before_failure: None,
                fragmented: false,
            }),
        }
    }

    /// Number of pins currently held.
    pub fn pinned_count(&self) -> usize {
        self.state.lock().pins.len()
    }

    /// Number of currently held pins that allow the hardware to write.
    pub fn writable_pins(&self) -> usize {
        self.state.lock().pins.values().filter(|p| p.writable).count()
    }

    /// Number of driver allocations not yet freed.
    pub fn allocated_count(&self) -> usize {
        self.state.lock().allocations.len()
    }

    /// Number of pin requests seen, successful or not.
    pub fn pin_calls(&self) -> usize {
        self.state.lock().pin_calls
    }

    /// Lets `count` more pins succeed, then fails every pin with `OutOfMemory`.
    pub fn fail_pins_after(&self, count: usize) {
        self.state.lock().pins_before_failure = Some(count);
    }

    /// While set, pins that require contiguous memory fail with `NotContiguous`.
    pub fn set_fragmented(&self, fragmented: bool) {
        self.state.lock().fragmented = fragmented;
    }
}

impl Default for SimBti {
    fn default() -> Self {
        Self::new()
    }
}

impl Bti for SimBti {
    fn pin(&self, memory: &MemoryHandle, options: PinOptions) -> Result<PinnedRegion, PinError> {
        let mut state = self.state.lock();
        state.pin_calls += 1;
        if let Some(remaining) = state.pins_before_failure.as_mut() {
            if *remaining == 0 {
                return Err(PinError::OutOfMemory);
            }
            *remaining -= 1;
        }
        if state.fragmented && options.contiguous {
            return Err(PinError::NotContiguous);
        }

        let token = state.next_token;
        state.next_token += 1;
        let phys_addr = state.next_address;
        let pages = memory.size().div_ceil(PAGE_SIZE).max(1);
        state.next_address = phys_addr.saturating_add(pages * PAGE_SIZE);
        state.pins.insert(
            token,
            Pin {
                writable: options.writable,
            },
        );
        Ok(PinnedRegion {
            token,
            phys_addr,
            size: memory.size(),
        })
    }

    fn unpin(&self, region: &PinnedRegion) {
        let removed = self.state.lock().pins.remove(&region.token);
        assert!(removed.is_some(), "unpin of unknown region {:?}", region);
    }

    fn allocate_contiguous(&self, size: u64) -> Result<MemoryHandle, PinError> {
        let mut state = self.state.lock();
        let id = state.next_allocation;
        state.next_allocation += 1;
        state.allocations.insert(id);
        Ok(MemoryHandle::new(id, size))
    }

    fn free_contiguous(&self, memory: &MemoryHandle) {
        let removed = self.state.lock().allocations.remove(&memory.id());
        assert!(removed, "free of unknown allocation {:?}", memory);
    }
}
