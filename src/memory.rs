// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Memory handles and pinning.
//!
//! Buffers reach the engine as opaque [`MemoryHandle`]s. Before the hardware may touch one, it is
//! pinned through the bus transaction initiator ([`Bti`]) so that its physical address stays
//! stable for DMA. A [`PinnedBuffer`] owns such a pin and releases it when dropped. Memory the
//! driver allocates for itself is held by a [`ContiguousBuffer`], which also gives the
//! allocation back.

use std::fmt;
use std::sync::Arc;

use log::error;
use remain::sorted;
use thiserror::Error;

use crate::error::Error;
use crate::error::Result;
use crate::format::ImageFormat;

/// Opaque handle to a region of memory shared with the client.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemoryHandle {
    id: u64,
    size: u64,
}

impl MemoryHandle {
    pub fn new(id: u64, size: u64) -> Self {
        MemoryHandle { id, size }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

/// A fixed set of buffers negotiated with the client, all holding images of `format`.
#[derive(Debug, Clone)]
pub struct BufferCollection {
    pub buffers: Vec<MemoryHandle>,
    pub format: ImageFormat,
}

impl BufferCollection {
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinOptions {
    /// The hardware may write to the memory.
    pub writable: bool,
    /// The pin must cover a single physically contiguous range.
    pub contiguous: bool,
}

/// A pinned range as reported by the BTI. `token` identifies the pin when unpinning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinnedRegion {
    pub token: u64,
    pub phys_addr: u64,
    pub size: u64,
}

#[sorted]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PinError {
    #[error("access to the memory was denied")]
    AccessDenied,
    #[error("memory is not physically contiguous")]
    NotContiguous,
    #[error("out of pinnable memory")]
    OutOfMemory,
}

/// Bus transaction initiator: grants the hardware access to memory.
pub trait Bti: Send + Sync {
    /// Pins the whole of `memory` and returns its physical placement.
    fn pin(
        &self,
        memory: &MemoryHandle,
        options: PinOptions,
    ) -> std::result::Result<PinnedRegion, PinError>;

    /// Releases a pin previously returned by `pin`.
    fn unpin(&self, region: &PinnedRegion);

    /// Allocates `size` bytes of physically contiguous memory owned by the driver.
    fn allocate_contiguous(&self, size: u64) -> std::result::Result<MemoryHandle, PinError>;

    /// Returns memory obtained from `allocate_contiguous`. It must no longer be pinned.
    fn free_contiguous(&self, memory: &MemoryHandle);
}

/// A buffer that stays pinned for as long as this value lives.
pub struct PinnedBuffer {
    bti: Arc<dyn Bti>,
    memory: MemoryHandle,
    region: PinnedRegion,
}

impl PinnedBuffer {
    /// Pins `memory` and checks that the pinned range ends at or below `dma_limit`.
    pub fn pin(
        bti: &Arc<dyn Bti>,
        memory: MemoryHandle,
        options: PinOptions,
        dma_limit: u64,
    ) -> Result<Self> {
        let region = bti.pin(&memory, options)?;
        let buffer = PinnedBuffer {
            bti: Arc::clone(bti),
            memory,
            region,
        };
        // Dropping `buffer` on the error path unpins it.
        match region.phys_addr.checked_add(region.size) {
            Some(end) if end <= dma_limit => Ok(buffer),
            _ => {
                error!(
                    "pinned buffer {} at {:#x} ({} bytes) is beyond the DMA limit {:#x}",
                    buffer.memory.id(),
                    region.phys_addr,
                    region.size,
                    dma_limit
                );
                Err(Error::NoResources("buffer is not reachable by the hardware"))
            }
        }
    }

    pub fn phys_addr(&self) -> u64 {
        self.region.phys_addr
    }

    pub fn size(&self) -> u64 {
        self.region.size
    }

    pub fn memory(&self) -> &MemoryHandle {
        &self.memory
    }
}

impl Drop for PinnedBuffer {
    fn drop(&mut self) {
        self.bti.unpin(&self.region);
    }
}

struct Allocation {
    bti: Arc<dyn Bti>,
    memory: MemoryHandle,
}

impl Drop for Allocation {
    fn drop(&mut self) {
        self.bti.free_contiguous(&self.memory);
    }
}

/// Driver-owned contiguous memory, pinned writable for as long as this value lives.
pub struct ContiguousBuffer {
    // Declared first so the pin is released before the memory is freed.
    pinned: PinnedBuffer,
    _allocation: Allocation,
}

impl ContiguousBuffer {
    pub fn allocate(bti: &Arc<dyn Bti>, size: u64, dma_limit: u64) -> Result<Self> {
        let memory = bti.allocate_contiguous(size)?;
        let allocation = Allocation {
            bti: Arc::clone(bti),
            memory: memory.clone(),
        };
        let pinned = PinnedBuffer::pin(
            bti,
            memory,
            PinOptions {
                writable: true,
                contiguous: true,
            },
            dma_limit,
        )?;
        Ok(ContiguousBuffer {
            pinned,
            _allocation: allocation,
        })
    }

    pub fn memory(&self) -> &MemoryHandle {
        self.pinned.memory()
    }
}

impl fmt::Debug for PinnedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PinnedBuffer")
            .field("memory", &self.memory)
            .field("phys_addr", &format_args!("{:#x}", self.region.phys_addr))
            .field("size", &self.region.size)
            .finish()
    }
}
