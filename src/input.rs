// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::Error;
use crate::error::Result;
use crate::memory::BufferCollection;
use crate::memory::Bti;
use crate::memory::MemoryHandle;
use crate::memory::PinOptions;
use crate::memory::PinnedBuffer;

/// The client's input buffers, pinned for the lifetime of a task.
///
/// Inputs are read-only to the hardware except for in-place tasks, which write their result
/// back into the frame they were given.
pub struct PinnedInputSet {
    buffers: Vec<PinnedBuffer>,
}

impl PinnedInputSet {
    pub fn new(
        bti: &Arc<dyn Bti>,
        collection: &BufferCollection,
        min_buffer_size: u64,
        writable: bool,
        config: &EngineConfig,
    ) -> Result<Self> {
        if collection.is_empty() {
            return Err(Error::InvalidArgs("input buffer collection is empty"));
        }
        collection.format.validate()?;
        if collection
            .buffers
            .iter()
            .any(|memory| memory.size() < min_buffer_size)
        {
            return Err(Error::InvalidArgs("input buffer too small for its image formats"));
        }
        let options = PinOptions {
            writable,
            contiguous: config.require_contiguous,
        };
        let buffers = collection
            .buffers
            .iter()
            .map(|memory| {
                PinnedBuffer::pin(bti, memory.clone(), options, config.dma_address_limit)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(PinnedInputSet { buffers })
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn contains(&self, index: u32) -> bool {
        (index as usize) < self.buffers.len()
    }

    pub fn get(&self, index: u32) -> Option<&PinnedBuffer> {
        self.buffers.get(index as usize)
    }

    pub fn memories(&self) -> impl Iterator<Item = &MemoryHandle> {
        self.buffers.iter().map(PinnedBuffer::memory)
    }
}
