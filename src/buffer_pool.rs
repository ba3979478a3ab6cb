// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Pool of pinned output buffers.
//!
//! A buffer moves through three states: `Free`, `WriteLocked` while the hardware fills it, and
//! `Outstanding` once it has been handed to the client in a frame-ready callback. Only the
//! client's explicit release brings an outstanding buffer back to `Free`.

use std::sync::Arc;

use sync::Mutex;

use crate::config::EngineConfig;
use crate::error::Error;
use crate::error::Result;
use crate::memory::BufferCollection;
use crate::memory::Bti;
use crate::memory::MemoryHandle;
use crate::memory::PinOptions;
use crate::memory::PinnedBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Free,
    WriteLocked,
    Outstanding,
}

pub struct BufferPool {
    buffers: Vec<PinnedBuffer>,
    // Separate from the registry and queue locks so a slow client release never holds up task
    // creation or frame submission.
    states: Mutex<Vec<SlotState>>,
}

impl BufferPool {
    /// Pins every buffer of `collection` for hardware writes.
    ///
    /// Each buffer must hold at least `min_buffer_size` bytes, typically the size of the largest
    /// image format the pool will receive.
    pub fn new(
        bti: &Arc<dyn Bti>,
        collection: &BufferCollection,
        min_buffer_size: u64,
        config: &EngineConfig,
    ) -> Result<Self> {
        if collection.is_empty() {
            return Err(Error::InvalidArgs("output buffer collection is empty"));
        }
        collection.format.validate()?;
        if collection
            .buffers
            .iter()
            .any(|memory| memory.size() < min_buffer_size)
        {
            return Err(Error::InvalidArgs("output buffer too small for its image formats"));
        }

        let options = PinOptions {
            writable: true,
            contiguous: config.require_contiguous,
        };
        let buffers = collection
            .buffers
            .iter()
            .map(|memory| {
                PinnedBuffer::pin(bti, memory.clone(), options, config.dma_address_limit)
            })
            .collect::<Result<Vec<_>>>()?;
        let states = vec![SlotState::Free; buffers.len()];

        Ok(BufferPool {
            buffers,
            states: Mutex::new(states),
        })
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// Number of buffers currently available to `lock_buffer_for_write`.
    pub fn free_count(&self) -> usize {
        self.states
            .lock()
            .iter()
            .filter(|&&state| state == SlotState::Free)
            .count()
    }

    pub fn memories(&self) -> impl Iterator<Item = &MemoryHandle> {
        self.buffers.iter().map(PinnedBuffer::memory)
    }

    /// Claims the lowest-index free buffer for the hardware. Returns `None` when every buffer is
    /// locked or held by the client; callers must drop the frame rather than wait.
    pub fn lock_buffer_for_write(&self) -> Option<WriteLockedBuffer> {
        let mut states = self.states.lock();
        let index = states.iter().position(|&state| state == SlotState::Free)?;
        states[index] = SlotState::WriteLocked;
        Some(WriteLockedBuffer {
            pool: self,
            index: index as u32,
            handed_out: false,
        })
    }

    /// Returns an outstanding buffer to the free list.
    pub fn release_buffer(&self, index: u32) -> Result<()> {
        let mut states = self.states.lock();
        let state = states
            .get_mut(index as usize)
            .ok_or(Error::InvalidArgs("buffer index out of range"))?;
        if *state != SlotState::Outstanding {
            return Err(Error::InvalidArgs("buffer is not held by the client"));
        }
        *state = SlotState::Free;
        Ok(())
    }

    fn set_state(&self, index: u32, state: SlotState) {
        self.states.lock()[index as usize] = state;
    }
}

/// Exclusive hardware access to one pool buffer.
///
/// Dropping the lock without calling `release_write_lock_and_get_index` puts the buffer back in
/// the free list, which is what happens when the hardware fails to produce a frame.
pub struct WriteLockedBuffer<'a> {
    pool: &'a BufferPool,
    index: u32,
    handed_out: bool,
}

impl<'a> WriteLockedBuffer<'a> {
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn phys_addr(&self) -> u64 {
        self.pool.buffers[self.index as usize].phys_addr()
    }

    /// Marks the buffer as handed to the client and returns its index.
    pub fn release_write_lock_and_get_index(mut self) -> u32 {
        self.pool.set_state(self.index, SlotState::Outstanding);
        self.handed_out = true;
        self.index
    }
}

impl<'a> Drop for WriteLockedBuffer<'a> {
    fn drop(&mut self) {
        if !self.handed_out {
            self.pool.set_state(self.index, SlotState::Free);
        }
    }
}
