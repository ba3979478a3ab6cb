// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Canvas addressing handles.
//!
//! The GE2D block does not take physical addresses directly. Each plane it reads or writes is
//! described by a canvas: a slot in a small hardware table recording the plane's address, stride
//! and height. A canvas is therefore bound to one buffer *and* one image format, and must be
//! re-derived whenever the resolution of the image in that buffer changes.

use std::fmt;
use std::sync::Arc;

use remain::sorted;
use thiserror::Error;

use crate::error::Error;
use crate::error::Result;
use crate::format::ImageFormat;
use crate::format::PlaneLayout;
use crate::memory::MemoryHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanvasAccess {
    Read,
    Write,
    ReadWrite,
}

#[sorted]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CanvasError {
    #[error("plane at offset {offset} does not fit in a buffer of {size} bytes")]
    PlaneOutOfBounds { offset: u64, size: u64 },
    #[error("all canvas slots are in use")]
    TableFull,
}

impl From<CanvasError> for Error {
    fn from(e: CanvasError) -> Self {
        match e {
            CanvasError::PlaneOutOfBounds { .. } => {
                Error::InvalidArgs("image format does not fit in its buffer")
            }
            CanvasError::TableFull => Error::NoResources("canvas table is full"),
        }
    }
}

/// Service owning the canvas table.
pub trait CanvasAllocator: Send + Sync {
    /// Configures a free canvas slot for `plane` inside `memory` and returns its index.
    fn allocate(
        &self,
        memory: &MemoryHandle,
        plane: &PlaneLayout,
        access: CanvasAccess,
    ) -> std::result::Result<u8, CanvasError>;

    /// Returns a slot obtained from `allocate` to the table.
    fn free(&self, canvas: u8);
}

/// One allocated canvas slot, freed on drop.
pub struct CanvasId {
    allocator: Arc<dyn CanvasAllocator>,
    id: u8,
}

impl CanvasId {
    pub fn id(&self) -> u8 {
        self.id
    }
}

impl Drop for CanvasId {
    fn drop(&mut self) {
        self.allocator.free(self.id);
    }
}

impl fmt::Debug for CanvasId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "CanvasId({})", self.id)
    }
}

/// Canvas indices the hardware needs to address one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanvasIds {
    /// Y plane for NV12, the only plane for RGBA.
    pub primary: u8,
    /// Interleaved UV plane for NV12.
    pub chroma: Option<u8>,
}

/// The canvases describing one image in one buffer.
#[derive(Debug)]
pub struct ImageCanvas {
    planes: Vec<CanvasId>,
    format: ImageFormat,
}

impl ImageCanvas {
    /// Allocates one canvas per plane of `format` inside `memory`.
    pub fn allocate(
        allocator: &Arc<dyn CanvasAllocator>,
        memory: &MemoryHandle,
        format: &ImageFormat,
        access: CanvasAccess,
    ) -> Result<Self> {
        let layout = format.planes();
        if layout.is_empty() || layout.len() > 2 {
            return Err(Error::InvalidArgs("pixel format cannot be addressed by canvases"));
        }
        let mut planes = Vec::with_capacity(layout.len());
        for plane in &layout {
            // Slots allocated so far are released by dropping `planes` on error.
            let id = allocator.allocate(memory, plane, access)?;
            planes.push(CanvasId {
                allocator: Arc::clone(allocator),
                id,
            });
        }
        Ok(ImageCanvas {
            planes,
            format: *format,
        })
    }

    pub fn ids(&self) -> CanvasIds {
        CanvasIds {
            primary: self.planes[0].id(),
            chroma: self.planes.get(1).map(CanvasId::id),
        }
    }

    pub fn format(&self) -> &ImageFormat {
        &self.format
    }
}

/// Allocates canvases for every buffer in `memories`, all holding images of `format`.
pub fn allocate_for_buffers<'a, I>(
    allocator: &Arc<dyn CanvasAllocator>,
    memories: I,
    format: &ImageFormat,
    access: CanvasAccess,
) -> Result<Vec<ImageCanvas>>
where
    I: IntoIterator<Item = &'a MemoryHandle>,
{
    memories
        .into_iter()
        .map(|memory| ImageCanvas::allocate(allocator, memory, format, access))
        .collect()
}
