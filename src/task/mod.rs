// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Configured units of work.
//!
//! A task captures everything needed to process frames of one stream: the client's format
//! tables, its pinned input buffers, the output buffer pool, the canvases bound to the current
//! formats and the callbacks to report results through. Tasks come in three closed variants,
//! see [`TaskType`].
//!
//! Only the immutable part of a task is visible to client threads. Everything that changes after
//! creation (format indices, crop, canvases) lives in a separate state block that only the
//! dispatcher thread locks.

mod resize;
mod watermark;

use std::fmt;
use std::sync::Arc;

use log::error;
use sync::Mutex;
use sync::MutexGuard;

pub use self::resize::ResizeInfo;
pub use self::watermark::WatermarkInfo;
use crate::buffer_pool::BufferPool;
use crate::canvas::allocate_for_buffers;
use crate::canvas::CanvasAccess;
use crate::canvas::CanvasAllocator;
use crate::canvas::ImageCanvas;
use crate::error::Error;
use crate::error::FrameError;
use crate::error::FrameStatus;
use crate::error::Result;
use crate::error::TaskRemoveStatus;
use crate::format::ImageFormat;
use crate::format::Rect;
use crate::hw::Ge2dHardware;
use crate::hw::Surface;
use crate::input::PinnedInputSet;
use crate::memory::Bti;

/// Opaque identifier of a task, unique for the lifetime of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskHandle(pub(crate) u32);

impl TaskHandle {
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "task {}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskType {
    /// Crops and scales input frames into a pool of output buffers.
    Resize,
    /// Copies input frames into output buffers and alpha-blends a watermark over them.
    Watermark,
    /// Blends a watermark directly into the input frame.
    InPlaceWatermark,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameMetadata {
    /// Monotonic time at which the frame completed, in nanoseconds.
    pub timestamp: u64,
    /// Index of the output format the frame was produced in.
    pub image_format_index: u32,
    pub input_buffer_index: u32,
}

/// Argument of the frame-ready callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameAvailable {
    pub status: FrameStatus,
    /// Buffer holding the result: an output pool index, or the input index for in-place tasks.
    /// `None` when the frame was dropped.
    pub buffer_id: Option<u32>,
    pub metadata: FrameMetadata,
}

/// Argument of the resolution-changed callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionChange {
    pub timestamp: u64,
    pub image_format_index: u32,
}

pub type FrameReadyFn = Arc<dyn Fn(FrameAvailable) + Send + Sync>;
pub type ResolutionChangedFn = Arc<dyn Fn(ResolutionChange) + Send + Sync>;
pub type TaskRemovedFn = Arc<dyn Fn(TaskRemoveStatus) + Send + Sync>;

/// Client callbacks. They run on the dispatcher thread and must not block.
///
/// The remove callback is shared with queued removal requests so that a duplicate removal can
/// still be answered after the task is gone.
#[derive(Clone)]
pub struct TaskCallbacks {
    pub frame_ready: FrameReadyFn,
    pub resolution_changed: ResolutionChangedFn,
    pub task_removed: TaskRemovedFn,
}

/// Shared collaborators every task is built against.
#[derive(Clone)]
pub struct TaskContext<'a> {
    pub bti: &'a Arc<dyn Bti>,
    pub canvas: &'a Arc<dyn CanvasAllocator>,
    pub config: &'a crate::config::EngineConfig,
}

/// Per-variant data fixed at creation.
pub(crate) enum Variant {
    Resize(resize::Resize),
    Watermark(watermark::Watermark),
    InPlaceWatermark(watermark::Watermark),
}

/// Mutable part of a task. Locked only by the dispatcher thread.
pub(crate) struct TaskState {
    pub input_index: u32,
    pub output_index: u32,
    pub crop: Rect,
    pub input_canvases: Vec<ImageCanvas>,
    pub output_canvases: Vec<ImageCanvas>,
    /// Canvas of the watermark staging buffer, bound to the current watermark size.
    pub blended_canvas: Option<ImageCanvas>,
}

pub struct Task {
    variant: Variant,
    input_formats: Vec<ImageFormat>,
    output_formats: Vec<ImageFormat>,
    inputs: PinnedInputSet,
    output_pool: Option<BufferPool>,
    callbacks: TaskCallbacks,
    canvas: Arc<dyn CanvasAllocator>,
    state: Mutex<TaskState>,
}

/// Result of processing one frame on the dispatcher thread.
pub(crate) struct FrameDone {
    pub buffer_id: u32,
    pub image_format_index: u32,
}

/// Everything a variant constructor has gathered before canvases are allocated.
pub(crate) struct TaskParts {
    pub variant: Variant,
    pub input_formats: Vec<ImageFormat>,
    pub output_formats: Vec<ImageFormat>,
    pub inputs: PinnedInputSet,
    pub output_pool: Option<BufferPool>,
    pub callbacks: TaskCallbacks,
    pub input_index: u32,
    pub output_index: u32,
    pub crop: Rect,
}

impl Task {
    fn new(ctx: &TaskContext, parts: TaskParts) -> Result<Self> {
        let TaskParts {
            variant,
            input_formats,
            output_formats,
            inputs,
            output_pool,
            callbacks,
            input_index,
            output_index,
            crop,
        } = parts;
        let input_access = match variant {
            Variant::InPlaceWatermark(_) => CanvasAccess::ReadWrite,
            _ => CanvasAccess::Read,
        };
        let input_canvases = allocate_for_buffers(
            ctx.canvas,
            inputs.memories(),
            &input_formats[input_index as usize],
            input_access,
        )?;
        let output_canvases = match &output_pool {
            Some(pool) => allocate_for_buffers(
                ctx.canvas,
                pool.memories(),
                &output_formats[output_index as usize],
                CanvasAccess::Write,
            )?,
            None => Vec::new(),
        };
        let blended_canvas = match &variant {
            Variant::Resize(_) => None,
            Variant::Watermark(wm) | Variant::InPlaceWatermark(wm) => Some(
                wm.allocate_blended_canvas(ctx.canvas, output_index)?,
            ),
        };

        Ok(Task {
            variant,
            input_formats,
            output_formats,
            inputs,
            output_pool,
            callbacks,
            canvas: Arc::clone(ctx.canvas),
            state: Mutex::new(TaskState {
                input_index,
                output_index,
                crop,
                input_canvases,
                output_canvases,
                blended_canvas,
            }),
        })
    }

    pub fn task_type(&self) -> TaskType {
        match self.variant {
            Variant::Resize(_) => TaskType::Resize,
            Variant::Watermark(_) => TaskType::Watermark,
            Variant::InPlaceWatermark(_) => TaskType::InPlaceWatermark,
        }
    }

    /// False for in-place tasks, which write back into their input buffers.
    pub fn has_output_images(&self) -> bool {
        self.output_pool.is_some()
    }

    pub fn input_buffer_count(&self) -> usize {
        self.inputs.len()
    }

    pub fn input_format_count(&self) -> usize {
        self.input_formats.len()
    }

    pub fn output_format_count(&self) -> usize {
        self.output_formats.len()
    }

    pub fn output_pool(&self) -> Option<&BufferPool> {
        self.output_pool.as_ref()
    }

    /// Checks a crop rectangle against the input dimensions. Only resize tasks crop, and they
    /// have a single input format.
    pub fn validate_crop(&self, crop: &Rect) -> Result<()> {
        if self.task_type() != TaskType::Resize {
            return Err(Error::InvalidArgs("only resize tasks can crop"));
        }
        let input = &self.input_formats[0];
        if !crop.fits_within(input.coded_width, input.coded_height) {
            return Err(Error::InvalidArgs("crop rectangle outside the input image"));
        }
        Ok(())
    }

    pub(crate) fn lock_state(&self) -> MutexGuard<TaskState> {
        self.state.lock()
    }

    pub(crate) fn notify_frame(&self, frame: FrameAvailable) {
        (self.callbacks.frame_ready)(frame)
    }

    pub(crate) fn notify_resolution(&self, change: ResolutionChange) {
        (self.callbacks.resolution_changed)(change)
    }

    pub(crate) fn removed_callback(&self) -> TaskRemovedFn {
        Arc::clone(&self.callbacks.task_removed)
    }

    /// Re-derives the output canvases (and the watermark staging canvas) for
    /// `output_formats[index]`. The previous canvases are freed first, so the switch never needs
    /// more slots than the task already holds. On failure the task goes back to its previous
    /// resolution.
    pub(crate) fn change_output_res(&self, state: &mut TaskState, index: u32) -> Result<()> {
        if index as usize >= self.output_formats.len() {
            return Err(Error::InvalidArgs("output format index out of range"));
        }
        let previous = state.output_index;
        let result = self.bind_output(state, index);
        if result.is_err() {
            if let Err(e) = self.bind_output(state, previous) {
                error!(
                    "failed to restore output format {}, task is unbound: {}",
                    previous, e
                );
            }
        }
        result
    }

    fn bind_output(&self, state: &mut TaskState, index: u32) -> Result<()> {
        state.output_canvases.clear();
        state.blended_canvas = None;
        let format = &self.output_formats[index as usize];
        if let Some(pool) = &self.output_pool {
            state.output_canvases =
                allocate_for_buffers(&self.canvas, pool.memories(), format, CanvasAccess::Write)?;
        }
        if let Variant::Watermark(wm) | Variant::InPlaceWatermark(wm) = &self.variant {
            state.blended_canvas = Some(wm.allocate_blended_canvas(&self.canvas, index)?);
        }
        state.output_index = index;
        Ok(())
    }

    /// Re-derives the input canvases for `input_formats[index]`, freeing the previous ones first.
    pub(crate) fn change_input_res(&self, state: &mut TaskState, index: u32) -> Result<()> {
        if index as usize >= self.input_formats.len() {
            return Err(Error::InvalidArgs("input format index out of range"));
        }
        let previous = state.input_index;
        let result = self.bind_input(state, index);
        if result.is_err() {
            if let Err(e) = self.bind_input(state, previous) {
                error!(
                    "failed to restore input format {}, task is unbound: {}",
                    previous, e
                );
            }
        }
        result
    }

    fn bind_input(&self, state: &mut TaskState, index: u32) -> Result<()> {
        state.input_canvases.clear();
        let access = match self.variant {
            Variant::InPlaceWatermark(_) => CanvasAccess::ReadWrite,
            _ => CanvasAccess::Read,
        };
        state.input_canvases = allocate_for_buffers(
            &self.canvas,
            self.inputs.memories(),
            &self.input_formats[index as usize],
            access,
        )?;
        state.input_index = index;
        Ok(())
    }

    /// Whether every canvas the current formats need is allocated. Only false after a failed
    /// resolution change could not restore the previous canvases either.
    fn is_bound(&self, state: &TaskState) -> bool {
        let outputs_bound = match &self.output_pool {
            Some(pool) => state.output_canvases.len() == pool.len(),
            None => true,
        };
        let staging_bound = match self.variant {
            Variant::Resize(_) => true,
            _ => state.blended_canvas.is_some(),
        };
        state.input_canvases.len() == self.inputs.len() && outputs_bound && staging_bound
    }

    /// Runs the hardware passes for one frame read from input buffer `input_index`.
    pub(crate) fn process_frame(
        &self,
        state: &mut TaskState,
        hw: &mut dyn Ge2dHardware,
        input_index: u32,
    ) -> std::result::Result<FrameDone, FrameError> {
        // The index was checked at submission, but the dispatcher re-checks every index it uses.
        if !self.inputs.contains(input_index) {
            return Err(FrameError::InvalidInputBuffer(input_index));
        }
        if !self.is_bound(state) {
            return Err(FrameError::Unbound);
        }
        let input = self.input_surface(state, input_index);

        if let Variant::InPlaceWatermark(wm) = &self.variant {
            wm.blend_in_place(state, hw, input)?;
            return Ok(FrameDone {
                buffer_id: input_index,
                image_format_index: state.output_index,
            });
        }

        let pool = self
            .output_pool
            .as_ref()
            .expect("task with output images has no output pool");
        let buffer = pool
            .lock_buffer_for_write()
            .ok_or(FrameError::NoOutputBuffer)?;
        let output = Surface {
            canvas: state.output_canvases[buffer.index() as usize].ids(),
            format: self.output_formats[state.output_index as usize],
            rect: self.output_formats[state.output_index as usize].rect(),
        };

        // On failure `buffer` is dropped and goes back to the free list.
        match &self.variant {
            Variant::Resize(resize) => resize.process(state, hw, input, output)?,
            Variant::Watermark(wm) => wm.process(state, hw, input, output)?,
            Variant::InPlaceWatermark(_) => unreachable!("handled above"),
        }

        Ok(FrameDone {
            buffer_id: buffer.release_write_lock_and_get_index(),
            image_format_index: state.output_index,
        })
    }

    fn input_surface(&self, state: &TaskState, input_index: u32) -> Surface {
        let format = self.input_formats[state.input_index as usize];
        Surface {
            canvas: state.input_canvases[input_index as usize].ids(),
            format,
            rect: format.rect(),
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Task")
            .field("type", &self.task_type())
            .field("inputs", &self.inputs.len())
            .field("output_formats", &self.output_formats.len())
            .finish()
    }
}

/// The whole staging buffer, as bound to the current watermark size.
fn blended_surface(state: &TaskState) -> Surface {
    let canvas = state
        .blended_canvas
        .as_ref()
        .expect("watermark task without a staging canvas");
    Surface {
        canvas: canvas.ids(),
        format: *canvas.format(),
        rect: canvas.format().rect(),
    }
}
