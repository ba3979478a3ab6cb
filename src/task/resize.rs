// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use log::info;

use super::Task;
use super::TaskCallbacks;
use super::TaskContext;
use super::TaskParts;
use super::TaskState;
use super::Variant;
use crate::buffer_pool::BufferPool;
use crate::error::Error;
use crate::error::FrameError;
use crate::error::Result;
use crate::format::max_buffer_size;
use crate::format::validate_format_table;
use crate::format::ImageFormat;
use crate::format::Rect;
use crate::format::Rotation;
use crate::hw::Ge2dHardware;
use crate::hw::Pass;
use crate::hw::Surface;
use crate::input::PinnedInputSet;
use crate::memory::BufferCollection;

/// Crop and rotation applied by a resize task.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ResizeInfo {
    /// Region of the input image that is scaled onto the whole output image.
    pub crop: Rect,
    pub rotation: Rotation,
}

pub(crate) struct Resize {
    rotation: Rotation,
}

impl Resize {
    /// Scales the crop region of `input` onto `output` in a single pass.
    pub fn process(
        &self,
        state: &TaskState,
        hw: &mut dyn Ge2dHardware,
        input: Surface,
        output: Surface,
    ) -> std::result::Result<(), FrameError> {
        let input = Surface {
            rect: state.crop,
            ..input
        };
        Pass::copy(input, output, self.rotation).run(hw)?;
        Ok(())
    }
}

impl Task {
    /// Creates a resize task.
    ///
    /// Every argument is validated before any buffer is pinned. The format table is copied, the
    /// caller's slice only needs to live for the duration of the call.
    #[allow(clippy::too_many_arguments)]
    pub fn init_resize(
        ctx: &TaskContext,
        input_collection: &BufferCollection,
        output_collection: &BufferCollection,
        info: &ResizeInfo,
        input_format: &ImageFormat,
        output_formats: &[ImageFormat],
        output_index: u32,
        callbacks: TaskCallbacks,
    ) -> Result<Task> {
        if input_collection.is_empty() || output_collection.is_empty() {
            return Err(Error::InvalidArgs("buffer collection is empty"));
        }
        input_format.validate()?;
        validate_format_table(output_formats, output_index)?;
        if !info
            .crop
            .fits_within(input_format.coded_width, input_format.coded_height)
        {
            return Err(Error::InvalidArgs("crop rectangle outside the input image"));
        }

        let inputs = PinnedInputSet::new(
            ctx.bti,
            input_collection,
            input_format.buffer_size(),
            false,
            ctx.config,
        )?;
        let output_pool = BufferPool::new(
            ctx.bti,
            output_collection,
            max_buffer_size(output_formats),
            ctx.config,
        )?;
        info!(
            "resize task: {} inputs of {}, {} outputs, {} output formats",
            inputs.len(),
            input_format,
            output_pool.len(),
            output_formats.len()
        );

        Task::new(
            ctx,
            TaskParts {
                variant: Variant::Resize(Resize {
                    rotation: info.rotation,
                }),
                input_formats: vec![*input_format],
                output_formats: output_formats.to_vec(),
                inputs,
                output_pool: Some(output_pool),
                callbacks,
                input_index: 0,
                output_index,
                crop: info.crop,
            },
        )
    }
}
