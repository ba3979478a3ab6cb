// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Watermark blending.
//!
//! Each entry of the task's image format table has its own watermark, so that the overlay can be
//! pre-scaled for every resolution the stream may switch to. Blending goes through a staging
//! buffer: the region of the frame under the watermark is blended with the overlay into the
//! staging buffer, which is then copied back over that region.

use std::sync::Arc;

use log::info;

use super::blended_surface;
use super::Task;
use super::TaskCallbacks;
use super::TaskContext;
use super::TaskParts;
use super::TaskState;
use super::Variant;
use crate::buffer_pool::BufferPool;
use crate::canvas::CanvasAccess;
use crate::canvas::CanvasAllocator;
use crate::canvas::ImageCanvas;
use crate::error::Error;
use crate::error::FrameError;
use crate::error::Result;
use crate::format::max_buffer_size;
use crate::format::validate_format_table;
use crate::format::ImageFormat;
use crate::format::PixelFormat;
use crate::format::Rect;
use crate::format::Rotation;
use crate::hw::Blend;
use crate::hw::Ge2dHardware;
use crate::hw::Pass;
use crate::hw::Surface;
use crate::input::PinnedInputSet;
use crate::memory::BufferCollection;
use crate::memory::ContiguousBuffer;
use crate::memory::MemoryHandle;
use crate::memory::PinOptions;
use crate::memory::PinnedBuffer;

/// A watermark for one entry of the image format table.
#[derive(Debug, Clone)]
pub struct WatermarkInfo {
    /// Position of the watermark's top-left corner in the frame.
    pub location_x: u32,
    pub location_y: u32,
    /// 0xff keeps the watermark's own per-pixel alpha, lower values fade it.
    pub global_alpha: u8,
    /// Must be RGBA.
    pub image_format: ImageFormat,
    pub image: MemoryHandle,
}

impl WatermarkInfo {
    fn location(&self) -> Rect {
        Rect::new(
            self.location_x,
            self.location_y,
            self.image_format.coded_width,
            self.image_format.coded_height,
        )
    }
}

struct WatermarkImage {
    location: Rect,
    blend: Blend,
    format: ImageFormat,
    canvas: ImageCanvas,
    // Declared after `canvas` so the canvas is released before the memory is unpinned.
    _image: PinnedBuffer,
}

pub(crate) struct Watermark {
    images: Vec<WatermarkImage>,
    staging: ContiguousBuffer,
}

/// Checks the watermarks against the format table they belong to. Runs before anything is pinned.
fn validate_watermarks(infos: &[WatermarkInfo], formats: &[ImageFormat]) -> Result<()> {
    if infos.len() != formats.len() {
        return Err(Error::InvalidArgs(
            "need exactly one watermark per image format",
        ));
    }
    for (info, format) in infos.iter().zip(formats) {
        if info.image_format.pixel_format != PixelFormat::Rgba8888 {
            return Err(Error::InvalidArgs("watermark image must be RGBA"));
        }
        info.image_format.validate()?;
        if info.image.size() < info.image_format.buffer_size() {
            return Err(Error::InvalidArgs("watermark image buffer too small"));
        }
        if !info
            .location()
            .fits_within(format.coded_width, format.coded_height)
        {
            return Err(Error::InvalidArgs("watermark does not fit in its frame"));
        }
    }
    Ok(())
}

impl Watermark {
    fn new(ctx: &TaskContext, infos: &[WatermarkInfo]) -> Result<Self> {
        let read_only = PinOptions {
            writable: false,
            contiguous: ctx.config.require_contiguous,
        };
        let images = infos
            .iter()
            .map(|info| {
                let image = PinnedBuffer::pin(
                    ctx.bti,
                    info.image.clone(),
                    read_only,
                    ctx.config.dma_address_limit,
                )?;
                let canvas = ImageCanvas::allocate(
                    ctx.canvas,
                    image.memory(),
                    &info.image_format,
                    CanvasAccess::Read,
                )?;
                Ok(WatermarkImage {
                    location: info.location(),
                    blend: Blend {
                        global_alpha: info.global_alpha,
                    },
                    format: info.image_format,
                    canvas,
                    _image: image,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let staging_size = infos
            .iter()
            .map(|info| info.image_format.buffer_size())
            .max()
            .unwrap_or(0);
        let staging =
            ContiguousBuffer::allocate(ctx.bti, staging_size, ctx.config.dma_address_limit)?;
        Ok(Watermark { images, staging })
    }

    fn image(&self, index: u32) -> &WatermarkImage {
        &self.images[index as usize]
    }

    /// Binds a canvas over the staging buffer sized for watermark `index`.
    pub fn allocate_blended_canvas(
        &self,
        canvas: &Arc<dyn CanvasAllocator>,
        index: u32,
    ) -> Result<ImageCanvas> {
        let image = self
            .images
            .get(index as usize)
            .ok_or(Error::InvalidArgs("image format index out of range"))?;
        let format = ImageFormat::new(
            image.format.pixel_format,
            image.format.coded_width,
            image.format.coded_height,
        );
        ImageCanvas::allocate(
            canvas,
            self.staging.memory(),
            &format,
            CanvasAccess::ReadWrite,
        )
    }

    /// Blends the watermark over the region of `frame` it covers, leaving the result in the
    /// staging buffer.
    fn blend_into_staging(
        &self,
        state: &TaskState,
        hw: &mut dyn Ge2dHardware,
        frame: Surface,
    ) -> std::result::Result<Surface, FrameError> {
        let image = self.image(state.output_index);
        let overlay = Surface {
            canvas: image.canvas.ids(),
            format: image.format,
            rect: image.format.rect(),
        };
        let staging = blended_surface(state);
        let region = Surface {
            rect: image.location,
            ..frame
        };
        Pass::blend(region, overlay, staging, image.blend).run(hw)?;
        Ok(staging)
    }

    /// Copies the staging buffer back over the watermark region of `frame`.
    fn copy_back(
        &self,
        state: &TaskState,
        hw: &mut dyn Ge2dHardware,
        staging: Surface,
        frame: Surface,
    ) -> std::result::Result<(), FrameError> {
        let region = Surface {
            rect: self.image(state.output_index).location,
            ..frame
        };
        Pass::copy(staging, region, Rotation::Deg0).run(hw)?;
        Ok(())
    }

    /// Copies `input` into `output`, then blends the watermark over the copy.
    pub fn process(
        &self,
        state: &TaskState,
        hw: &mut dyn Ge2dHardware,
        input: Surface,
        output: Surface,
    ) -> std::result::Result<(), FrameError> {
        Pass::copy(input, output, Rotation::Deg0).run(hw)?;
        let staging = self.blend_into_staging(state, hw, input)?;
        self.copy_back(state, hw, staging, output)
    }

    /// Blends the watermark directly into `frame`.
    pub fn blend_in_place(
        &self,
        state: &TaskState,
        hw: &mut dyn Ge2dHardware,
        frame: Surface,
    ) -> std::result::Result<(), FrameError> {
        let staging = self.blend_into_staging(state, hw, frame)?;
        self.copy_back(state, hw, staging, frame)
    }
}

impl Task {
    /// Creates a watermark task writing into a pool of output buffers. Input and output share
    /// `image_formats`, and `infos[i]` is the watermark applied at `image_formats[i]`.
    pub fn init_watermark(
        ctx: &TaskContext,
        input_collection: &BufferCollection,
        output_collection: &BufferCollection,
        infos: &[WatermarkInfo],
        image_formats: &[ImageFormat],
        image_format_index: u32,
        callbacks: TaskCallbacks,
    ) -> Result<Task> {
        if input_collection.is_empty() || output_collection.is_empty() {
            return Err(Error::InvalidArgs("buffer collection is empty"));
        }
        validate_format_table(image_formats, image_format_index)?;
        validate_watermarks(infos, image_formats)?;

        let buffer_size = max_buffer_size(image_formats);
        let inputs = PinnedInputSet::new(ctx.bti, input_collection, buffer_size, false, ctx.config)?;
        let output_pool = BufferPool::new(ctx.bti, output_collection, buffer_size, ctx.config)?;
        let watermark = Watermark::new(ctx, infos)?;
        info!(
            "watermark task: {} inputs, {} outputs, {} formats",
            inputs.len(),
            output_pool.len(),
            image_formats.len()
        );

        Task::new(
            ctx,
            TaskParts {
                variant: Variant::Watermark(watermark),
                input_formats: image_formats.to_vec(),
                output_formats: image_formats.to_vec(),
                inputs,
                output_pool: Some(output_pool),
                callbacks,
                input_index: image_format_index,
                output_index: image_format_index,
                crop: Rect::default(),
            },
        )
    }

    /// Creates a watermark task that blends into the client's input buffers.
    pub fn init_in_place_watermark(
        ctx: &TaskContext,
        input_collection: &BufferCollection,
        infos: &[WatermarkInfo],
        image_formats: &[ImageFormat],
        image_format_index: u32,
        callbacks: TaskCallbacks,
    ) -> Result<Task> {
        if input_collection.is_empty() {
            return Err(Error::InvalidArgs("buffer collection is empty"));
        }
        validate_format_table(image_formats, image_format_index)?;
        validate_watermarks(infos, image_formats)?;

        let inputs = PinnedInputSet::new(
            ctx.bti,
            input_collection,
            max_buffer_size(image_formats),
            true,
            ctx.config,
        )?;
        let watermark = Watermark::new(ctx, infos)?;
        info!(
            "in-place watermark task: {} buffers, {} formats",
            inputs.len(),
            image_formats.len()
        );

        Task::new(
            ctx,
            TaskParts {
                variant: Variant::InPlaceWatermark(watermark),
                input_formats: image_formats.to_vec(),
                output_formats: image_formats.to_vec(),
                inputs,
                output_pool: None,
                callbacks,
                input_index: image_format_index,
                output_index: image_format_index,
                crop: Rect::default(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::CompletionMode;
    use crate::sim::HwCall;
    use crate::sim::SimHardware;
    use crate::task::tests::channel_callbacks;
    use crate::task::tests::Fixture;
    use crate::task::TaskType;

    fn formats() -> Vec<ImageFormat> {
        vec![
            ImageFormat::new(PixelFormat::Nv12, 1280, 720),
            ImageFormat::new(PixelFormat::Nv12, 640, 360),
        ]
    }

    fn infos(fixture: &mut Fixture) -> Vec<WatermarkInfo> {
        [(64, 32), (32, 16)]
            .iter()
            .map(|&(width, height)| {
                let image_format = ImageFormat::new(PixelFormat::Rgba8888, width, height);
                WatermarkInfo {
                    location_x: 100,
                    location_y: 50,
                    global_alpha: 0xc0,
                    image_format,
                    image: fixture.memory(image_format.buffer_size()),
                }
            })
            .collect()
    }

    fn build(fixture: &mut Fixture, outputs: usize) -> Task {
        let size = formats()[0].buffer_size();
        let input = fixture.collection(2, formats()[0], size);
        let output = fixture.collection(outputs, formats()[0], size);
        let infos = infos(fixture);
        let (callbacks, _, _, _) = channel_callbacks();
        Task::init_watermark(
            &fixture.ctx(),
            &input,
            &output,
            &infos,
            &formats(),
            0,
            callbacks,
        )
        .unwrap()
    }

    fn build_in_place(fixture: &mut Fixture) -> Task {
        let input = fixture.collection(3, formats()[0], formats()[0].buffer_size());
        let infos = infos(fixture);
        let (callbacks, _, _, _) = channel_callbacks();
        Task::init_in_place_watermark(&fixture.ctx(), &input, &infos, &formats(), 1, callbacks)
            .unwrap()
    }

    #[test]
    fn watermark_count_must_match_table() {
        let mut fixture = Fixture::new();
        let input = fixture.collection(1, formats()[0], formats()[0].buffer_size());
        let mut infos = infos(&mut fixture);
        infos.pop();
        let (callbacks, _, _, _) = channel_callbacks();
        assert!(matches!(
            Task::init_in_place_watermark(&fixture.ctx(), &input, &infos, &formats(), 0, callbacks),
            Err(Error::InvalidArgs(_))
        ));
        assert_eq!(fixture.bti.pin_calls(), 0);
    }

    #[test]
    fn watermark_must_be_rgba_and_fit() {
        let mut fixture = Fixture::new();
        let input = fixture.collection(1, formats()[0], formats()[0].buffer_size());

        let mut infos = infos(&mut fixture);
        infos[1].image_format = ImageFormat::new(PixelFormat::Nv12, 32, 16);
        let (callbacks, _, _, _) = channel_callbacks();
        assert!(Task::init_in_place_watermark(
            &fixture.ctx(),
            &input,
            &infos,
            &formats(),
            0,
            callbacks
        )
        .is_err());

        let mut infos = self::infos(&mut fixture);
        infos[1].location_x = 620;
        let (callbacks, _, _, _) = channel_callbacks();
        assert!(Task::init_in_place_watermark(
            &fixture.ctx(),
            &input,
            &infos,
            &formats(),
            0,
            callbacks
        )
        .is_err());

        let mut infos = self::infos(&mut fixture);
        infos[0].image = fixture.memory(16);
        let (callbacks, _, _, _) = channel_callbacks();
        assert!(Task::init_in_place_watermark(
            &fixture.ctx(),
            &input,
            &infos,
            &formats(),
            0,
            callbacks
        )
        .is_err());
        assert_eq!(fixture.bti.pin_calls(), 0);
    }

    #[test]
    fn init_pins_images_and_staging() {
        let mut fixture = Fixture::new();
        let task = build(&mut fixture, 2);
        assert_eq!(task.task_type(), TaskType::Watermark);
        // 2 inputs + 2 outputs + 2 watermark images + staging.
        assert_eq!(fixture.bti.pinned_count(), 7);
        assert_eq!(fixture.bti.allocated_count(), 1);
        // NV12 inputs and outputs take two slots each, RGBA images and staging one.
        assert_eq!(fixture.canvas.in_use(), 11);
        drop(task);
        assert_eq!(fixture.bti.pinned_count(), 0);
        assert_eq!(fixture.bti.allocated_count(), 0);
        assert_eq!(fixture.canvas.in_use(), 0);
    }

    #[test]
    fn frame_runs_copy_blend_copy() {
        let mut fixture = Fixture::new();
        let task = build(&mut fixture, 1);
        let (mut hw, controller) = SimHardware::new(CompletionMode::Immediate);

        let mut state = task.lock_state();
        let done = task.process_frame(&mut state, &mut hw, 1).unwrap();
        assert_eq!(done.buffer_id, 0);
        assert_eq!(controller.commit_count(), 3);

        let geometries = controller.geometries();
        let location = Rect::new(100, 50, 64, 32);
        assert_eq!(geometries[0].input, formats()[0].rect());
        assert_eq!(geometries[0].output, formats()[0].rect());
        assert_eq!(geometries[1].input, location);
        assert_eq!(geometries[1].second_input, Some(Rect::new(0, 0, 64, 32)));
        assert_eq!(geometries[1].output, Rect::new(0, 0, 64, 32));
        assert_eq!(geometries[2].input, Rect::new(0, 0, 64, 32));
        assert_eq!(geometries[2].output, location);

        let blends: Vec<_> = controller
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                HwCall::Formats { blend, .. } => Some(blend),
                _ => None,
            })
            .collect();
        assert_eq!(
            blends,
            vec![None, Some(Blend { global_alpha: 0xc0 }), None]
        );
    }

    #[test]
    fn in_place_reports_input_buffer() {
        let mut fixture = Fixture::new();
        let task = build_in_place(&mut fixture);
        assert!(!task.has_output_images());
        assert!(task.output_pool().is_none());
        assert_eq!(fixture.bti.writable_pins(), 4);
        let (mut hw, controller) = SimHardware::new(CompletionMode::Immediate);

        let mut state = task.lock_state();
        let done = task.process_frame(&mut state, &mut hw, 2).unwrap();
        assert_eq!(done.buffer_id, 2);
        assert_eq!(done.image_format_index, 1);
        assert_eq!(controller.commit_count(), 2);
        let geometries = controller.geometries();
        assert_eq!(geometries[0].input, Rect::new(100, 50, 32, 16));
        assert_eq!(geometries[1].output, Rect::new(100, 50, 32, 16));
    }

    #[test]
    fn resolution_change_rebinds_staging_canvas() {
        let mut fixture = Fixture::new();
        let task = build(&mut fixture, 1);
        let mut state = task.lock_state();
        assert_eq!(
            state.blended_canvas.as_ref().unwrap().format().coded_width,
            64
        );

        task.change_input_res(&mut state, 1).unwrap();
        task.change_output_res(&mut state, 1).unwrap();
        assert_eq!(state.input_index, 1);
        assert_eq!(state.output_index, 1);
        assert_eq!(
            state.blended_canvas.as_ref().unwrap().format().coded_width,
            32
        );
        assert_eq!(fixture.canvas.in_use(), 11);
    }
}
