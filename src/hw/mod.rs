// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Interface to the GE2D register block.
//!
//! The engine never touches registers itself. It describes each hardware operation as a
//! [`Pass`] and plays it against a [`Ge2dHardware`] implementation owned by the dispatcher
//! thread: formats, geometry and addressing are programmed, the operation is committed, and the
//! dispatcher blocks until the block signals completion.

mod scaler;

use remain::sorted;
use thiserror::Error;

pub use self::scaler::AxisScaler;
pub use self::scaler::PHASE_FRACTION_BITS;
pub use self::scaler::ScalerConfig;
use crate::canvas::CanvasIds;
use crate::format::ImageFormat;
use crate::format::Rect;
use crate::format::Rotation;

#[sorted]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HwError {
    #[error("hardware reported error status {0:#x}")]
    Status(u32),
    #[error("waiting for the completion interrupt failed: {0}")]
    WaitFailed(String),
}

/// Alpha blending of the second input over the first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Blend {
    /// Applied on top of the per-pixel alpha of the second input. 0xff is fully opaque.
    pub global_alpha: u8,
}

/// Source and destination rectangles of one operation, with the scaler settings between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub input: Rect,
    pub second_input: Option<Rect>,
    pub output: Rect,
    pub rotation: Rotation,
    pub scaler: ScalerConfig,
}

/// Register programmer for the GE2D block.
pub trait Ge2dHardware: Send {
    fn program_formats(&mut self, input: &ImageFormat, output: &ImageFormat, blend: Option<Blend>);

    fn program_geometry(&mut self, geometry: &Geometry);

    fn program_addressing(
        &mut self,
        input: CanvasIds,
        output: CanvasIds,
        second_input: Option<CanvasIds>,
    );

    /// Starts the programmed operation.
    fn commit(&mut self);

    /// Blocks until the operation started by `commit` finishes. There is no timeout.
    fn wait_for_completion(&mut self) -> Result<(), HwError>;
}

/// An image region the hardware reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Surface {
    pub canvas: CanvasIds,
    pub format: ImageFormat,
    pub rect: Rect,
}

/// One complete hardware operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pass {
    pub input: Surface,
    /// Overlay blended over `input`, present only for blending passes.
    pub second_input: Option<Surface>,
    pub output: Surface,
    pub rotation: Rotation,
    pub blend: Option<Blend>,
}

impl Pass {
    /// A plain copy or scale from `input` to `output`.
    pub fn copy(input: Surface, output: Surface, rotation: Rotation) -> Self {
        Pass {
            input,
            second_input: None,
            output,
            rotation,
            blend: None,
        }
    }

    /// Blends `overlay` over `input` into `output`. All three rectangles have the same size.
    pub fn blend(input: Surface, overlay: Surface, output: Surface, blend: Blend) -> Self {
        Pass {
            input,
            second_input: Some(overlay),
            output,
            rotation: Rotation::Deg0,
            blend: Some(blend),
        }
    }

    /// Programs the pass, starts it and waits for the hardware to finish.
    pub fn run(&self, hw: &mut dyn Ge2dHardware) -> Result<(), HwError> {
        let scaler = ScalerConfig::new(self.input.rect, self.output.rect, self.rotation);
        hw.program_formats(&self.input.format, &self.output.format, self.blend);
        hw.program_geometry(&Geometry {
            input: self.input.rect,
            second_input: self.second_input.map(|s| s.rect),
            output: self.output.rect,
            rotation: self.rotation,
            scaler,
        });
        hw.program_addressing(
            self.input.canvas,
            self.output.canvas,
            self.second_input.map(|s| s.canvas),
        );
        hw.commit();
        hw.wait_for_completion()
    }
}
