// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::format::Rect;
use crate::format::Rotation;

/// Number of fractional bits in scaler steps and phases.
pub const PHASE_FRACTION_BITS: u32 = 24;
const PHASE_ONE: u64 = 1 << PHASE_FRACTION_BITS;

/// Scaler settings for one axis, in 8.24 fixed point.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AxisScaler {
    /// Scaling is bypassed when the axis is copied 1:1.
    pub enabled: bool,
    /// Source pixels advanced per destination pixel.
    pub step: u32,
    /// Source position of the first destination pixel centre, relative to the first source pixel
    /// centre.
    pub initial_phase: u32,
}

impl AxisScaler {
    fn new(input: u32, output: u32) -> Self {
        if input == output || input == 0 || output == 0 {
            return AxisScaler {
                enabled: false,
                step: PHASE_ONE as u32,
                initial_phase: 0,
            };
        }
        let step = ((input as u64) << PHASE_FRACTION_BITS) / output as u64;
        // Align pixel centres: the first output centre sits at (step - 1) / 2 in source
        // coordinates. When upscaling that is negative and the hardware clamps to the first
        // source pixel.
        let initial_phase = (step / 2).saturating_sub(PHASE_ONE / 2);
        AxisScaler {
            enabled: true,
            step: step.min(u32::MAX as u64) as u32,
            initial_phase: initial_phase.min(u32::MAX as u64) as u32,
        }
    }
}

/// Scaler settings mapping an input rectangle onto an output rectangle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScalerConfig {
    pub horizontal: AxisScaler,
    pub vertical: AxisScaler,
}

impl ScalerConfig {
    /// Computes the scaler settings. Rotations by 90 and 270 degrees read input rows into output
    /// columns, so the input width is scaled onto the output height.
    pub fn new(input: Rect, output: Rect, rotation: Rotation) -> Self {
        let (out_width, out_height) = if rotation.swaps_axes() {
            (output.height, output.width)
        } else {
            (output.width, output.height)
        };
        ScalerConfig {
            horizontal: AxisScaler::new(input.width, out_width),
            vertical: AxisScaler::new(input.height, out_height),
        }
    }

    pub fn is_bypassed(&self) -> bool {
        !self.horizontal.enabled && !self.vertical.enabled
    }
}
