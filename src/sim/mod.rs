// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! In-process stand-ins for the platform services the engine drives.
//!
//! These back the unit and integration tests and the `ge2d_sim` binary. None of them touch real
//! memory: addresses are made up, canvases are table slots, and the hardware only records what it
//! was asked to do.

mod bti;
mod canvas;
mod hardware;

pub use self::bti::SimBti;
pub use self::canvas::SimCanvasAllocator;
pub use self::canvas::CANVAS_TABLE_SIZE;
pub use self::hardware::CompletionMode;
pub use self::hardware::HwCall;
pub use self::hardware::SimHardware;
pub use self::hardware::SimHardwareController;
