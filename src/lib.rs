// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Task engine for the GE2D 2D graphics accelerator found on Amlogic camera pipelines.
//!
//! Clients create tasks (resize, watermark, in-place watermark) against buffer collections they
//! share with the engine, then submit frames. A single dispatcher thread owns the hardware: it
//! takes requests from a FIFO queue, programs and runs the hardware passes for each one, and
//! reports results through the task's callbacks. Client threads never wait for the hardware.

pub mod buffer_pool;
pub mod canvas;
pub mod config;
mod dispatcher;
mod engine;
mod error;
pub mod format;
pub mod hw;
pub mod input;
pub mod memory;
pub mod queue;
pub mod registry;
pub mod sim;
pub mod task;

pub use crate::config::EngineConfig;
pub use crate::config::ShutdownPolicy;
pub use crate::engine::Ge2dEngine;
pub use crate::error::Error;
pub use crate::error::FrameStatus;
pub use crate::error::Result;
pub use crate::error::TaskRemoveStatus;
pub use crate::format::ImageFormat;
pub use crate::format::PixelFormat;
pub use crate::format::Rect;
pub use crate::format::Rotation;
pub use crate::memory::BufferCollection;
pub use crate::memory::MemoryHandle;
pub use crate::task::FrameAvailable;
pub use crate::task::FrameMetadata;
pub use crate::task::ResizeInfo;
pub use crate::task::ResolutionChange;
pub use crate::task::TaskCallbacks;
pub use crate::task::TaskHandle;
pub use crate::task::TaskType;
pub use crate::task::WatermarkInfo;
