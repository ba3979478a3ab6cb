// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Errors surfaced by the GE2D engine.
//!
//! Errors returned from a public call are always synchronous: a request that fails validation
//! never reaches the processing queue. Failures that happen on the dispatcher thread travel
//! through the client callbacks instead, as a [`FrameStatus`] or [`TaskRemoveStatus`].

use remain::sorted;
use thiserror::Error;

use crate::hw::HwError;
use crate::memory::PinError;

#[sorted]
#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to load configuration: {0}")]
    Config(String),
    #[error("invalid argument: {0}")]
    InvalidArgs(&'static str),
    #[error("out of memory: {0}")]
    NoMemory(PinError),
    #[error("no resources available: {0}")]
    NoResources(&'static str),
    #[error("the engine is shutting down")]
    ShuttingDown,
    #[error("failed to spawn the dispatcher thread: {0}")]
    SpawnWorker(std::io::Error),
}

impl From<PinError> for Error {
    fn from(e: PinError) -> Self {
        match e {
            PinError::NotContiguous => Error::NoResources("memory is not physically contiguous"),
            e => Error::NoMemory(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Outcome of a frame request, reported through the frame-ready callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    Ok,
    /// The frame was dropped: no output buffer was free, the hardware failed, or the engine was
    /// shutting down.
    ErrorFrame,
}

/// Outcome of a task removal, reported through the remove-task callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskRemoveStatus {
    Ok,
    /// The task had already been removed by an earlier request.
    Error,
}

/// Internal failure of a single frame on the dispatcher thread. Never returned to clients,
/// it is logged and turned into [`FrameStatus::ErrorFrame`].
#[sorted]
#[derive(Error, Debug)]
pub(crate) enum FrameError {
    #[error("hardware failure: {0}")]
    Hardware(#[from] HwError),
    #[error("input buffer {0} is out of range")]
    InvalidInputBuffer(u32),
    #[error("no free output buffer")]
    NoOutputBuffer,
    #[error("task has no canvases for its current formats")]
    Unbound,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contiguity_failures_are_resource_errors() {
        assert!(matches!(
            Error::from(PinError::NotContiguous),
            Error::NoResources(_)
        ));
        assert!(matches!(
            Error::from(PinError::OutOfMemory),
            Error::NoMemory(PinError::OutOfMemory)
        ));
    }
}
