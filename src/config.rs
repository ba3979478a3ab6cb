// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Engine configuration.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::Deserialize;
use serde::Serialize;

use crate::error::Error;
use crate::error::Result;

/// Highest physical address the GE2D block can reach. Its DMA master uses 32-bit addresses.
pub const DEFAULT_DMA_ADDRESS_LIMIT: u64 = 1 << 32;

/// What the dispatcher does with entries still queued when the engine shuts down.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShutdownPolicy {
    /// Resolve every pending entry without touching the hardware: frames are reported as
    /// dropped, removals complete, resolution and crop changes are discarded.
    #[default]
    Cancel,
    /// Dispatch every pending entry normally, then exit.
    Drain,
}

impl std::str::FromStr for ShutdownPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "cancel" => Ok(ShutdownPolicy::Cancel),
            "drain" => Ok(ShutdownPolicy::Drain),
            _ => Err(format!("invalid shutdown policy `{}`, expected cancel or drain", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default, rename_all = "kebab-case")]
pub struct EngineConfig {
    /// Name given to the dispatcher thread.
    pub thread_name: String,
    pub shutdown_policy: ShutdownPolicy,
    /// Every pinned buffer must end below this physical address.
    pub dma_address_limit: u64,
    /// Require pinned buffers to be physically contiguous.
    pub require_contiguous: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            thread_name: String::from("ge2d_dispatcher"),
            shutdown_policy: ShutdownPolicy::default(),
            dma_address_limit: DEFAULT_DMA_ADDRESS_LIMIT,
            require_contiguous: true,
        }
    }
}

impl EngineConfig {
    /// Reads a JSON configuration file. Fields missing from the file keep their default value.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| Error::Config(format!("failed to open {}: {}", path.display(), e)))?;
        serde_json::from_reader(BufReader::new(file))
            .map_err(|e| Error::Config(format!("failed to parse {}: {}", path.display(), e)))
    }
}
