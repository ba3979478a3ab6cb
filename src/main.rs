// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Runs frames through a GE2D task on simulated hardware and reports what came out.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use anyhow::bail;
use anyhow::Context;
use argh::FromArgs;
use ge2d::sim::CompletionMode;
use ge2d::sim::SimBti;
use ge2d::sim::SimCanvasAllocator;
use ge2d::sim::SimHardware;
use ge2d::BufferCollection;
use ge2d::EngineConfig;
use ge2d::FrameAvailable;
use ge2d::FrameStatus;
use ge2d::Ge2dEngine;
use ge2d::ImageFormat;
use ge2d::MemoryHandle;
use ge2d::PixelFormat;
use ge2d::Rect;
use ge2d::ResizeInfo;
use ge2d::ShutdownPolicy;
use ge2d::TaskCallbacks;
use ge2d::TaskHandle;
use ge2d::TaskRemoveStatus;
use ge2d::WatermarkInfo;
use log::info;
use sync::Mutex;

const CALLBACK_TIMEOUT: Duration = Duration::from_secs(5);
const WATERMARK_SIZE: u32 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskKind {
    Resize,
    Watermark,
    InPlaceWatermark,
}

impl FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "resize" => Ok(TaskKind::Resize),
            "watermark" => Ok(TaskKind::Watermark),
            "in-place-watermark" => Ok(TaskKind::InPlaceWatermark),
            _ => Err(format!(
                "invalid task `{}`, expected resize, watermark or in-place-watermark",
                s
            )),
        }
    }
}

#[derive(FromArgs)]
/// Run frames through a GE2D task on simulated hardware.
struct Args {
    /// path to a JSON engine configuration file
    #[argh(option)]
    cfg: Option<PathBuf>,
    /// task to run: resize, watermark or in-place-watermark
    #[argh(option, default = "TaskKind::Resize")]
    task: TaskKind,
    /// number of frames to submit
    #[argh(option, default = "30")]
    frames: u32,
    /// number of input buffers
    #[argh(option, default = "4")]
    input_buffers: u32,
    /// number of output buffers
    #[argh(option, default = "4")]
    output_buffers: u32,
    /// width of the input frames
    #[argh(option, default = "1920")]
    width: u32,
    /// height of the input frames
    #[argh(option, default = "1080")]
    height: u32,
    /// index of the output format to use: 0 is full size, each step halves it
    #[argh(option, default = "0")]
    format_index: u32,
    /// return output buffers to the pool as soon as they are delivered
    #[argh(switch)]
    release: bool,
    /// what to do with queued work at exit: cancel or drain
    #[argh(option)]
    shutdown_policy: Option<ShutdownPolicy>,
}

/// Full, half and quarter size versions of the input format.
fn format_table(width: u32, height: u32) -> Vec<ImageFormat> {
    (0..3)
        .map(|shift| ImageFormat::new(PixelFormat::Nv12, width >> shift, height >> shift))
        .collect()
}

struct MemoryIds(u64);

impl MemoryIds {
    fn collection(&mut self, count: u32, format: ImageFormat, size: u64) -> BufferCollection {
        BufferCollection {
            buffers: (0..count)
                .map(|_| {
                    self.0 += 1;
                    MemoryHandle::new(self.0, size)
                })
                .collect(),
            format,
        }
    }

    fn watermarks(&mut self, table: &[ImageFormat]) -> Vec<WatermarkInfo> {
        (0..table.len() as u32)
            .map(|shift| {
                let image_format = ImageFormat::new(
                    PixelFormat::Rgba8888,
                    (WATERMARK_SIZE >> shift).max(1),
                    (WATERMARK_SIZE >> shift).max(1),
                );
                self.0 += 1;
                WatermarkInfo {
                    location_x: 16 >> shift,
                    location_y: 16 >> shift,
                    global_alpha: 0xc0,
                    image_format,
                    image: MemoryHandle::new(self.0, image_format.buffer_size()),
                }
            })
            .collect()
    }
}

fn create_task(
    engine: &Ge2dEngine,
    args: &Args,
    callbacks: TaskCallbacks,
) -> anyhow::Result<TaskHandle> {
    let table = format_table(args.width, args.height);
    let input_format = table[0];
    let buffer_size = input_format.buffer_size();
    let mut ids = MemoryIds(0);
    let inputs = ids.collection(args.input_buffers, input_format, buffer_size);
    let handle = match args.task {
        TaskKind::Resize => {
            let outputs = ids.collection(args.output_buffers, input_format, buffer_size);
            let info = ResizeInfo {
                crop: input_format.rect(),
                ..Default::default()
            };
            engine.init_task_resize(
                &inputs,
                &outputs,
                &info,
                &input_format,
                &table,
                args.format_index,
                callbacks,
            )
        }
        TaskKind::Watermark => {
            let outputs = ids.collection(args.output_buffers, input_format, buffer_size);
            let watermarks = ids.watermarks(&table);
            engine.init_task_watermark(
                &inputs,
                &outputs,
                &watermarks,
                &table,
                args.format_index,
                callbacks,
            )
        }
        TaskKind::InPlaceWatermark => {
            let watermarks = ids.watermarks(&table);
            engine.init_task_in_place_watermark(
                &inputs,
                &watermarks,
                &table,
                args.format_index,
                callbacks,
            )
        }
    };
    handle.with_context(|| format!("failed to create {:?} task", args.task))
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args: Args = argh::from_env();
    if args.input_buffers == 0 {
        bail!("at least one input buffer is needed");
    }

    let mut config = match &args.cfg {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(policy) = args.shutdown_policy {
        config.shutdown_policy = policy;
    }

    let (hw, controller) = SimHardware::new(CompletionMode::Immediate);
    let engine = Ge2dEngine::new(
        config,
        Arc::new(SimBti::new()),
        Arc::new(SimCanvasAllocator::new()),
        Box::new(hw),
    )
    .context("failed to start the engine")?;

    let (frame_tx, frame_rx) = mpsc::channel::<FrameAvailable>();
    let (removed_tx, removed_rx) = mpsc::channel::<TaskRemoveStatus>();
    let frame_tx = Mutex::new(frame_tx);
    let removed_tx = Mutex::new(removed_tx);
    let callbacks = TaskCallbacks {
        frame_ready: Arc::new(move |frame| {
            let _ = frame_tx.lock().send(frame);
        }),
        resolution_changed: Arc::new(|change| {
            info!("resolution changed to format {}", change.image_format_index);
        }),
        task_removed: Arc::new(move |status| {
            let _ = removed_tx.lock().send(status);
        }),
    };
    let handle = create_task(&engine, &args, callbacks)?;

    for frame in 0..args.frames {
        engine
            .process_frame(handle, frame % args.input_buffers)
            .with_context(|| format!("failed to submit frame {}", frame))?;
    }

    let mut delivered = 0;
    let mut dropped = 0;
    for _ in 0..args.frames {
        let frame = frame_rx
            .recv_timeout(CALLBACK_TIMEOUT)
            .context("timed out waiting for a frame")?;
        match (frame.status, frame.buffer_id) {
            (FrameStatus::Ok, Some(buffer_id)) => {
                delivered += 1;
                if args.release && args.task != TaskKind::InPlaceWatermark {
                    engine
                        .release_frame(handle, buffer_id)
                        .context("failed to release an output buffer")?;
                }
            }
            _ => dropped += 1,
        }
    }

    engine.remove_task(handle)?;
    match removed_rx.recv_timeout(CALLBACK_TIMEOUT) {
        Ok(TaskRemoveStatus::Ok) => {}
        Ok(status) => return Err(anyhow!("task removal failed: {:?}", status)),
        Err(e) => return Err(e).context("timed out waiting for task removal"),
    }
    engine.shutdown();

    println!(
        "{:?}: {} frames delivered, {} dropped, {} hardware operations",
        args.task,
        delivered,
        dropped,
        controller.commit_count()
    );
    Ok(())
}
