// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Client-facing API of the GE2D engine.
//!
//! Every call here runs on the caller's thread and only touches the task registry, the processing
//! queue and output buffer pools. Requests are validated against the task's current state before
//! they are queued, so a call that returns `Ok` is guaranteed to be answered through a callback.

use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;
use std::thread::ThreadId;

use log::error;
use log::info;
use sync::Mutex;

use crate::canvas::CanvasAllocator;
use crate::config::EngineConfig;
use crate::dispatcher::Dispatcher;
use crate::dispatcher::Shared;
use crate::error::Error;
use crate::error::Result;
use crate::format::ImageFormat;
use crate::format::Rect;
use crate::hw::Ge2dHardware;
use crate::memory::BufferCollection;
use crate::memory::Bti;
use crate::queue::Operation;
use crate::queue::QueueEntry;
use crate::task::ResizeInfo;
use crate::task::Task;
use crate::task::TaskCallbacks;
use crate::task::TaskContext;
use crate::task::TaskHandle;
use crate::task::TaskType;
use crate::task::WatermarkInfo;

pub struct Ge2dEngine {
    shared: Arc<Shared>,
    bti: Arc<dyn Bti>,
    canvas: Arc<dyn CanvasAllocator>,
    config: EngineConfig,
    worker_id: ThreadId,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Ge2dEngine {
    /// Starts the dispatcher thread, which takes ownership of `hw`.
    pub fn new(
        config: EngineConfig,
        bti: Arc<dyn Bti>,
        canvas: Arc<dyn CanvasAllocator>,
        hw: Box<dyn Ge2dHardware>,
    ) -> Result<Self> {
        let shared = Arc::new(Shared::new());
        let dispatcher = Dispatcher::new(Arc::clone(&shared), hw, config.shutdown_policy);
        let worker = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || dispatcher.run())
            .map_err(Error::SpawnWorker)?;
        Ok(Ge2dEngine {
            shared,
            bti,
            canvas,
            config,
            worker_id: worker.thread().id(),
            worker: Mutex::new(Some(worker)),
        })
    }

    fn ctx(&self) -> TaskContext {
        TaskContext {
            bti: &self.bti,
            canvas: &self.canvas,
            config: &self.config,
        }
    }

    fn check_running(&self) -> Result<()> {
        if self.is_shutting_down() {
            return Err(Error::ShuttingDown);
        }
        Ok(())
    }

    fn register(&self, task: Task) -> TaskHandle {
        let task_type = task.task_type();
        let handle = self.shared.registry.insert(task);
        info!("{}: created {:?} task", handle, task_type);
        handle
    }

    /// Creates a task that crops `info.crop` out of each input frame and scales it into an output
    /// buffer in `output_formats[output_index]`.
    #[allow(clippy::too_many_arguments)]
    pub fn init_task_resize(
        &self,
        input_collection: &BufferCollection,
        output_collection: &BufferCollection,
        info: &ResizeInfo,
        input_format: &ImageFormat,
        output_formats: &[ImageFormat],
        output_index: u32,
        callbacks: TaskCallbacks,
    ) -> Result<TaskHandle> {
        self.check_running()?;
        let task = Task::init_resize(
            &self.ctx(),
            input_collection,
            output_collection,
            info,
            input_format,
            output_formats,
            output_index,
            callbacks,
        )?;
        Ok(self.register(task))
    }

    /// Creates a task that copies each input frame into an output buffer and blends the
    /// watermark for the current format over it.
    pub fn init_task_watermark(
        &self,
        input_collection: &BufferCollection,
        output_collection: &BufferCollection,
        infos: &[WatermarkInfo],
        image_formats: &[ImageFormat],
        image_format_index: u32,
        callbacks: TaskCallbacks,
    ) -> Result<TaskHandle> {
        self.check_running()?;
        let task = Task::init_watermark(
            &self.ctx(),
            input_collection,
            output_collection,
            infos,
            image_formats,
            image_format_index,
            callbacks,
        )?;
        Ok(self.register(task))
    }

    /// Creates a task that blends the watermark into the input frame itself.
    pub fn init_task_in_place_watermark(
        &self,
        input_collection: &BufferCollection,
        infos: &[WatermarkInfo],
        image_formats: &[ImageFormat],
        image_format_index: u32,
        callbacks: TaskCallbacks,
    ) -> Result<TaskHandle> {
        self.check_running()?;
        let task = Task::init_in_place_watermark(
            &self.ctx(),
            input_collection,
            infos,
            image_formats,
            image_format_index,
            callbacks,
        )?;
        Ok(self.register(task))
    }

    /// Validates a request against the task and queues it, both under the registry lock so the
    /// task cannot be removed in between.
    fn enqueue<F>(&self, handle: TaskHandle, validate: F) -> Result<()>
    where
        F: FnOnce(&Task) -> Result<Operation>,
    {
        self.shared
            .registry
            .with_task(handle, |task| {
                let op = validate(task)?;
                self.shared.queue.push(QueueEntry { handle, op })
            })
            .unwrap_or(Err(Error::InvalidArgs("unknown task handle")))
    }

    /// Queues a frame read from input buffer `input_index`. The result arrives through the
    /// frame-ready callback.
    pub fn process_frame(&self, handle: TaskHandle, input_index: u32) -> Result<()> {
        self.enqueue(handle, |task| {
            if input_index as usize >= task.input_buffer_count() {
                return Err(Error::InvalidArgs("input buffer index out of range"));
            }
            Ok(Operation::Frame { input_index })
        })
    }

    /// Switches a resize task to `output_formats[index]` for the frames queued after this call.
    pub fn set_output_resolution(&self, handle: TaskHandle, index: u32) -> Result<()> {
        self.enqueue(handle, |task| {
            if task.task_type() != TaskType::Resize {
                return Err(Error::InvalidArgs("only resize tasks change output resolution"));
            }
            if index as usize >= task.output_format_count() {
                return Err(Error::InvalidArgs("output format index out of range"));
            }
            Ok(Operation::SetOutputRes { index })
        })
    }

    /// Switches a watermark task's input and output to `image_formats[index]`.
    pub fn set_input_and_output_resolution(&self, handle: TaskHandle, index: u32) -> Result<()> {
        self.enqueue(handle, |task| {
            if task.task_type() == TaskType::Resize {
                return Err(Error::InvalidArgs(
                    "resize tasks only change output resolution",
                ));
            }
            if index as usize >= task.input_format_count() {
                return Err(Error::InvalidArgs("image format index out of range"));
            }
            Ok(Operation::SetInputOutputRes { index })
        })
    }

    /// Sets the crop rectangle of a resize task for the frames queued after this call.
    pub fn set_crop_rect(&self, handle: TaskHandle, crop: Rect) -> Result<()> {
        self.enqueue(handle, |task| {
            task.validate_crop(&crop)?;
            Ok(Operation::SetCropRect(crop))
        })
    }

    /// Queues removal of a task. Frames queued before the removal are still processed; the
    /// remove callback fires once the task is gone.
    ///
    /// # Panics
    ///
    /// Panics if `handle` does not name a live task.
    pub fn remove_task(&self, handle: TaskHandle) -> Result<()> {
        self.shared
            .registry
            .with_task(handle, |task| {
                self.shared.queue.push(QueueEntry {
                    handle,
                    op: Operation::RemoveTask(task.removed_callback()),
                })
            })
            .unwrap_or_else(|| panic!("remove_task: {} does not exist", handle))
    }

    /// Returns an output buffer delivered by the frame-ready callback to the task's pool.
    pub fn release_frame(&self, handle: TaskHandle, buffer_index: u32) -> Result<()> {
        self.shared
            .registry
            .with_task(handle, |task| match task.output_pool() {
                Some(pool) => pool.release_buffer(buffer_index),
                None => Err(Error::InvalidArgs("in-place tasks have no output buffers")),
            })
            .unwrap_or(Err(Error::InvalidArgs("unknown task handle")))
    }

    /// Number of live tasks, including tasks with a removal still queued.
    pub fn task_count(&self) -> usize {
        self.shared.registry.len()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shared.queue.is_shutting_down()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Stops the dispatcher and waits for it to exit. Entries still queued are cancelled or
    /// processed according to the configured shutdown policy. Later requests fail with
    /// [`Error::ShuttingDown`].
    ///
    /// Concurrent callers all return only once the dispatcher is gone. Calling this from a
    /// callback stops the dispatcher without waiting for it.
    pub fn shutdown(&self) {
        if self.shared.queue.shutdown() {
            info!("shutting down ge2d engine");
        }
        if thread::current().id() == self.worker_id {
            return;
        }
        // Joined under the lock so other callers block until the thread has exited.
        let mut worker = self.worker.lock();
        if let Some(handle) = worker.take() {
            if handle.join().is_err() {
                error!("ge2d dispatcher thread panicked");
            }
        }
    }
}

impl Drop for Ge2dEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
