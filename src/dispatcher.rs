// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The dispatcher thread: the only code that programs the hardware or invokes client callbacks.

use std::sync::Arc;
use std::time::Instant;

use log::debug;
use log::error;
use log::info;
use log::warn;

use crate::config::ShutdownPolicy;
use crate::error::FrameError;
use crate::error::FrameStatus;
use crate::error::Result;
use crate::error::TaskRemoveStatus;
use crate::hw::Ge2dHardware;
use crate::queue::Operation;
use crate::queue::ProcessingQueue;
use crate::queue::QueueEntry;
use crate::registry::TaskRegistry;
use crate::task::FrameAvailable;
use crate::task::FrameMetadata;
use crate::task::ResolutionChange;
use crate::task::Task;
use crate::task::TaskHandle;
use crate::task::TaskRemovedFn;
use crate::task::TaskState;

/// State shared between the client-facing engine and its dispatcher thread.
pub(crate) struct Shared {
    pub registry: TaskRegistry,
    pub queue: ProcessingQueue,
    epoch: Instant,
}

impl Shared {
    pub fn new() -> Self {
        Shared {
            registry: TaskRegistry::new(),
            queue: ProcessingQueue::new(),
            epoch: Instant::now(),
        }
    }

    /// Monotonic nanoseconds since the engine was created.
    fn timestamp(&self) -> u64 {
        self.epoch.elapsed().as_nanos() as u64
    }
}

pub(crate) struct Dispatcher {
    shared: Arc<Shared>,
    hw: Box<dyn Ge2dHardware>,
    policy: ShutdownPolicy,
}

impl Dispatcher {
    pub fn new(shared: Arc<Shared>, hw: Box<dyn Ge2dHardware>, policy: ShutdownPolicy) -> Self {
        Dispatcher { shared, hw, policy }
    }

    pub fn run(mut self) {
        info!("ge2d dispatcher started");
        while let Some(entry) = self.shared.queue.pop() {
            if self.policy == ShutdownPolicy::Cancel && self.shared.queue.is_shutting_down() {
                self.cancel(entry);
                for entry in self.shared.queue.take_all() {
                    self.cancel(entry);
                }
                break;
            }
            self.dispatch(entry);
        }
        info!("ge2d dispatcher stopped");
    }

    fn dispatch(&mut self, entry: QueueEntry) {
        debug!("{}: dispatching {:?}", entry.handle, entry.op);
        let handle = entry.handle;
        let op = match entry.op {
            Operation::RemoveTask(on_removed) => return self.remove_task(handle, on_removed),
            op => op,
        };
        // Only the task's own reference is held from here on, so callbacks may call back into
        // the engine.
        let task = match self.shared.registry.get(handle) {
            Some(task) => task,
            None => {
                warn!("{}: task is gone, dropping {:?}", handle, op);
                return;
            }
        };
        match op {
            Operation::Frame { input_index } => self.process_frame(handle, &task, input_index),
            Operation::SetOutputRes { index } => {
                let mut state = task.lock_state();
                if let Err(e) = task.change_output_res(&mut state, index) {
                    error!(
                        "{}: failed to switch to output format {}, keeping {}: {}",
                        handle, index, state.output_index, e
                    );
                }
                let image_format_index = state.output_index;
                drop(state);
                self.notify_resolution(&task, image_format_index);
            }
            Operation::SetInputOutputRes { index } => {
                let mut state = task.lock_state();
                if let Err(e) = change_input_and_output_res(&task, &mut state, index) {
                    error!(
                        "{}: failed to switch to format {}, keeping {}: {}",
                        handle, index, state.output_index, e
                    );
                }
                let image_format_index = state.output_index;
                drop(state);
                self.notify_resolution(&task, image_format_index);
            }
            Operation::SetCropRect(rect) => task.lock_state().crop = rect,
            Operation::RemoveTask(_) => unreachable!("removal handled above"),
        }
    }

    fn process_frame(&mut self, handle: TaskHandle, task: &Task, input_index: u32) {
        let mut state = task.lock_state();
        let result = task.process_frame(&mut state, self.hw.as_mut(), input_index);
        let image_format_index = state.output_index;
        drop(state);

        let timestamp = self.shared.timestamp();
        let frame = match result {
            Ok(done) => FrameAvailable {
                status: FrameStatus::Ok,
                buffer_id: Some(done.buffer_id),
                metadata: FrameMetadata {
                    timestamp,
                    image_format_index: done.image_format_index,
                    input_buffer_index: input_index,
                },
            },
            Err(e) => {
                match &e {
                    FrameError::Hardware(_) => {
                        error!("{}: frame {} failed: {}", handle, input_index, e)
                    }
                    _ => warn!("{}: dropping frame {}: {}", handle, input_index, e),
                }
                dropped_frame(timestamp, image_format_index, input_index)
            }
        };
        task.notify_frame(frame);
    }

    fn notify_resolution(&self, task: &Task, image_format_index: u32) {
        task.notify_resolution(ResolutionChange {
            timestamp: self.shared.timestamp(),
            image_format_index,
        });
    }

    fn remove_task(&self, handle: TaskHandle, on_removed: TaskRemovedFn) {
        match self.shared.registry.remove(handle) {
            Some(task) => {
                // Canvases and pins are released before the client hears about it.
                drop(task);
                info!("{}: removed", handle);
                on_removed(TaskRemoveStatus::Ok);
            }
            None => {
                warn!("{}: already removed", handle);
                on_removed(TaskRemoveStatus::Error);
            }
        }
    }

    /// Resolves an entry without touching the hardware.
    fn cancel(&self, entry: QueueEntry) {
        match entry.op {
            Operation::RemoveTask(on_removed) => self.remove_task(entry.handle, on_removed),
            Operation::Frame { input_index } => match self.shared.registry.get(entry.handle) {
                Some(task) => {
                    warn!("{}: shutting down, dropping frame {}", entry.handle, input_index);
                    let image_format_index = task.lock_state().output_index;
                    task.notify_frame(dropped_frame(
                        self.shared.timestamp(),
                        image_format_index,
                        input_index,
                    ));
                }
                None => warn!("{}: task is gone, dropping frame {}", entry.handle, input_index),
            },
            op => warn!("{}: shutting down, discarding {:?}", entry.handle, op),
        }
    }
}

/// Moves input and output to table entry `index` together, or leaves both where they were.
fn change_input_and_output_res(task: &Task, state: &mut TaskState, index: u32) -> Result<()> {
    let previous = state.input_index;
    task.change_input_res(state, index)?;
    if let Err(e) = task.change_output_res(state, index) {
        if let Err(restore) = task.change_input_res(state, previous) {
            error!("failed to restore input format {}: {}", previous, restore);
        }
        return Err(e);
    }
    Ok(())
}

fn dropped_frame(timestamp: u64, image_format_index: u32, input_index: u32) -> FrameAvailable {
    FrameAvailable {
        status: FrameStatus::ErrorFrame,
        buffer_id: None,
        metadata: FrameMetadata {
            timestamp,
            image_format_index,
            input_buffer_index: input_index,
        },
    }
}
