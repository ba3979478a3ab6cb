// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! FIFO of requests waiting for the dispatcher thread.

use std::collections::VecDeque;
use std::fmt;
use std::mem;

use sync::Condvar;
use sync::Mutex;

use crate::error::Error;
use crate::error::Result;
use crate::format::Rect;
use crate::task::TaskHandle;
use crate::task::TaskRemovedFn;

#[derive(Clone)]
pub enum Operation {
    Frame { input_index: u32 },
    SetOutputRes { index: u32 },
    SetInputOutputRes { index: u32 },
    SetCropRect(Rect),
    /// Carries the task's remove callback, which is still needed if the task is already gone by
    /// the time the entry is dispatched.
    RemoveTask(TaskRemovedFn),
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Operation::Frame { input_index } => write!(f, "Frame({})", input_index),
            Operation::SetOutputRes { index } => write!(f, "SetOutputRes({})", index),
            Operation::SetInputOutputRes { index } => write!(f, "SetInputOutputRes({})", index),
            Operation::SetCropRect(rect) => write!(f, "SetCropRect({:?})", rect),
            Operation::RemoveTask(_) => write!(f, "RemoveTask"),
        }
    }
}

/// A request against one task. Entries name the task by handle; the dispatcher looks it up again
/// when the entry reaches the head of the queue.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub handle: TaskHandle,
    pub op: Operation,
}

#[derive(Default)]
struct State {
    entries: VecDeque<QueueEntry>,
    shutting_down: bool,
}

/// Entries are consumed exactly once, in the order they were pushed, across all tasks.
#[derive(Default)]
pub struct ProcessingQueue {
    state: Mutex<State>,
    condvar: Condvar,
}

impl ProcessingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: QueueEntry) -> Result<()> {
        let mut state = self.state.lock();
        if state.shutting_down {
            return Err(Error::ShuttingDown);
        }
        state.entries.push_back(entry);
        drop(state);
        self.condvar.notify_one();
        Ok(())
    }

    /// Returns the oldest entry, blocking while the queue is empty. Returns `None` once the queue
    /// is shut down and empty.
    pub fn pop(&self) -> Option<QueueEntry> {
        let state = self.state.lock();
        let mut state = self
            .condvar
            .wait_while(state, |s| s.entries.is_empty() && !s.shutting_down);
        state.entries.pop_front()
    }

    /// Refuses further pushes and wakes the dispatcher. Returns false if the queue was already
    /// shut down.
    pub fn shutdown(&self) -> bool {
        let mut state = self.state.lock();
        if state.shutting_down {
            return false;
        }
        state.shutting_down = true;
        drop(state);
        self.condvar.notify_all();
        true
    }

    pub fn is_shutting_down(&self) -> bool {
        self.state.lock().shutting_down
    }

    /// Removes and returns every queued entry, oldest first.
    pub fn take_all(&self) -> Vec<QueueEntry> {
        mem::take(&mut self.state.lock().entries).into()
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;
    use crate::error::TaskRemoveStatus;

    fn frame(task: u32, input_index: u32) -> QueueEntry {
        QueueEntry {
            handle: TaskHandle(task),
            op: Operation::Frame { input_index },
        }
    }

    fn as_frame(entry: Option<QueueEntry>) -> Option<(u32, u32)> {
        match entry? {
            QueueEntry {
                handle,
                op: Operation::Frame { input_index },
            } => Some((handle.raw(), input_index)),
            other => panic!("unexpected entry {:?}", other),
        }
    }

    #[test]
    fn fifo_across_tasks() {
        let queue = ProcessingQueue::new();
        queue.push(frame(1, 0)).unwrap();
        queue.push(frame(2, 0)).unwrap();
        queue
            .push(QueueEntry {
                handle: TaskHandle(1),
                op: Operation::RemoveTask(Arc::new(|_: TaskRemoveStatus| {})),
            })
            .unwrap();
        assert_eq!(as_frame(queue.pop()), Some((1, 0)));
        assert_eq!(as_frame(queue.pop()), Some((2, 0)));
        assert!(matches!(queue.pop().unwrap().op, Operation::RemoveTask(_)));
        assert!(queue.is_empty());
    }

    #[test]
    fn pop_wakes_on_push() {
        let queue = Arc::new(ProcessingQueue::new());
        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.pop())
        };
        queue.push(frame(3, 1)).unwrap();
        assert_eq!(as_frame(consumer.join().unwrap()), Some((3, 1)));
    }

    #[test]
    fn shutdown_wakes_idle_consumer_and_rejects_pushes() {
        let queue = Arc::new(ProcessingQueue::new());
        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.pop())
        };
        assert!(queue.shutdown());
        assert!(!queue.shutdown());
        assert!(consumer.join().unwrap().is_none());
        assert!(matches!(queue.push(frame(1, 0)), Err(Error::ShuttingDown)));
    }

    #[test]
    fn entries_survive_shutdown() {
        let queue = ProcessingQueue::new();
        queue.push(frame(1, 0)).unwrap();
        queue.push(frame(1, 1)).unwrap();
        queue.shutdown();
        assert!(queue.is_shutting_down());
        assert_eq!(as_frame(queue.pop()), Some((1, 0)));
        let rest = queue.take_all();
        assert_eq!(rest.len(), 1);
        assert_eq!(as_frame(rest.into_iter().next()), Some((1, 1)));
        assert!(queue.pop().is_none());
    }
}
