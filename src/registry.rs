// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::collections::BTreeMap;
use std::sync::Arc;

use sync::Mutex;

use crate::task::Task;
use crate::task::TaskHandle;

struct State {
    next_handle: u32,
    tasks: BTreeMap<TaskHandle, Arc<Task>>,
}

/// The live tasks, keyed by the handle given to the client.
///
/// Handles increase monotonically and are never reused, so a stale handle can never resolve to a
/// task created later.
pub struct TaskRegistry {
    state: Mutex<State>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        TaskRegistry {
            state: Mutex::new(State {
                next_handle: 1,
                tasks: BTreeMap::new(),
            }),
        }
    }

    pub fn insert(&self, task: Task) -> TaskHandle {
        let mut state = self.state.lock();
        let handle = TaskHandle(state.next_handle);
        state.next_handle = state
            .next_handle
            .checked_add(1)
            .expect("task handles exhausted");
        state.tasks.insert(handle, Arc::new(task));
        handle
    }

    /// Looks up a task. The registry keeps ownership; the returned reference only keeps the task
    /// alive until the caller drops it.
    pub fn get(&self, handle: TaskHandle) -> Option<Arc<Task>> {
        self.state.lock().tasks.get(&handle).cloned()
    }

    pub fn remove(&self, handle: TaskHandle) -> Option<Arc<Task>> {
        self.state.lock().tasks.remove(&handle)
    }

    /// Runs `f` on the task while the registry is locked, so the task cannot be removed
    /// concurrently.
    pub fn with_task<R, F>(&self, handle: TaskHandle, f: F) -> Option<R>
    where
        F: FnOnce(&Task) -> R,
    {
        self.state.lock().tasks.get(&handle).map(|task| f(task))
    }

    pub fn len(&self) -> usize {
        self.state.lock().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}
