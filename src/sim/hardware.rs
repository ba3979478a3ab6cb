// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use sync::Condvar;
use sync::Mutex;

use crate::canvas::CanvasIds;
use crate::format::ImageFormat;
use crate::hw::Blend;
use crate::hw::Ge2dHardware;
use crate::hw::Geometry;
use crate::hw::HwError;

/// How a committed operation finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionMode {
    /// Every operation completes as soon as it is waited on.
    Immediate,
    /// Waits block until the controller signals a completion.
    Manual,
}

/// One call made against the hardware, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HwCall {
    Formats {
        input: ImageFormat,
        output: ImageFormat,
        blend: Option<Blend>,
    },
    Geometry(Geometry),
    Addressing {
        input: CanvasIds,
        output: CanvasIds,
        second_input: Option<CanvasIds>,
    },
    Commit,
    Wait(Result<(), HwError>),
}

#[derive(Default)]
struct State {
    calls: Vec<HwCall>,
    commits: usize,
    // Completions signalled in manual mode and not yet consumed.
    completions: VecDeque<Result<(), HwError>>,
    next_failure: Option<HwError>,
}

struct Shared {
    state: Mutex<State>,
    cond: Condvar,
}

/// Records every call and completes operations according to its [`CompletionMode`].
pub struct SimHardware {
    mode: CompletionMode,
    shared: Arc<Shared>,
}

/// Test-side view of a [`SimHardware`] that has been handed to the engine.
#[derive(Clone)]
pub struct SimHardwareController {
    shared: Arc<Shared>,
}

impl SimHardware {
    pub fn new(mode: CompletionMode) -> (SimHardware, SimHardwareController) {
        let shared = Arc::new(Shared {
            state: Mutex::new(State::default()),
            cond: Condvar::new(),
        });
        (
            SimHardware {
                mode,
                shared: Arc::clone(&shared),
            },
            SimHardwareController { shared },
        )
    }

    fn record(&self, call: HwCall) {
        self.shared.state.lock().calls.push(call);
    }
}

impl Ge2dHardware for SimHardware {
    fn program_formats(&mut self, input: &ImageFormat, output: &ImageFormat, blend: Option<Blend>) {
        self.record(HwCall::Formats {
            input: *input,
            output: *output,
            blend,
        });
    }

    fn program_geometry(&mut self, geometry: &Geometry) {
        self.record(HwCall::Geometry(*geometry));
    }

    fn program_addressing(
        &mut self,
        input: CanvasIds,
        output: CanvasIds,
        second_input: Option<CanvasIds>,
    ) {
        self.record(HwCall::Addressing {
            input,
            output,
            second_input,
        });
    }

    fn commit(&mut self) {
        let mut state = self.shared.state.lock();
        state.commits += 1;
        state.calls.push(HwCall::Commit);
        self.shared.cond.notify_all();
    }

    fn wait_for_completion(&mut self) -> Result<(), HwError> {
        let mut state = self.shared.state.lock();
        let result = match self.mode {
            CompletionMode::Immediate => match state.next_failure.take() {
                Some(e) => Err(e),
                None => Ok(()),
            },
            CompletionMode::Manual => {
                state = self
                    .shared
                    .cond
                    .wait_while(state, |s| s.completions.is_empty());
                state
                    .completions
                    .pop_front()
                    .expect("woken without a completion")
            }
        };
        debug!("simulated operation {} finished: {:?}", state.commits, result);
        state.calls.push(HwCall::Wait(result.clone()));
        self.shared.cond.notify_all();
        result
    }
}

impl SimHardwareController {
    /// Every call made so far.
    pub fn calls(&self) -> Vec<HwCall> {
        self.shared.state.lock().calls.clone()
    }

    /// The geometry of every operation programmed so far.
    pub fn geometries(&self) -> Vec<Geometry> {
        self.shared
            .state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                HwCall::Geometry(g) => Some(*g),
                _ => None,
            })
            .collect()
    }

    pub fn commit_count(&self) -> usize {
        self.shared.state.lock().commits
    }

    /// Number of operations that have finished, successfully or not.
    pub fn completed_count(&self) -> usize {
        self.shared
            .state
            .lock()
            .calls
            .iter()
            .filter(|call| matches!(call, HwCall::Wait(_)))
            .count()
    }

    /// Signals completion of one operation in manual mode. Completions queue up if nothing is
    /// waiting yet.
    pub fn complete(&self, result: Result<(), HwError>) {
        self.shared.state.lock().completions.push_back(result);
        self.shared.cond.notify_all();
    }

    /// Makes the next operation fail with `error` in immediate mode.
    pub fn fail_next(&self, error: HwError) {
        self.shared.state.lock().next_failure = Some(error);
    }

    /// Blocks until at least `count` operations were committed. Returns false on timeout.
    pub fn wait_for_commits(&self, count: usize, timeout: Duration) -> bool {
        let state = self.shared.state.lock();
        let (_state, timed_out) =
            self.shared
                .cond
                .wait_timeout_while(state, timeout, |s| s.commits < count);
        !timed_out
    }
}
