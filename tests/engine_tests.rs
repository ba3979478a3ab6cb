// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Drives the engine through its public API against the simulated platform.

use std::sync::mpsc;
use std::sync::Arc;
use std::sync::Weak;
use std::thread;
use std::time::Duration;

use ge2d::sim::CompletionMode;
use ge2d::sim::SimBti;
use ge2d::sim::SimCanvasAllocator;
use ge2d::sim::SimHardware;
use ge2d::sim::SimHardwareController;
use ge2d::BufferCollection;
use ge2d::EngineConfig;
use ge2d::Error;
use ge2d::FrameAvailable;
use ge2d::FrameStatus;
use ge2d::Ge2dEngine;
use ge2d::ImageFormat;
use ge2d::MemoryHandle;
use ge2d::PixelFormat;
use ge2d::Rect;
use ge2d::ResizeInfo;
use ge2d::ResolutionChange;
use ge2d::ShutdownPolicy;
use ge2d::TaskCallbacks;
use ge2d::TaskHandle;
use ge2d::TaskRemoveStatus;
use ge2d::WatermarkInfo;
use sync::Mutex;

const TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Event {
    Frame(u32, FrameAvailable),
    Resolution(u32, ResolutionChange),
    Removed(u32, TaskRemoveStatus),
}

/// An engine on simulated hardware whose callbacks all feed one ordered event stream.
struct Harness {
    engine: Arc<Ge2dEngine>,
    bti: Arc<SimBti>,
    canvas: Arc<SimCanvasAllocator>,
    controller: SimHardwareController,
    events_tx: mpsc::Sender<Event>,
    events: mpsc::Receiver<Event>,
    next_memory: u64,
}

fn output_table() -> Vec<ImageFormat> {
    [1024, 512, 256]
        .iter()
        .map(|&size| ImageFormat::new(PixelFormat::Nv12, size, size))
        .collect()
}

fn frame_format() -> ImageFormat {
    ImageFormat::new(PixelFormat::Nv12, 1024, 1024)
}

impl Harness {
    fn new(mode: CompletionMode) -> Self {
        Self::with_config(mode, EngineConfig::default())
    }

    fn with_config(mode: CompletionMode, config: EngineConfig) -> Self {
        Self::with_parts(mode, config, SimCanvasAllocator::new())
    }

    fn with_parts(mode: CompletionMode, config: EngineConfig, canvas: SimCanvasAllocator) -> Self {
        let bti = Arc::new(SimBti::new());
        let canvas = Arc::new(canvas);
        let (hw, controller) = SimHardware::new(mode);
        let engine = Ge2dEngine::new(config, bti.clone(), canvas.clone(), Box::new(hw)).unwrap();
        let (events_tx, events) = mpsc::channel();
        Harness {
            engine: Arc::new(engine),
            bti,
            canvas,
            controller,
            events_tx,
            events,
            next_memory: 0,
        }
    }

    fn callbacks(&self, tag: u32) -> TaskCallbacks {
        let tx = Arc::new(Mutex::new(self.events_tx.clone()));
        let (frame_tx, res_tx, remove_tx) = (tx.clone(), tx.clone(), tx);
        TaskCallbacks {
            frame_ready: Arc::new(move |frame| {
                let _ = frame_tx.lock().send(Event::Frame(tag, frame));
            }),
            resolution_changed: Arc::new(move |change| {
                let _ = res_tx.lock().send(Event::Resolution(tag, change));
            }),
            task_removed: Arc::new(move |status| {
                let _ = remove_tx.lock().send(Event::Removed(tag, status));
            }),
        }
    }

    fn collection(&mut self, count: usize, format: ImageFormat) -> BufferCollection {
        let size = format.buffer_size();
        BufferCollection {
            buffers: (0..count)
                .map(|_| {
                    self.next_memory += 1;
                    MemoryHandle::new(self.next_memory, size)
                })
                .collect(),
            format,
        }
    }

    fn resize_task(&mut self, tag: u32, outputs: usize) -> TaskHandle {
        let input = self.collection(2, frame_format());
        let output = self.collection(outputs, output_table()[0]);
        let info = ResizeInfo {
            crop: frame_format().rect(),
            ..Default::default()
        };
        self.engine
            .init_task_resize(
                &input,
                &output,
                &info,
                &frame_format(),
                &output_table(),
                0,
                self.callbacks(tag),
            )
            .unwrap()
    }

    fn watermarks(&mut self) -> Vec<WatermarkInfo> {
        (0..3)
            .map(|shift| {
                let image_format =
                    ImageFormat::new(PixelFormat::Rgba8888, 64 >> shift, 32 >> shift);
                self.next_memory += 1;
                WatermarkInfo {
                    location_x: 8,
                    location_y: 8,
                    global_alpha: 0xff,
                    image_format,
                    image: MemoryHandle::new(self.next_memory, image_format.buffer_size()),
                }
            })
            .collect()
    }

    fn next_event(&self) -> Event {
        self.events.recv_timeout(TIMEOUT).expect("no callback")
    }

    fn next_frame(&self) -> (u32, FrameAvailable) {
        match self.next_event() {
            Event::Frame(tag, frame) => (tag, frame),
            other => panic!("expected a frame, got {:?}", other),
        }
    }
}

#[test]
fn callbacks_follow_submission_order_across_tasks() {
    let mut harness = Harness::new(CompletionMode::Immediate);
    let a = harness.resize_task(1, 8);
    let b = harness.resize_task(2, 8);

    let submissions = [(a, 1, 0), (b, 2, 1), (b, 2, 0), (a, 1, 1), (a, 1, 0), (b, 2, 1)];
    for &(handle, _, input) in &submissions {
        harness.engine.process_frame(handle, input).unwrap();
    }
    for &(_, tag, input) in &submissions {
        let (got_tag, frame) = harness.next_frame();
        assert_eq!(got_tag, tag);
        assert_eq!(frame.status, FrameStatus::Ok);
        assert_eq!(frame.metadata.input_buffer_index, input);
    }
}

#[test]
fn exhausted_pool_drops_frame_without_touching_hardware() {
    let mut harness = Harness::new(CompletionMode::Immediate);
    let task = harness.resize_task(1, 1);

    harness.engine.process_frame(task, 0).unwrap();
    let (_, first) = harness.next_frame();
    assert_eq!(first.status, FrameStatus::Ok);
    assert_eq!(first.buffer_id, Some(0));
    let calls = harness.controller.calls().len();

    // The only output buffer is still held by the client.
    harness.engine.process_frame(task, 1).unwrap();
    let (_, second) = harness.next_frame();
    assert_eq!(second.status, FrameStatus::ErrorFrame);
    assert_eq!(second.buffer_id, None);
    assert_eq!(second.metadata.input_buffer_index, 1);
    assert_eq!(harness.controller.calls().len(), calls);
    assert_eq!(harness.controller.commit_count(), 1);
}

#[test]
fn released_frames_are_reused() {
    let mut harness = Harness::new(CompletionMode::Immediate);
    let task = harness.resize_task(1, 1);

    harness.engine.process_frame(task, 0).unwrap();
    assert_eq!(harness.next_frame().1.buffer_id, Some(0));
    harness.engine.release_frame(task, 0).unwrap();
    assert!(matches!(
        harness.engine.release_frame(task, 0),
        Err(Error::InvalidArgs(_))
    ));
    assert!(matches!(
        harness.engine.release_frame(task, 1),
        Err(Error::InvalidArgs(_))
    ));

    harness.engine.process_frame(task, 1).unwrap();
    let (_, frame) = harness.next_frame();
    assert_eq!(frame.status, FrameStatus::Ok);
    assert_eq!(frame.buffer_id, Some(0));
}

#[test]
fn output_resolution_applies_to_later_frames() {
    let mut harness = Harness::new(CompletionMode::Immediate);
    let task = harness.resize_task(1, 2);

    harness.engine.set_output_resolution(task, 2).unwrap();
    harness.engine.process_frame(task, 0).unwrap();

    match harness.next_event() {
        Event::Resolution(1, change) => assert_eq!(change.image_format_index, 2),
        other => panic!("expected a resolution change, got {:?}", other),
    }
    let (_, frame) = harness.next_frame();
    assert_eq!(frame.status, FrameStatus::Ok);
    assert_eq!(frame.metadata.image_format_index, 2);
    assert_eq!(
        harness.controller.geometries()[0].output,
        Rect::new(0, 0, 256, 256)
    );

    assert!(matches!(
        harness.engine.set_output_resolution(task, 3),
        Err(Error::InvalidArgs(_))
    ));
}

#[test]
fn output_resolution_switch_with_most_canvases_in_use() {
    let mut harness = Harness::new(CompletionMode::Immediate);
    let input = harness.collection(1, frame_format());
    let output = harness.collection(100, output_table()[0]);
    let task = harness
        .engine
        .init_task_resize(
            &input,
            &output,
            &ResizeInfo {
                crop: frame_format().rect(),
                ..Default::default()
            },
            &frame_format(),
            &output_table(),
            0,
            harness.callbacks(1),
        )
        .unwrap();
    assert_eq!(harness.canvas.in_use(), 202);

    harness.engine.set_output_resolution(task, 2).unwrap();
    harness.engine.process_frame(task, 0).unwrap();

    match harness.next_event() {
        Event::Resolution(1, change) => assert_eq!(change.image_format_index, 2),
        other => panic!("expected a resolution change, got {:?}", other),
    }
    let (_, frame) = harness.next_frame();
    assert_eq!(frame.status, FrameStatus::Ok);
    assert_eq!(frame.metadata.image_format_index, 2);
    assert_eq!(harness.canvas.in_use(), 202);
}

#[test]
fn failed_output_resolution_switch_keeps_previous_format() {
    // Room for the RGBA outputs plus one spare slot, not for NV12 outputs.
    let mut harness = Harness::with_parts(
        CompletionMode::Immediate,
        EngineConfig::default(),
        SimCanvasAllocator::with_capacity(5),
    );
    let table = [
        ImageFormat::new(PixelFormat::Rgba8888, 512, 512),
        ImageFormat::new(PixelFormat::Nv12, 512, 512),
    ];
    let input = harness.collection(1, frame_format());
    let output = harness.collection(2, table[0]);
    let task = harness
        .engine
        .init_task_resize(
            &input,
            &output,
            &ResizeInfo {
                crop: frame_format().rect(),
                ..Default::default()
            },
            &frame_format(),
            &table,
            0,
            harness.callbacks(1),
        )
        .unwrap();

    harness.engine.set_output_resolution(task, 1).unwrap();
    harness.engine.process_frame(task, 0).unwrap();

    match harness.next_event() {
        Event::Resolution(1, change) => assert_eq!(change.image_format_index, 0),
        other => panic!("expected a resolution change, got {:?}", other),
    }
    let (_, frame) = harness.next_frame();
    assert_eq!(frame.status, FrameStatus::Ok);
    assert_eq!(frame.metadata.image_format_index, 0);
    assert_eq!(
        harness.controller.geometries()[0].output,
        Rect::new(0, 0, 512, 512)
    );
    assert_eq!(harness.canvas.in_use(), 4);
}

#[test]
fn empty_collection_fails_before_any_state_is_created() {
    let mut harness = Harness::new(CompletionMode::Immediate);
    let input = harness.collection(0, frame_format());
    let output = harness.collection(2, output_table()[0]);
    let result = harness.engine.init_task_resize(
        &input,
        &output,
        &ResizeInfo {
            crop: frame_format().rect(),
            ..Default::default()
        },
        &frame_format(),
        &output_table(),
        0,
        harness.callbacks(1),
    );
    assert!(matches!(result, Err(Error::InvalidArgs(_))));

    let input = harness.collection(2, frame_format());
    let output = harness.collection(2, output_table()[0]);
    let result = harness.engine.init_task_resize(
        &input,
        &output,
        &ResizeInfo {
            crop: frame_format().rect(),
            ..Default::default()
        },
        &frame_format(),
        &[],
        0,
        harness.callbacks(1),
    );
    assert!(matches!(result, Err(Error::InvalidArgs(_))));

    assert_eq!(harness.bti.pin_calls(), 0);
    assert_eq!(harness.canvas.in_use(), 0);
    assert_eq!(harness.engine.task_count(), 0);
}

#[test]
fn manual_completions_are_reported_in_submission_order() {
    let mut harness = Harness::new(CompletionMode::Manual);
    let a = harness.resize_task(1, 2);
    let b = harness.resize_task(2, 2);

    harness.engine.process_frame(a, 0).unwrap();
    harness.engine.process_frame(b, 1).unwrap();

    assert!(harness.controller.wait_for_commits(1, TIMEOUT));
    assert!(harness.events.try_recv().is_err());
    harness.controller.complete(Ok(()));
    assert_eq!(harness.next_frame().0, 1);

    assert!(harness.controller.wait_for_commits(2, TIMEOUT));
    harness.controller.complete(Ok(()));
    let (tag, frame) = harness.next_frame();
    assert_eq!(tag, 2);
    assert_eq!(frame.metadata.input_buffer_index, 1);
}

#[test]
fn removal_waits_for_queued_frames() {
    let mut harness = Harness::new(CompletionMode::Immediate);
    let task = harness.resize_task(1, 4);

    harness.engine.process_frame(task, 0).unwrap();
    harness.engine.process_frame(task, 1).unwrap();
    harness.engine.remove_task(task).unwrap();

    assert_eq!(harness.next_frame().1.status, FrameStatus::Ok);
    assert_eq!(harness.next_frame().1.status, FrameStatus::Ok);
    assert_eq!(
        harness.next_event(),
        Event::Removed(1, TaskRemoveStatus::Ok)
    );

    assert!(matches!(
        harness.engine.process_frame(task, 0),
        Err(Error::InvalidArgs(_))
    ));
    assert_eq!(harness.engine.task_count(), 0);
    assert_eq!(harness.bti.pinned_count(), 0);
    assert_eq!(harness.bti.allocated_count(), 0);
    assert_eq!(harness.canvas.in_use(), 0);
}

#[test]
fn watermark_removal_returns_staging_memory() {
    let mut harness = Harness::new(CompletionMode::Immediate);
    let table = output_table();
    for tag in 0..3 {
        let input = harness.collection(1, table[0]);
        let output = harness.collection(1, table[0]);
        let watermarks = harness.watermarks();
        let task = harness
            .engine
            .init_task_watermark(&input, &output, &watermarks, &table, 0, harness.callbacks(tag))
            .unwrap();
        assert_eq!(harness.bti.allocated_count(), 1);

        harness.engine.remove_task(task).unwrap();
        assert_eq!(
            harness.next_event(),
            Event::Removed(tag, TaskRemoveStatus::Ok)
        );
        assert_eq!(harness.bti.allocated_count(), 0);
        assert_eq!(harness.bti.pinned_count(), 0);
    }
}

#[test]
fn duplicate_removal_reports_an_error() {
    let mut harness = Harness::new(CompletionMode::Manual);
    let task = harness.resize_task(1, 1);

    // Hold the dispatcher in a hardware wait so both removals are queued against a live task.
    harness.engine.process_frame(task, 0).unwrap();
    assert!(harness.controller.wait_for_commits(1, TIMEOUT));
    harness.engine.remove_task(task).unwrap();
    harness.engine.remove_task(task).unwrap();
    harness.controller.complete(Ok(()));

    assert_eq!(harness.next_frame().1.status, FrameStatus::Ok);
    assert_eq!(
        harness.next_event(),
        Event::Removed(1, TaskRemoveStatus::Ok)
    );
    assert_eq!(
        harness.next_event(),
        Event::Removed(1, TaskRemoveStatus::Error)
    );
}

#[test]
#[should_panic(expected = "does not exist")]
fn removing_unknown_task_panics() {
    // A handle given out by a different engine.
    let mut other = Harness::new(CompletionMode::Immediate);
    let handle = other.resize_task(9, 1);

    let harness = Harness::new(CompletionMode::Immediate);
    let _ = harness.engine.remove_task(handle);
}

#[test]
fn hardware_failure_drops_frame_and_frees_buffer() {
    let mut harness = Harness::new(CompletionMode::Manual);
    let task = harness.resize_task(1, 1);

    harness.engine.process_frame(task, 0).unwrap();
    harness
        .controller
        .complete(Err(ge2d::hw::HwError::Status(0x20)));
    let (_, frame) = harness.next_frame();
    assert_eq!(frame.status, FrameStatus::ErrorFrame);
    assert_eq!(frame.buffer_id, None);

    harness.engine.process_frame(task, 1).unwrap();
    harness.controller.complete(Ok(()));
    let (_, frame) = harness.next_frame();
    assert_eq!(frame.status, FrameStatus::Ok);
    assert_eq!(frame.buffer_id, Some(0));
}

#[test]
fn crop_rect_is_validated_and_applied() {
    let mut harness = Harness::new(CompletionMode::Immediate);
    let task = harness.resize_task(1, 2);

    assert!(matches!(
        harness
            .engine
            .set_crop_rect(task, Rect::new(512, 512, 1024, 16)),
        Err(Error::InvalidArgs(_))
    ));
    harness
        .engine
        .set_crop_rect(task, Rect::new(256, 256, 512, 512))
        .unwrap();
    harness.engine.process_frame(task, 0).unwrap();
    assert_eq!(harness.next_frame().1.status, FrameStatus::Ok);

    let geometry = harness.controller.geometries()[0];
    assert_eq!(geometry.input, Rect::new(256, 256, 512, 512));
    assert_eq!(geometry.output, Rect::new(0, 0, 1024, 1024));
    assert!(geometry.scaler.horizontal.enabled);
}

#[test]
fn watermark_task_switches_input_and_output_together() {
    let mut harness = Harness::new(CompletionMode::Immediate);
    let table = output_table();
    let input = harness.collection(2, table[0]);
    let output = harness.collection(2, table[0]);
    let watermarks = harness.watermarks();
    let task = harness
        .engine
        .init_task_watermark(&input, &output, &watermarks, &table, 0, harness.callbacks(1))
        .unwrap();

    assert!(matches!(
        harness.engine.set_output_resolution(task, 1),
        Err(Error::InvalidArgs(_))
    ));
    harness
        .engine
        .set_input_and_output_resolution(task, 1)
        .unwrap();
    harness.engine.process_frame(task, 1).unwrap();

    match harness.next_event() {
        Event::Resolution(1, change) => assert_eq!(change.image_format_index, 1),
        other => panic!("expected a resolution change, got {:?}", other),
    }
    let (_, frame) = harness.next_frame();
    assert_eq!(frame.status, FrameStatus::Ok);
    assert_eq!(frame.metadata.image_format_index, 1);

    let geometries = harness.controller.geometries();
    assert_eq!(geometries.len(), 3);
    assert_eq!(geometries[0].input, Rect::new(0, 0, 512, 512));
    assert_eq!(geometries[2].output, Rect::new(8, 8, 32, 16));
}

#[test]
fn in_place_watermark_reports_input_buffer() {
    let mut harness = Harness::new(CompletionMode::Immediate);
    let table = output_table();
    let input = harness.collection(3, table[0]);
    let watermarks = harness.watermarks();
    let task = harness
        .engine
        .init_task_in_place_watermark(&input, &watermarks, &table, 0, harness.callbacks(1))
        .unwrap();

    harness.engine.process_frame(task, 2).unwrap();
    let (_, frame) = harness.next_frame();
    assert_eq!(frame.status, FrameStatus::Ok);
    assert_eq!(frame.buffer_id, Some(2));
    assert_eq!(harness.controller.commit_count(), 2);
    assert!(matches!(
        harness.engine.release_frame(task, 2),
        Err(Error::InvalidArgs(_))
    ));
}

#[test]
fn cancel_policy_fails_pending_work_on_shutdown() {
    let mut harness = Harness::new(CompletionMode::Manual);
    let task = harness.resize_task(1, 4);
    let other = harness.resize_task(2, 1);

    harness.engine.process_frame(task, 0).unwrap();
    assert!(harness.controller.wait_for_commits(1, TIMEOUT));
    harness.engine.process_frame(task, 1).unwrap();
    harness.engine.set_output_resolution(task, 1).unwrap();
    harness.engine.remove_task(other).unwrap();

    let stopper = {
        let engine = Arc::clone(&harness.engine);
        thread::spawn(move || engine.shutdown())
    };
    while !harness.engine.is_shutting_down() {
        thread::yield_now();
    }
    // The operation already running is not cancelled.
    harness.controller.complete(Ok(()));
    stopper.join().unwrap();

    assert_eq!(harness.next_frame().1.status, FrameStatus::Ok);
    let (_, cancelled) = harness.next_frame();
    assert_eq!(cancelled.status, FrameStatus::ErrorFrame);
    assert_eq!(cancelled.metadata.image_format_index, 0);
    assert_eq!(
        harness.next_event(),
        Event::Removed(2, TaskRemoveStatus::Ok)
    );
    assert!(harness.events.try_recv().is_err());
    assert_eq!(harness.controller.commit_count(), 1);

    assert!(matches!(
        harness.engine.process_frame(task, 0),
        Err(Error::ShuttingDown)
    ));
}

#[test]
fn concurrent_shutdowns_all_wait_for_the_dispatcher() {
    let mut harness = Harness::new(CompletionMode::Manual);
    let task = harness.resize_task(1, 1);
    harness.engine.process_frame(task, 0).unwrap();
    assert!(harness.controller.wait_for_commits(1, TIMEOUT));

    let stoppers: Vec<_> = (0..2)
        .map(|_| {
            let engine = Arc::clone(&harness.engine);
            let controller = harness.controller.clone();
            thread::spawn(move || {
                engine.shutdown();
                controller.completed_count()
            })
        })
        .collect();
    while !harness.engine.is_shutting_down() {
        thread::yield_now();
    }
    // Give the second caller time to reach shutdown while the first is joining.
    thread::sleep(Duration::from_millis(50));
    harness.controller.complete(Ok(()));

    for stopper in stoppers {
        assert_eq!(stopper.join().unwrap(), 1);
    }
    assert_eq!(harness.next_frame().1.status, FrameStatus::Ok);
}

#[test]
fn drain_policy_finishes_pending_work_on_shutdown() {
    let config = EngineConfig {
        shutdown_policy: ShutdownPolicy::Drain,
        ..Default::default()
    };
    let mut harness = Harness::with_config(CompletionMode::Manual, config);
    let task = harness.resize_task(1, 4);

    for input in [0, 1, 0] {
        harness.engine.process_frame(task, input).unwrap();
    }
    assert!(harness.controller.wait_for_commits(1, TIMEOUT));
    for _ in 0..3 {
        harness.controller.complete(Ok(()));
    }
    harness.engine.shutdown();

    for _ in 0..3 {
        assert_eq!(harness.next_frame().1.status, FrameStatus::Ok);
    }
    assert_eq!(harness.controller.commit_count(), 3);
}

#[test]
fn callbacks_run_on_the_configured_thread_and_may_reenter() {
    let config = EngineConfig {
        thread_name: "ge2d_test_dispatcher".to_string(),
        ..Default::default()
    };
    let mut harness = Harness::with_config(CompletionMode::Immediate, config);
    let input = harness.collection(1, frame_format());
    let output = harness.collection(1, output_table()[0]);

    let engine_ref: Arc<Mutex<Weak<Ge2dEngine>>> = Arc::new(Mutex::new(Weak::new()));
    let handle_ref: Arc<Mutex<Option<TaskHandle>>> = Arc::new(Mutex::new(None));
    let (tx, rx) = mpsc::channel();
    let tx = Mutex::new(tx);
    let mut callbacks = harness.callbacks(1);
    callbacks.frame_ready = {
        let engine_ref = Arc::clone(&engine_ref);
        let handle_ref = Arc::clone(&handle_ref);
        Arc::new(move |frame: FrameAvailable| {
            let name = thread::current().name().map(str::to_string);
            // Hand the buffer straight back, from inside the callback.
            let released = match (engine_ref.lock().upgrade(), *handle_ref.lock(), frame.buffer_id) {
                (Some(engine), Some(handle), Some(buffer)) => {
                    engine.release_frame(handle, buffer).is_ok()
                }
                _ => false,
            };
            let _ = tx.lock().send((name, released));
        })
    };

    let task = harness
        .engine
        .init_task_resize(
            &input,
            &output,
            &ResizeInfo {
                crop: frame_format().rect(),
                ..Default::default()
            },
            &frame_format(),
            &output_table(),
            0,
            callbacks,
        )
        .unwrap();
    *engine_ref.lock() = Arc::downgrade(&harness.engine);
    *handle_ref.lock() = Some(task);

    for _ in 0..3 {
        harness.engine.process_frame(task, 0).unwrap();
        let (name, released) = rx.recv_timeout(TIMEOUT).unwrap();
        assert_eq!(name.as_deref(), Some("ge2d_test_dispatcher"));
        assert!(released);
    }
}

#[test]
fn config_file_selects_drain_policy() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    std::io::Write::write_all(
        &mut file,
        br#"{"shutdown-policy": "drain", "thread-name": "ge2d_from_file"}"#,
    )
    .unwrap();
    let config = EngineConfig::from_file(file.path()).unwrap();
    assert_eq!(config.shutdown_policy, ShutdownPolicy::Drain);
    assert_eq!(config.thread_name, "ge2d_from_file");
    assert!(config.require_contiguous);

    let mut harness = Harness::with_config(CompletionMode::Immediate, config);
    let task = harness.resize_task(1, 1);
    harness.engine.process_frame(task, 0).unwrap();
    harness.engine.shutdown();
    assert_eq!(harness.next_frame().1.status, FrameStatus::Ok);
}
