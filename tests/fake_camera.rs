// This is free and unencumbered software released into the public domain.

//! Shared scripted camera fakes for the integration suites.

#![allow(dead_code)]

use asimov_camera_session::shared::{
    CallbackRegistry, CameraCaps, CameraDescriptor, CameraError, CameraFacing, CameraProvider,
    CameraSession, CameraStatus, DriveMode, FpsRange, HandleEvent, HandleEventSink,
    NativeCameraHandle, ParameterBatch, PixelFormat, PreviewTarget, Resolution, SessionEvent,
    VideoOutput,
};
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub const FAKE_JPEG: &[u8] = b"\xff\xd8fake-jpeg-payload\xff\xd9";

#[derive(Default)]
pub struct FakeCalls {
    pub open: AtomicUsize,
    pub start_preview: AtomicUsize,
    pub stop_preview: AtomicUsize,
    pub take_picture: AtomicUsize,
    pub release: AtomicUsize,
    pub frames_enabled: AtomicBool,
    pub applied: Mutex<Vec<ParameterBatch>>,
}

impl FakeCalls {
    pub fn applied_batches(&self) -> Vec<ParameterBatch> {
        self.applied.lock().unwrap().clone()
    }

    /// Most recent value pushed for a parameter, picked by `field`.
    pub fn last_applied<T>(&self, field: impl Fn(&ParameterBatch) -> Option<T>) -> Option<T> {
        self.applied_batches().iter().rev().find_map(field)
    }
}

/// Scripted provider: one back and one front device, controllable failure
/// modes, and full visibility into native calls.
pub struct FakeProvider {
    pub fail_open: AtomicBool,
    pub fail_preview: AtomicBool,
    /// When set, `take_picture` posts exposed+captured on its own.
    pub auto_complete_capture: AtomicBool,
    pub calls: Arc<FakeCalls>,
    /// Sink of the most recently opened handle; lets tests play the
    /// platform callback thread.
    pub last_sink: Mutex<Option<HandleEventSink>>,
    pub caps: Mutex<CameraCaps>,
}

impl FakeProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            fail_open: AtomicBool::new(false),
            fail_preview: AtomicBool::new(false),
            auto_complete_capture: AtomicBool::new(true),
            calls: Arc::new(FakeCalls::default()),
            last_sink: Mutex::new(None),
            caps: Mutex::new(default_caps()),
        })
    }

    pub fn set_caps(&self, caps: CameraCaps) {
        *self.caps.lock().unwrap() = caps;
    }

    pub fn sink(&self) -> HandleEventSink {
        self.last_sink
            .lock()
            .unwrap()
            .clone()
            .expect("no handle has been opened")
    }

    /// Simulate hardware callbacks for the capture that is in flight.
    pub fn post(&self, event: HandleEvent) {
        self.sink().post(event);
    }
}

pub fn default_caps() -> CameraCaps {
    CameraCaps {
        preview_sizes: vec![
            Resolution::new(320, 240),
            Resolution::new(640, 360),
            Resolution::new(640, 480),
            Resolution::new(1280, 720),
        ],
        picture_sizes: vec![
            Resolution::new(640, 480),
            Resolution::new(1280, 720),
            Resolution::new(1920, 1080),
        ],
        preview_formats: vec![PixelFormat::Nv21, PixelFormat::Yv12],
        fps_ranges: vec![
            FpsRange::new(15, 15),
            FpsRange::new(10, 30),
            FpsRange::new(30, 30),
        ],
        drive_modes: vec![DriveMode::SingleShot],
        separate_video_preview: true,
    }
}

impl CameraProvider for FakeProvider {
    fn enumerate(&self) -> Vec<CameraDescriptor> {
        vec![
            CameraDescriptor {
                id: "fake:0".into(),
                facing: CameraFacing::Back,
                orientation: 90,
                name: "Fake back camera".into(),
                description: "scripted".into(),
            },
            CameraDescriptor {
                id: "fake:1".into(),
                facing: CameraFacing::Front,
                orientation: 90,
                name: "Fake front camera".into(),
                description: "scripted".into(),
            },
        ]
    }

    fn open(
        &self,
        _id: &str,
        sink: HandleEventSink,
    ) -> Result<Box<dyn NativeCameraHandle>, CameraError> {
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(CameraError::other("device is busy"));
        }
        self.calls.open.fetch_add(1, Ordering::SeqCst);
        *self.last_sink.lock().unwrap() = Some(sink.clone());
        Ok(Box::new(FakeHandle {
            sink,
            calls: Arc::clone(&self.calls),
            caps: self.caps.lock().unwrap().clone(),
            fail_preview: self.fail_preview.load(Ordering::SeqCst),
            auto_complete: self.auto_complete_capture.load(Ordering::SeqCst),
            running: false,
            target: None,
        }))
    }
}

struct FakeHandle {
    sink: HandleEventSink,
    calls: Arc<FakeCalls>,
    caps: CameraCaps,
    fail_preview: bool,
    auto_complete: bool,
    running: bool,
    target: Option<PreviewTarget>,
}

impl NativeCameraHandle for FakeHandle {
    fn capabilities(&self) -> CameraCaps {
        self.caps.clone()
    }

    fn lock(&mut self) -> Result<(), CameraError> {
        Ok(())
    }

    fn unlock(&mut self) -> Result<(), CameraError> {
        Ok(())
    }

    fn reconnect(&mut self) -> Result<(), CameraError> {
        Ok(())
    }

    fn apply_parameters(&mut self, batch: &ParameterBatch) -> Result<(), CameraError> {
        self.calls.applied.lock().unwrap().push(batch.clone());
        Ok(())
    }

    fn set_preview_target(&mut self, target: Option<PreviewTarget>) -> Result<(), CameraError> {
        self.target = target;
        Ok(())
    }

    fn set_frame_notification(&mut self, enabled: bool) {
        self.calls.frames_enabled.store(enabled, Ordering::SeqCst);
    }

    fn start_preview(&mut self) -> Result<(), CameraError> {
        self.calls.start_preview.fetch_add(1, Ordering::SeqCst);
        if self.fail_preview {
            return Err(CameraError::other("preview refused by hardware"));
        }
        self.running = true;
        self.sink.post(HandleEvent::PreviewStarted);
        Ok(())
    }

    fn stop_preview(&mut self) {
        self.calls.stop_preview.fetch_add(1, Ordering::SeqCst);
        if self.running {
            self.running = false;
            self.sink.post(HandleEvent::PreviewStopped);
        }
    }

    fn take_picture(&mut self) -> Result<(), CameraError> {
        self.calls.take_picture.fetch_add(1, Ordering::SeqCst);
        self.running = false;
        if self.auto_complete {
            self.sink.post(HandleEvent::PictureExposed);
            self.sink.post(HandleEvent::PictureCaptured {
                data: Bytes::from_static(FAKE_JPEG),
            });
        }
        Ok(())
    }

    fn release(&mut self) {
        self.calls.release.fetch_add(1, Ordering::SeqCst);
        self.running = false;
    }
}

/// Video output with externally controllable readiness.
pub struct TestOutput {
    pub ready: Arc<AtomicBool>,
    pub stops: Arc<AtomicUsize>,
    pub video_sizes: Arc<Mutex<Vec<Resolution>>>,
}

pub struct TestOutputHandles {
    pub ready: Arc<AtomicBool>,
    pub stops: Arc<AtomicUsize>,
    pub video_sizes: Arc<Mutex<Vec<Resolution>>>,
}

pub fn test_output(ready: bool) -> (Box<dyn VideoOutput>, TestOutputHandles) {
    let output = Box::new(TestOutput {
        ready: Arc::new(AtomicBool::new(ready)),
        stops: Arc::new(AtomicUsize::new(0)),
        video_sizes: Arc::new(Mutex::new(Vec::new())),
    });
    let handles = TestOutputHandles {
        ready: Arc::clone(&output.ready),
        stops: Arc::clone(&output.stops),
        video_sizes: Arc::clone(&output.video_sizes),
    };
    (output, handles)
}

impl VideoOutput for TestOutput {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn preview_target(&self) -> Option<PreviewTarget> {
        Some(PreviewTarget::Texture(7))
    }

    fn set_video_size(&mut self, size: Resolution) {
        self.video_sizes.lock().unwrap().push(size);
    }

    fn stop(&mut self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }

    fn reset(&mut self) {}
}

/// Session bound to a private registry so suites do not share routes.
pub fn make_session(provider: &Arc<FakeProvider>) -> CameraSession {
    CameraSession::with_registry(
        Arc::clone(provider) as Arc<dyn CameraProvider>,
        Arc::new(CallbackRegistry::new()),
    )
}

pub fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

pub fn wait_for_status(session: &CameraSession, status: CameraStatus) -> bool {
    wait_until(Duration::from_secs(2), || session.status() == status)
}

/// Drain and return every event that arrives within `settle`.
pub fn drain_events(session: &CameraSession, settle: Duration) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = session.events().recv_timeout(settle) {
        events.push(event);
    }
    events
}

/// Block until an event matching `matches` arrives; `None` on timeout.
/// Non-matching events are discarded.
pub fn wait_for_event(
    session: &CameraSession,
    timeout: Duration,
    matches: impl Fn(&SessionEvent) -> bool,
) -> Option<SessionEvent> {
    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.checked_duration_since(Instant::now())?;
        match session.events().recv_timeout(remaining) {
            Ok(event) if matches(&event) => return Some(event),
            Ok(_) => continue,
            Err(_) => return None,
        }
    }
}
