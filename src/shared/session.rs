// This is free and unencumbered software released into the public domain.

//! Camera session state machine.
//!
//! The session presents a synchronous-looking API on the application
//! thread, serializes every native-handle call through its
//! [`CameraWorker`], and consumes hardware events as queued messages on a
//! private router thread. Status checks, the cancellation flag, and capture
//! id bookkeeping exist to reject callbacks that arrive late or out of
//! order relative to outgoing commands.

use crate::shared::{
    CallbackRegistry, CameraCaps, CameraDescriptor, CameraError, CameraFacing, CameraProvider,
    CameraWorker, CaptureDestination, CaptureMode, DriveMode, ErrorCode, FixedOrientation,
    HandleEvent, HandleEventSink, ImageSettings, OrientationSource, ParameterBatch, PixelFormat,
    PreviewConfig, PreviewFrame, Resolution, VideoOutput, ViewfinderSettings, choose_fps_range,
    choose_picture_size, choose_preview_size, next_capture_path, sort_by_pixel_count,
};
use bytes::Bytes;
use std::path::PathBuf;
use std::sync::mpsc::{Receiver, Sender, SyncSender, channel, sync_channel};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;

/// Outbound notification queue depth; a consumer this far behind is gone
/// and further notifications are dropped with a warning.
const EVENT_QUEUE_CAPACITY: usize = 256;

pub type CaptureId = u64;

pub type FrameSink = Arc<dyn Fn(PreviewFrame) + Send + Sync + 'static>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProbeId(u64);

/// Externally driven lifecycle target, mutated only through
/// [`CameraSession::set_state`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CameraState {
    Unloaded,
    Loaded,
    Active,
}

/// Finer lifecycle projection, derived from the state plus asynchronous
/// hardware callback timing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CameraStatus {
    Unloaded,
    Loading,
    Loaded,
    Starting,
    Active,
    Stopping,
    Unavailable,
}

/// Asynchronous session notifications. Failure detail never crosses the
/// worker boundary as a panic; it arrives here, keyed by capture id where
/// one applies.
#[derive(Debug)]
pub enum SessionEvent {
    /// The native handle is open; delegators re-query supported value sets.
    Opened,
    StateChanged(CameraState),
    StatusChanged(CameraStatus),
    ReadyForCaptureChanged(bool),
    ImageExposed(CaptureId),
    ImageCaptured(CaptureId),
    ImageAvailable { id: CaptureId, frame: PreviewFrame },
    ImageSaved { id: CaptureId, path: PathBuf },
    AutoFocusComplete { success: bool },
    Error {
        id: Option<CaptureId>,
        code: ErrorCode,
        message: String,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PreviewPhase {
    Inactive,
    Starting,
    Running,
    Stopping,
}

struct InFlightCapture {
    id: CaptureId,
    file_name: String,
    destination: CaptureDestination,
    cancelled: bool,
}

/// Orchestrates one camera: open/close, state transitions, preview
/// configuration, capture sequencing, and frame distribution.
pub struct CameraSession {
    core: Arc<Mutex<SessionCore>>,
    events_rx: Receiver<SessionEvent>,
    router: Option<JoinHandle<()>>,
}

impl CameraSession {
    pub fn new(provider: Arc<dyn CameraProvider>) -> Self {
        Self::with_registry(provider, Arc::clone(CallbackRegistry::global()))
    }

    /// Session bound to a private callback registry instead of the
    /// process-wide one.
    pub fn with_registry(
        provider: Arc<dyn CameraProvider>,
        registry: Arc<CallbackRegistry>,
    ) -> Self {
        let (events_tx, events_rx) = sync_channel(EVENT_QUEUE_CAPACITY);
        let (route_tx, route_rx) = channel();
        let core = Arc::new(Mutex::new(SessionCore::new(
            provider, registry, events_tx, route_tx,
        )));
        let router_core = Arc::clone(&core);
        let router = std::thread::spawn(move || route_events(router_core, route_rx));
        Self {
            core,
            events_rx,
            router: Some(router),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionCore> {
        self.core.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queued session notifications; drain from the application thread.
    pub fn events(&self) -> &Receiver<SessionEvent> {
        &self.events_rx
    }

    pub fn state(&self) -> CameraState {
        self.lock().state
    }

    pub fn status(&self) -> CameraStatus {
        self.lock().status
    }

    pub fn ready_for_capture(&self) -> bool {
        self.lock().ready_for_capture
    }

    pub fn selected_camera(&self) -> Option<CameraDescriptor> {
        self.lock().descriptor.clone()
    }

    /// Hardware-advertised value sets cached at open; empty when closed.
    pub fn caps(&self) -> CameraCaps {
        self.lock().caps.clone()
    }

    /// Pick the device to open. Rejected while a camera is open.
    pub fn select_camera(&self, id: &str) -> Result<(), CameraError> {
        let mut core = self.lock();
        if core.worker.is_some() || core.opening {
            return Err(CameraError::other(
                "camera must be unloaded before selecting a device",
            ));
        }
        let descriptor = core
            .provider
            .enumerate()
            .into_iter()
            .find(|d| d.id == id)
            .ok_or(CameraError::NoCamera)?;
        core.descriptor = Some(descriptor);
        core.unavailable = false;
        core.recompute_status();
        Ok(())
    }

    /// Sole external driver of the lifecycle. While the host application is
    /// backgrounded the request is stored, not applied, and replayed once
    /// on foreground regain.
    pub fn set_state(&self, target: CameraState) {
        let mut core = self.lock();
        if !core.foreground {
            core.saved_state = Some(target);
            return;
        }
        core.apply_state(target);
    }

    pub fn set_foreground(&self, foreground: bool) {
        let mut core = self.lock();
        if core.foreground == foreground {
            return;
        }
        core.foreground = foreground;
        if foreground {
            if let Some(saved) = core.saved_state.take() {
                core.apply_state(saved);
            }
        } else if core.state != CameraState::Unloaded {
            // the platform reclaims cameras from backgrounded applications;
            // remember where we were and wind down
            core.saved_state = Some(core.state);
            core.apply_state(CameraState::Unloaded);
        }
    }

    pub fn set_capture_mode(&self, mode: CaptureMode) {
        let mut core = self.lock();
        if core.capture_mode == mode {
            return;
        }
        core.capture_mode = mode;
        if core.worker.is_some() {
            core.apply_viewfinder_settings_inner(true);
        }
    }

    pub fn set_drive_mode(&self, mode: DriveMode) {
        self.lock().drive_mode = mode;
    }

    pub fn set_capture_destination(&self, destination: CaptureDestination) {
        self.lock().destination = destination;
    }

    pub fn set_viewfinder_settings(&self, settings: ViewfinderSettings) {
        let mut core = self.lock();
        core.viewfinder = settings;
        if core.worker.is_some() {
            core.apply_viewfinder_settings_inner(true);
        }
    }

    pub fn set_image_settings(&self, settings: ImageSettings) {
        let mut core = self.lock();
        core.image = settings;
        if core.worker.is_some() {
            core.apply_image_settings_inner();
        }
    }

    /// Negotiate and push the viewfinder configuration for an explicit
    /// capture size. With `restart`, a running preview is stopped, the
    /// size/format/fps applied, and preview restarted; without it the new
    /// configuration waits for the next preview start.
    pub fn apply_viewfinder_settings(&self, target_capture_size: Resolution, restart: bool) {
        self.lock().apply_viewfinder_for(target_capture_size, restart);
    }

    pub fn set_video_output(&self, output: Option<Box<dyn VideoOutput>>) {
        self.lock().output = output;
    }

    pub fn set_orientation_source(&self, source: Box<dyn OrientationSource>) {
        self.lock().orientation = source;
    }

    /// Readiness feedback from the attached video output. A preview start
    /// deferred on an unready output is retried here.
    pub fn notify_video_output_ready(&self, ready: bool) {
        let mut core = self.lock();
        if ready && core.start_deferred && core.worker.is_some() {
            core.start_preview_inner();
        }
    }

    /// Request a still capture. A fresh id is allocated and returned even
    /// when the request is rejected immediately; rejection is reported
    /// asynchronously against that id and no native call is made.
    pub fn capture(&self, file_name: &str) -> CaptureId {
        let mut core = self.lock();
        core.last_capture_id += 1;
        let id = core.last_capture_id;

        if core.drive_mode != DriveMode::SingleShot {
            core.report(
                Some(id),
                ErrorCode::NotSupported,
                "only single-shot drive mode is supported",
            );
            return id;
        }
        if core.status != CameraStatus::Active || !core.ready_for_capture {
            core.report(Some(id), ErrorCode::NotReady, "camera not ready for capture");
            return id;
        }

        core.set_ready(false);
        core.capture = Some(InFlightCapture {
            id,
            file_name: file_name.to_string(),
            destination: core.destination,
            cancelled: false,
        });
        core.apply_image_settings_inner();
        let rotation = core.current_rotation();
        if let Some(worker) = core.worker.clone() {
            worker.apply_parameters(ParameterBatch {
                rotation: Some(rotation),
                ..ParameterBatch::default()
            });
            if let Err(err) = worker.take_picture() {
                core.capture = None;
                core.report(Some(id), ErrorCode::CaptureFailed, err.to_string());
                // restart preview to recover device usability
                worker.start_preview();
            }
        }
        id
    }

    /// Cooperative cancellation: consulted at the picture-exposed and
    /// picture-captured callback points; suppresses capture side effects
    /// while the preview restart still occurs.
    pub fn cancel_capture(&self) {
        let mut core = self.lock();
        if let Some(capture) = core.capture.as_mut() {
            capture.cancelled = true;
        }
    }

    /// Rotation to stamp on captures: sensor mounting orientation combined
    /// with the device's physical orientation rounded to a quarter turn,
    /// normalized into `[0, 360)`.
    pub fn current_camera_rotation(&self) -> u32 {
        self.lock().current_rotation()
    }

    /// Parameter funnel for control delegators; writes go through the
    /// worker, never to the handle directly.
    pub fn set_parameters(&self, batch: ParameterBatch) {
        if let Some(worker) = self.lock().worker.clone() {
            worker.apply_parameters(batch);
        }
    }

    pub fn lock_hardware(&self) -> Result<(), CameraError> {
        match self.lock().worker.clone() {
            Some(worker) => worker.lock(),
            None => Err(CameraError::NotOpen),
        }
    }

    pub fn unlock_hardware(&self) -> Result<(), CameraError> {
        match self.lock().worker.clone() {
            Some(worker) => worker.unlock(),
            None => Err(CameraError::NotOpen),
        }
    }

    pub fn reconnect_hardware(&self) -> Result<(), CameraError> {
        match self.lock().worker.clone() {
            Some(worker) => worker.reconnect(),
            None => Err(CameraError::NotOpen),
        }
    }

    /// Register a frame observer. Per-frame native notification is enabled
    /// while any probe or the preview callback is installed.
    pub fn add_probe(&self, sink: FrameSink) -> ProbeId {
        let mut core = self.lock();
        core.next_probe_id += 1;
        let id = ProbeId(core.next_probe_id);
        core.probes.push((id, sink));
        core.update_frame_notification();
        id
    }

    pub fn remove_probe(&self, id: ProbeId) {
        let mut core = self.lock();
        core.probes.retain(|(probe, _)| *probe != id);
        core.update_frame_notification();
    }

    pub fn set_preview_callback(&self, sink: Option<FrameSink>) {
        let mut core = self.lock();
        core.preview_callback = sink;
        core.update_frame_notification();
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        {
            let mut core = self.lock();
            core.close_camera();
            core.route_tx = None;
        }
        if let Some(router) = self.router.take() {
            let _ = router.join();
        }
    }
}

struct SessionCore {
    provider: Arc<dyn CameraProvider>,
    registry: Arc<CallbackRegistry>,
    events_tx: SyncSender<SessionEvent>,
    route_tx: Option<Sender<HandleEvent>>,

    descriptor: Option<CameraDescriptor>,
    worker: Option<Arc<CameraWorker>>,
    serial: Option<u64>,
    caps: CameraCaps,

    state: CameraState,
    status: CameraStatus,
    saved_state: Option<CameraState>,
    foreground: bool,

    phase: PreviewPhase,
    opening: bool,
    unavailable: bool,
    start_deferred: bool,
    ready_for_capture: bool,

    capture_mode: CaptureMode,
    drive_mode: DriveMode,
    destination: CaptureDestination,
    viewfinder: ViewfinderSettings,
    image: ImageSettings,
    actual_preview: Option<PreviewConfig>,
    actual_picture_size: Option<Resolution>,
    actual_jpeg_quality: Option<u8>,

    last_capture_id: CaptureId,
    capture: Option<InFlightCapture>,

    probes: Vec<(ProbeId, FrameSink)>,
    next_probe_id: u64,
    preview_callback: Option<FrameSink>,

    output: Option<Box<dyn VideoOutput>>,
    orientation: Box<dyn OrientationSource>,
}

impl SessionCore {
    fn new(
        provider: Arc<dyn CameraProvider>,
        registry: Arc<CallbackRegistry>,
        events_tx: SyncSender<SessionEvent>,
        route_tx: Sender<HandleEvent>,
    ) -> Self {
        Self {
            provider,
            registry,
            events_tx,
            route_tx: Some(route_tx),
            descriptor: None,
            worker: None,
            serial: None,
            caps: CameraCaps::default(),
            state: CameraState::Unloaded,
            status: CameraStatus::Unloaded,
            saved_state: None,
            foreground: true,
            phase: PreviewPhase::Inactive,
            opening: false,
            unavailable: false,
            start_deferred: false,
            ready_for_capture: false,
            capture_mode: CaptureMode::default(),
            drive_mode: DriveMode::default(),
            destination: CaptureDestination::default(),
            viewfinder: ViewfinderSettings::default(),
            image: ImageSettings::default(),
            actual_preview: None,
            actual_picture_size: None,
            actual_jpeg_quality: None,
            last_capture_id: 0,
            capture: None,
            probes: Vec::new(),
            next_probe_id: 0,
            preview_callback: None,
            output: None,
            orientation: Box::new(FixedOrientation::default()),
        }
    }

    fn emit(&self, event: SessionEvent) {
        if self.events_tx.try_send(event).is_err() {
            #[cfg(feature = "tracing")]
            asimov_module::tracing::warn!(
                target: "asimov_camera_session",
                "session event queue full, notification dropped"
            );
        }
    }

    fn report(&self, id: Option<CaptureId>, code: ErrorCode, message: impl Into<String>) {
        self.emit(SessionEvent::Error {
            id,
            code,
            message: message.into(),
        });
    }

    /// Single reducer for the status projection. Hardware callbacks and
    /// state requests only flip its inputs; nothing else writes `status`.
    fn recompute_status(&mut self) {
        let status = if self.unavailable {
            CameraStatus::Unavailable
        } else if self.opening {
            CameraStatus::Loading
        } else if self.worker.is_none() {
            CameraStatus::Unloaded
        } else {
            match self.phase {
                PreviewPhase::Inactive => CameraStatus::Loaded,
                PreviewPhase::Starting => CameraStatus::Starting,
                PreviewPhase::Running => CameraStatus::Active,
                PreviewPhase::Stopping => CameraStatus::Stopping,
            }
        };
        if status != self.status {
            self.status = status;
            self.emit(SessionEvent::StatusChanged(status));
        }
    }

    fn set_ready(&mut self, ready: bool) {
        if self.ready_for_capture != ready {
            self.ready_for_capture = ready;
            self.emit(SessionEvent::ReadyForCaptureChanged(ready));
        }
    }

    fn apply_state(&mut self, target: CameraState) {
        if target == self.state {
            return;
        }
        let accepted = match target {
            CameraState::Unloaded => {
                self.close_camera();
                true
            },
            CameraState::Loaded => {
                if self.state == CameraState::Active {
                    self.stop_preview_inner();
                    true
                } else {
                    self.open_camera()
                }
            },
            CameraState::Active => {
                if self.worker.is_none() && !self.open_camera() {
                    false
                } else {
                    self.start_preview_inner()
                }
            },
        };
        if accepted {
            self.state = target;
            self.emit(SessionEvent::StateChanged(target));
        }
    }

    /// Allocate the native handle on the worker thread; blocking from the
    /// caller's view. Failure is terminal for this attempt but retryable.
    fn open_camera(&mut self) -> bool {
        if self.worker.is_some() {
            return true;
        }
        let Some(route) = self.route_tx.clone() else {
            return false;
        };
        let descriptor = match self.descriptor.clone() {
            Some(descriptor) => descriptor,
            None => match self.provider.enumerate().into_iter().next() {
                Some(descriptor) => {
                    self.descriptor = Some(descriptor.clone());
                    descriptor
                },
                None => {
                    self.unavailable = true;
                    self.recompute_status();
                    self.report(None, ErrorCode::Unavailable, "no camera device available");
                    return false;
                },
            },
        };

        self.unavailable = false;
        self.opening = true;
        self.recompute_status();

        let worker = Arc::new(CameraWorker::spawn(Arc::clone(&self.provider)));
        let serial = self.registry.register(route);
        let sink = HandleEventSink::new(serial, Arc::clone(&self.registry));
        match worker.open(&descriptor.id, sink) {
            Ok(mut caps) => {
                sort_by_pixel_count(&mut caps.preview_sizes);
                sort_by_pixel_count(&mut caps.picture_sizes);
                self.caps = caps;
                self.serial = Some(serial);
                self.opening = false;
                // force the canonical preview format up front; an
                // explicitly requested supported format overrides it
                let format = self
                    .viewfinder
                    .pixel_format
                    .filter(|f| self.caps.preview_formats.contains(f))
                    .unwrap_or(PixelFormat::Nv21);
                worker.apply_parameters(ParameterBatch {
                    preview_format: Some(format),
                    ..ParameterBatch::default()
                });
                self.worker = Some(worker);
                self.update_frame_notification();
                self.recompute_status();
                self.emit(SessionEvent::Opened);
                true
            },
            Err(err) => {
                self.registry.unregister(serial);
                drop(worker);
                self.opening = false;
                self.unavailable = true;
                self.recompute_status();
                self.report(None, ErrorCode::Unavailable, err.to_string());
                false
            },
        }
    }

    /// Idempotent: stops preview if active, releases the native handle,
    /// resets capture bookkeeping.
    fn close_camera(&mut self) {
        if matches!(self.phase, PreviewPhase::Starting | PreviewPhase::Running) {
            self.stop_preview_inner();
        }
        if let Some(worker) = self.worker.take() {
            // release happens-before the worker is asked to exit
            worker.release();
            drop(worker);
        }
        if let Some(serial) = self.serial.take() {
            self.registry.unregister(serial);
        }
        self.caps = CameraCaps::default();
        self.actual_preview = None;
        self.actual_picture_size = None;
        self.actual_jpeg_quality = None;
        self.capture = None;
        self.phase = PreviewPhase::Inactive;
        self.opening = false;
        self.unavailable = false;
        self.start_deferred = false;
        self.set_ready(false);
        self.recompute_status();
    }

    /// Returns success without starting when the attached output is not yet
    /// ready; the start is retried on the readiness notification.
    fn start_preview_inner(&mut self) -> bool {
        if matches!(self.phase, PreviewPhase::Starting | PreviewPhase::Running) {
            return true;
        }
        let Some(worker) = self.worker.clone() else {
            return false;
        };
        let (ready, target) = match self.output.as_ref() {
            Some(output) => (output.is_ready(), output.preview_target()),
            None => {
                self.report(None, ErrorCode::PreviewFailed, "no video output attached");
                return false;
            },
        };
        if !ready {
            self.start_deferred = true;
            return true;
        }
        self.start_deferred = false;
        let Some(target) = target else {
            self.report(
                None,
                ErrorCode::PreviewFailed,
                "video output has no preview target",
            );
            return false;
        };

        self.apply_image_settings_inner();
        self.apply_viewfinder_settings_inner(true);

        if let Err(err) = worker.set_preview_target(Some(target)) {
            self.report(None, ErrorCode::PreviewFailed, err.to_string());
            return false;
        }
        if let Some(config) = self.actual_preview {
            if let Some(output) = self.output.as_mut() {
                output.set_video_size(config.resolution);
            }
        }
        self.orientation.start();
        worker.start_preview();
        self.phase = PreviewPhase::Starting;
        self.recompute_status();
        true
    }

    /// Idempotent.
    fn stop_preview_inner(&mut self) {
        self.start_deferred = false;
        if !matches!(self.phase, PreviewPhase::Starting | PreviewPhase::Running) {
            return;
        }
        let Some(worker) = self.worker.clone() else {
            return;
        };
        self.orientation.stop();
        worker.stop_preview();
        // clears the native preview surface; ordered after stop on the worker
        let _ = worker.set_preview_target(None);
        self.phase = PreviewPhase::Stopping;
        self.set_ready(false);
        if let Some(output) = self.output.as_mut() {
            output.stop();
            output.reset();
        }
        self.recompute_status();
    }

    fn target_capture_size(&self) -> Option<Resolution> {
        self.actual_picture_size
            .or(self.image.resolution)
            .or_else(|| self.caps.picture_sizes.last().copied())
    }

    fn apply_viewfinder_settings_inner(&mut self, restart: bool) {
        if let Some(capture) = self.target_capture_size() {
            self.apply_viewfinder_for(capture, restart);
        }
    }

    fn apply_viewfinder_for(&mut self, capture: Resolution, restart: bool) {
        let Some(worker) = self.worker.clone() else {
            return;
        };
        if self.caps.preview_sizes.is_empty() {
            return;
        }

        // video capture on devices without an independent preview size pins
        // the preview resolution to the capture size
        let resolution = if self.capture_mode.includes_video() && !self.caps.separate_video_preview
        {
            capture
        } else {
            match choose_preview_size(&self.caps.preview_sizes, self.viewfinder.resolution, capture)
            {
                Some(resolution) => resolution,
                None => return,
            }
        };

        let pixel_format = self
            .viewfinder
            .pixel_format
            .filter(|format| self.caps.preview_formats.contains(format))
            .unwrap_or(PixelFormat::Nv21);

        let fps = choose_fps_range(
            &self.caps.fps_ranges,
            self.viewfinder.min_fps,
            self.viewfinder.max_fps,
        );

        let config = PreviewConfig {
            resolution,
            pixel_format,
            fps,
        };
        if self.actual_preview == Some(config) {
            return;
        }

        let running = matches!(self.phase, PreviewPhase::Starting | PreviewPhase::Running);
        if running && !restart {
            // the new configuration waits for the next preview start
            return;
        }
        if running {
            worker.stop_preview();
        }
        worker.apply_parameters(ParameterBatch {
            preview_size: Some(resolution),
            preview_format: Some(pixel_format),
            preview_fps: fps,
            ..ParameterBatch::default()
        });
        if running {
            worker.start_preview();
        }
        self.actual_preview = Some(config);
        if let Some(output) = self.output.as_mut() {
            output.set_video_size(resolution);
        }
    }

    fn apply_image_settings_inner(&mut self) {
        let Some(worker) = self.worker.clone() else {
            return;
        };
        let Some(size) = choose_picture_size(&self.caps.picture_sizes, self.image.resolution)
        else {
            return;
        };
        let quality = self.image.jpeg_quality;
        if self.actual_picture_size == Some(size) && self.actual_jpeg_quality == quality {
            return;
        }
        worker.apply_parameters(ParameterBatch {
            picture_size: Some(size),
            jpeg_quality: quality,
            ..ParameterBatch::default()
        });
        self.actual_picture_size = Some(size);
        self.actual_jpeg_quality = quality;
    }

    fn current_rotation(&self) -> u32 {
        let Some(descriptor) = &self.descriptor else {
            return 0;
        };
        let device = round_to_quarter_turn(self.orientation.device_orientation());
        combined_rotation(descriptor.facing, descriptor.orientation, device)
    }

    fn update_frame_notification(&mut self) {
        let enabled = !self.probes.is_empty() || self.preview_callback.is_some();
        if let Some(worker) = &self.worker {
            worker.set_frame_notification(enabled);
        }
    }

    fn frame_sinks(&self) -> Vec<FrameSink> {
        let mut sinks: Vec<FrameSink> = self
            .probes
            .iter()
            .map(|(_, sink)| Arc::clone(sink))
            .collect();
        if let Some(callback) = &self.preview_callback {
            sinks.push(Arc::clone(callback));
        }
        sinks
    }

    fn handle_event(&mut self, event: HandleEvent) {
        match event {
            HandleEvent::PreviewStarted => {
                if matches!(self.phase, PreviewPhase::Starting | PreviewPhase::Running) {
                    self.phase = PreviewPhase::Running;
                    self.recompute_status();
                    if self.capture.is_none() {
                        self.set_ready(true);
                    }
                }
            },
            HandleEvent::PreviewStopped => {
                if self.phase == PreviewPhase::Stopping {
                    self.phase = PreviewPhase::Inactive;
                    self.recompute_status();
                }
            },
            HandleEvent::PreviewFailed { reason } => self.on_preview_failed(reason),
            HandleEvent::PictureExposed => {
                if let Some(capture) = &self.capture {
                    if !capture.cancelled {
                        self.emit(SessionEvent::ImageExposed(capture.id));
                    }
                }
            },
            HandleEvent::PictureCaptured { data } => self.on_picture_captured(data),
            HandleEvent::CaptureFailed { reason } => {
                if let Some(capture) = self.capture.take() {
                    self.report(Some(capture.id), ErrorCode::CaptureFailed, reason);
                }
                if let Some(worker) = self.worker.clone() {
                    worker.start_preview();
                }
            },
            HandleEvent::AutoFocusComplete { success } => {
                self.emit(SessionEvent::AutoFocusComplete { success });
            },
            // distributed by the router without holding the session lock
            HandleEvent::PreviewFrame(_) => {},
        }
    }

    /// Preview-start hardware failure: recoverable, not fatal. Roll back to
    /// loaded, detach surfaces, report.
    fn on_preview_failed(&mut self, reason: String) {
        if !matches!(self.phase, PreviewPhase::Starting | PreviewPhase::Running) {
            return;
        }
        self.phase = PreviewPhase::Inactive;
        self.orientation.stop();
        if let Some(worker) = self.worker.clone() {
            let _ = worker.set_preview_target(None);
        }
        if let Some(output) = self.output.as_mut() {
            output.stop();
            output.reset();
        }
        self.set_ready(false);
        if self.state == CameraState::Active {
            self.state = CameraState::Loaded;
            self.emit(SessionEvent::StateChanged(CameraState::Loaded));
        }
        self.recompute_status();
        self.report(None, ErrorCode::PreviewFailed, reason);
    }

    fn on_picture_captured(&mut self, data: Bytes) {
        let Some(capture) = self.capture.take() else {
            return; // stale callback, no capture outstanding
        };
        if !capture.cancelled {
            self.emit(SessionEvent::ImageCaptured(capture.id));
            if capture.destination.to_buffer() {
                let frame = jpeg_frame(data.clone());
                self.emit(SessionEvent::ImageAvailable {
                    id: capture.id,
                    frame,
                });
            }
            if capture.destination.to_file() {
                self.spawn_writer(capture.id, capture.file_name, data);
            }
        }
        // the native preview halts after exposure; restart it to recover
        // the viewfinder and re-arm the readiness gate
        if let Some(worker) = self.worker.clone() {
            worker.start_preview();
        }
    }

    fn spawn_writer(&self, id: CaptureId, file_name: String, data: Bytes) {
        let events = self.events_tx.clone();
        std::thread::spawn(move || {
            let path = next_capture_path(&file_name);
            let result = match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => {
                    std::fs::create_dir_all(parent).and_then(|()| std::fs::write(&path, &data))
                },
                _ => std::fs::write(&path, &data),
            };
            let event = match result {
                Ok(()) => SessionEvent::ImageSaved { id, path },
                Err(err) => SessionEvent::Error {
                    id: Some(id),
                    code: ErrorCode::WriteFailed,
                    message: err.to_string(),
                },
            };
            let _ = events.try_send(event);
        });
    }
}

fn route_events(core: Arc<Mutex<SessionCore>>, rx: Receiver<HandleEvent>) {
    for event in rx {
        match event {
            HandleEvent::PreviewFrame(frame) => {
                let sinks = {
                    let core = core.lock().unwrap_or_else(|e| e.into_inner());
                    core.frame_sinks()
                };
                // observers run without the session lock held
                for sink in &sinks {
                    sink(frame.clone());
                }
            },
            other => {
                let mut core = core.lock().unwrap_or_else(|e| e.into_inner());
                core.handle_event(other);
            },
        }
    }
}

fn jpeg_frame(data: Bytes) -> PreviewFrame {
    let (width, height) = image::ImageReader::new(std::io::Cursor::new(data.as_ref()))
        .with_guessed_format()
        .ok()
        .and_then(|reader| reader.into_dimensions().ok())
        .unwrap_or((0, 0));
    PreviewFrame::new(data, width, height, 0, PixelFormat::Jpeg)
}

fn round_to_quarter_turn(degrees: u32) -> u32 {
    ((degrees + 45) / 90 * 90) % 360
}

fn combined_rotation(facing: CameraFacing, native_orientation: u32, device_orientation: u32) -> u32 {
    let native = native_orientation as i32;
    let device = device_orientation as i32;
    let combined = match facing {
        CameraFacing::Back => native + device,
        CameraFacing::Front => native - device,
    };
    combined.rem_euclid(360) as u32
}
