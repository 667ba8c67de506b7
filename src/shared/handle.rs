// This is free and unencumbered software released into the public domain.

use crate::shared::{
    CallbackRegistry, CameraDescriptor, CameraError, DriveMode, FpsRange, PixelFormat,
    PreviewFrame, Resolution,
};
use bytes::Bytes;
use std::sync::Arc;

/// Events originating on the platform's own camera callback thread(s),
/// outside the worker's request/response flow. They are routed through the
/// [`CallbackRegistry`] and consumed as queued messages by the owning
/// session, never as direct calls.
#[derive(Debug)]
pub enum HandleEvent {
    PreviewStarted,
    PreviewStopped,
    PreviewFailed { reason: String },
    PreviewFrame(PreviewFrame),
    PictureExposed,
    PictureCaptured { data: Bytes },
    CaptureFailed { reason: String },
    AutoFocusComplete { success: bool },
}

/// Route for hardware events back into the owning session.
///
/// Cheap to clone and safe to use from any thread; a post after the session
/// has closed its camera is dropped at the registry.
#[derive(Clone)]
pub struct HandleEventSink {
    serial: u64,
    registry: Arc<CallbackRegistry>,
}

impl HandleEventSink {
    pub(crate) fn new(serial: u64, registry: Arc<CallbackRegistry>) -> Self {
        Self { serial, registry }
    }

    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// Forward one hardware event; returns false when the route is gone.
    pub fn post(&self, event: HandleEvent) -> bool {
        self.registry.dispatch(self.serial, event)
    }
}

impl core::fmt::Debug for HandleEventSink {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HandleEventSink")
            .field("serial", &self.serial)
            .finish()
    }
}

/// Hardware-advertised value sets, queried once after open and cached by
/// the session for lock-free reads.
#[derive(Clone, Debug, Default)]
pub struct CameraCaps {
    /// Ascending by pixel count once the session has normalized them.
    pub preview_sizes: Vec<Resolution>,
    /// Ascending by pixel count once the session has normalized them.
    pub picture_sizes: Vec<Resolution>,
    pub preview_formats: Vec<PixelFormat>,
    /// Platform order preserved; negotiation relies on it for tie-breaks.
    pub fps_ranges: Vec<FpsRange>,
    pub drive_modes: Vec<DriveMode>,
    /// Whether the device supports a preview size independent of the video
    /// capture size.
    pub separate_video_preview: bool,
}

/// Partial parameter write pushed to the native handle. `None` fields are
/// left untouched on the device.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParameterBatch {
    pub preview_size: Option<Resolution>,
    pub preview_format: Option<PixelFormat>,
    pub preview_fps: Option<FpsRange>,
    pub picture_size: Option<Resolution>,
    pub jpeg_quality: Option<u8>,
    pub rotation: Option<u32>,
}

impl ParameterBatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Where the native handle renders preview frames; opaque to the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PreviewTarget {
    /// GPU texture identified by a platform texture name.
    Texture(u64),
    /// Platform window or surface handle.
    Window(u64),
}

/// Opaque native camera device handle.
///
/// Every method is invoked on the session's dedicated worker thread; the
/// platform forbids access from any other thread. Completions of the
/// asynchronous primitives are delivered through the [`HandleEventSink`]
/// given at open:
///
/// - `start_preview` posts `PreviewStarted` each time it takes effect, also
///   when preview was already running;
/// - `stop_preview` posts `PreviewStopped`;
/// - `take_picture` halts preview without a `PreviewStopped` notification,
///   then posts `PictureExposed` followed by `PictureCaptured` or
///   `CaptureFailed`.
pub trait NativeCameraHandle: Send {
    fn capabilities(&self) -> CameraCaps;

    fn lock(&mut self) -> Result<(), CameraError>;
    fn unlock(&mut self) -> Result<(), CameraError>;
    fn reconnect(&mut self) -> Result<(), CameraError>;

    fn apply_parameters(&mut self, batch: &ParameterBatch) -> Result<(), CameraError>;

    fn set_preview_target(&mut self, target: Option<PreviewTarget>) -> Result<(), CameraError>;

    /// Enable or disable per-frame `PreviewFrame` notifications.
    fn set_frame_notification(&mut self, enabled: bool);

    fn start_preview(&mut self) -> Result<(), CameraError>;
    fn stop_preview(&mut self);

    fn take_picture(&mut self) -> Result<(), CameraError>;

    fn release(&mut self);
}

/// Factory and enumerator for one native camera service.
pub trait CameraProvider: Send + Sync {
    fn enumerate(&self) -> Vec<CameraDescriptor>;

    fn open(
        &self,
        id: &str,
        sink: HandleEventSink,
    ) -> Result<Box<dyn NativeCameraHandle>, CameraError>;
}
