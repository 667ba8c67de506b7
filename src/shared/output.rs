// This is free and unencumbered software released into the public domain.

use crate::shared::{PreviewTarget, Resolution};

/// Rendering sink for the viewfinder stream.
///
/// Concrete outputs (GPU-texture compositing, raw-buffer delivery) live
/// outside this crate. The session only drives this contract, and reacts to
/// readiness changes fed back through
/// [`CameraSession::notify_video_output_ready`](crate::shared::CameraSession::notify_video_output_ready):
/// a preview start requested while the output is not ready is deferred and
/// retried on the next readiness notification.
pub trait VideoOutput: Send {
    /// Whether the output can provide a preview target right now.
    fn is_ready(&self) -> bool;

    /// The target to attach to the native handle. Expected to be `Some`
    /// once [`is_ready`](Self::is_ready) reports true.
    fn preview_target(&self) -> Option<PreviewTarget>;

    /// The negotiated frame size; called whenever it changes.
    fn set_video_size(&mut self, size: Resolution);

    fn stop(&mut self);

    fn reset(&mut self);
}
