// This is free and unencumbered software released into the public domain.

//! Simulated camera backend.
//!
//! A software stand-in for the native camera service: preview frames come
//! from a ticker thread playing the platform callback thread's role, and
//! still captures produce synthetic JPEG data. The default runnable backend
//! for the CLI bins and for exercising the session end-to-end.

use crate::shared::{
    CameraCaps, CameraDescriptor, CameraError, CameraFacing, CameraProvider, DriveMode, FpsRange,
    HandleEvent, HandleEventSink, NativeCameraHandle, ParameterBatch, PixelFormat, PreviewFrame,
    PreviewTarget, Resolution,
};
use bytes::Bytes;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub struct SimCameraProvider {
    descriptors: Vec<CameraDescriptor>,
}

impl Default for SimCameraProvider {
    fn default() -> Self {
        Self {
            descriptors: vec![
                CameraDescriptor {
                    id: "sim:0".into(),
                    facing: CameraFacing::Back,
                    orientation: 90,
                    name: "Simulated back camera".into(),
                    description: "software-generated frames".into(),
                },
                CameraDescriptor {
                    id: "sim:1".into(),
                    facing: CameraFacing::Front,
                    orientation: 270,
                    name: "Simulated front camera".into(),
                    description: "software-generated frames".into(),
                },
            ],
        }
    }
}

impl CameraProvider for SimCameraProvider {
    fn enumerate(&self) -> Vec<CameraDescriptor> {
        self.descriptors.clone()
    }

    fn open(
        &self,
        id: &str,
        sink: HandleEventSink,
    ) -> Result<Box<dyn NativeCameraHandle>, CameraError> {
        if !self.descriptors.iter().any(|d| d.id == id) {
            return Err(CameraError::NoCamera);
        }
        Ok(Box::new(SimCameraHandle::new(sink)))
    }
}

pub struct SimCameraHandle {
    sink: HandleEventSink,
    running: Arc<AtomicBool>,
    frames_enabled: Arc<AtomicBool>,
    silent_stop: Arc<AtomicBool>,
    ticker: Option<JoinHandle<()>>,
    target: Option<PreviewTarget>,
    preview_size: Resolution,
    preview_format: PixelFormat,
    preview_fps: FpsRange,
    picture_size: Resolution,
    jpeg_quality: u8,
}

impl SimCameraHandle {
    fn new(sink: HandleEventSink) -> Self {
        Self {
            sink,
            running: Arc::new(AtomicBool::new(false)),
            frames_enabled: Arc::new(AtomicBool::new(false)),
            silent_stop: Arc::new(AtomicBool::new(false)),
            ticker: None,
            target: None,
            preview_size: Resolution::new(640, 480),
            preview_format: PixelFormat::Nv21,
            preview_fps: FpsRange::new(30, 30),
            picture_size: Resolution::new(1920, 1080),
            jpeg_quality: 85,
        }
    }

    fn stop_ticker(&mut self, silent: bool) {
        self.silent_stop.store(silent, Ordering::Relaxed);
        self.running.store(false, Ordering::Relaxed);
        if let Some(ticker) = self.ticker.take() {
            let _ = ticker.join();
        }
        self.silent_stop.store(false, Ordering::Relaxed);
    }
}

impl NativeCameraHandle for SimCameraHandle {
    fn capabilities(&self) -> CameraCaps {
        CameraCaps {
            preview_sizes: vec![
                Resolution::new(176, 144),
                Resolution::new(320, 240),
                Resolution::new(640, 480),
                Resolution::new(1280, 720),
                Resolution::new(1920, 1080),
            ],
            picture_sizes: vec![
                Resolution::new(640, 480),
                Resolution::new(1280, 720),
                Resolution::new(1920, 1080),
                Resolution::new(2592, 1944),
            ],
            preview_formats: vec![PixelFormat::Nv21, PixelFormat::Yv12],
            fps_ranges: vec![
                FpsRange::new(15, 15),
                FpsRange::new(10, 30),
                FpsRange::new(30, 30),
            ],
            drive_modes: vec![DriveMode::SingleShot],
            separate_video_preview: false,
        }
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
        if let Some(size) = batch.preview_size {
            self.preview_size = size;
        }
        if let Some(format) = batch.preview_format {
            self.preview_format = format;
        }
        if let Some(fps) = batch.preview_fps {
            self.preview_fps = fps;
        }
        if let Some(size) = batch.picture_size {
            self.picture_size = size;
        }
        if let Some(quality) = batch.jpeg_quality {
            self.jpeg_quality = quality.min(100);
        }
        Ok(())
    }

    fn set_preview_target(&mut self, target: Option<PreviewTarget>) -> Result<(), CameraError> {
        self.target = target;
        Ok(())
    }

    fn set_frame_notification(&mut self, enabled: bool) {
        self.frames_enabled.store(enabled, Ordering::Relaxed);
    }

    fn start_preview(&mut self) -> Result<(), CameraError> {
        if self.target.is_none() {
            return Err(CameraError::other("no preview target attached"));
        }
        if self.running.load(Ordering::Relaxed) {
            // already streaming; acknowledge like the hardware does
            self.sink.post(HandleEvent::PreviewStarted);
            return Ok(());
        }

        self.running.store(true, Ordering::Relaxed);
        let running = Arc::clone(&self.running);
        let frames_enabled = Arc::clone(&self.frames_enabled);
        let silent_stop = Arc::clone(&self.silent_stop);
        let sink = self.sink.clone();
        let size = self.preview_size;
        let format = self.preview_format;
        let fps = i64::from(self.preview_fps.max.max(1));
        let interval = Duration::from_nanos((1_000_000_000 / fps) as u64);

        self.ticker = Some(std::thread::spawn(move || {
            sink.post(HandleEvent::PreviewStarted);
            while running.load(Ordering::Relaxed) {
                if frames_enabled.load(Ordering::Relaxed) {
                    sink.post(HandleEvent::PreviewFrame(synthetic_frame(size, format)));
                }
                std::thread::sleep(interval);
            }
            if !silent_stop.load(Ordering::Relaxed) {
                sink.post(HandleEvent::PreviewStopped);
            }
        }));
        Ok(())
    }

    fn stop_preview(&mut self) {
        if self.running.load(Ordering::Relaxed) {
            self.stop_ticker(false);
        }
    }

    fn take_picture(&mut self) -> Result<(), CameraError> {
        if !self.running.load(Ordering::Relaxed) {
            return Err(CameraError::other("preview is not running"));
        }
        // the hardware halts preview after exposure without a stop event
        self.stop_ticker(true);

        let sink = self.sink.clone();
        let size = self.picture_size;
        let quality = self.jpeg_quality;
        std::thread::spawn(move || {
            sink.post(HandleEvent::PictureExposed);
            match encode_still(size, quality) {
                Ok(data) => {
                    sink.post(HandleEvent::PictureCaptured { data });
                },
                Err(err) => {
                    sink.post(HandleEvent::CaptureFailed {
                        reason: err.to_string(),
                    });
                },
            }
        });
        Ok(())
    }

    fn release(&mut self) {
        self.stop_ticker(true);
        self.target = None;
    }
}

impl Drop for SimCameraHandle {
    fn drop(&mut self) {
        self.release();
    }
}

fn now_ns_best_effort() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// Mid-gray frame of the configured size; NV21/YV12 carry 12 bits per
/// pixel, everything else is padded to 16.
fn synthetic_frame(size: Resolution, format: PixelFormat) -> PreviewFrame {
    let (width, height) = (size.width as usize, size.height as usize);
    let len = match format {
        PixelFormat::Nv21 | PixelFormat::Yv12 => width * height * 3 / 2,
        _ => width * height * 2,
    };
    let data = Bytes::from(vec![0x80u8; len]);
    PreviewFrame::new(data, size.width, size.height, size.width, format)
        .with_timestamp_ns(now_ns_best_effort())
}

fn encode_still(size: Resolution, quality: u8) -> Result<Bytes, image::ImageError> {
    let image = image::RgbImage::from_fn(size.width, size.height, |x, y| {
        // cheap gradient so consecutive captures are visibly images
        image::Rgb([
            (x * 255 / size.width.max(1)) as u8,
            (y * 255 / size.height.max(1)) as u8,
            0x60,
        ])
    });
    let mut out = Vec::new();
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, quality);
    encoder.encode_image(&image)?;
    Ok(Bytes::from(out))
}
