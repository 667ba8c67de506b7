// This is free and unencumbered software released into the public domain.

use crate::shared::PixelFormat;
use derive_more::Display;

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash)]
#[display("{width}x{height}")]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn pixel_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            return 0.0;
        }
        f64::from(self.width) / f64::from(self.height)
    }
}

/// Inclusive frame-rate range as advertised by the hardware.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
#[display("{min}-{max}")]
pub struct FpsRange {
    pub min: i32,
    pub max: i32,
}

impl FpsRange {
    pub const fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CaptureMode {
    #[default]
    Still,
    Video,
}

impl CaptureMode {
    pub fn includes_video(&self) -> bool {
        matches!(self, CaptureMode::Video)
    }
}

/// Capture cadence policy. Only single-shot has hardware support here.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DriveMode {
    #[default]
    SingleShot,
    Burst,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CaptureDestination {
    #[default]
    File,
    Buffer,
    FileAndBuffer,
}

impl CaptureDestination {
    pub fn to_file(&self) -> bool {
        matches!(self, CaptureDestination::File | CaptureDestination::FileAndBuffer)
    }

    pub fn to_buffer(&self) -> bool {
        matches!(self, CaptureDestination::Buffer | CaptureDestination::FileAndBuffer)
    }
}

/// Requested viewfinder configuration. Unset fields are negotiated against
/// the hardware-advertised sets when preview starts.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ViewfinderSettings {
    pub resolution: Option<Resolution>,
    pub pixel_format: Option<PixelFormat>,
    pub min_fps: Option<i32>,
    pub max_fps: Option<i32>,
}

impl ViewfinderSettings {
    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = Some(resolution);
        self
    }

    pub fn with_pixel_format(mut self, format: PixelFormat) -> Self {
        self.pixel_format = Some(format);
        self
    }

    pub fn with_fps(mut self, min: i32, max: i32) -> Self {
        self.min_fps = Some(min);
        self.max_fps = Some(max);
        self
    }

    pub fn with_min_fps(mut self, min: i32) -> Self {
        self.min_fps = Some(min);
        self
    }

    pub fn with_max_fps(mut self, max: i32) -> Self {
        self.max_fps = Some(max);
        self
    }
}

/// Requested still-image configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ImageSettings {
    pub resolution: Option<Resolution>,
    pub jpeg_quality: Option<u8>,
}

impl ImageSettings {
    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = Some(resolution);
        self
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = Some(quality.min(100));
        self
    }
}

/// A preview configuration actually pushed to the native handle. Kept by the
/// session so an identical request is not pushed twice.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PreviewConfig {
    pub resolution: Resolution,
    pub pixel_format: PixelFormat,
    pub fps: Option<FpsRange>,
}
