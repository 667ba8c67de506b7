// This is free and unencumbered software released into the public domain.

use bytes::Bytes;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    /// Canonical preview format on the target platform.
    Nv21,
    Yv12,
    Yuy2,
    Rgb565,
    Jpeg,
}

#[derive(Clone, Debug)]
pub struct PreviewFrame {
    pub data: Bytes,
    pub width: u32,
    pub height: u32,
    pub bytes_per_line: u32,
    pub pixel_format: PixelFormat,
    pub timestamp_ns: u64,
}

impl PreviewFrame {
    pub fn new(
        data: Bytes,
        width: u32,
        height: u32,
        bytes_per_line: u32,
        pixel_format: PixelFormat,
    ) -> Self {
        Self {
            data,
            width,
            height,
            bytes_per_line,
            pixel_format,
            timestamp_ns: 0,
        }
    }

    pub fn with_timestamp_ns(mut self, timestamp_ns: u64) -> Self {
        self.timestamp_ns = timestamp_ns;
        self
    }
}
