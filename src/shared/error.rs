// This is free and unencumbered software released into the public domain.

use derive_more::Display;
use std::error::Error as StdError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CameraError {
    #[error("no camera backend available")]
    NoBackend,

    #[error("no camera device available")]
    NoCamera,

    #[error("camera is not open")]
    NotOpen,

    #[error("camera worker is gone")]
    Closed,

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("hardware error while {context}")]
    HardwareError {
        context: &'static str,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    #[error("{0}")]
    Other(String),
}

impl CameraError {
    #[inline]
    pub fn hardware(context: &'static str, source: impl StdError + Send + Sync + 'static) -> Self {
        Self::HardwareError {
            context,
            source: Box::new(source),
        }
    }

    #[inline]
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    #[inline]
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    #[inline]
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

/// Failure categories carried by asynchronous session error notifications.
///
/// Nothing crosses the worker boundary as a panic or an exception: operations
/// report success through return values and failure detail out-of-band with
/// one of these codes.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum ErrorCode {
    /// The device could not be opened; retryable later.
    #[display("unavailable")]
    Unavailable,
    /// Preview could not be started; the session rolled back to loaded.
    #[display("preview-failed")]
    PreviewFailed,
    /// A capture was requested while the device cannot accept one.
    #[display("not-ready")]
    NotReady,
    /// The requested drive mode has no hardware support.
    #[display("not-supported")]
    NotSupported,
    /// The hardware rejected or aborted a still capture.
    #[display("capture-failed")]
    CaptureFailed,
    /// The captured image could not be persisted.
    #[display("write-failed")]
    WriteFailed,
}
