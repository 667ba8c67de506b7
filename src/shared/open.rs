// This is free and unencumbered software released into the public domain.

use super::{CameraError, CameraProvider, CameraSession};
use std::sync::Arc;

/// The default camera provider for this build.
pub fn default_provider() -> Result<Arc<dyn CameraProvider>, CameraError> {
    if cfg!(feature = "sim") {
        #[cfg(feature = "sim")]
        return Ok(Arc::new(super::handles::sim::SimCameraProvider::default()));
    }
    Err(CameraError::NoBackend)
}

/// Open a session against the default provider.
pub fn open_session() -> Result<CameraSession, CameraError> {
    Ok(CameraSession::new(default_provider()?))
}
