// This is free and unencumbered software released into the public domain.

use crate::shared::CameraProvider;
use derive_more::Display;
use std::sync::{OnceLock, RwLock};

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum CameraFacing {
    #[display("front")]
    Front,
    #[display("back")]
    Back,
}

/// Immutable description of one camera device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CameraDescriptor {
    pub id: String,
    pub facing: CameraFacing,
    /// Fixed mounting rotation of the sensor relative to the device's
    /// natural orientation, in clockwise degrees.
    pub orientation: u32,
    pub name: String,
    pub description: String,
}

fn cache() -> &'static RwLock<Option<Vec<CameraDescriptor>>> {
    static CACHE: OnceLock<RwLock<Option<Vec<CameraDescriptor>>>> = OnceLock::new();
    CACHE.get_or_init(|| RwLock::new(None))
}

/// The process-wide device list, enumerated once and cached. Invalidated
/// only by [`rescan_cameras`].
pub fn available_cameras(provider: &dyn CameraProvider) -> Vec<CameraDescriptor> {
    {
        let cached = cache().read().unwrap_or_else(|e| e.into_inner());
        if let Some(list) = cached.as_ref() {
            return list.clone();
        }
    }
    rescan_cameras(provider)
}

/// Re-enumerate devices and replace the process-wide cache.
pub fn rescan_cameras(provider: &dyn CameraProvider) -> Vec<CameraDescriptor> {
    let list = provider.enumerate();
    let mut cached = cache().write().unwrap_or_else(|e| e.into_inner());
    *cached = Some(list.clone());
    list
}
