// This is free and unencumbered software released into the public domain.

/// Source of the device's physical orientation in clockwise degrees.
///
/// The session starts listening when preview starts and stops listening
/// when preview stops. Implementations may report arbitrary angles; the
/// session rounds to the nearest quarter turn before combining with the
/// sensor's mounting orientation.
pub trait OrientationSource: Send {
    fn start(&mut self) {}

    fn stop(&mut self) {}

    fn device_orientation(&self) -> u32;
}

/// Fixed orientation for hosts without motion sensors.
#[derive(Clone, Copy, Debug, Default)]
pub struct FixedOrientation(pub u32);

impl OrientationSource for FixedOrientation {
    fn device_orientation(&self) -> u32 {
        self.0
    }
}
