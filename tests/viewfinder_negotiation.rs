// This is free and unencumbered software released into the public domain.

//! Viewfinder negotiation observed at the native handle: what the session
//! actually pushes for sizes, formats, and fps ranges.

mod fake_camera;

use asimov_camera_session::shared::{
    CameraState, CameraStatus, CaptureMode, FpsRange, ImageSettings, PixelFormat, Resolution,
    ViewfinderSettings,
};
use fake_camera::*;
use std::sync::Arc;
use std::time::Duration;

fn activate(session: &asimov_camera_session::shared::CameraSession) {
    let (output, _handles) = test_output(true);
    session.set_video_output(Some(output));
    session.set_state(CameraState::Active);
    assert!(wait_for_status(session, CameraStatus::Active));
}

fn last_preview_size(provider: &Arc<FakeProvider>) -> Option<Resolution> {
    provider.calls.last_applied(|batch| batch.preview_size)
}

#[test]
fn preview_size_matches_capture_aspect_within_tolerance() {
    let provider = FakeProvider::new();
    let session = make_session(&provider);
    session.set_image_settings(ImageSettings::default().with_resolution(Resolution::new(1920, 1080)));
    activate(&session);

    let chosen = last_preview_size(&provider).expect("no preview size pushed");
    let capture_aspect = Resolution::new(1920, 1080).aspect_ratio();
    assert!((chosen.aspect_ratio() - capture_aspect).abs() < 0.01);
    // largest matching size in the supported set
    assert_eq!(chosen, Resolution::new(1280, 720));
}

#[test]
fn requested_supported_resolution_wins_when_aspect_matches() {
    let provider = FakeProvider::new();
    let session = make_session(&provider);
    session.set_image_settings(ImageSettings::default().with_resolution(Resolution::new(1920, 1080)));
    session.set_viewfinder_settings(
        ViewfinderSettings::default().with_resolution(Resolution::new(640, 360)),
    );
    activate(&session);

    assert_eq!(last_preview_size(&provider), Some(Resolution::new(640, 360)));
}

#[test]
fn video_mode_without_separate_preview_pins_to_capture_size() {
    let provider = FakeProvider::new();
    let mut caps = default_caps();
    caps.separate_video_preview = false;
    provider.set_caps(caps);

    let session = make_session(&provider);
    session.set_capture_mode(CaptureMode::Video);
    session.set_image_settings(ImageSettings::default().with_resolution(Resolution::new(1280, 720)));
    activate(&session);

    assert_eq!(last_preview_size(&provider), Some(Resolution::new(1280, 720)));
}

#[test]
fn canonical_format_unless_supported_format_requested() {
    let provider = FakeProvider::new();
    let session = make_session(&provider);
    activate(&session);
    assert_eq!(
        provider.calls.last_applied(|batch| batch.preview_format),
        Some(PixelFormat::Nv21)
    );

    let provider = FakeProvider::new();
    let session = make_session(&provider);
    session
        .set_viewfinder_settings(ViewfinderSettings::default().with_pixel_format(PixelFormat::Yv12));
    activate(&session);
    assert_eq!(
        provider.calls.last_applied(|batch| batch.preview_format),
        Some(PixelFormat::Yv12)
    );

    // an unsupported request falls back to the canonical format
    let provider = FakeProvider::new();
    let session = make_session(&provider);
    session.set_viewfinder_settings(
        ViewfinderSettings::default().with_pixel_format(PixelFormat::Rgb565),
    );
    activate(&session);
    assert_eq!(
        provider.calls.last_applied(|batch| batch.preview_format),
        Some(PixelFormat::Nv21)
    );
}

#[test]
fn requested_fps_bounds_select_a_supported_range() {
    let provider = FakeProvider::new();
    let session = make_session(&provider);
    session.set_viewfinder_settings(ViewfinderSettings::default().with_fps(10, 30));
    activate(&session);

    assert_eq!(
        provider.calls.last_applied(|batch| batch.preview_fps),
        Some(FpsRange::new(10, 30))
    );
}

#[test]
fn unrequested_fps_leaves_hardware_default() {
    let provider = FakeProvider::new();
    let session = make_session(&provider);
    activate(&session);

    assert_eq!(provider.calls.last_applied(|batch| batch.preview_fps), None);
}

#[test]
fn picture_size_clamps_to_supported_set() {
    let provider = FakeProvider::new();
    let session = make_session(&provider);
    session.set_image_settings(ImageSettings::default().with_resolution(Resolution::new(1900, 1060)));
    activate(&session);

    assert_eq!(
        provider.calls.last_applied(|batch| batch.picture_size),
        Some(Resolution::new(1920, 1080))
    );
}

#[test]
fn identical_configuration_is_not_pushed_twice() {
    let provider = FakeProvider::new();
    let session = make_session(&provider);
    session.set_image_settings(ImageSettings::default().with_resolution(Resolution::new(1920, 1080)));
    activate(&session);

    let pushes_before = provider
        .calls
        .applied_batches()
        .iter()
        .filter(|batch| batch.preview_size.is_some())
        .count();

    // re-applying the same settings must not touch the handle again
    session.set_viewfinder_settings(ViewfinderSettings::default());
    std::thread::sleep(Duration::from_millis(100));
    let pushes_after = provider
        .calls
        .applied_batches()
        .iter()
        .filter(|batch| batch.preview_size.is_some())
        .count();
    assert_eq!(pushes_before, pushes_after);
}

#[test]
fn viewfinder_change_while_active_restarts_preview() {
    let provider = FakeProvider::new();
    let session = make_session(&provider);
    session.set_image_settings(ImageSettings::default().with_resolution(Resolution::new(1920, 1080)));
    activate(&session);

    let starts_before = provider
        .calls
        .start_preview
        .load(std::sync::atomic::Ordering::SeqCst);
    session.set_viewfinder_settings(
        ViewfinderSettings::default().with_resolution(Resolution::new(640, 360)),
    );

    assert!(wait_until(Duration::from_secs(1), || {
        provider
            .calls
            .start_preview
            .load(std::sync::atomic::Ordering::SeqCst)
            > starts_before
    }));
    assert_eq!(last_preview_size(&provider), Some(Resolution::new(640, 360)));
    assert!(wait_for_status(&session, CameraStatus::Active));
}
