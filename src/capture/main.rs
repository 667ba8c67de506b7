// This is free and unencumbered software released into the public domain.

#[cfg(not(feature = "std"))]
compile_error!("asimov-camera-capture requires the 'std' feature");

use asimov_camera_session::{
    cli,
    shared::{
        CameraError, CameraState, CameraStatus, ErrorCode, PreviewTarget, Resolution,
        SessionEvent, VideoOutput, ViewfinderSettings, open_session,
    },
};
use asimov_module::SysexitsError::{self, *};
use clap::Parser;
use clientele::StandardOptions;
use std::{
    error::Error as StdError,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

#[derive(Debug, Parser)]
struct Options {
    #[clap(flatten)]
    flags: StandardOptions,

    /// Camera device id (defaults to the first enumerated device).
    #[arg(long)]
    device: Option<String>,

    /// Requested viewfinder size.
    #[arg(short, long = "size", value_parser = parse_dimensions)]
    size: Option<(u32, u32)>,

    /// Output file; empty for a timestamped name under the picture directory.
    #[arg(short, long, default_value = "")]
    output: String,

    /// Seconds to wait for the device and the capture to complete.
    #[arg(long, default_value = "10")]
    timeout: u64,
}

/// Headless output: always ready, renders nowhere. Concrete rendering
/// outputs live with the host application; a still-capture probe does not
/// need one.
struct HeadlessOutput;

impl VideoOutput for HeadlessOutput {
    fn is_ready(&self) -> bool {
        true
    }

    fn preview_target(&self) -> Option<PreviewTarget> {
        Some(PreviewTarget::Texture(0))
    }

    fn set_video_size(&mut self, _size: Resolution) {}

    fn stop(&mut self) {}

    fn reset(&mut self) {}
}

pub fn main() -> Result<SysexitsError, Box<dyn StdError>> {
    asimov_module::dotenv().ok();
    let args = asimov_module::args_os()?;
    let options = Options::parse_from(args);

    if options.flags.version {
        println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        return Ok(EX_OK);
    }

    if options.flags.license {
        print!("{}", include_str!("../../UNLICENSE"));
        return Ok(EX_OK);
    }

    #[cfg(feature = "tracing")]
    asimov_module::init_tracing_subscriber(&options.flags).expect("failed to initialize logging");

    let exit_code = match run_capture(&options) {
        Ok(()) => EX_OK,
        Err(err) => cli::handle_error(&err, &options.flags),
    };

    Ok(exit_code)
}

fn run_capture(options: &Options) -> Result<(), CameraError> {
    let quit = Arc::new(AtomicBool::new(false));
    {
        let quit = Arc::clone(&quit);
        ctrlc::set_handler(move || {
            quit.store(true, Ordering::SeqCst);
        })
        .map_err(|e| CameraError::other(e.to_string()))?;
    }

    let session = open_session()?;
    if let Some(device) = &options.device {
        session.select_camera(device)?;
    }
    if let Some((width, height)) = options.size {
        session.set_viewfinder_settings(
            ViewfinderSettings::default().with_resolution(Resolution::new(width, height)),
        );
    }
    session.set_video_output(Some(Box::new(HeadlessOutput)));

    cli::info_user(&options.flags, "starting camera");
    session.set_state(CameraState::Active);

    let deadline = Instant::now() + Duration::from_secs(options.timeout.max(1));
    wait_until(&session, &quit, deadline, |s| {
        s.status() == CameraStatus::Active && s.ready_for_capture()
    })?;

    let id = session.capture(&options.output);
    cli::info_user(&options.flags, &format!("capture {id} requested"));

    let mut saved = None;
    while saved.is_none() && !quit.load(Ordering::SeqCst) {
        let remaining = deadline
            .checked_duration_since(Instant::now())
            .ok_or_else(|| CameraError::other("timed out waiting for the capture"))?;
        match session.events().recv_timeout(remaining.min(Duration::from_millis(100))) {
            Ok(SessionEvent::ImageSaved { id: saved_id, path }) if saved_id == id => {
                println!("{}", path.display());
                saved = Some(path);
            },
            Ok(SessionEvent::Error {
                id: Some(err_id),
                code,
                message,
            }) if err_id == id => {
                return Err(match code {
                    ErrorCode::NotReady => CameraError::other(message),
                    ErrorCode::NotSupported => CameraError::unsupported(message),
                    _ => CameraError::other(message),
                });
            },
            Ok(_) => {},
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {},
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                return Err(CameraError::Closed);
            },
        }
    }

    session.set_state(CameraState::Unloaded);
    Ok(())
}

fn wait_until(
    session: &asimov_camera_session::shared::CameraSession,
    quit: &AtomicBool,
    deadline: Instant,
    ready: impl Fn(&asimov_camera_session::shared::CameraSession) -> bool,
) -> Result<(), CameraError> {
    while !ready(session) {
        if quit.load(Ordering::SeqCst) {
            return Err(CameraError::other("interrupted"));
        }
        if Instant::now() >= deadline {
            return Err(CameraError::other("timed out waiting for the camera"));
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    Ok(())
}

fn parse_dimensions(s: &str) -> Result<(u32, u32), String> {
    let s = s.trim().replace('\u{d7}', "x");
    let parts: Vec<&str> = s.split('x').map(|t| t.trim()).collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(format!("Invalid format '{s}'. Use WxH (e.g., 1920x1080)"));
    }

    let width: u32 = parts[0]
        .parse()
        .map_err(|_| format!("Invalid width: {}", parts[0]))?;
    let height: u32 = parts[1]
        .parse()
        .map_err(|_| format!("Invalid height: {}", parts[1]))?;

    if !(160..=7680).contains(&width) {
        return Err(format!("Width {width} is out of reasonable range (160-7680)"));
    }
    if !(120..=4320).contains(&height) {
        return Err(format!("Height {height} is out of reasonable range (120-4320)"));
    }

    Ok((width, height))
}
