// This is free and unencumbered software released into the public domain.

#[cfg(not(feature = "std"))]
compile_error!("asimov-camera-cataloger requires the 'std' feature");

use asimov_camera_session::{
    cli,
    shared::{CameraError, available_cameras, default_provider, rescan_cameras},
};
use asimov_module::SysexitsError::{self, *};
use clap::Parser;
use clientele::StandardOptions;
use serde_json::json;
use std::error::Error as StdError;

#[derive(Debug, Parser)]
struct Options {
    #[clap(flatten)]
    flags: StandardOptions,

    #[arg(
        value_name = "FORMAT",
        short = 'o',
        long = "output",
        value_enum,
        default_value = "text"
    )]
    output: OutputFormat,

    /// Drop the process-wide device cache and enumerate afresh.
    #[arg(long)]
    rescan: bool,
}

#[derive(Debug, Clone, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Jsonl,
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

    let exit_code = match run_cataloger(&options) {
        Ok(()) => EX_OK,
        Err(err) => cli::handle_error(&err, &options.flags),
    };

    Ok(exit_code)
}

fn run_cataloger(options: &Options) -> Result<(), CameraError> {
    cli::info_user(&options.flags, "enumerating camera devices");

    let provider = default_provider()?;
    let mut devices = if options.rescan {
        rescan_cameras(provider.as_ref())
    } else {
        available_cameras(provider.as_ref())
    };

    if devices.is_empty() {
        cli::warn_user(&options.flags, "no camera devices found");
        return Ok(());
    }

    devices.sort_by(|a, b| a.id.cmp(&b.id).then_with(|| a.name.cmp(&b.name)));

    for device in devices {
        match options.output {
            OutputFormat::Text => {
                println!(
                    "{}: {} [{}, {}\u{b0}]",
                    device.id, device.name, device.facing, device.orientation
                );
            },
            OutputFormat::Jsonl => {
                println!(
                    "{}",
                    json!({
                        "id": device.id,
                        "name": device.name,
                        "facing": device.facing.to_string(),
                        "orientation": device.orientation,
                        "description": device.description,
                    })
                );
            },
        }
    }

    Ok(())
}
