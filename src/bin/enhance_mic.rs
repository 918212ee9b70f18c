use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use enhance_stream::audio::{list_audio_devices, open_capture_device, DeviceSelector};
use enhance_stream::engine::DynamicBackend;
use enhance_stream::error::log_stream_error;
use enhance_stream::pipeline::{install_interrupt_handler, ConsoleObserver};
use enhance_stream::session::{show_audio_devices, show_inference_devices};
use enhance_stream::{AppConfig, CancellationToken, CaptureSession, EngineInitParams, StreamError};

#[derive(Parser, Debug)]
#[command(
    name = "enhance_mic",
    version,
    about = "Enhance live microphone audio with a dynamically loaded engine"
)]
struct Cli {
    /// Absolute path to the engine shared library
    #[arg(
        short = 'l',
        long = "library_path",
        required_unless_present = "show_audio_devices"
    )]
    library_path: Option<PathBuf>,
    /// Access key for the engine
    #[arg(
        short = 'a',
        long = "access_key",
        required_unless_present_any = ["show_audio_devices", "show_inference_devices"]
    )]
    access_key: Option<String>,
    /// Path to the enhanced output WAV file
    #[arg(
        short = 'o',
        long = "output_audio_path",
        required_unless_present_any = ["show_audio_devices", "show_inference_devices"]
    )]
    output_audio_path: Option<PathBuf>,
    /// Path to the model file
    #[arg(
        short = 'm',
        long = "model_path",
        required_unless_present_any = ["show_audio_devices", "show_inference_devices"]
    )]
    model_path: Option<PathBuf>,
    /// Inference device, e.g. `best`, `cpu` or `gpu:0`
    #[arg(short = 'y', long = "device", default_value = "best")]
    device: String,
    /// Capture device index; negative selects the default device
    #[arg(
        short = 'd',
        long = "audio_device_index",
        default_value_t = -1,
        allow_negative_numbers = true
    )]
    audio_device_index: i32,
    /// Also save the raw microphone audio to this WAV file
    #[arg(short = 'r', long = "reference_audio_path")]
    reference_audio_path: Option<PathBuf>,
    /// List capture devices and exit
    #[arg(short = 's', long = "show_audio_devices")]
    show_audio_devices: bool,
    /// List inference devices and exit
    #[arg(short = 'z', long = "show_inference_devices")]
    show_inference_devices: bool,
    /// JSON tuning file for the meter and capture buffering
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            };
        }
    };
    enhance_stream::init_logging();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => match err.downcast_ref::<StreamError>() {
            Some(stream_err) => {
                log_stream_error(stream_err, "enhance_mic");
                eprintln!("\n{stream_err}");
                ExitCode::from(stream_err.exit_code())
            }
            None => {
                eprintln!("Error: {err:?}");
                ExitCode::from(1)
            }
        },
    }
}

fn required<T>(value: Option<T>, flag: &str) -> Result<T, StreamError> {
    value.ok_or_else(|| StreamError::argument(format!("`{}` is required", flag)))
}

fn run(cli: Cli) -> Result<()> {
    let config = AppConfig::load(cli.config.as_deref());
    let stdout = std::io::stdout();

    if cli.show_audio_devices {
        let devices = list_audio_devices()?;
        show_audio_devices(&devices, &mut stdout.lock())?;
        return Ok(());
    }

    let library_path = required(cli.library_path, "library_path")?;
    if cli.show_inference_devices {
        let backend = DynamicBackend::load(&library_path)?;
        show_inference_devices(&backend, &mut stdout.lock())?;
        return Ok(());
    }

    let session = CaptureSession {
        engine: EngineInitParams::new(required(cli.access_key, "access_key")?)
            .with_model_path(Some(required(cli.model_path, "model_path")?))
            .with_device(Some(cli.device)),
        audio_device: DeviceSelector::from_index(cli.audio_device_index),
        output_path: required(cli.output_audio_path, "output_audio_path")?,
        reference_path: cli.reference_audio_path,
    };
    session.validate()?;

    let backend = DynamicBackend::load(&library_path)?;
    let cancel = CancellationToken::new();
    install_interrupt_handler(cancel.clone())?;

    let observer = ConsoleObserver::stdout(config.progress.bar_width, config.meter.bar_width);
    let report = session.run(
        &backend,
        &config,
        |frame_length, sample_rate, selector| {
            open_capture_device(frame_length, sample_rate, selector, &config.capture)
        },
        Box::new(observer),
        &cancel,
    )?;

    let mut out = stdout.lock();
    writeln!(
        out,
        "{:.2} seconds of audio written to '{}'.",
        report.seconds_written(),
        session.output_path.display()
    )?;
    if let Some(reference) = &session.reference_path {
        writeln!(out, "Reference audio written to '{}'.", reference.display())?;
    }
    Ok(())
}
