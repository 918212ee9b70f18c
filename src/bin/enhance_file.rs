use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use enhance_stream::engine::DynamicBackend;
use enhance_stream::error::log_stream_error;
use enhance_stream::pipeline::ConsoleObserver;
use enhance_stream::{AppConfig, EngineInitParams, FileSession, StreamError};

#[derive(Parser, Debug)]
#[command(
    name = "enhance_file",
    version,
    about = "Enhance a 16-bit mono WAV file with a dynamically loaded engine"
)]
struct Cli {
    /// Absolute path to the engine shared library
    #[arg(short = 'l', long = "library_path")]
    library_path: PathBuf,
    /// Access key for the engine
    #[arg(short = 'a', long = "access_key")]
    access_key: String,
    /// Path to the input WAV file
    #[arg(short = 'i', long = "input_path")]
    input_path: PathBuf,
    /// Path to the output WAV file
    #[arg(short = 'o', long = "output_path")]
    output_path: PathBuf,
    /// Path to the model file (engine default when omitted)
    #[arg(short = 'm', long = "model_path")]
    model_path: Option<PathBuf>,
    /// Inference device, e.g. `best`, `cpu` or `gpu:0`
    #[arg(short = 'y', long = "device")]
    device: Option<String>,
    /// JSON tuning file for console output
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
                log_stream_error(stream_err, "enhance_file");
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

fn run(cli: Cli) -> Result<()> {
    let config = AppConfig::load(cli.config.as_deref());
    let session = FileSession {
        engine: EngineInitParams::new(cli.access_key)
            .with_model_path(cli.model_path)
            .with_device(cli.device),
        input_path: cli.input_path,
        output_path: cli.output_path,
    };
    session.validate()?;

    let backend = DynamicBackend::load(&cli.library_path)?;
    let observer = ConsoleObserver::stdout(config.progress.bar_width, config.meter.bar_width);
    session.run(&backend, Box::new(observer))?;
    println!();
    Ok(())
}
