//! Command-line entry point: compiles an Atlas source file and runs it to completion,
//! driving [`atlas::Evaluator::run_pass`] once per frame. This binary has no windowing or
//! input layer of its own (SPEC_FULL.md treats presentation as an external concern); it
//! exists to exercise a program headlessly and report runtime errors the way the original
//! prints them to its console.

use std::path::PathBuf;

use atlas::Evaluator;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "atlas", about = "Runs an Atlas program headlessly")]
struct Args {
    /// Path to the program's main source file.
    program: PathBuf,

    /// Maximum number of frames (passes over the program) to run before stopping.
    #[arg(long, default_value_t = 1)]
    frames: u32,
}

#[pollster::main]
pub async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry().with(fmt::layer()).with(EnvFilter::from_default_env()).init();

    let args = Args::parse();
    let source = std::fs::read_to_string(&args.program)?;
    let filename = args.program.to_string_lossy().to_string();

    let device = atlas_wgpu::WGPU::default_context().await?;
    let mut evaluator = Evaluator::new(device, &filename, &source)?;

    for frame in 0..args.frames {
        tracing::debug!(frame, "running pass");
        if !evaluator.run_pass()? {
            tracing::info!("program quit at frame {frame}");
            break;
        }
        for command in evaluator.host_commands.drain(..) {
            tracing::debug!(?command, "host command");
        }
    }

    Ok(())
}
