use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

mod config;
mod session;

use lc_codec::ffmpeg;

#[derive(Parser, Debug)]
#[command(name = "lumicast")]
#[command(about = "Stream a capture device to an RTSP endpoint as H.264", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "lumicast.toml")]
    config: PathBuf,

    /// Capture device index (overrides config)
    #[arg(short, long)]
    device: Option<u32>,

    /// Destination RTSP URL (overrides config)
    #[arg(short, long)]
    url: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    info!("lumicast v{}", env!("CARGO_PKG_VERSION"));

    let mut config = config::load(&args.config)?;
    if let Some(device) = args.device {
        config.capture.device = device;
    }
    if let Some(url) = args.url {
        config.output.url = url;
    }
    config.validate()?;

    info!("  device: {}", config.capture.device);
    info!(
        "  video: {} bps, gop {}, {} b-frames",
        config.video.bitrate, config.video.gop_size, config.video.max_b_frames
    );
    info!("  output: {}", config.output.url);

    ffmpeg::init().context("failed to initialize ffmpeg")?;
    ffmpeg::format::network::init();

    // First Ctrl+C requests a cooperative stop; the loop notices at the
    // next iteration and runs the flush/trailer sequence.
    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("received ctrl-c, finishing stream...");
                stop.store(true, Ordering::Relaxed);
            }
        });
    }

    let session_config = config.clone();
    let outcome =
        tokio::task::spawn_blocking(move || session::run(&session_config, stop)).await?;

    match outcome {
        Ok(stats) => {
            info!("session complete:");
            info!("  frames captured: {}", stats.frames_captured);
            info!(
                "  packets streamed: {} ({} recovered in flush)",
                stats.packets_total(),
                stats.packets_flushed
            );
            info!("  data sent: {} KiB", stats.bytes_streamed / 1024);
            info!(
                "  uptime: {}s ({:.1} fps, {:.0} kbps avg)",
                stats.uptime_secs(),
                stats.average_fps(),
                stats.average_bitrate_kbps()
            );
            Ok(())
        }
        Err(e) => {
            error!("{} stage failed: {}", e.stage(), e);
            std::process::exit(e.exit_code());
        }
    }
}
