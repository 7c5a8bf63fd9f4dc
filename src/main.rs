use anyhow::{anyhow, bail, Result};
use clap::Parser;
use quickcam::{
    CameraEvent, CameraListener, DeviceRotation, FailureReason, Facing, MockCameraBackend, QuickCamera,
    QuickcamConfig, Rect, Size,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "quickcam")]
#[command(about = "Camera preview, tap-to-focus and still capture driven by a serial lifecycle worker")]
#[command(version)]
#[command(long_about = "Runs a scripted camera session against the built-in mock camera service: \
open, measure the viewport, focus on a tap, capture a still, swap cameras and pause. \
Useful for checking configuration and observing the lifecycle in the logs.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "quickcam.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Number of camera swaps to perform after the capture
    #[arg(long, default_value_t = 2)]
    swaps: u32,

    /// Viewport width in pixels
    #[arg(long, default_value_t = 720)]
    viewport_width: u32,

    /// Viewport height in pixels
    #[arg(long, default_value_t = 1280)]
    viewport_height: u32,

    /// Display rotation reported before the camera opens, in degrees
    #[arg(long, default_value_t = 0)]
    device_rotation: u32,

    /// Write the captured JPEG to this path
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,
}

/// Logs listener callbacks
struct LoggingListener;

impl CameraListener for LoggingListener {
    fn on_image_capture(&self, image_bytes: &[u8]) {
        info!("Listener received image ({} bytes)", image_bytes.len());
    }

    fn on_camera_fail(&self, reason: &FailureReason) {
        warn!("Listener notified of camera failure: {}", reason);
    }

    fn on_camera_ready(&self, facing: Facing, preview: Size) {
        info!("Listener notified {} camera ready at {}", facing, preview);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    init_logging(&args)?;

    info!("Starting quickcam v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = match QuickcamConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if args.validate_config {
        match config.validate() {
            Ok(()) => {
                info!("Configuration validation successful");
                println!("✓ Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                error!("Configuration validation failed: {}", e);
                eprintln!("✗ Configuration validation failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    run_session(config, &args).await
}

async fn run_session(config: QuickcamConfig, args: &Args) -> Result<()> {
    let backend = Arc::new(MockCameraBackend::dual());
    let camera = QuickCamera::builder()
        .config(config)
        .backend(backend.clone())
        .build()?;
    camera.set_listener(Arc::new(LoggingListener));
    let mut events = camera.subscribe();

    let rotation = DeviceRotation::from_degrees(args.device_rotation)
        .ok_or_else(|| anyhow!("Unsupported device rotation {}", args.device_rotation))?;
    camera.on_device_rotation(rotation);

    let viewport = Rect::from_size(args.viewport_width as i32, args.viewport_height as i32);
    camera.on_viewport_measured(args.viewport_width, args.viewport_height);
    camera.on_resume();
    wait_until_ready(&mut events).await?;

    camera.on_tap(
        args.viewport_width as f32 / 2.0,
        args.viewport_height as f32 / 2.0,
    );

    if !camera.take_picture(viewport) {
        bail!("Capture request was rejected");
    }
    let image = wait_for_event(&mut events, |event| match event {
        CameraEvent::ImageCaptured { image } => Some(image.clone()),
        _ => None,
    })
    .await?;
    info!(
        "Captured {}x{} image rotated {} at {}",
        image.width, image.height, image.rotation, image.captured_at
    );

    if let Some(path) = &args.output {
        tokio::fs::write(path, image.bytes.as_slice()).await?;
        info!("Wrote capture to {}", path.display());
    }

    for swap in 0..args.swaps {
        camera.swap_camera();
        wait_until_ready(&mut events).await?;
        info!(
            "Swap {} complete, now using the {} camera",
            swap + 1,
            if camera.is_rear_camera() { "rear" } else { "front" }
        );
    }

    camera.on_pause();
    camera.settled().await;

    println!(
        "Session complete: {} opens, {} releases, at most {} camera(s) open at once",
        backend.total_opens(),
        backend.total_releases(),
        backend.max_concurrent_open()
    );
    Ok(())
}

async fn wait_until_ready(events: &mut broadcast::Receiver<CameraEvent>) -> Result<()> {
    wait_for_event(events, |event| match event {
        CameraEvent::Ready { .. } => Some(()),
        _ => None,
    })
    .await
}

/// Wait for the first event `select` accepts, failing on a camera failure
async fn wait_for_event<T, F>(events: &mut broadcast::Receiver<CameraEvent>, select: F) -> Result<T>
where
    F: Fn(&CameraEvent) -> Option<T>,
{
    tokio::time::timeout(Duration::from_secs(10), next_matching(events, select))
        .await
        .map_err(|_| anyhow!("Timed out waiting for camera event"))?
}

async fn next_matching<T, F>(events: &mut broadcast::Receiver<CameraEvent>, select: F) -> Result<T>
where
    F: Fn(&CameraEvent) -> Option<T>,
{
    loop {
        let event = events.recv().await?;
        if let CameraEvent::CameraFailed { facing, reason } = &event {
            bail!("{} camera failed: {}", facing, reason);
        }
        if let Some(value) = select(&event) {
            return Ok(value);
        }
    }
}

fn init_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    // Determine log level based on flags
    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("quickcam={}", log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_target(true)
                .with_thread_ids(args.debug)
                .boxed()
        }
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .init();

    Ok(())
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# quickcam configuration file");
    println!("# Every key is optional; values shown are the defaults.");
    println!("# Environment overrides use the QUICKCAM_ prefix, e.g. QUICKCAM_CAPTURE__JPEG_QUALITY=90");
    println!();
    println!("{}", toml::to_string_pretty(&QuickcamConfig::default())?);
    Ok(())
}
