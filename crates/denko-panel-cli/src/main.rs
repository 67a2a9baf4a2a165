//! Denko Panel Control Tool
//!
//! CLI for previewing frames and sending them to an LED matrix panel.

mod config;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use denko_panel_core::{
    address_from_link, compose, preview_strip, Bitmap, CancelToken, Color, Content, DeviceTarget,
    HttpTransport, JobSnapshot, PlaybackConfig, PresetId, Rasterizer, UploadSequencer,
    DEFAULT_THROTTLE, FRAME_HEIGHT, FRAME_WIDTH,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use config::CliConfig;

#[derive(Parser)]
#[command(name = "denkopanelctl")]
#[command(about = "Preview and send frames to a Denko LED matrix panel")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Defaults file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render frames to PNG files
    Preview {
        #[command(subcommand)]
        action: PreviewCommands,
    },
    /// Send frames to the panel
    Send {
        #[command(subcommand)]
        action: SendCommands,
    },
    /// Build or parse a share link
    Link(LinkArgs),
}

#[derive(Subcommand)]
enum PreviewCommands {
    /// One frame per character
    Text {
        text: String,
        #[command(flatten)]
        colors: ColorArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// One frame per image file
    Images {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(Subcommand)]
enum SendCommands {
    /// One frame per character
    Text {
        text: String,
        #[command(flatten)]
        colors: ColorArgs,
        #[command(flatten)]
        device: DeviceArgs,
    },
    /// One frame per image file
    Images {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[command(flatten)]
        device: DeviceArgs,
    },
}

#[derive(Args)]
struct ColorArgs {
    /// Glyph color (e.g., #f00)
    #[arg(long)]
    fg: Option<Color>,

    /// Background color (e.g., #000)
    #[arg(long)]
    bg: Option<Color>,
}

#[derive(Args)]
struct OutputArgs {
    /// Output directory
    #[arg(short, long)]
    out: PathBuf,

    /// Upscale factor for strip.png (1-32)
    #[arg(long, default_value_t = 8, value_parser = clap::value_parser!(u32).range(1..=32))]
    scale: u32,
}

#[derive(Args)]
struct DeviceArgs {
    /// Device address (host or host:port)
    #[arg(short, long, env = "DENKO_PANEL_ADDRESS")]
    address: Option<String>,

    /// Preset slot (1-4)
    #[arg(short, long)]
    preset: Option<PresetId>,

    /// Seconds between frames (0.2-10)
    #[arg(short, long)]
    interval: Option<f64>,

    /// Times the sequence plays (1-20)
    #[arg(short = 'n', long)]
    loop_count: Option<u32>,

    /// Send a single frame through the older /contents endpoint
    #[arg(long)]
    legacy: bool,
}

#[derive(Args)]
struct LinkArgs {
    /// Device address to embed
    #[arg(short, long, env = "DENKO_PANEL_ADDRESS")]
    address: Option<String>,

    /// Page the link points at
    #[arg(long, default_value = "http://localhost:8787/")]
    base: String,

    /// Print the address carried by this link instead
    #[arg(long)]
    parse: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match &cli.config {
        Some(path) => CliConfig::load(path)?,
        None => CliConfig::default(),
    };

    match cli.command {
        Commands::Preview { action } => handle_preview(action, &config).await,
        Commands::Send { action } => handle_send(action, &config).await,
        Commands::Link(args) => handle_link(&args, &config),
    }
}

fn rasterizer(config: &CliConfig) -> Result<Rasterizer> {
    match &config.font {
        Some(path) => Rasterizer::from_font_file(path)
            .with_context(|| format!("Failed to load font {}", path.display())),
        None => Ok(Rasterizer::discover()),
    }
}

fn text_content(text: String, colors: &ColorArgs, config: &CliConfig) -> Content {
    Content::Text {
        text,
        fg: colors.fg.or(config.foreground).unwrap_or(Color::RED),
        bg: colors.bg.or(config.background).unwrap_or(Color::BLACK),
    }
}

fn image_content(files: &[PathBuf]) -> Result<Content> {
    let images = files
        .iter()
        .map(|path| {
            std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Content::Images(images))
}

async fn render(content: &Content, config: &CliConfig) -> Result<Vec<Bitmap>> {
    let frames = compose(&rasterizer(config)?, content, FRAME_WIDTH, FRAME_HEIGHT).await?;
    debug!("Rendered {} frame(s)", frames.len());
    Ok(frames)
}

async fn handle_preview(action: PreviewCommands, config: &CliConfig) -> Result<()> {
    let (content, output) = match action {
        PreviewCommands::Text {
            text,
            colors,
            output,
        } => (text_content(text, &colors, config), output),
        PreviewCommands::Images { files, output } => (image_content(&files)?, output),
    };
    let frames = render(&content, config).await?;
    write_preview(&frames, &output.out, output.scale)
}

fn write_preview(frames: &[Bitmap], dir: &Path, scale: u32) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    for (i, frame) in frames.iter().enumerate() {
        let path = dir.join(format!("frame{:02}.png", i));
        std::fs::write(&path, frame.encode_png()?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("{}", path.display());
    }

    let path = dir.join("strip.png");
    std::fs::write(&path, preview_strip(frames, scale)?.encode_png()?)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("{}", path.display());
    Ok(())
}

fn device_address(address: Option<&str>, config: &CliConfig) -> Result<String> {
    match address.or(config.address.as_deref()) {
        Some(address) => Ok(address.to_string()),
        None => bail!("No device address. Pass --address or set DENKO_PANEL_ADDRESS"),
    }
}

fn resolve_target(device: &DeviceArgs, config: &CliConfig) -> Result<DeviceTarget> {
    let address = device_address(device.address.as_deref(), config)?;
    let preset = device.preset.or(config.preset).unwrap_or_default();
    Ok(DeviceTarget::new(&address, preset)?)
}

fn resolve_playback(device: &DeviceArgs, config: &CliConfig) -> Result<PlaybackConfig> {
    let defaults = PlaybackConfig::default();
    let loop_count = device
        .loop_count
        .or(config.loop_count)
        .unwrap_or(defaults.loop_count());
    let playback = match device.interval.or(config.interval) {
        Some(seconds) => PlaybackConfig::from_seconds(seconds, loop_count)?,
        None => PlaybackConfig::new(defaults.interval_ms(), loop_count)?,
    };
    Ok(playback)
}

async fn handle_send(action: SendCommands, config: &CliConfig) -> Result<()> {
    let (content, device) = match action {
        SendCommands::Text {
            text,
            colors,
            device,
        } => (text_content(text, &colors, config), device),
        SendCommands::Images { files, device } => (image_content(&files)?, device),
    };

    // Settings are checked before anything is rendered or sent.
    let target = resolve_target(&device, config)?;
    let playback = resolve_playback(&device, config)?;
    let frames = render(&content, config).await?;
    if device.legacy && frames.len() > 1 {
        bail!(
            "--legacy sends a single frame, got {}. Use one character or image",
            frames.len()
        );
    }

    let throttle = config
        .throttle_ms
        .map(Duration::from_millis)
        .unwrap_or(DEFAULT_THROTTLE);
    let sequencer = UploadSequencer::new(HttpTransport::new()).with_throttle(throttle);
    let cancel = CancelToken::new();

    let progress = tokio::spawn(report_progress(sequencer.jobs().subscribe()));
    let interrupt = tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

    info!(
        "Sending to {} preset {} ({} ms, {} loop(s))",
        target.address(),
        target.preset(),
        playback.interval_ms(),
        playback.loop_count()
    );
    let result = if device.legacy {
        let count = playback.loop_count() as usize;
        sequencer
            .send_single(&frames[0], &target, count, &cancel)
            .await
    } else {
        sequencer.send(&frames, &target, &playback, &cancel).await
    };

    interrupt.abort();
    // Closing the progress channel ends the reporter.
    drop(sequencer);
    let _ = progress.await;

    let completed = result.context("Send failed")?;
    println!(
        "Sent {} frame(s) to {} preset {}",
        completed.frames,
        target.address(),
        target.preset()
    );
    Ok(())
}

async fn report_progress(mut rx: watch::Receiver<JobSnapshot>) {
    let mut last = None;
    while rx.changed().await.is_ok() {
        let snapshot = rx.borrow_and_update().clone();
        if snapshot.is_sending() && last != Some(snapshot.acknowledged) {
            eprintln!(
                "[{:>3}%] {}/{} frames",
                snapshot.percent(),
                snapshot.acknowledged,
                snapshot.total
            );
            last = Some(snapshot.acknowledged);
        }
    }
}

async fn cancel_on_ctrl_c(cancel: CancelToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        eprintln!("Cancelling...");
        cancel.cancel();
    }
}

fn handle_link(args: &LinkArgs, config: &CliConfig) -> Result<()> {
    if let Some(link) = &args.parse {
        match address_from_link(link)? {
            Some(address) => println!("{}", address),
            None => bail!("Link carries no device address"),
        }
        return Ok(());
    }

    let address = device_address(args.address.as_deref(), config)?;
    let target = DeviceTarget::new(&address, PresetId::default())?;
    println!("{}", target.share_link(&args.base)?);
    Ok(())
}
