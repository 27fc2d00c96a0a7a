use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "pathreel", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a single frame as a PNG.
    Frame(FrameArgs),
    /// Render an MP4 video (requires `ffmpeg` on PATH).
    Render(RenderArgs),
}

#[derive(Args, Debug)]
struct ConfigArgs {
    /// Pipeline config JSON. Flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output width in pixels.
    #[arg(long)]
    width: Option<u32>,

    /// Output height in pixels.
    #[arg(long)]
    height: Option<u32>,

    /// Integer frame rate.
    #[arg(long)]
    fps: Option<u32>,

    /// Fill with the even-odd rule instead of non-zero winding.
    #[arg(long)]
    even_odd: bool,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Input frame script JSON.
    #[arg(long)]
    script: PathBuf,

    /// Frame index (0-based).
    #[arg(long)]
    frame: u64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    #[command(flatten)]
    config: ConfigArgs,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Input frame script JSON.
    #[arg(long)]
    script: PathBuf,

    /// Output MP4 path.
    #[arg(long)]
    out: PathBuf,

    #[command(flatten)]
    config: ConfigArgs,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Frame(args) => cmd_frame(args),
        Command::Render(args) => cmd_render(args),
    }
}

fn load_config(args: &ConfigArgs) -> anyhow::Result<pathreel::PipelineConfig> {
    let mut cfg = match &args.config {
        Some(path) => pathreel::PipelineConfig::from_path(path)?,
        None => pathreel::PipelineConfig::default(),
    };
    if let Some(w) = args.width {
        cfg.width = w;
    }
    if let Some(h) = args.height {
        cfg.height = h;
    }
    if let Some(fps) = args.fps {
        cfg.fps = pathreel::Fps::integer(fps)?;
    }
    if args.even_odd {
        cfg.fill_rule = pathreel::FillRule::EvenOdd;
    }
    cfg.validate()?;
    Ok(cfg)
}

fn read_script(path: &Path) -> anyhow::Result<pathreel::FrameScript> {
    let script = pathreel::FrameScript::from_path(path)?;
    script
        .validate()
        .with_context(|| format!("validate frame script '{}'", path.display()))?;
    Ok(script)
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let cfg = load_config(&args.config)?;
    let script = read_script(&args.script)?;

    let index = usize::try_from(args.frame).context("frame index out of range")?;
    let frame = script.frames.get(index).with_context(|| {
        format!(
            "frame {} out of range (script has {} frames)",
            args.frame,
            script.len()
        )
    })?;

    let mut data = pathreel::render_frame_rgba(&cfg, frame)?;
    unpremultiply_in_place(&mut data);

    pathreel::encode::ffmpeg::ensure_parent_dir(&args.out)?;
    image::save_buffer_with_format(
        &args.out,
        &data,
        cfg.width,
        cfg.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let mut cfg = load_config(&args.config)?;
    cfg.out_path = args.out.clone();
    let script = read_script(&args.script)?;

    let pipeline = pathreel::Pipeline::to_mp4(cfg)?;
    let handle = pipeline.run_blocking(script)?;

    eprintln!(
        "wrote {} ({} frames, {:.3}s)",
        args.out.display(),
        handle.frames,
        handle.duration.as_secs_f64()
    );
    Ok(())
}

fn unpremultiply_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 0 || a == 255 {
            continue;
        }
        for c in &mut px[..3] {
            *c = ((*c as u16 * 255 + a / 2) / a).min(255) as u8;
        }
    }
}
