use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;

use crate::encode::ffmpeg::FfmpegSinkOpts;
use crate::encode::sink::SinkConfig;
use crate::foundation::core::{Canvas, Fps, PixelFormat};
use crate::foundation::error::{PipelineError, PipelineResult};
use crate::render::raster::{CpuRasterizerOpts, FillRule};
use crate::render::surface_pool::{SurfaceDesc, SurfacePoolOpts};

/// Options for one pipeline session.
///
/// Every field has a default, so JSON configs only need the values they change.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Fixed frame rate for the whole session.
    pub fps: Fps,
    /// Bitmap layout of render targets.
    pub pixel_format: PixelFormat,
    /// Container destination, used by file-writing sinks.
    pub out_path: PathBuf,
    /// Color every frame is cleared to (RGBA8, straight alpha).
    pub background_rgba: [u8; 4],
    /// Color path groups are filled with (RGBA8, straight alpha).
    pub fill_rgba: [u8; 4],
    /// Fill rule for every path group.
    pub fill_rule: FillRule,
    /// Render targets that may be in flight at once. Must be at least `sink_capacity`.
    pub pool_capacity: usize,
    /// How long to wait for a recycled target before failing with `PoolExhausted`.
    pub acquire_timeout_ms: u64,
    /// Frames the sink queues before reporting it is not ready.
    pub sink_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 360,
            fps: Fps::default(),
            pixel_format: PixelFormat::default(),
            out_path: PathBuf::from("out.mp4"),
            background_rgba: [255, 255, 255, 255],
            fill_rgba: [0, 0, 0, 255],
            fill_rule: FillRule::default(),
            pool_capacity: 4,
            acquire_timeout_ms: 2000,
            sink_capacity: 2,
        }
    }
}

impl PipelineConfig {
    /// Defaults at the given size.
    pub fn with_size(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    /// Parse a config from JSON.
    pub fn from_json_str(s: &str) -> PipelineResult<Self> {
        serde_json::from_str(s).map_err(|e| PipelineError::serde(e.to_string()))
    }

    /// Load a config from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read pipeline config '{}'", path.display()))?;
        Self::from_json_str(&s)
    }

    /// Check values a session cannot run with.
    pub fn validate(&self) -> PipelineResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(PipelineError::validation("width/height must be non-zero"));
        }
        self.canvas().to_u16()?;
        Fps::new(self.fps.num, self.fps.den)?;
        if self.sink_capacity == 0 {
            return Err(PipelineError::validation("sink_capacity must be > 0"));
        }
        // Every frame the sink can queue holds a pooled target.
        if self.pool_capacity < self.sink_capacity {
            return Err(PipelineError::validation(format!(
                "pool_capacity ({}) must be >= sink_capacity ({})",
                self.pool_capacity, self.sink_capacity
            )));
        }
        Ok(())
    }

    /// Output canvas.
    pub fn canvas(&self) -> Canvas {
        Canvas {
            width: self.width,
            height: self.height,
        }
    }

    /// Description of every render target in a session.
    pub fn surface_desc(&self) -> SurfaceDesc {
        SurfaceDesc::for_canvas(self.canvas(), self.pixel_format)
    }

    /// Pool options.
    pub fn pool_opts(&self) -> SurfacePoolOpts {
        SurfacePoolOpts {
            capacity: self.pool_capacity,
            acquire_timeout: Duration::from_millis(self.acquire_timeout_ms),
        }
    }

    /// Rasterizer options.
    pub fn rasterizer_opts(&self) -> CpuRasterizerOpts {
        CpuRasterizerOpts {
            fill_rule: self.fill_rule,
        }
    }

    /// Configuration handed to the sink in `begin`.
    pub fn sink_config(&self) -> SinkConfig {
        SinkConfig {
            width: self.width,
            height: self.height,
            fps: self.fps,
            format: self.pixel_format,
        }
    }

    /// `ffmpeg` sink options writing to [`PipelineConfig::out_path`].
    pub fn ffmpeg_opts(&self) -> FfmpegSinkOpts {
        FfmpegSinkOpts {
            bg_rgba: self.background_rgba,
            capacity: self.sink_capacity,
            ..FfmpegSinkOpts::new(self.out_path.clone())
        }
    }
}
