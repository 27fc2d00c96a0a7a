//! Pathreel renders progressively drawn vector paths into a video, one frame at a time.
//!
//! A session is driven by a [`Pipeline`]:
//!
//! - Describe the frames as a [`FrameScript`] of [`PathGroup`]s
//! - Build a pipeline over a [`BufferPool`], a [`Rasterizer`] and an [`EncoderSink`]
//! - [`Pipeline::start`] it; frames are produced only while the sink is ready for more input and
//!   the single completion callback reports the finalized container or the first error
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

/// Encoding sinks and the readiness protocol.
pub mod encode;
/// Session driver.
pub mod pipeline;
/// Render targets and rasterization.
pub mod render;
/// Frame descriptions.
pub mod script;

pub use crate::foundation::core::{
    BezPath, Canvas, Fps, FrameIndex, PixelFormat, Point, PresentationTime, Rgba8Premul,
};
pub use crate::foundation::error::{ErrorKind, PipelineError, PipelineResult};

pub use crate::encode::ffmpeg::{FfmpegSink, FfmpegSinkOpts, is_ffmpeg_on_path};
pub use crate::encode::memory::{InMemoryRecording, InMemorySink, RecordedFrame, SinkEvent};
pub use crate::encode::sink::{
    ContainerHandle, EncoderSink, FinalizeCallback, MediaDataProducer, Production, SinkConfig,
    SinkInput, request_media_data_when_ready,
};
pub use crate::pipeline::config::PipelineConfig;
pub use crate::pipeline::driver::{CompletionCallback, Pipeline, render_frame_rgba};
pub use crate::pipeline::state::PipelineState;
pub use crate::render::raster::{CpuRasterizer, CpuRasterizerOpts, FillRule, Rasterizer};
pub use crate::render::surface_pool::{
    BufferPool, PoolStats, RenderTarget, SurfaceDesc, SurfacePool, SurfacePoolOpts,
    TargetWriteLock,
};
pub use crate::script::path::{FrameDescriptor, FrameScript, PathCommand, PathGroup};
