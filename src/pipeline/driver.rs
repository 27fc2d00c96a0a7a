use std::sync::{Arc, Mutex, PoisonError};

use crate::encode::ffmpeg::{FfmpegSink, is_ffmpeg_on_path};
use crate::encode::sink::{
    ContainerHandle, EncoderSink, MediaDataProducer, Production, SinkInput,
    request_media_data_when_ready,
};
use crate::foundation::core::{Fps, FrameIndex};
use crate::foundation::error::{PipelineError, PipelineResult};
use crate::pipeline::config::PipelineConfig;
use crate::pipeline::state::{PipelineState, StateCell};
use crate::render::raster::{CpuRasterizer, Rasterizer};
use crate::render::surface_pool::{BufferPool, RenderTarget, SurfacePool};
use crate::script::path::{FrameDescriptor, FrameScript};

/// Receives the single terminal result of a session.
pub type CompletionCallback = Box<dyn FnOnce(PipelineResult<ContainerHandle>) + Send>;

struct SessionParts {
    pool: Arc<dyn BufferPool>,
    rasterizer: Box<dyn Rasterizer>,
    sink: Box<dyn EncoderSink>,
}

/// Single-use session that rasterizes a [`FrameScript`] frame by frame and streams the results
/// into an [`EncoderSink`].
///
/// `start` may be called from any thread. Production runs on a thread owned by the sink's
/// readiness loop; the completion callback fires exactly once, from whichever thread observes the
/// terminal outcome.
pub struct Pipeline {
    cfg: PipelineConfig,
    state: Arc<StateCell>,
    parts: Mutex<Option<SessionParts>>,
}

impl Pipeline {
    /// Assemble a pipeline from explicit collaborators.
    ///
    /// The pool must hand out targets matching the configured canvas and pixel format.
    pub fn new(
        cfg: PipelineConfig,
        pool: Arc<dyn BufferPool>,
        rasterizer: Box<dyn Rasterizer>,
        sink: Box<dyn EncoderSink>,
    ) -> PipelineResult<Self> {
        cfg.validate()?;
        let want = cfg.surface_desc();
        let got = pool.desc();
        if got != want {
            return Err(PipelineError::validation(format!(
                "pool surfaces are {}x{} {:?}, pipeline needs {}x{} {:?}",
                got.width, got.height, got.format, want.width, want.height, want.format
            )));
        }
        Ok(Self {
            cfg,
            state: Arc::new(StateCell::new()),
            parts: Mutex::new(Some(SessionParts {
                pool,
                rasterizer,
                sink,
            })),
        })
    }

    /// Pipeline with a bounded [`SurfacePool`] and [`CpuRasterizer`] built from `cfg`.
    pub fn with_sink(cfg: PipelineConfig, sink: Box<dyn EncoderSink>) -> PipelineResult<Self> {
        cfg.validate()?;
        let pool = SurfacePool::new(cfg.surface_desc(), cfg.pool_opts())?;
        let rasterizer = CpuRasterizer::new(cfg.rasterizer_opts());
        Self::new(cfg, Arc::new(pool), Box::new(rasterizer), sink)
    }

    /// Pipeline writing an MP4 to [`PipelineConfig::out_path`] through the system `ffmpeg`.
    pub fn to_mp4(cfg: PipelineConfig) -> PipelineResult<Self> {
        if !is_ffmpeg_on_path() {
            return Err(PipelineError::encoder(
                "ffmpeg is required for MP4 output, but was not found on PATH",
            ));
        }
        let sink = FfmpegSink::new(cfg.ffmpeg_opts());
        Self::with_sink(cfg, Box::new(sink))
    }

    /// Session configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.cfg
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PipelineState {
        self.state.get()
    }

    /// Begin the session.
    ///
    /// Returns immediately. Every outcome, including usage errors, reaches `on_complete`.
    #[tracing::instrument(skip(self, frames, on_complete), fields(frames = frames.len()))]
    pub fn start<F>(&self, frames: FrameScript, on_complete: F)
    where
        F: FnOnce(PipelineResult<ContainerHandle>) + Send + 'static,
    {
        if let Err(e) = self.state.try_begin() {
            tracing::debug!(error = %e, "start rejected");
            on_complete(Err(e));
            return;
        }

        let completion = Completion::new(self.state.clone(), Box::new(on_complete));
        let parts = self
            .parts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(SessionParts {
            pool,
            rasterizer,
            mut sink,
        }) = parts
        else {
            completion.finish(Err(PipelineError::AlreadyDiscarded));
            return;
        };

        if let Err(e) = sink.begin(&self.cfg.sink_config()) {
            tracing::warn!(error = %e, sink = sink.label(), "sink refused to begin");
            completion.finish(Err(e));
            return;
        }

        let producer = FrameProducer {
            frames,
            next: 0,
            fps: self.cfg.fps,
            pool,
            rasterizer,
            background_rgba: self.cfg.background_rgba,
            fill_rgba: self.cfg.fill_rgba,
            state: self.state.clone(),
            completion: Some(completion),
        };

        // On spawn failure the producer is dropped and its completion reports the failure.
        if let Err(e) = request_media_data_when_ready(sink, Box::new(producer)) {
            tracing::error!(error = %e, "failed to start production loop");
        }
    }

    /// Run a session and block until its completion reports.
    pub fn run_blocking(&self, frames: FrameScript) -> PipelineResult<ContainerHandle> {
        let (tx, rx) = std::sync::mpsc::channel();
        self.start(frames, move |result| {
            let _ = tx.send(result);
        });
        rx.recv()
            .map_err(|_| PipelineError::encoder("session ended without reporting completion"))?
    }
}

/// Rasterize one frame into a standalone premultiplied RGBA8 buffer.
///
/// Uses the same clear-then-fill sequence as a streamed session, without a pool or sink.
pub fn render_frame_rgba(cfg: &PipelineConfig, frame: &FrameDescriptor) -> PipelineResult<Vec<u8>> {
    cfg.validate()?;
    let mut target = RenderTarget::detached(cfg.surface_desc())?;
    let mut rasterizer = CpuRasterizer::new(cfg.rasterizer_opts());
    paint_frame(
        &mut rasterizer,
        &mut target,
        frame,
        cfg.background_rgba,
        cfg.fill_rgba,
    )?;
    Ok(target.data().to_vec())
}

fn paint_frame(
    rasterizer: &mut dyn Rasterizer,
    target: &mut RenderTarget,
    frame: &FrameDescriptor,
    background_rgba: [u8; 4],
    fill_rgba: [u8; 4],
) -> PipelineResult<()> {
    let mut lock = target.lock_for_write();
    rasterizer.clear(&mut lock, background_rgba);
    for group in frame.groups() {
        rasterizer.fill(&mut lock, group, fill_rgba)?;
    }
    Ok(())
}

/// One-shot holder for the caller's completion callback.
///
/// Dropping it unfired reports an encoder error, so a producer lost to a panic or a failed spawn
/// still completes the session.
struct Completion {
    state: Arc<StateCell>,
    on_complete: Option<CompletionCallback>,
}

impl Completion {
    fn new(state: Arc<StateCell>, on_complete: CompletionCallback) -> Self {
        Self {
            state,
            on_complete: Some(on_complete),
        }
    }

    fn finish(mut self, result: PipelineResult<ContainerHandle>) {
        self.fire(result);
    }

    fn fire(&mut self, result: PipelineResult<ContainerHandle>) {
        if let Some(on_complete) = self.on_complete.take() {
            self.state.set(PipelineState::Discarded);
            on_complete(result);
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if self.on_complete.is_some() {
            tracing::warn!("production ended without reporting completion");
            self.fire(Err(PipelineError::encoder(
                "production ended without reporting completion",
            )));
        }
    }
}

struct FrameProducer {
    frames: FrameScript,
    next: usize,
    fps: Fps,
    pool: Arc<dyn BufferPool>,
    rasterizer: Box<dyn Rasterizer>,
    background_rgba: [u8; 4],
    fill_rgba: [u8; 4],
    state: Arc<StateCell>,
    completion: Option<Completion>,
}

impl FrameProducer {
    fn produce_frame(&mut self, input: &mut dyn SinkInput) -> PipelineResult<()> {
        let index = FrameIndex(self.next as u64);
        let pts = self.fps.presentation_time(index);

        let mut target = self.pool.acquire()?;
        paint_frame(
            self.rasterizer.as_mut(),
            &mut target,
            &self.frames.frames[self.next],
            self.background_rgba,
            self.fill_rgba,
        )
        .map_err(|e| with_frame_context(e, index))?;

        input.submit(target, pts)?;
        tracing::debug!(frame = index.0, pts = %pts, "submitted frame");
        self.next += 1;
        Ok(())
    }

    fn abort(&mut self, input: &mut dyn SinkInput, err: PipelineError) {
        let Some(completion) = self.completion.take() else {
            return;
        };
        tracing::warn!(error = %err, frame = self.next, "aborting session");
        input.cancel();
        completion.finish(Err(err));
    }

    fn finish(&mut self, input: &mut dyn SinkInput) {
        let Some(completion) = self.completion.take() else {
            return;
        };
        input.mark_input_finished();
        self.state
            .transition(PipelineState::Writing, PipelineState::Finished);
        let frames = self.next;
        input.finalize(Box::new(move |result| {
            match &result {
                Ok(handle) => tracing::info!(
                    frames = handle.frames,
                    duration = %handle.duration,
                    "container finalized"
                ),
                Err(e) => tracing::warn!(error = %e, frames, "container finalize failed"),
            }
            completion.finish(result);
        }));
    }
}

impl MediaDataProducer for FrameProducer {
    fn produce(&mut self, input: &mut dyn SinkInput) -> Production {
        if self.completion.is_none() {
            return Production::Complete;
        }
        while self.next < self.frames.len() && input.is_ready_for_more_input() {
            if let Err(e) = self.produce_frame(input) {
                self.abort(input, e);
                return Production::Complete;
            }
        }
        if self.next == self.frames.len() {
            self.finish(input);
            return Production::Complete;
        }
        Production::Pending
    }

    fn sink_failed(&mut self, input: &mut dyn SinkInput, err: PipelineError) {
        self.abort(input, err);
    }
}

fn with_frame_context(err: PipelineError, index: FrameIndex) -> PipelineError {
    match err {
        PipelineError::MalformedPath(msg) => {
            PipelineError::MalformedPath(format!("frame {}: {msg}", index.0))
        }
        PipelineError::RasterizationFailed(msg) => {
            PipelineError::RasterizationFailed(format!("frame {}: {msg}", index.0))
        }
        other => other,
    }
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/driver.rs"]
mod tests;
