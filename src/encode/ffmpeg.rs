use std::io::{Read, Write as _};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use crate::encode::sink::{
    ContainerHandle, EncoderSink, FinalizeCallback, FrameQueue, SinkConfig, SinkInput,
    container_duration,
};
use crate::foundation::core::{Fps, PresentationTime};
use crate::foundation::error::{PipelineError, PipelineResult};
use crate::foundation::math::mul_div255_u16;
use crate::render::surface_pool::RenderTarget;

/// Options for [`FfmpegSink`] MP4 output.
#[derive(Clone, Debug)]
pub struct FfmpegSinkOpts {
    /// Output MP4 file path. Any existing file is removed when the session begins.
    pub out_path: PathBuf,
    /// Background color used to flatten alpha (RGBA8, straight alpha).
    pub bg_rgba: [u8; 4],
    /// Frames queued between the production loop and the ffmpeg writer.
    pub capacity: usize,
    /// x264 constant rate factor.
    pub crf: u8,
}

impl FfmpegSinkOpts {
    /// Create options for outputting an MP4 to `out_path`.
    pub fn new(out_path: impl Into<PathBuf>) -> Self {
        Self {
            out_path: out_path.into(),
            bg_rgba: [255, 255, 255, 255],
            capacity: 2,
            crf: 18,
        }
    }
}

/// Sink that spawns the system `ffmpeg` and streams raw frames to its stdin.
pub struct FfmpegSink {
    opts: FfmpegSinkOpts,

    child: Option<Child>,
    stderr_drain: Option<std::thread::JoinHandle<std::io::Result<Vec<u8>>>>,
    queue: Option<FrameQueue>,

    cfg: Option<SinkConfig>,
    input_finished: bool,
    finalized: bool,
}

impl FfmpegSink {
    /// Create a new sink that streams into `ffmpeg`.
    pub fn new(opts: FfmpegSinkOpts) -> Self {
        Self {
            opts,
            child: None,
            stderr_drain: None,
            queue: None,
            cfg: None,
            input_finished: false,
            finalized: false,
        }
    }

    fn close_container(&mut self) -> PipelineResult<ContainerHandle> {
        let cfg = self
            .cfg
            .ok_or_else(|| PipelineError::encoder("ffmpeg sink not started"))?;
        if !self.input_finished {
            return Err(PipelineError::encoder(
                "finalize before input was marked finished",
            ));
        }

        // ffmpeg cannot mux an empty rawvideo stream; report an empty container without a file.
        if self.queue.as_ref().is_none_or(|q| q.submitted() == 0) {
            self.discard_child();
            return Ok(ContainerHandle {
                path: None,
                frames: 0,
                duration: container_duration(0, cfg.fps),
            });
        }

        // Writer errors take precedence over the exit status they usually cause.
        let (frames, written) = match self.queue.as_mut() {
            Some(q) => (q.submitted(), q.close()),
            None => (0, Ok(())),
        };
        let mut child = self
            .child
            .take()
            .ok_or_else(|| PipelineError::encoder("ffmpeg sink not started"))?;
        let status = child.wait().map_err(|e| {
            PipelineError::encoder(format!("failed to wait for ffmpeg to finish: {e}"))
        })?;
        let stderr_bytes = self.join_stderr()?;
        written?;

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr_bytes);
            return Err(PipelineError::encoder(format!(
                "ffmpeg exited with status {}: {}",
                status,
                stderr.trim()
            )));
        }

        Ok(ContainerHandle {
            path: Some(self.opts.out_path.clone()),
            frames,
            duration: container_duration(frames, cfg.fps),
        })
    }

    /// Stop ffmpeg and the writer without muxing, then remove whatever was written.
    fn discard_child(&mut self) {
        // Kill first so a writer blocked on a full stdin pipe fails fast.
        if let Some(child) = self.child.as_mut() {
            let _ = child.kill();
        }
        if let Some(q) = self.queue.as_mut() {
            q.abandon();
        }
        if let Some(mut child) = self.child.take() {
            let _ = child.wait();
        }
        let _ = self.join_stderr();
        self.remove_partial_output();
    }

    fn join_stderr(&mut self) -> PipelineResult<Vec<u8>> {
        match self.stderr_drain.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| PipelineError::encoder("ffmpeg stderr drain thread panicked"))?
                .map_err(|e| PipelineError::encoder(format!("ffmpeg stderr read failed: {e}"))),
            None => Ok(Vec::new()),
        }
    }

    fn remove_partial_output(&self) {
        if self.opts.out_path.exists()
            && let Err(e) = std::fs::remove_file(&self.opts.out_path)
        {
            tracing::warn!(
                path = %self.opts.out_path.display(),
                "failed to remove partial output: {e}"
            );
        }
    }
}

impl SinkInput for FfmpegSink {
    fn is_ready_for_more_input(&self) -> bool {
        !self.input_finished
            && self
                .queue
                .as_ref()
                .is_some_and(|q| q.is_open() && q.gate().has_room())
    }

    fn submit(&mut self, target: RenderTarget, pts: PresentationTime) -> PipelineResult<()> {
        let cfg = self
            .cfg
            .as_ref()
            .ok_or_else(|| PipelineError::encoder("ffmpeg sink not started"))?;
        if self.input_finished {
            return Err(PipelineError::encoder("submit after input was marked finished"));
        }
        let desc = target.desc();
        if desc.width != cfg.width || desc.height != cfg.height {
            return Err(PipelineError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                desc.width, desc.height, cfg.width, cfg.height
            )));
        }
        let queue = self
            .queue
            .as_mut()
            .ok_or_else(|| PipelineError::encoder("ffmpeg sink is already finalized"))?;
        queue.push(target, pts)
    }

    fn mark_input_finished(&mut self) {
        self.input_finished = true;
    }

    #[tracing::instrument(skip(self, on_done), fields(out = %self.opts.out_path.display()))]
    fn finalize(&mut self, on_done: FinalizeCallback) {
        if self.finalized {
            on_done(Err(PipelineError::encoder("finalize called twice")));
            return;
        }
        self.finalized = true;

        let result = self.close_container();
        if result.is_err() {
            self.remove_partial_output();
        }
        on_done(result);
    }

    fn cancel(&mut self) {
        self.discard_child();
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        // A live child means the session was neither finalized nor cancelled.
        if self.child.is_some() {
            tracing::warn!(
                path = %self.opts.out_path.display(),
                "ffmpeg sink dropped mid-session; discarding output"
            );
            self.cancel();
        }
    }
}

impl EncoderSink for FfmpegSink {
    #[tracing::instrument(skip(self), fields(out = %self.opts.out_path.display()))]
    fn begin(&mut self, cfg: &SinkConfig) -> PipelineResult<()> {
        if cfg.fps.num == 0 || cfg.fps.den == 0 {
            return Err(PipelineError::validation("fps must be non-zero"));
        }
        if cfg.width == 0 || cfg.height == 0 {
            return Err(PipelineError::validation(
                "ffmpeg sink width/height must be non-zero",
            ));
        }
        if !cfg.width.is_multiple_of(2) || !cfg.height.is_multiple_of(2) {
            return Err(PipelineError::validation(
                "ffmpeg sink width/height must be even (required for yuv420p mp4 output)",
            ));
        }

        ensure_parent_dir(&self.opts.out_path)?;
        remove_existing_output(&self.opts.out_path)?;

        if !is_ffmpeg_on_path() {
            return Err(PipelineError::encoder(
                "ffmpeg is required for MP4 encoding, but was not found on PATH",
            ));
        }

        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        // Input: raw RGBA8 frames, flattened to opaque before writing (see the consumer below).
        cmd.args([
            "-y",
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{}x{}", cfg.width, cfg.height),
        ]);
        push_input_fps(&mut cmd, cfg.fps);
        cmd.args(["-i", "pipe:0"]);
        // Output: h264 + yuv420p for broad compatibility.
        cmd.args([
            "-an",
            "-c:v",
            "libx264",
            "-crf",
            &self.opts.crf.to_string(),
            "-pix_fmt",
            "yuv420p",
            "-movflags",
            "+faststart",
        ]);
        cmd.arg(&self.opts.out_path);

        let mut child = cmd.spawn().map_err(|e| {
            PipelineError::encoder(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| PipelineError::encoder("failed to open ffmpeg stdin (unexpected)"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| PipelineError::encoder("failed to open ffmpeg stderr (unexpected)"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut stderr_bytes = Vec::new();
            stderr.read_to_end(&mut stderr_bytes)?;
            Ok(stderr_bytes)
        });

        let bg = self.opts.bg_rgba;
        let mut scratch = vec![0u8; (cfg.width as usize) * (cfg.height as usize) * 4];
        let queue = FrameQueue::spawn(
            "pathreel-ffmpeg-writer".to_string(),
            self.opts.capacity,
            move |target, _pts| {
                flatten_premul_over_bg_to_opaque_rgba8(&mut scratch, target.data(), bg)?;
                stdin.write_all(&scratch).map_err(|e| {
                    PipelineError::encoder(format!("failed to write frame to ffmpeg stdin: {e}"))
                })
            },
        );
        let queue = match queue {
            Ok(q) => q,
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(e);
            }
        };

        self.child = Some(child);
        self.stderr_drain = Some(stderr_drain);
        self.queue = Some(queue);
        self.cfg = Some(*cfg);
        self.input_finished = false;
        self.finalized = false;
        Ok(())
    }

    fn wait_for_capacity(&mut self) -> PipelineResult<()> {
        let queue = self
            .queue
            .as_mut()
            .ok_or_else(|| PipelineError::encoder("ffmpeg sink not started"))?;
        queue.wait_for_room()
    }

    fn label(&self) -> &'static str {
        "ffmpeg"
    }
}

fn push_input_fps(cmd: &mut Command, fps: Fps) {
    // For rawvideo input, use `-r` before `-i` to specify the input framerate.
    cmd.args(["-r", &format!("{}/{}", fps.num, fps.den)]);
}

fn flatten_premul_over_bg_to_opaque_rgba8(
    dst: &mut [u8],
    src_premul: &[u8],
    bg_rgba: [u8; 4],
) -> PipelineResult<()> {
    if dst.len() != src_premul.len() || !dst.len().is_multiple_of(4) {
        return Err(PipelineError::validation(
            "flatten_premul_over_bg_to_opaque_rgba8 expects equal-length rgba8 buffers",
        ));
    }

    let bg_r = u16::from(bg_rgba[0]);
    let bg_g = u16::from(bg_rgba[1]);
    let bg_b = u16::from(bg_rgba[2]);

    for (d, s) in dst.chunks_exact_mut(4).zip(src_premul.chunks_exact(4)) {
        let a = u16::from(s[3]);
        if a == 255 {
            d.copy_from_slice(s);
            continue;
        }

        let inv = 255u16 - a;
        let r = u16::from(s[0]) + mul_div255_u16(bg_r, inv);
        let g = u16::from(s[1]) + mul_div255_u16(bg_g, inv);
        let b = u16::from(s[2]) + mul_div255_u16(bg_b, inv);

        d[0] = r.min(255) as u8;
        d[1] = g.min(255) as u8;
        d[2] = b.min(255) as u8;
        d[3] = 255;
    }

    Ok(())
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> PipelineResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

fn remove_existing_output(path: &Path) -> PipelineResult<()> {
    use anyhow::Context as _;
    match std::fs::remove_file(path) {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "removed existing output");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e)
            .with_context(|| format!("failed to remove existing output '{}'", path.display()))
            .map_err(PipelineError::from),
    }
}

/// Return `true` when `ffmpeg` can be invoked from `PATH`.
pub fn is_ffmpeg_on_path() -> bool {
    std::process::Command::new("ffmpeg")
        .arg("-version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(test)]
#[path = "../../tests/unit/encode/ffmpeg.rs"]
mod tests;
