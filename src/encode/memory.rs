use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::encode::sink::{
    ContainerHandle, EncoderSink, FinalizeCallback, FrameQueue, SinkConfig, SinkInput,
    container_duration,
};
use crate::foundation::core::PresentationTime;
use crate::foundation::error::{PipelineError, PipelineResult};
use crate::render::surface_pool::RenderTarget;

/// A frame captured by [`InMemorySink`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedFrame {
    /// Presentation time the frame was submitted with.
    pub pts: PresentationTime,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Copied pixel bytes.
    pub data: Vec<u8>,
}

/// Protocol events observed by [`InMemorySink`], in call order.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    /// `begin` was called.
    Begin,
    /// A frame was accepted at this time.
    Submit(PresentationTime),
    /// `mark_input_finished` was called.
    MarkInputFinished,
    /// `finalize` was called.
    Finalize,
    /// `cancel` was called.
    Cancel,
}

#[derive(Debug, Default)]
struct RecordingInner {
    config: Option<SinkConfig>,
    frames: Vec<RecordedFrame>,
    events: Vec<SinkEvent>,
    max_in_flight: usize,
}

/// Shared view of what an [`InMemorySink`] received.
///
/// Clone it before handing the sink to a pipeline; the sink moves onto its own thread.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRecording {
    inner: Arc<Mutex<RecordingInner>>,
}

impl InMemoryRecording {
    fn lock(&self) -> MutexGuard<'_, RecordingInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Configuration captured in `begin`, if any.
    pub fn config(&self) -> Option<SinkConfig> {
        self.lock().config
    }

    /// Frames consumed so far, in presentation order. Cleared on cancel.
    pub fn frames(&self) -> Vec<RecordedFrame> {
        self.lock().frames.clone()
    }

    /// Protocol events so far.
    pub fn events(&self) -> Vec<SinkEvent> {
        self.lock().events.clone()
    }

    /// Presentation times of every accepted submission.
    pub fn submitted_pts(&self) -> Vec<PresentationTime> {
        self.lock()
            .events
            .iter()
            .filter_map(|e| match e {
                SinkEvent::Submit(t) => Some(*t),
                _ => None,
            })
            .collect()
    }

    /// Highest number of frames queued but not yet consumed.
    pub fn max_in_flight(&self) -> usize {
        self.lock().max_in_flight
    }

    fn push_event(&self, e: SinkEvent) {
        self.lock().events.push(e);
    }
}

/// In-memory sink for tests and debugging.
///
/// Frames are copied out on a consumer thread; `consume_delay` simulates a slow encoder so the
/// producer sees backpressure.
pub struct InMemorySink {
    capacity: usize,
    consume_delay: Duration,
    fail_at: Option<(usize, String)>,
    recording: InMemoryRecording,
    cfg: Option<SinkConfig>,
    queue: Option<FrameQueue>,
    input_finished: bool,
    finalized: bool,
}

impl InMemorySink {
    /// Create a sink accepting `capacity` unconsumed frames at a time.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            consume_delay: Duration::ZERO,
            fail_at: None,
            recording: InMemoryRecording::default(),
            cfg: None,
            queue: None,
            input_finished: false,
            finalized: false,
        }
    }

    /// Sleep this long per consumed frame.
    pub fn with_consume_delay(mut self, delay: Duration) -> Self {
        self.consume_delay = delay;
        self
    }

    /// Fail consumption of the `frame`-th submitted frame (0-based) with an encoder error.
    pub fn with_failure_at(mut self, frame: usize, message: impl Into<String>) -> Self {
        self.fail_at = Some((frame, message.into()));
        self
    }

    /// Handle for inspecting what the sink received.
    pub fn recording(&self) -> InMemoryRecording {
        self.recording.clone()
    }

    fn close_container(&mut self) -> PipelineResult<ContainerHandle> {
        let cfg = self
            .cfg
            .ok_or_else(|| PipelineError::encoder("in-memory sink not started"))?;
        if !self.input_finished {
            return Err(PipelineError::encoder(
                "finalize before input was marked finished",
            ));
        }
        let queue = self
            .queue
            .as_mut()
            .ok_or_else(|| PipelineError::encoder("in-memory sink not started"))?;
        queue.close()?;
        let frames = queue.submitted();
        Ok(ContainerHandle {
            path: None,
            frames,
            duration: container_duration(frames, cfg.fps),
        })
    }

    fn sync_in_flight(&self) {
        if let Some(q) = &self.queue {
            let mut rec = self.recording.lock();
            rec.max_in_flight = rec.max_in_flight.max(q.gate().max_in_flight());
        }
    }
}

impl Default for InMemorySink {
    fn default() -> Self {
        Self::new(2)
    }
}

impl SinkInput for InMemorySink {
    fn is_ready_for_more_input(&self) -> bool {
        !self.input_finished
            && self
                .queue
                .as_ref()
                .is_some_and(|q| q.is_open() && q.gate().has_room())
    }

    fn submit(&mut self, target: RenderTarget, pts: PresentationTime) -> PipelineResult<()> {
        if self.input_finished {
            return Err(PipelineError::encoder("submit after input was marked finished"));
        }
        let queue = self
            .queue
            .as_mut()
            .ok_or_else(|| PipelineError::encoder("in-memory sink not started"))?;
        queue.push(target, pts)?;
        self.recording.push_event(SinkEvent::Submit(pts));
        self.sync_in_flight();
        Ok(())
    }

    fn mark_input_finished(&mut self) {
        self.input_finished = true;
        self.recording.push_event(SinkEvent::MarkInputFinished);
    }

    fn finalize(&mut self, on_done: FinalizeCallback) {
        self.recording.push_event(SinkEvent::Finalize);
        if self.finalized {
            on_done(Err(PipelineError::encoder("finalize called twice")));
            return;
        }
        self.finalized = true;

        let result = self.close_container();
        self.sync_in_flight();
        on_done(result);
    }

    fn cancel(&mut self) {
        self.recording.push_event(SinkEvent::Cancel);
        self.sync_in_flight();
        if let Some(q) = self.queue.as_mut() {
            q.abandon();
        }
        self.recording.lock().frames.clear();
    }
}

impl EncoderSink for InMemorySink {
    fn begin(&mut self, cfg: &SinkConfig) -> PipelineResult<()> {
        let recording = self.recording.clone();
        let delay = self.consume_delay;
        let fail_at = self.fail_at.clone();
        let mut consumed = 0usize;
        let queue = FrameQueue::spawn(
            "pathreel-memory-consumer".to_string(),
            self.capacity,
            move |target, pts| {
                if !delay.is_zero() {
                    std::thread::sleep(delay);
                }
                if let Some((frame, message)) = &fail_at
                    && *frame == consumed
                {
                    return Err(PipelineError::encoder(message.clone()));
                }
                consumed += 1;
                let desc = target.desc();
                recording.lock().frames.push(RecordedFrame {
                    pts,
                    width: desc.width,
                    height: desc.height,
                    data: target.data().to_vec(),
                });
                Ok(())
            },
        )?;

        {
            let mut rec = self.recording.lock();
            rec.config = Some(*cfg);
            rec.frames.clear();
            rec.events.push(SinkEvent::Begin);
        }
        self.cfg = Some(*cfg);
        self.queue = Some(queue);
        self.input_finished = false;
        self.finalized = false;
        Ok(())
    }

    fn wait_for_capacity(&mut self) -> PipelineResult<()> {
        let queue = self
            .queue
            .as_mut()
            .ok_or_else(|| PipelineError::encoder("in-memory sink not started"))?;
        queue.wait_for_room()
    }

    fn label(&self) -> &'static str {
        "memory"
    }
}
