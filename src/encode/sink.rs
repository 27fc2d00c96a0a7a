use std::path::PathBuf;
use std::sync::mpsc::{self, SyncSender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use anyhow::Context as _;

use crate::foundation::core::{Fps, FrameIndex, PixelFormat, PresentationTime};
use crate::foundation::error::{PipelineError, PipelineResult};
use crate::render::surface_pool::RenderTarget;

/// Configuration provided to an [`EncoderSink`] before the first readiness callback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SinkConfig {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Output frames-per-second.
    pub fps: Fps,
    /// Layout of submitted targets.
    pub format: PixelFormat,
}

/// Finished container reported on successful finalize.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerHandle {
    /// Output file, when the sink writes one.
    pub path: Option<PathBuf>,
    /// Frames muxed into the container.
    pub frames: u64,
    /// Container duration (`frames / fps`).
    pub duration: PresentationTime,
}

/// One-shot finalize report.
pub type FinalizeCallback = Box<dyn FnOnce(PipelineResult<ContainerHandle>) + Send>;

/// Input side of a sink session, as seen from the production loop.
pub trait SinkInput {
    /// `true` when one more [`SinkInput::submit`] fits.
    fn is_ready_for_more_input(&self) -> bool;

    /// Hand `target` to the sink, presented at `pts`.
    ///
    /// Presentation times must strictly increase within a session; sinks reject regressions with
    /// `TimestampOrderViolation`.
    fn submit(&mut self, target: RenderTarget, pts: PresentationTime) -> PipelineResult<()>;

    /// No further submissions follow.
    fn mark_input_finished(&mut self);

    /// Flush and close the container, then report through `on_done` exactly once.
    fn finalize(&mut self, on_done: FinalizeCallback);

    /// Abort the session: drop queued frames and remove any partial output. No finalize follows.
    fn cancel(&mut self);
}

/// Result of one production step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Production {
    /// Waiting for more capacity.
    Pending,
    /// The producer is done with the sink; no more callbacks are needed.
    Complete,
}

/// Demand-driven frame producer invoked on the sink's serial context.
pub trait MediaDataProducer: Send {
    /// Submit as much as the sink currently has room for.
    fn produce(&mut self, input: &mut dyn SinkInput) -> Production;

    /// The sink failed while the producer was waiting for capacity.
    fn sink_failed(&mut self, input: &mut dyn SinkInput, err: PipelineError);
}

/// A streaming container writer with bounded input capacity.
pub trait EncoderSink: SinkInput + Send {
    /// Prepare the output for a session. Called once, before any readiness callback.
    fn begin(&mut self, cfg: &SinkConfig) -> PipelineResult<()>;

    /// Block until [`SinkInput::is_ready_for_more_input`] may hold again.
    ///
    /// Returns an error when the sink can no longer accept input.
    fn wait_for_capacity(&mut self) -> PipelineResult<()>;

    /// Short name used for thread names and logs.
    fn label(&self) -> &'static str {
        "sink"
    }
}

/// Drive `producer` from a dedicated serial thread until it completes.
///
/// The first callback runs immediately, so producers with nothing to submit can finalize without
/// waiting for capacity. Callbacks never overlap.
pub fn request_media_data_when_ready(
    mut sink: Box<dyn EncoderSink>,
    mut producer: Box<dyn MediaDataProducer>,
) -> PipelineResult<JoinHandle<()>> {
    let name = format!("pathreel-{}-producer", sink.label());
    let handle = std::thread::Builder::new()
        .name(name)
        .spawn(move || {
            loop {
                match producer.produce(sink.as_mut()) {
                    Production::Complete => break,
                    Production::Pending => {
                        if let Err(e) = sink.wait_for_capacity() {
                            producer.sink_failed(sink.as_mut(), e);
                            break;
                        }
                    }
                }
            }
        })
        .context("failed to spawn producer thread")?;
    Ok(handle)
}

/// Container duration for `frames` frames at `fps`.
pub fn container_duration(frames: u64, fps: Fps) -> PresentationTime {
    fps.presentation_time(FrameIndex(frames))
}

#[derive(Debug, Default)]
struct GateState {
    in_flight: usize,
    max_in_flight: usize,
    failed: bool,
    cancelled: bool,
}

/// Outcome of [`SlotGate::wait_for_room`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GateWait {
    Room,
    /// The consumer returned an error; the queue owner holds it.
    Failed,
    Cancelled,
}

/// Counts frames between submission and consumption.
#[derive(Debug)]
pub(crate) struct SlotGate {
    capacity: usize,
    state: Mutex<GateState>,
    freed: Condvar,
}

impl SlotGate {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(GateState::default()),
            freed: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn has_room(&self) -> bool {
        let st = self.lock();
        !st.failed && !st.cancelled && st.in_flight < self.capacity
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.lock().max_in_flight
    }

    fn take(&self) {
        let mut st = self.lock();
        st.in_flight += 1;
        st.max_in_flight = st.max_in_flight.max(st.in_flight);
    }

    fn release(&self) {
        let mut st = self.lock();
        st.in_flight = st.in_flight.saturating_sub(1);
        drop(st);
        self.freed.notify_all();
    }

    fn fail(&self) {
        self.lock().failed = true;
        self.freed.notify_all();
    }

    pub(crate) fn has_failed(&self) -> bool {
        self.lock().failed
    }

    fn cancel(&self) {
        self.lock().cancelled = true;
        self.freed.notify_all();
    }

    fn is_cancelled(&self) -> bool {
        self.lock().cancelled
    }

    /// Block until a slot frees up or the consumer stops.
    pub(crate) fn wait_for_room(&self) -> GateWait {
        let mut st = self.lock();
        loop {
            if st.failed {
                return GateWait::Failed;
            }
            if st.cancelled {
                return GateWait::Cancelled;
            }
            if st.in_flight < self.capacity {
                return GateWait::Room;
            }
            st = self.freed.wait(st).unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Bounded hand-off from the production loop to a sink's consumer thread.
///
/// The consumer drops each target after handling it, which recycles it into its pool.
pub(crate) struct FrameQueue {
    gate: Arc<SlotGate>,
    tx: Option<SyncSender<(RenderTarget, PresentationTime)>>,
    worker: Option<JoinHandle<PipelineResult<()>>>,
    last_pts: Option<PresentationTime>,
    submitted: u64,
}

impl FrameQueue {
    pub(crate) fn spawn<F>(name: String, capacity: usize, mut consume: F) -> PipelineResult<Self>
    where
        F: FnMut(&RenderTarget, PresentationTime) -> PipelineResult<()> + Send + 'static,
    {
        let gate = Arc::new(SlotGate::new(capacity));
        let (tx, rx) = mpsc::sync_channel::<(RenderTarget, PresentationTime)>(gate.capacity);
        let worker_gate = Arc::clone(&gate);
        let worker = std::thread::Builder::new()
            .name(name)
            .spawn(move || {
                for (target, pts) in rx {
                    if worker_gate.is_cancelled() {
                        drop(target);
                        worker_gate.release();
                        continue;
                    }
                    let res = consume(&target, pts);
                    drop(target);
                    // Flag the failure before freeing the slot so no waiter sees room first.
                    if res.is_err() {
                        worker_gate.fail();
                    }
                    worker_gate.release();
                    res?;
                }
                Ok(())
            })
            .context("failed to spawn sink consumer thread")?;

        Ok(Self {
            gate,
            tx: Some(tx),
            worker: Some(worker),
            last_pts: None,
            submitted: 0,
        })
    }

    pub(crate) fn gate(&self) -> &SlotGate {
        &self.gate
    }

    pub(crate) fn submitted(&self) -> u64 {
        self.submitted
    }

    pub(crate) fn is_open(&self) -> bool {
        self.tx.is_some()
    }

    pub(crate) fn push(&mut self, target: RenderTarget, pts: PresentationTime) -> PipelineResult<()> {
        if let Some(last) = self.last_pts
            && pts <= last
        {
            return Err(PipelineError::TimestampOrderViolation { last, got: pts });
        }
        if self.gate.has_failed() {
            return Err(self.worker_failure());
        }
        let Some(tx) = self.tx.as_ref() else {
            return Err(PipelineError::encoder("sink input is already closed"));
        };
        if !self.gate.has_room() {
            return Err(PipelineError::encoder(
                "frame submitted while the sink was not ready",
            ));
        }

        self.gate.take();
        if tx.send((target, pts)).is_err() {
            self.gate.release();
            return Err(self.worker_failure());
        }
        self.last_pts = Some(pts);
        self.submitted += 1;
        Ok(())
    }

    /// Block until the consumer has room, reporting its own error if it stopped.
    pub(crate) fn wait_for_room(&mut self) -> PipelineResult<()> {
        match self.gate.wait_for_room() {
            GateWait::Room => Ok(()),
            GateWait::Failed => Err(self.worker_failure()),
            GateWait::Cancelled => Err(PipelineError::encoder("sink session was cancelled")),
        }
    }

    /// Stop accepting input and wait for the consumer to drain.
    pub(crate) fn close(&mut self) -> PipelineResult<()> {
        drop(self.tx.take());
        match self.worker.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| PipelineError::encoder("sink consumer thread panicked"))?,
            None if self.gate.has_failed() => {
                Err(PipelineError::encoder("sink consumer already failed"))
            }
            None => Ok(()),
        }
    }

    /// Drop queued frames without consuming them.
    pub(crate) fn abandon(&mut self) {
        self.gate.cancel();
        drop(self.tx.take());
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }

    fn worker_failure(&mut self) -> PipelineError {
        match self.close() {
            Err(e) => e,
            Ok(()) => PipelineError::encoder("sink consumer stopped unexpectedly"),
        }
    }
}

impl Drop for FrameQueue {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.abandon();
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/sink.rs"]
mod tests;
