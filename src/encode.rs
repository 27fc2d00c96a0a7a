//! Encoding sinks.
//!
//! Sinks pull rendered targets through a readiness protocol and mux them into a container.

/// `ffmpeg`-based sink (MP4 output via system `ffmpeg`).
pub mod ffmpeg;
/// In-memory sink for tests and debugging.
pub mod memory;
/// Sink traits, the readiness loop and the bounded frame queue.
pub mod sink;
