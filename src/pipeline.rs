//! The progressive vector-to-video session driver.

/// Session configuration.
pub mod config;
/// Readiness-gated frame production and one-shot completion.
pub mod driver;
/// Single-use session state.
pub mod state;
