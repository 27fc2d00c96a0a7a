//! Frame scripts: the ordered vector content rendered by a pipeline session.
//!
//! A script is data only. Each [`FrameDescriptor`] already holds everything painted for its
//! output frame; helpers such as [`FrameScript::progressive`] build cumulative reveals before the
//! script reaches the driver.

/// Path commands, groups and frame descriptors.
pub mod path;
