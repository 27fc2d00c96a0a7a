//! CPU raster targets and the path-fill adapter.

/// Path-fill adapter powered by `vello_cpu`.
pub mod raster;
/// Bounded pool of render targets with scoped write locks.
pub mod surface_pool;
