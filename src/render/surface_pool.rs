use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::foundation::core::{Canvas, PixelFormat};
use crate::foundation::error::{PipelineError, PipelineResult};

/// Surface declaration: dimensions + pixel format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SurfaceDesc {
    /// Surface width in pixels.
    pub width: u32,
    /// Surface height in pixels.
    pub height: u32,
    /// Surface pixel format.
    pub format: PixelFormat,
}

impl SurfaceDesc {
    /// Describe a surface covering `canvas`.
    pub fn for_canvas(canvas: Canvas, format: PixelFormat) -> Self {
        Self {
            width: canvas.width,
            height: canvas.height,
            format,
        }
    }

    /// Size of one surface in bytes.
    pub fn byte_len(self) -> usize {
        let px = (self.width as usize).saturating_mul(self.height as usize);
        px.saturating_mul(self.format.bytes_per_pixel())
    }

    fn dims_u16(self) -> PipelineResult<(u16, u16)> {
        Canvas {
            width: self.width,
            height: self.height,
        }
        .to_u16()
    }
}

/// Pool configuration.
#[derive(Debug, Clone, Copy)]
pub struct SurfacePoolOpts {
    /// Maximum number of surfaces handed out and not yet recycled.
    pub capacity: usize,
    /// How long `acquire` waits for a recycled surface before reporting exhaustion.
    pub acquire_timeout: Duration,
}

impl Default for SurfacePoolOpts {
    fn default() -> Self {
        Self {
            capacity: 4,
            acquire_timeout: Duration::from_millis(2000),
        }
    }
}

/// Counters exposed for diagnostics and tests.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PoolStats {
    /// Surfaces allocated fresh.
    pub alloc_surfaces: u64,
    /// Acquisitions served from recycled surfaces.
    pub reused_surfaces: u64,
    /// Surfaces currently handed out.
    pub outstanding: usize,
    /// Recycled surfaces waiting to be reused.
    pub retained_surfaces: usize,
    /// Surfaces currently under a write lock.
    pub locked: usize,
    /// Acquisitions that failed with `PoolExhausted`.
    pub exhausted: u64,
}

/// Source of render targets for a pipeline session.
///
/// Implementations must hand out targets matching [`BufferPool::desc`]. Exhaustion is a
/// reportable condition, not a bug.
pub trait BufferPool: Send + Sync {
    /// Description shared by every target this pool hands out.
    fn desc(&self) -> SurfaceDesc;
    /// Take a target. Content is undefined until cleared.
    fn acquire(&self) -> PipelineResult<RenderTarget>;
}

struct PoolInner {
    free: Vec<vello_cpu::Pixmap>,
    stats: PoolStats,
}

struct PoolShared {
    desc: SurfaceDesc,
    opts: SurfacePoolOpts,
    inner: Mutex<PoolInner>,
    recycled: Condvar,
}

impl PoolShared {
    fn lock(&self) -> MutexGuard<'_, PoolInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn recycle(&self, pixmap: vello_cpu::Pixmap) {
        let mut inner = self.lock();
        inner.stats.outstanding = inner.stats.outstanding.saturating_sub(1);
        let fits = u32::from(pixmap.width()) == self.desc.width
            && u32::from(pixmap.height()) == self.desc.height;
        if fits {
            inner.free.push(pixmap);
            inner.stats.retained_surfaces = inner.free.len();
        }
        drop(inner);
        self.recycled.notify_one();
    }

    fn set_locked(&self, delta: isize) {
        let mut inner = self.lock();
        inner.stats.locked = inner.stats.locked.saturating_add_signed(delta);
    }
}

/// Bounded pooled allocator for CPU pixmaps of one fixed [`SurfaceDesc`].
///
/// Targets return to the pool when dropped, which happens once the encoder sink has consumed
/// them. `acquire` blocks while every surface is outstanding and reports exhaustion after
/// `acquire_timeout`.
#[derive(Clone)]
pub struct SurfacePool {
    shared: Arc<PoolShared>,
}

impl SurfacePool {
    /// Create a pool for `desc`.
    pub fn new(desc: SurfaceDesc, opts: SurfacePoolOpts) -> PipelineResult<Self> {
        if desc.width == 0 || desc.height == 0 {
            return Err(PipelineError::validation(
                "surface pool width/height must be non-zero",
            ));
        }
        desc.dims_u16()?;
        Ok(Self {
            shared: Arc::new(PoolShared {
                desc,
                opts,
                inner: Mutex::new(PoolInner {
                    free: Vec::new(),
                    stats: PoolStats::default(),
                }),
                recycled: Condvar::new(),
            }),
        })
    }

    /// Snapshot of the pool counters.
    pub fn stats(&self) -> PoolStats {
        self.shared.lock().stats.clone()
    }
}

impl BufferPool for SurfacePool {
    fn desc(&self) -> SurfaceDesc {
        self.shared.desc
    }

    fn acquire(&self) -> PipelineResult<RenderTarget> {
        let shared = &self.shared;
        let deadline = Instant::now() + shared.opts.acquire_timeout;
        let mut inner = shared.lock();

        if shared.opts.capacity == 0 {
            inner.stats.exhausted = inner.stats.exhausted.saturating_add(1);
            return Err(PipelineError::pool_exhausted("pool has no capacity"));
        }

        loop {
            if let Some(pixmap) = inner.free.pop() {
                inner.stats.reused_surfaces = inner.stats.reused_surfaces.saturating_add(1);
                inner.stats.retained_surfaces = inner.free.len();
                inner.stats.outstanding += 1;
                return Ok(RenderTarget::pooled(pixmap, shared));
            }

            if inner.stats.outstanding < shared.opts.capacity {
                let (w, h) = shared.desc.dims_u16()?;
                inner.stats.alloc_surfaces = inner.stats.alloc_surfaces.saturating_add(1);
                inner.stats.outstanding += 1;
                return Ok(RenderTarget::pooled(vello_cpu::Pixmap::new(w, h), shared));
            }

            let now = Instant::now();
            if now >= deadline {
                inner.stats.exhausted = inner.stats.exhausted.saturating_add(1);
                return Err(PipelineError::pool_exhausted(format!(
                    "no surface recycled within {:?} ({} outstanding)",
                    shared.opts.acquire_timeout, inner.stats.outstanding
                )));
            }
            inner = shared
                .recycled
                .wait_timeout(inner, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}

/// One frame's bitmap.
///
/// Owned by the driver from acquisition until submission, then by the sink. Pooled targets go
/// back to their pool on drop.
pub struct RenderTarget {
    pixmap: vello_cpu::Pixmap,
    desc: SurfaceDesc,
    home: Option<Arc<PoolShared>>,
}

impl RenderTarget {
    fn pooled(pixmap: vello_cpu::Pixmap, shared: &Arc<PoolShared>) -> Self {
        Self {
            pixmap,
            desc: shared.desc,
            home: Some(Arc::clone(shared)),
        }
    }

    /// A target outside any pool, for one-off renders.
    pub fn detached(desc: SurfaceDesc) -> PipelineResult<Self> {
        let (w, h) = desc.dims_u16()?;
        Ok(Self {
            pixmap: vello_cpu::Pixmap::new(w, h),
            desc,
            home: None,
        })
    }

    /// Surface description.
    pub fn desc(&self) -> SurfaceDesc {
        self.desc
    }

    /// Pixel bytes in [`SurfaceDesc::format`] layout.
    pub fn data(&self) -> &[u8] {
        self.pixmap.data_as_u8_slice()
    }

    /// Take exclusive write access for the lifetime of the returned guard.
    pub fn lock_for_write(&mut self) -> TargetWriteLock<'_> {
        if let Some(home) = &self.home {
            home.set_locked(1);
        }
        TargetWriteLock { target: self }
    }
}

impl Drop for RenderTarget {
    fn drop(&mut self) {
        if let Some(home) = self.home.take() {
            let pixmap = std::mem::replace(&mut self.pixmap, vello_cpu::Pixmap::new(0, 0));
            home.recycle(pixmap);
        }
    }
}

impl std::fmt::Debug for RenderTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderTarget")
            .field("desc", &self.desc)
            .field("pooled", &self.home.is_some())
            .finish()
    }
}

/// Scoped write lock on a [`RenderTarget`]; released on drop along every exit path.
pub struct TargetWriteLock<'a> {
    target: &'a mut RenderTarget,
}

impl std::ops::Deref for TargetWriteLock<'_> {
    type Target = vello_cpu::Pixmap;

    fn deref(&self) -> &Self::Target {
        &self.target.pixmap
    }
}

impl std::ops::DerefMut for TargetWriteLock<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.target.pixmap
    }
}

impl Drop for TargetWriteLock<'_> {
    fn drop(&mut self) {
        if let Some(home) = &self.target.home {
            home.set_locked(-1);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/surface_pool.rs"]
mod tests;
