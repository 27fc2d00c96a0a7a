use super::*;

fn desc(w: u32, h: u32) -> SurfaceDesc {
    SurfaceDesc {
        width: w,
        height: h,
        format: PixelFormat::Rgba8Premul,
    }
}

fn opts(capacity: usize, timeout_ms: u64) -> SurfacePoolOpts {
    SurfacePoolOpts {
        capacity,
        acquire_timeout: Duration::from_millis(timeout_ms),
    }
}

#[test]
fn acquired_target_matches_desc() {
    let pool = SurfacePool::new(desc(8, 4), opts(2, 10)).unwrap();
    let t = pool.acquire().unwrap();
    assert_eq!(t.desc(), desc(8, 4));
    assert_eq!(t.data().len(), 8 * 4 * 4);
}

#[test]
fn dropped_targets_are_reused() {
    let pool = SurfacePool::new(desc(8, 8), opts(1, 10)).unwrap();
    let a = pool.acquire().unwrap();
    drop(a);
    let _b = pool.acquire().unwrap();

    let st = pool.stats();
    assert_eq!(st.alloc_surfaces, 1);
    assert_eq!(st.reused_surfaces, 1);
    assert_eq!(st.outstanding, 1);
}

#[test]
fn exhaustion_is_reported_after_timeout() {
    let pool = SurfacePool::new(desc(8, 8), opts(1, 5)).unwrap();
    let _held = pool.acquire().unwrap();
    let err = pool.acquire().unwrap_err();
    assert!(matches!(err, PipelineError::PoolExhausted(_)));
    assert_eq!(pool.stats().exhausted, 1);
}

#[test]
fn zero_capacity_is_exhausted_immediately() {
    let pool = SurfacePool::new(desc(8, 8), opts(0, 10_000)).unwrap();
    let started = Instant::now();
    assert!(matches!(
        pool.acquire().unwrap_err(),
        PipelineError::PoolExhausted(_)
    ));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn acquire_waits_for_recycle_from_another_thread() {
    let pool = SurfacePool::new(desc(8, 8), opts(1, 5_000)).unwrap();
    let held = pool.acquire().unwrap();
    let releaser = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(20));
        drop(held);
    });
    let again = pool.acquire();
    releaser.join().unwrap();
    assert!(again.is_ok());
    assert_eq!(pool.stats().alloc_surfaces, 1);
}

#[test]
fn write_lock_is_scoped() {
    let pool = SurfacePool::new(desc(4, 4), opts(1, 10)).unwrap();
    let mut t = pool.acquire().unwrap();
    {
        let mut lock = t.lock_for_write();
        lock.data_as_u8_slice_mut().fill(7);
        assert_eq!(pool.stats().locked, 1);
    }
    assert_eq!(pool.stats().locked, 0);
    assert!(t.data().iter().all(|&b| b == 7));
}

#[test]
fn new_rejects_bad_dimensions() {
    assert!(SurfacePool::new(desc(0, 4), opts(1, 10)).is_err());
    assert!(SurfacePool::new(desc(70_000, 4), opts(1, 10)).is_err());
}

#[test]
fn detached_targets_do_not_touch_a_pool() {
    let mut t = RenderTarget::detached(desc(2, 2)).unwrap();
    t.lock_for_write().data_as_u8_slice_mut().fill(1);
    assert_eq!(t.data(), &[1u8; 16][..]);
}
