use super::*;
use crate::foundation::core::PixelFormat;

#[test]
fn flatten_premul_alpha_0_returns_bg() {
    let src = vec![0u8, 0, 0, 0];
    let mut dst = vec![0u8; 4];
    flatten_premul_over_bg_to_opaque_rgba8(&mut dst, &src, [10, 20, 30, 255]).unwrap();
    assert_eq!(dst, vec![10, 20, 30, 255]);
}

#[test]
fn flatten_premul_alpha_255_is_identity() {
    let src = vec![1u8, 2, 3, 255];
    let mut dst = vec![0u8; 4];
    flatten_premul_over_bg_to_opaque_rgba8(&mut dst, &src, [10, 20, 30, 255]).unwrap();
    assert_eq!(dst, src);
}

#[test]
fn flatten_rejects_mismatched_buffers() {
    let mut dst = vec![0u8; 8];
    assert!(flatten_premul_over_bg_to_opaque_rgba8(&mut dst, &[0u8; 4], [0; 4]).is_err());
}

#[test]
fn begin_rejects_odd_dimensions() {
    let dir = tempfile::tempdir().unwrap();
    let mut sink = FfmpegSink::new(FfmpegSinkOpts::new(dir.path().join("odd.mp4")));
    let err = sink
        .begin(&SinkConfig {
            width: 15,
            height: 16,
            fps: Fps::integer(30).unwrap(),
            format: PixelFormat::Rgba8Premul,
        })
        .unwrap_err();
    assert!(matches!(err, PipelineError::Validation(_)));
    assert!(!sink.is_ready_for_more_input());
}

#[test]
fn existing_output_is_removed() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("stale.mp4");
    std::fs::write(&out, b"stale").unwrap();
    remove_existing_output(&out).unwrap();
    assert!(!out.exists());
    remove_existing_output(&out).unwrap();
}

#[test]
fn ensure_parent_dir_creates_nested_dirs() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("a").join("b").join("out.mp4");
    ensure_parent_dir(&out).unwrap();
    assert!(out.parent().unwrap().is_dir());
    ensure_parent_dir(Path::new("bare.mp4")).unwrap();
}

#[test]
fn submit_before_begin_is_an_encoder_error() {
    let mut sink = FfmpegSink::new(FfmpegSinkOpts::new("unused.mp4"));
    let target = RenderTarget::detached(crate::render::surface_pool::SurfaceDesc {
        width: 2,
        height: 2,
        format: PixelFormat::Rgba8Premul,
    })
    .unwrap();
    let err = sink.submit(target, PresentationTime::ZERO).unwrap_err();
    assert!(matches!(err, PipelineError::Encoder(_)));
}

fn sink_config(width: u32, height: u32) -> SinkConfig {
    SinkConfig {
        width,
        height,
        fps: Fps::integer(10).unwrap(),
        format: PixelFormat::Rgba8Premul,
    }
}

fn opaque_target(width: u32, height: u32) -> RenderTarget {
    let mut t = RenderTarget::detached(crate::render::surface_pool::SurfaceDesc {
        width,
        height,
        format: PixelFormat::Rgba8Premul,
    })
    .unwrap();
    t.lock_for_write().data_as_u8_slice_mut().fill(255);
    t
}

#[test]
fn dropping_a_started_sink_removes_partial_output() {
    if !is_ffmpeg_on_path() {
        eprintln!("skipping: ffmpeg not on PATH");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("dropped.mp4");
    let mut sink = FfmpegSink::new(FfmpegSinkOpts::new(&out));
    sink.begin(&sink_config(16, 16)).unwrap();
    sink.submit(opaque_target(16, 16), PresentationTime::ZERO).unwrap();

    drop(sink);
    assert!(!out.exists());
}

#[test]
fn dropping_a_finalized_sink_keeps_output() {
    if !is_ffmpeg_on_path() {
        eprintln!("skipping: ffmpeg not on PATH");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("kept.mp4");
    let mut sink = FfmpegSink::new(FfmpegSinkOpts::new(&out));
    sink.begin(&sink_config(16, 16)).unwrap();
    sink.submit(opaque_target(16, 16), PresentationTime::ZERO).unwrap();
    sink.mark_input_finished();

    let (tx, rx) = std::sync::mpsc::channel();
    sink.finalize(Box::new(move |r| tx.send(r).unwrap()));
    assert_eq!(rx.recv().unwrap().unwrap().frames, 1);

    drop(sink);
    assert!(out.exists());
}
