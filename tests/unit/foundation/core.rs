use super::*;

#[test]
fn fps_rejects_zero_parts() {
    assert!(Fps::new(0, 1).is_err());
    assert!(Fps::new(30, 0).is_err());
    assert_eq!(Fps::integer(24).unwrap(), Fps { num: 24, den: 1 });
}

#[test]
fn presentation_time_is_exact_rational() {
    let fps = Fps::integer(10).unwrap();
    let t = fps.presentation_time(FrameIndex(2));
    assert_eq!(t, PresentationTime::new(1, 5).unwrap());
    assert_eq!(t.value, 2);
    assert_eq!(t.timescale, 10);
    assert_eq!(fps.presentation_time(FrameIndex(0)), PresentationTime::ZERO);
}

#[test]
fn presentation_time_does_not_drift_over_long_runs() {
    let fps = Fps::new(30000, 1001).unwrap();
    let t = fps.presentation_time(FrameIndex(30000 * 3600));
    assert_eq!(t, PresentationTime::new(3600 * 1001, 1).unwrap());
}

#[test]
fn presentation_time_orders_across_timescales() {
    let a = PresentationTime::new(1, 10).unwrap();
    let b = PresentationTime::new(1, 3).unwrap();
    assert!(a < b);
    assert_eq!(PresentationTime::new(3, 30).unwrap(), a);
    assert!(PresentationTime::new(1, 0).is_err());
}

#[test]
fn canvas_to_u16_rejects_oversized() {
    let c = Canvas {
        width: 70_000,
        height: 8,
    };
    assert!(c.to_u16().is_err());
    let c = Canvas {
        width: 64,
        height: 32,
    };
    assert_eq!(c.to_u16().unwrap(), (64, 32));
}

#[test]
fn straight_to_premul_scales_channels() {
    let c = Rgba8Premul::from_straight([255, 0, 0, 128]);
    assert_eq!(c.to_array(), [128, 0, 0, 128]);
    assert_eq!(Rgba8Premul::from_straight([255, 255, 255, 255]).to_array(), [255; 4]);
}
