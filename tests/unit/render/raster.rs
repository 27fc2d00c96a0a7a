use super::*;

const WHITE: [u8; 4] = [255, 255, 255, 255];
const BLACK: [u8; 4] = [0, 0, 0, 255];

fn px(p: &vello_cpu::Pixmap, x: u16, y: u16) -> [u8; 4] {
    let i = (usize::from(y) * usize::from(p.width()) + usize::from(x)) * 4;
    let d = p.data_as_u8_slice();
    [d[i], d[i + 1], d[i + 2], d[i + 3]]
}

fn nested_squares() -> PathGroup {
    PathGroup::from_svg("M0,0 L16,0 L16,16 L0,16 Z M4,4 L12,4 L12,12 L4,12 Z").unwrap()
}

#[test]
fn clear_paints_every_pixel() {
    let mut r = CpuRasterizer::default();
    let mut p = vello_cpu::Pixmap::new(4, 3);
    r.clear(&mut p, WHITE);
    assert!(p.data_as_u8_slice().iter().all(|&b| b == 255));
}

#[test]
fn full_canvas_rect_covers_every_pixel() {
    let mut r = CpuRasterizer::default();
    let mut p = vello_cpu::Pixmap::new(16, 8);
    r.clear(&mut p, WHITE);
    r.fill(&mut p, &PathGroup::rect(0.0, 0.0, 16.0, 8.0), BLACK).unwrap();
    assert!(p.data_as_u8_slice().chunks_exact(4).all(|c| c == BLACK));
}

#[test]
fn fill_leaves_outside_pixels_untouched() {
    let mut r = CpuRasterizer::default();
    let mut p = vello_cpu::Pixmap::new(16, 16);
    r.clear(&mut p, WHITE);
    r.fill(&mut p, &PathGroup::rect(0.0, 0.0, 8.0, 16.0), BLACK).unwrap();
    assert_eq!(px(&p, 2, 5), BLACK);
    assert_eq!(px(&p, 12, 5), WHITE);
}

#[test]
fn quad_edges_are_filled() {
    let mut r = CpuRasterizer::default();
    let mut p = vello_cpu::Pixmap::new(32, 32);
    r.clear(&mut p, WHITE);
    let g = PathGroup::new(vec![
        PathCommand::MoveTo { x: 0.0, y: 32.0 },
        PathCommand::QuadTo {
            x: 32.0,
            y: 32.0,
            control_x: 16.0,
            control_y: -16.0,
        },
        PathCommand::ClosePath,
    ]);
    r.fill(&mut p, &g, BLACK).unwrap();
    assert_eq!(px(&p, 16, 28), BLACK);
    assert_eq!(px(&p, 1, 1), WHITE);
}

#[test]
fn malformed_group_does_not_touch_target() {
    let mut r = CpuRasterizer::default();
    let mut p = vello_cpu::Pixmap::new(4, 4);
    r.clear(&mut p, WHITE);
    let g = PathGroup::new(vec![
        PathCommand::LineTo { x: 4.0, y: 4.0 },
        PathCommand::ClosePath,
    ]);
    let err = r.fill(&mut p, &g, BLACK).unwrap_err();
    assert!(matches!(err, PipelineError::MalformedPath(_)));
    assert!(p.data_as_u8_slice().iter().all(|&b| b == 255));

    let err = r.fill(&mut p, &PathGroup::default(), BLACK).unwrap_err();
    assert!(matches!(err, PipelineError::MalformedPath(_)));
}

#[test]
fn fill_rule_controls_holes() {
    let mut non_zero = CpuRasterizer::default();
    let mut even_odd = CpuRasterizer::new(CpuRasterizerOpts {
        fill_rule: FillRule::EvenOdd,
    });

    let mut a = vello_cpu::Pixmap::new(16, 16);
    non_zero.clear(&mut a, WHITE);
    non_zero.fill(&mut a, &nested_squares(), BLACK).unwrap();
    assert_eq!(px(&a, 8, 8), BLACK);

    let mut b = vello_cpu::Pixmap::new(16, 16);
    even_odd.clear(&mut b, WHITE);
    even_odd.fill(&mut b, &nested_squares(), BLACK).unwrap();
    assert_eq!(px(&b, 8, 8), WHITE);
    assert_eq!(px(&b, 1, 1), BLACK);
}

#[test]
fn rasterizer_adapts_to_new_target_sizes() {
    let mut r = CpuRasterizer::default();
    for (w, h) in [(8u16, 8u16), (12, 4)] {
        let mut p = vello_cpu::Pixmap::new(w, h);
        r.clear(&mut p, WHITE);
        r.fill(
            &mut p,
            &PathGroup::rect(0.0, 0.0, f64::from(w), f64::from(h)),
            BLACK,
        )
        .unwrap();
        assert_eq!(px(&p, w - 1, h - 1), BLACK);
    }
}
