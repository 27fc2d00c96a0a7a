use super::*;

fn tri() -> PathGroup {
    PathGroup::new(vec![
        PathCommand::MoveTo { x: 0.0, y: 0.0 },
        PathCommand::LineTo { x: 4.0, y: 0.0 },
        PathCommand::LineTo { x: 0.0, y: 4.0 },
        PathCommand::ClosePath,
    ])
}

#[test]
fn empty_group_is_malformed() {
    let err = PathGroup::default().validate().unwrap_err();
    assert!(matches!(err, PipelineError::MalformedPath(_)));
}

#[test]
fn group_must_start_with_move_to() {
    let g = PathGroup::new(vec![
        PathCommand::LineTo { x: 1.0, y: 1.0 },
        PathCommand::ClosePath,
    ]);
    assert!(matches!(
        g.validate().unwrap_err(),
        PipelineError::MalformedPath(_)
    ));

    let g = PathGroup::new(vec![PathCommand::ClosePath]);
    assert!(g.validate().is_err());
    assert!(tri().validate().is_ok());
}

#[test]
fn non_finite_coordinates_are_malformed() {
    let g = PathGroup::new(vec![
        PathCommand::MoveTo { x: 0.0, y: 0.0 },
        PathCommand::QuadTo {
            x: 1.0,
            y: 1.0,
            control_x: f64::NAN,
            control_y: 0.0,
        },
    ]);
    assert!(matches!(
        g.validate().unwrap_err(),
        PipelineError::MalformedPath(_)
    ));
}

#[test]
fn from_svg_keeps_subpaths_in_one_group() {
    let g = PathGroup::from_svg("M0,0 L10,0 L10,10 Z M2,2 L8,2 L8,8 Z").unwrap();
    let moves = g
        .commands()
        .iter()
        .filter(|c| matches!(c, PathCommand::MoveTo { .. }))
        .count();
    assert_eq!(moves, 2);
    assert!(g.validate().is_ok());
}

#[test]
fn from_svg_maps_quad_control_point() {
    let g = PathGroup::from_svg("M0,0 Q5,10 10,0").unwrap();
    assert_eq!(
        g.commands()[1],
        PathCommand::QuadTo {
            x: 10.0,
            y: 0.0,
            control_x: 5.0,
            control_y: 10.0,
        }
    );
}

#[test]
fn from_svg_approximates_cubics_with_quads() {
    let g = PathGroup::from_svg("M0,0 C0,10 10,10 10,0 Z").unwrap();
    assert!(
        g.commands()
            .iter()
            .all(|c| !matches!(c, PathCommand::LineTo { .. }))
    );
    let Some(PathCommand::QuadTo { x, y, .. }) = g.commands().iter().rev().nth(1).copied() else {
        panic!("expected a quad before close");
    };
    assert!((x - 10.0).abs() < 1e-9 && y.abs() < 1e-9);
}

#[test]
fn from_svg_rejects_garbage() {
    assert!(PathGroup::from_svg("M0,0 X5,5").is_err());
}

#[test]
fn progressive_accumulates_groups() {
    let groups = vec![tri(), tri(), tri()];
    let script = FrameScript::progressive(&groups, 2).unwrap();
    assert_eq!(script.len(), 2);
    assert_eq!(script.frames[0].groups().len(), 2);
    assert_eq!(script.frames[1].groups().len(), 3);

    let one = FrameScript::progressive(&groups, 1).unwrap();
    let counts: Vec<_> = one.frames.iter().map(|f| f.groups().len()).collect();
    assert_eq!(counts, vec![1, 2, 3]);

    assert!(FrameScript::progressive(&groups, 0).is_err());
    assert!(FrameScript::progressive(&[], 3).unwrap().is_empty());
}

#[test]
fn json_uses_tagged_commands() {
    let json = r#"{
        "frames": [
            [],
            [[{"op":"move_to","x":0,"y":0},{"op":"line_to","x":4,"y":0},
              {"op":"quad_to","x":4,"y":4,"control_x":6,"control_y":2},{"op":"close_path"}]]
        ]
    }"#;
    let script = FrameScript::from_json_str(json).unwrap();
    assert_eq!(script.len(), 2);
    assert!(script.frames[0].groups().is_empty());
    assert_eq!(script.frames[1].groups()[0].commands().len(), 4);
    assert!(script.validate().is_ok());

    assert!(matches!(
        FrameScript::from_json_str("{\"frames\": [[[{\"op\":\"warp\"}]]]}").unwrap_err(),
        PipelineError::Serde(_)
    ));
}

#[test]
fn validate_reports_frame_and_group() {
    let bad = PathGroup::new(vec![PathCommand::LineTo { x: 0.0, y: 0.0 }]);
    let script = FrameScript::new(vec![
        FrameDescriptor::blank(),
        FrameDescriptor::new(vec![tri(), bad]),
    ]);
    let err = script.validate().unwrap_err().to_string();
    assert!(err.contains("frame 1 group 1"), "{err}");
}
