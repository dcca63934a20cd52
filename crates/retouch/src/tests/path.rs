use crate::error::PathError;
use crate::svg::PathData;

const LOOP: &str = "M 75,133 C 135,123 135,153 75,143";

#[test]
fn self_loop_detection() {
    assert!(PathData::parse(LOOP).unwrap().is_self_loop());
    assert!(!PathData::parse("M 76,128 L 271,128").unwrap().is_self_loop());
    // Curved but ending somewhere else entirely.
    assert!(
        !PathData::parse("M 0,0 C 10,10 20,10 30,30")
            .unwrap()
            .is_self_loop()
    );
}

#[test]
fn flip_mirrors_control_points_only() {
    let flipped = PathData::parse(LOOP).unwrap().flip_horizontal();
    assert_eq!(flipped, "M 75,133 C 15,123 15,153 75,143");
}

#[test]
fn flip_twice_restores_the_original_text() {
    let once = PathData::parse(LOOP).unwrap().flip_horizontal();
    let twice = PathData::parse(&once).unwrap().flip_horizontal();
    assert_eq!(twice, LOOP);
}

#[test]
fn flip_handles_relative_curves() {
    let d = "M 100,50 c 40,-10 40,20 0,10";
    let path = PathData::parse(d).unwrap();
    assert!(path.is_self_loop());
    let flipped = path.flip_horizontal();
    assert_eq!(flipped, "M 100,50 c -40,-10 -40,20 0,10");
    assert_eq!(PathData::parse(&flipped).unwrap().flip_horizontal(), d);
}

#[test]
fn translate_moves_absolute_coordinates() {
    let moved = PathData::parse(LOOP).unwrap().translate(10.0, -5.0);
    assert_eq!(moved, "M 85,128 C 145,118 145,148 85,138");
}

#[test]
fn translate_leaves_relative_segments_alone() {
    let moved = PathData::parse("M10 20 l5 5 h3").unwrap().translate(1.5, 2.0);
    assert_eq!(moved, "M11.5 22 l5 5 h3");
}

#[test]
fn start_and_end_points_resolve_relative_segments() {
    let path = PathData::parse("m 10 10 l 5 0 v 5 z").unwrap();
    assert_eq!(path.start_point(), (10.0, 10.0));
    assert_eq!(path.end_point(), (10.0, 10.0));
}

#[test]
fn malformed_path_data_is_rejected() {
    assert!(matches!(PathData::parse(""), Err(PathError::Empty)));
    assert!(matches!(
        PathData::parse("L 1 2"),
        Err(PathError::MissingMoveTo)
    ));
    assert!(matches!(
        PathData::parse("M 1 2 C 3 4 5"),
        Err(PathError::TruncatedArguments { command: 'C' })
    ));
}

#[test]
fn hull_points_cover_controls_and_ends() {
    let hull = PathData::parse(LOOP).unwrap().hull_points();
    assert_eq!(
        hull,
        vec![(75.0, 133.0), (135.0, 123.0), (135.0, 153.0), (75.0, 143.0)]
    );
}

#[test]
fn flip_keeps_fractional_centres_exact() {
    let d = "M 164.6875,273 C 224.6875,263 224.6875,303 164.6875,283";
    let once = PathData::parse(d).unwrap().flip_horizontal();
    assert_eq!(once, "M 164.6875,273 C 104.6875,263 104.6875,303 164.6875,283");
    assert_eq!(PathData::parse(&once).unwrap().flip_horizontal(), d);
}

#[test]
fn flip_round_trip_keeps_the_geometry_of_padded_numbers() {
    let d = "M 100.5,20 C 160.25,40 160.0,80 100.5,100";
    let once = PathData::parse(d).unwrap().flip_horizontal();
    assert_eq!(once, "M 100.5,20 C 40.75,40 41,80 100.5,100");
    let twice = PathData::parse(&PathData::parse(&once).unwrap().flip_horizontal()).unwrap();
    assert!(twice.same_geometry(&PathData::parse(d).unwrap()));
}
