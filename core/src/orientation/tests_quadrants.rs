use super::*;
use crate::geometry::{ApproxEq, LinearSpan};
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

fn p(x: f64, y: f64, z: f64) -> Point3 {
    Point3::new(x, y, z)
}

fn solve_y(start: Point3, end: Point3) -> Result<f64, NotApplicable> {
    solve(&start, &end, &Vector3::y())
}

#[test]
fn test_equal_y_uses_raw_angle() {
    let angle = solve_y(p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0)).unwrap();
    assert!(angle.approx_eq(&FRAC_PI_2));

    let angle = solve_y(p(1.0, 0.0, 0.0), p(0.0, 0.0, 0.0)).unwrap();
    assert!(angle.approx_eq(&FRAC_PI_2));
}

#[test]
fn test_y_greater_x_greater() {
    let angle = solve_y(p(1.0, 1.0, 0.0), p(0.0, 0.0, 0.0)).unwrap();
    assert!(angle.approx_eq(&(PI + 3.0 * FRAC_PI_4)));
}

#[test]
fn test_y_greater_x_less() {
    let angle = solve_y(p(0.0, 1.0, 0.0), p(1.0, 0.0, 0.0)).unwrap();
    assert!(angle.approx_eq(&(2.0 * PI - 3.0 * FRAC_PI_4)));
}

#[test]
fn test_y_less_x_greater() {
    let angle = solve_y(p(1.0, 0.0, 0.0), p(0.0, 1.0, 0.0)).unwrap();
    assert!(angle.approx_eq(&(PI + FRAC_PI_4)));
}

#[test]
fn test_y_less_x_less() {
    let angle = solve_y(p(0.0, 0.0, 0.0), p(1.0, 1.0, 0.0)).unwrap();
    assert!(angle.approx_eq(&(2.0 * PI - FRAC_PI_4)));
}

#[test]
fn test_equal_x_is_unhandled() {
    // Run along Y falls outside the quadrant table
    let start = p(0.0, 0.0, 0.0);
    let end = p(0.0, 1.0, 0.0);
    assert_eq!(solve_y(start, end), Err(NotApplicable::UnhandledQuadrant));
    assert!(y_angle(&start, &end, &Vector3::y()).unwrap().approx_eq(&0.0));

    assert_eq!(
        solve_y(p(3.0, 5.0, 0.0), p(3.0, 1.0, 0.0)),
        Err(NotApplicable::UnhandledQuadrant)
    );
}

#[test]
fn test_vertical_segment_not_applicable() {
    assert_eq!(
        solve_y(p(2.0, 2.0, 0.0), p(2.0, 2.0, 5.0)),
        Err(NotApplicable::NoHorizontalExtent)
    );
}

#[test]
fn test_slope_does_not_change_angle() {
    let flat = solve_y(p(0.0, 0.0, 0.0), p(4.0, 3.0, 0.0)).unwrap();
    let sloped = solve_y(p(0.0, 0.0, 0.0), p(4.0, 3.0, 2.5)).unwrap();
    assert!(flat.approx_eq(&sloped));
}

#[test]
fn test_rotated_axis_runs_along_pipe() {
    let cases = [
        (p(0.0, 0.0, 0.0), p(5.0, 0.0, 0.0)),
        (p(3.0, 4.0, 0.0), p(-1.0, 1.0, 0.0)),
        (p(-2.0, 6.0, 1.0), p(4.0, -3.0, 1.0)),
        (p(7.0, -1.0, 0.0), p(2.0, 8.0, 0.0)),
        (p(0.0, 0.0, 0.0), p(2.0, 9.0, 0.0)),
    ];
    for (start, end) in cases {
        let angle = solve_y(start, end).unwrap();
        let o = Orientation::about_vertical(start, angle);
        let support_axis = o.rotate(&Vector3::y());
        let pipe_dir = Point3::new(end.x, end.y, start.z) - start;
        let cross = support_axis.cross(&pipe_dir.normalize());
        assert!(cross.norm() < 1e-9, "{:?} -> {:?}: axis {:?}", start, end, support_axis);
    }
}

#[test]
fn test_orient_axis_through_point() {
    let span = LinearSpan::new(p(0.0, 0.0, 3.0), p(10.0, 0.0, 3.0)).unwrap();
    let at = p(2.5, 0.0, 3.0);
    let o = OrientationSolver::default().orient(&Centerline::Line(span), at).unwrap();
    assert!(o.axis.origin.approx_eq(&at));
    assert!(o.axis.direction.approx_eq(&Vector3::z()));
    assert!(o.angle.approx_eq(&FRAC_PI_2));
}

#[test]
fn test_curved_centerline_not_applicable() {
    let line = Centerline::polyline(vec![p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(1.0, 1.0, 0.0)]).unwrap();
    let res = OrientationSolver::default().orient(&line, p(1.0, 0.0, 0.0));
    assert_eq!(res, Err(NotApplicable::CurvedCenterline));
}
