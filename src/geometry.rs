//! Small 2D helpers shared by placement and symmetry operations.

use std::f64::consts::TAU;

use glam::DVec2;

/// Wrap an angle into `[0, 2π)`.
pub fn normalize_angle(a: f64) -> f64 {
    let r = a.rem_euclid(TAU);
    if r >= TAU {
        r - TAU
    } else {
        r
    }
}

/// Round an angle to the nearest multiple of `increment`.
pub fn snap_angle(a: f64, increment: f64) -> f64 {
    (a / increment).round() * increment
}

/// Widest angular gap between the given directions, scanning around the
/// circle with wrap-around. Returns `(start, width)` where the gap spans
/// `start .. start + width` counter-clockwise. A single direction leaves
/// the whole circle as its gap.
pub fn largest_gap(directions: &[f64]) -> Option<(f64, f64)> {
    if directions.is_empty() {
        return None;
    }
    let mut angles: Vec<f64> = directions.iter().map(|&a| normalize_angle(a)).collect();
    angles.sort_by(f64::total_cmp);

    let last = angles[angles.len() - 1];
    let mut best_start = last;
    let mut best_width = angles[0] + TAU - last;
    for w in angles.windows(2) {
        let width = w[1] - w[0];
        if width > best_width {
            best_start = w[0];
            best_width = width;
        }
    }
    Some((best_start, best_width))
}

/// Rotate `p` counter-clockwise about `center`.
pub fn rotate_about(p: DVec2, center: DVec2, angle: f64) -> DVec2 {
    center + DVec2::from_angle(angle).rotate(p - center)
}

/// Point-reflect `p` through `center`.
pub fn reflect_through(p: DVec2, center: DVec2) -> DVec2 {
    center + (center - p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn normalize_wraps_both_directions() {
        assert!(close(normalize_angle(0.0), 0.0));
        assert!(close(normalize_angle(TAU + 1.0), 1.0));
        assert!(close(normalize_angle(-FRAC_PI_2), 1.5 * PI));
        assert!(close(normalize_angle(3.0 * TAU), 0.0));
    }

    #[test]
    fn snap_to_fifteen_degrees() {
        let inc = 15f64.to_radians();
        assert!(close(snap_angle(14f64.to_radians(), inc), inc));
        assert!(close(snap_angle(7f64.to_radians(), inc), 0.0));
        assert!(close(snap_angle(97f64.to_radians(), inc), 90f64.to_radians()));
    }

    #[test]
    fn gap_of_single_direction_is_full_circle() {
        let (start, width) = largest_gap(&[1.0]).unwrap();
        assert!(close(start, 1.0));
        assert!(close(width, TAU));
    }

    #[test]
    fn gap_between_two_directions() {
        // directions at 0 and 90 degrees: the big gap runs 90 -> 360
        let (start, width) = largest_gap(&[0.0, FRAC_PI_2]).unwrap();
        assert!(close(start, FRAC_PI_2));
        assert!(close(width, 1.5 * PI));
    }

    #[test]
    fn gap_handles_wrap_around() {
        // directions at 350 and 10 degrees: big gap starts at 10
        let (start, width) = largest_gap(&[350f64.to_radians(), 10f64.to_radians()]).unwrap();
        assert!(close(start, 10f64.to_radians()));
        assert!(close(width, 340f64.to_radians()));
    }

    #[test]
    fn gap_of_empty_input_is_none() {
        assert!(largest_gap(&[]).is_none());
    }

    #[test]
    fn rotate_quarter_turn() {
        let p = rotate_about(DVec2::new(2.0, 0.0), DVec2::ZERO, FRAC_PI_2);
        assert!(close(p.x, 0.0));
        assert!(close(p.y, 2.0));
    }

    #[test]
    fn rotate_about_offset_center() {
        let p = rotate_about(DVec2::new(2.0, 1.0), DVec2::new(1.0, 1.0), PI);
        assert!(close(p.x, 0.0));
        assert!(close(p.y, 1.0));
    }

    #[test]
    fn reflection_is_involutive() {
        let c = DVec2::new(3.0, -2.0);
        let p = DVec2::new(5.5, 1.0);
        let q = reflect_through(p, c);
        assert!(close(q.x, 0.5));
        assert!(close(q.y, -5.0));
        let back = reflect_through(q, c);
        assert!(close(back.x, p.x));
        assert!(close(back.y, p.y));
    }
}
