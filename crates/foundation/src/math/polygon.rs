//! Planar polygon helpers used for marker and label placement.
//!
//! Rings are lists of lon/lat vertices. A closing vertex equal to the first
//! one is tolerated and ignored.

use super::Vec2;

pub type Ring = Vec<Vec2>;

fn open_ring(ring: &[Vec2]) -> &[Vec2] {
    if ring.len() >= 2 {
        let first = ring[0];
        let last = ring[ring.len() - 1];
        if (first.x - last.x).abs() < 1e-12 && (first.y - last.y).abs() < 1e-12 {
            return &ring[..ring.len() - 1];
        }
    }
    ring
}

/// Signed shoelace area. Counter-clockwise rings are positive.
pub fn ring_signed_area(ring: &[Vec2]) -> f64 {
    let pts = open_ring(ring);
    if pts.len() < 3 {
        return 0.0;
    }
    let mut twice = 0.0;
    for (i, a) in pts.iter().enumerate() {
        let b = pts[(i + 1) % pts.len()];
        twice += a.cross(b);
    }
    twice * 0.5
}

pub fn ring_area(ring: &[Vec2]) -> f64 {
    ring_signed_area(ring).abs()
}

/// Vertex-averaged centroid of a ring.
pub fn ring_centroid(ring: &[Vec2]) -> Option<Vec2> {
    let mut sum = Vec2::ZERO;
    let mut count = 0.0_f64;
    for v in open_ring(ring) {
        if v.is_finite() {
            sum = sum + *v;
            count += 1.0;
        }
    }
    if count <= 0.0 {
        return None;
    }
    Some(sum.scale(1.0 / count))
}

/// Centroid of the largest-area ring among `rings`.
///
/// Ties keep the first ring, so single-part polygons resolve to their outer ring
/// as long as it is not smaller than a hole.
pub fn largest_ring_centroid<'a>(rings: impl IntoIterator<Item = &'a [Vec2]>) -> Option<Vec2> {
    let mut best: Option<(&[Vec2], f64)> = None;
    for ring in rings {
        let area = ring_area(ring);
        let replace = match best {
            Some((_, a)) => area > a,
            None => true,
        };
        if replace {
            best = Some((ring, area));
        }
    }
    ring_centroid(best?.0)
}
