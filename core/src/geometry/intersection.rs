//! Ray intersection against axis-aligned boxes.

use super::{Aabb, Ray};

/// Intersect a ray with a box using the slab method.
/// Returns `(t_enter, t_exit)` along the ray, or None if the ray misses or
/// the box lies entirely behind the origin.
///
/// `t_enter` is negative when the origin is inside the box.
pub fn ray_aabb_intersect(ray: &Ray, aabb: &Aabb) -> Option<(f64, f64)> {
    let mut t_min = f64::NEG_INFINITY;
    let mut t_max = f64::INFINITY;

    for axis in 0..3 {
        let o = ray.origin[axis];
        let d = ray.direction[axis];
        let (lo, hi) = (aabb.min[axis], aabb.max[axis]);

        if d.abs() < 1e-12 {
            // Parallel to this slab: origin must already be inside it
            if o < lo || o > hi {
                return None;
            }
            continue;
        }

        let mut t0 = (lo - o) / d;
        let mut t1 = (hi - o) / d;
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }
        t_min = t_min.max(t0);
        t_max = t_max.min(t1);
        if t_min > t_max {
            return None;
        }
    }

    if t_max < 0.0 {
        return None;
    }
    Some((t_min, t_max))
}

/// Distance along the ray to the first face it crosses: the entry face, or
/// the exit face when the origin is inside the box.
pub fn first_crossing(ray: &Ray, aabb: &Aabb) -> Option<f64> {
    ray_aabb_intersect(ray, aabb).map(|(enter, exit)| if enter >= 0.0 { enter } else { exit })
}
