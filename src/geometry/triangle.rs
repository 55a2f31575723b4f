//! Triangle primitive: storage, derived AABB/centroid, closest-point and
//! ray-intersection tests, following Ericson's *Real-Time Collision
//! Detection* and the standard Möller–Trumbore derivation.

use super::bbox::Aabb;
use super::vector::Vec3;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Zeroable, bytemuck::Pod)]
pub struct Triangle {
    pub v0: Vec3,
    pub v1: Vec3,
    pub v2: Vec3,
}

impl Triangle {
    pub fn new(v0: Vec3, v1: Vec3, v2: Vec3) -> Self {
        Self { v0, v1, v2 }
    }

    pub fn aabb(&self) -> Aabb {
        Aabb::from_points(self.v0, self.v1, self.v2)
    }

    pub fn centroid(&self) -> Vec3 {
        (self.v0 + self.v1 + self.v2) / 3.0
    }
}

/// Result of a point/ray query against a single triangle: squared (for
/// point queries) or linear (for ray queries — see `RayHit`) distance,
/// barycentric coordinates `(u, v, w)` with `u + v + w == 1`, and the
/// closest/hit point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosestPoint {
    pub point: Vec3,
    pub barycentric: (f32, f32, f32),
    pub dist_sq: f32,
}

/// Closest point on a triangle to `p`, via Ericson's Voronoi-region
/// classification (*Real-Time Collision Detection*, §5.1.5). The six
/// regions are tested in a fixed order — vertex A, vertex B, edge AB,
/// vertex C, edge AC, edge BC, face interior — so that ties on shared
/// features (e.g. a point exactly above a shared vertex of two triangles)
/// resolve deterministically.
pub fn closest_point(tri: &Triangle, p: Vec3) -> ClosestPoint {
    let (a, b, c) = (tri.v0, tri.v1, tri.v2);

    let ab = b - a;
    let ac = c - a;
    let ap = p - a;
    let d1 = ab.dot(ap);
    let d2 = ac.dot(ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        // vertex A region
        return ClosestPoint { point: a, barycentric: (1.0, 0.0, 0.0), dist_sq: (p - a).length_squared() };
    }

    let bp = p - b;
    let d3 = ab.dot(bp);
    let d4 = ac.dot(bp);
    if d3 >= 0.0 && d4 <= d3 {
        // vertex B region
        return ClosestPoint { point: b, barycentric: (0.0, 1.0, 0.0), dist_sq: (p - b).length_squared() };
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        // edge AB region
        let v = d1 / (d1 - d3);
        let point = a + ab * v;
        return ClosestPoint { point, barycentric: (1.0 - v, v, 0.0), dist_sq: (p - point).length_squared() };
    }

    let cp = p - c;
    let d5 = ab.dot(cp);
    let d6 = ac.dot(cp);
    if d6 >= 0.0 && d5 <= d6 {
        // vertex C region
        return ClosestPoint { point: c, barycentric: (0.0, 0.0, 1.0), dist_sq: (p - c).length_squared() };
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        // edge AC region
        let w = d2 / (d2 - d6);
        let point = a + ac * w;
        return ClosestPoint { point, barycentric: (1.0 - w, 0.0, w), dist_sq: (p - point).length_squared() };
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        // edge BC region
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        let point = b + (c - b) * w;
        return ClosestPoint { point, barycentric: (0.0, 1.0 - w, w), dist_sq: (p - point).length_squared() };
    }

    // face interior region
    let denom = 1.0 / (va + vb + vc);
    let v = vb * denom;
    let w = vc * denom;
    let point = a + ab * v + ac * w;
    ClosestPoint { point, barycentric: (1.0 - v - w, v, w), dist_sq: (p - point).length_squared() }
}

/// Parametric ray-triangle hit: `t` along the ray, barycentric
/// coordinates, and the hit point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub t: f32,
    pub point: Vec3,
    pub barycentric: (f32, f32, f32),
}

/// Möller–Trumbore ray-triangle intersection. Returns `None` for: parallel
/// (degenerate) rays, `u`/`v` outside `[0, 1]`, `u + v > 1`, or `t < 0`.
pub fn intersect_ray(tri: &Triangle, origin: Vec3, direction: Vec3) -> Option<RayHit> {
    const EPSILON: f32 = 1e-8;
    let edge1 = tri.v1 - tri.v0;
    let edge2 = tri.v2 - tri.v0;
    let pvec = direction.cross(edge2);
    let det = edge1.dot(pvec);
    if det.abs() < EPSILON {
        return None;
    }
    let inv_det = 1.0 / det;
    let tvec = origin - tri.v0;
    let u = tvec.dot(pvec) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let qvec = tvec.cross(edge1);
    let v = direction.dot(qvec) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = edge2.dot(qvec) * inv_det;
    if t < 0.0 {
        return None;
    }
    let point = origin + direction * t;
    Some(RayHit { t, point, barycentric: (1.0 - u - v, u, v) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::vector::vec3;
    use approx::assert_relative_eq;

    fn unit_triangle() -> Triangle {
        Triangle::new(vec3(0.0, 0.0, 0.0), vec3(1.0, 0.0, 0.0), vec3(0.0, 1.0, 0.0))
    }

    #[test]
    fn vertex_query_is_exact() {
        let tri = unit_triangle();
        let cp = closest_point(&tri, tri.v0);
        assert_eq!(cp.dist_sq, 0.0);
        assert_eq!(cp.barycentric, (1.0, 0.0, 0.0));
    }

    #[test]
    fn centroid_query_is_one_third_each() {
        let tri = unit_triangle();
        let centroid = tri.centroid();
        let cp = closest_point(&tri, centroid);
        assert_relative_eq!(cp.dist_sq, 0.0, epsilon = 1e-6);
        assert_relative_eq!(cp.barycentric.0, 1.0 / 3.0, epsilon = 1e-5);
        assert_relative_eq!(cp.barycentric.1, 1.0 / 3.0, epsilon = 1e-5);
        assert_relative_eq!(cp.barycentric.2, 1.0 / 3.0, epsilon = 1e-5);
    }

    #[test]
    fn point_above_face_projects_to_interior() {
        let tri = unit_triangle();
        let p = vec3(0.25, 0.25, 2.0);
        let cp = closest_point(&tri, p);
        assert_relative_eq!(cp.dist_sq, 4.0, epsilon = 1e-4);
        let sum = cp.barycentric.0 + cp.barycentric.1 + cp.barycentric.2;
        assert_relative_eq!(sum, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn ray_parallel_to_plane_misses() {
        let tri = unit_triangle();
        let hit = intersect_ray(&tri, vec3(0.0, 0.0, 1.0), vec3(1.0, 0.0, 0.0));
        assert!(hit.is_none());
    }

    #[test]
    fn ray_pointing_away_misses() {
        let tri = unit_triangle();
        let hit = intersect_ray(&tri, vec3(0.1, 0.1, 1.0), vec3(0.0, 0.0, 1.0));
        assert!(hit.is_none());
    }

    #[test]
    fn ray_through_face_hits() {
        let tri = unit_triangle();
        let hit = intersect_ray(&tri, vec3(0.1, 0.1, 5.0), vec3(0.0, 0.0, -1.0))
            .expect("ray should hit the triangle");
        assert_relative_eq!(hit.t, 5.0, epsilon = 1e-5);
        assert_relative_eq!(hit.point.2, 0.0, epsilon = 1e-5);
    }
}
