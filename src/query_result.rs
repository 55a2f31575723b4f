//! Shared result shape for nearest-point and nearest-ray-hit queries.
//! Both traversal variants (stack, best-first) must agree on this type up
//! to tie-breaking by triangle index.

use crate::geometry::Vec3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryResult {
    pub closest_point: Vec3,
    /// `None` when the mesh is empty, or (for ray queries) when no
    /// triangle is hit.
    pub closest_face: Option<u32>,
    pub barycentric: (f32, f32, f32),
    /// Squared distance for point queries, linear `t` distance for ray
    /// queries; `f32::INFINITY` signals "no hit" for rays.
    pub distance: f32,
}

impl QueryResult {
    pub fn miss() -> Self {
        Self {
            closest_point: Vec3::ZERO,
            closest_face: None,
            barycentric: (0.0, 0.0, 0.0),
            distance: f32::INFINITY,
        }
    }
}
