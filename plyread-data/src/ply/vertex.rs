//! PLY vertex data structures

use glam::Vec3;

/// Vertex attributes extracted from a `vertex` element.
#[derive(Debug, Clone, PartialEq)]
pub struct PlyVertex {
    pub position: Vec3,
    /// Present when the element carries `nx`, `ny`, `nz`.
    pub normal: Option<Vec3>,
    /// RGB in 0-1, present when the element carries `red`, `green`, `blue`.
    pub color: Option<Vec3>,
}

impl PlyVertex {
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            normal: None,
            color: None,
        }
    }
}

/// Axis-aligned bounds of a vertex set as `(min, max)`.
pub fn bounding_box(vertices: &[PlyVertex]) -> Option<(Vec3, Vec3)> {
    let first = vertices.first()?.position;
    Some(
        vertices
            .iter()
            .fold((first, first), |(min, max), v| (min.min(v.position), max.max(v.position))),
    )
}
