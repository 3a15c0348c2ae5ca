//! Vertex and face extraction on top of [`PlyReader`].

use crate::error::{PlyError, Result};
use crate::ply::reader::PlyReader;
use crate::ply::store::Cell;
use crate::ply::vertex::PlyVertex;
use glam::Vec3;
use tracing::{debug, info};

/// Read positions, and normals and colors where present, from the `vertex`
/// element.
#[tracing::instrument(skip_all)]
pub fn load_vertices(ply: &PlyReader) -> Result<Vec<PlyVertex>> {
    let vertex = ply
        .find_element("vertex")
        .ok_or_else(|| PlyError::MissingElement("vertex".to_string()))?;

    let require = |name: &str| -> Result<usize> {
        ply.find_property(vertex, name)?
            .ok_or_else(|| PlyError::MissingProperty {
                element: "vertex".to_string(),
                property: name.to_string(),
            })
    };
    let position = [require("x")?, require("y")?, require("z")?];
    let normal = optional_triple(ply, vertex, ["nx", "ny", "nz"])?;
    let color = optional_triple(ply, vertex, ["red", "green", "blue"])?;

    let count = ply.element_size(vertex)?;
    let mut vertices = Vec::with_capacity(count);
    for row in 0..count {
        let value_triple = |props: [usize; 3]| -> Result<Vec3> {
            Ok(Vec3::new(
                ply.get_value(vertex, row, props[0])? as f32,
                ply.get_value(vertex, row, props[1])? as f32,
                ply.get_value(vertex, row, props[2])? as f32,
            ))
        };
        let byte_color = |props: [usize; 3]| -> Result<Vec3> {
            let channel =
                |p: usize| -> Result<f32> { Ok(ply.get_byte(vertex, row, p)?.min(255) as f32 / 255.0) };
            Ok(Vec3::new(channel(props[0])?, channel(props[1])?, channel(props[2])?))
        };

        vertices.push(PlyVertex {
            position: value_triple(position)?,
            normal: normal.map(value_triple).transpose()?,
            color: color.map(byte_color).transpose()?,
        });
    }

    debug!(
        "Loaded {} vertices (normals: {}, colors: {})",
        vertices.len(),
        normal.is_some(),
        color.is_some()
    );
    Ok(vertices)
}

/// Read the `face` element's vertex index lists.
///
/// Accepts `vertex_indices` or `vertex_index`, stored as signed or unsigned
/// integers.
#[tracing::instrument(skip_all)]
pub fn load_faces(ply: &PlyReader) -> Result<Vec<Vec<u32>>> {
    let face = ply
        .find_element("face")
        .ok_or_else(|| PlyError::MissingElement("face".to_string()))?;
    let prop = match ply.find_property(face, "vertex_indices")? {
        Some(prop) => prop,
        None => ply
            .find_property(face, "vertex_index")?
            .ok_or_else(|| PlyError::MissingProperty {
                element: "face".to_string(),
                property: "vertex_indices".to_string(),
            })?,
    };

    let count = ply.element_size(face)?;
    let mut faces = Vec::with_capacity(count);
    for row in 0..count {
        let indices = match ply.cell(face, row, prop)? {
            Cell::ByteList(_) => ply
                .get_byte_list(face, row, prop)?
                .iter()
                .map(|&i| u32::try_from(i).map_err(|_| invalid(row, i128::from(i))))
                .collect::<Result<Vec<u32>>>()?,
            _ => ply
                .get_index_list(face, row, prop)?
                .iter()
                .map(|&i| u32::try_from(i).map_err(|_| invalid(row, i128::from(i))))
                .collect::<Result<Vec<u32>>>()?,
        };
        faces.push(indices);
    }

    info!("Loaded {} faces", faces.len());
    Ok(faces)
}

fn invalid(face: usize, index: i128) -> PlyError {
    PlyError::InvalidFaceIndex { face, index }
}

/// All three properties, or `None` if any is missing.
fn optional_triple(ply: &PlyReader, element: usize, names: [&str; 3]) -> Result<Option<[usize; 3]>> {
    let mut found = [0; 3];
    for (slot, name) in found.iter_mut().zip(names) {
        match ply.find_property(element, name)? {
            Some(index) => *slot = index,
            None => return Ok(None),
        }
    }
    Ok(Some(found))
}
