//! Wavefront OBJ mesh loading.

use crate::{AssetError, Result};
use glam::{Vec2, Vec3};
use std::collections::HashMap;
use std::path::Path;

/// One interleaved vertex as consumed by the mesh pipelines.
///
/// Layout must match the vertex shader input exactly.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub color: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    /// Size in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();
}

/// Buffer-ready mesh data.
#[derive(Debug, Default, Clone)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Load and index a mesh from an OBJ file.
    ///
    /// Faces are fan-triangulated; identical position/normal/uv triples
    /// are deduplicated into shared indices.
    pub fn load_obj(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| AssetError::Io {
            path: path.display().to_string(),
            source: e,
        })?;

        let mesh = parse_obj(&text).map_err(|message| AssetError::MalformedObj {
            path: path.display().to_string(),
            message,
        })?;

        tracing::debug!(
            "Loaded {}: {} vertices, {} indices",
            path.display(),
            mesh.vertices.len(),
            mesh.indices.len()
        );

        Ok(mesh)
    }

    /// Generate a flat grid in the XZ plane, centered on the origin,
    /// with `subdivisions` quads per side. Used for the water surface.
    pub fn plane(size: f32, subdivisions: u32) -> Self {
        let verts_per_side = subdivisions + 1;
        let mut vertices = Vec::with_capacity((verts_per_side * verts_per_side) as usize);

        for z in 0..verts_per_side {
            for x in 0..verts_per_side {
                let u = x as f32 / subdivisions as f32;
                let v = z as f32 / subdivisions as f32;
                vertices.push(Vertex {
                    position: [(u - 0.5) * size, 0.0, (v - 0.5) * size],
                    color: [1.0, 1.0, 1.0],
                    normal: [0.0, -1.0, 0.0],
                    uv: [u, v],
                });
            }
        }

        let mut indices = Vec::with_capacity((subdivisions * subdivisions * 6) as usize);
        for z in 0..subdivisions {
            for x in 0..subdivisions {
                let top_left = z * verts_per_side + x;
                let top_right = top_left + 1;
                let bottom_left = top_left + verts_per_side;
                let bottom_right = bottom_left + 1;

                indices.extend_from_slice(&[
                    top_left,
                    bottom_left,
                    top_right,
                    top_right,
                    bottom_left,
                    bottom_right,
                ]);
            }
        }

        Self { vertices, indices }
    }
}

/// Reference into the OBJ attribute streams: (position, uv, normal),
/// 0-based, usize::MAX when absent.
type VertexKey = (usize, usize, usize);

fn parse_obj(text: &str) -> std::result::Result<MeshData, String> {
    let mut positions: Vec<Vec3> = Vec::new();
    let mut uvs: Vec<Vec2> = Vec::new();
    let mut normals: Vec<Vec3> = Vec::new();

    let mut vertices: Vec<Vertex> = Vec::new();
    let mut indices: Vec<u32> = Vec::new();
    let mut unique: HashMap<VertexKey, u32> = HashMap::new();

    for (line_no, line) in text.lines().enumerate() {
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("v") => {
                let v = parse_floats::<3>(&mut parts)
                    .ok_or_else(|| format!("line {}: bad vertex", line_no + 1))?;
                positions.push(Vec3::from_array(v));
            }
            Some("vt") => {
                let v = parse_floats::<2>(&mut parts)
                    .ok_or_else(|| format!("line {}: bad texcoord", line_no + 1))?;
                uvs.push(Vec2::from_array(v));
            }
            Some("vn") => {
                let v = parse_floats::<3>(&mut parts)
                    .ok_or_else(|| format!("line {}: bad normal", line_no + 1))?;
                normals.push(Vec3::from_array(v));
            }
            Some("f") => {
                let corners: Vec<VertexKey> = parts
                    .map(|corner| parse_corner(corner, positions.len(), uvs.len(), normals.len()))
                    .collect::<std::result::Result<_, _>>()
                    .map_err(|e| format!("line {}: {e}", line_no + 1))?;

                if corners.len() < 3 {
                    return Err(format!("line {}: face with < 3 corners", line_no + 1));
                }

                // Fan triangulation
                for i in 1..corners.len() - 1 {
                    for &key in &[corners[0], corners[i], corners[i + 1]] {
                        let index = *unique.entry(key).or_insert_with(|| {
                            let (pi, ti, ni) = key;
                            let vertex = Vertex {
                                position: positions[pi].to_array(),
                                color: [1.0, 1.0, 1.0],
                                normal: if ni == usize::MAX {
                                    [0.0, 0.0, 0.0]
                                } else {
                                    normals[ni].to_array()
                                },
                                uv: if ti == usize::MAX {
                                    [0.0, 0.0]
                                } else {
                                    uvs[ti].to_array()
                                },
                            };
                            vertices.push(vertex);
                            (vertices.len() - 1) as u32
                        });
                        indices.push(index);
                    }
                }
            }
            // Comments, groups, materials, smoothing
            _ => {}
        }
    }

    if vertices.is_empty() {
        return Err("no faces".to_string());
    }

    Ok(MeshData { vertices, indices })
}

fn parse_floats<'a, const N: usize>(
    parts: &mut impl Iterator<Item = &'a str>,
) -> Option<[f32; N]> {
    let mut out = [0.0f32; N];
    for slot in &mut out {
        *slot = parts.next()?.parse().ok()?;
    }
    Some(out)
}

fn parse_corner(
    corner: &str,
    n_positions: usize,
    n_uvs: usize,
    n_normals: usize,
) -> std::result::Result<VertexKey, String> {
    let mut fields = corner.split('/');

    let pi = resolve_index(fields.next(), n_positions)?
        .ok_or_else(|| format!("corner '{corner}' missing position"))?;
    let ti = resolve_index(fields.next(), n_uvs)?;
    let ni = resolve_index(fields.next(), n_normals)?;

    Ok((
        pi,
        ti.unwrap_or(usize::MAX),
        ni.unwrap_or(usize::MAX),
    ))
}

/// OBJ indices are 1-based; negative indices count from the end.
fn resolve_index(
    field: Option<&str>,
    len: usize,
) -> std::result::Result<Option<usize>, String> {
    let Some(field) = field else {
        return Ok(None);
    };
    if field.is_empty() {
        return Ok(None);
    }

    let raw: i64 = field
        .parse()
        .map_err(|_| format!("bad index '{field}'"))?;

    let index = if raw > 0 {
        (raw - 1) as usize
    } else if raw < 0 {
        let back = (-raw) as usize;
        if back > len {
            return Err(format!("index {raw} out of range"));
        }
        len - back
    } else {
        return Err("index 0 is invalid".to_string());
    };

    if index >= len {
        return Err(format!("index {raw} out of range (count {len})"));
    }
    Ok(Some(index))
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUAD: &str = "\
# a unit quad
v 0.0 0.0 0.0
v 1.0 0.0 0.0
v 1.0 1.0 0.0
v 0.0 1.0 0.0
vt 0.0 0.0
vt 1.0 0.0
vt 1.0 1.0
vt 0.0 1.0
vn 0.0 0.0 1.0
f 1/1/1 2/2/1 3/3/1 4/4/1
";

    #[test]
    fn quad_fan_triangulates_to_two_triangles() {
        let mesh = parse_obj(QUAD).unwrap();
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.indices.len(), 6);
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn shared_corners_are_deduplicated() {
        let mesh = parse_obj(QUAD).unwrap();
        // Corner 1 and 3 appear in both triangles but exist once.
        let first = mesh.vertices[0];
        assert_eq!(first.position, [0.0, 0.0, 0.0]);
        assert_eq!(first.normal, [0.0, 0.0, 1.0]);
        assert_eq!(first.uv, [0.0, 0.0]);
    }

    #[test]
    fn position_only_faces_parse() {
        let text = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";
        let mesh = parse_obj(text).unwrap();
        assert_eq!(mesh.indices, vec![0, 1, 2]);
        assert_eq!(mesh.vertices[1].normal, [0.0, 0.0, 0.0]);
    }

    #[test]
    fn negative_indices_resolve_from_end() {
        let text = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\n";
        let mesh = parse_obj(text).unwrap();
        assert_eq!(mesh.indices, vec![0, 1, 2]);
    }

    #[test]
    fn out_of_range_index_is_an_error() {
        let text = "v 0 0 0\nf 1 2 3\n";
        assert!(parse_obj(text).is_err());
    }

    #[test]
    fn empty_obj_is_an_error() {
        assert!(parse_obj("# nothing\n").is_err());
    }

    #[test]
    fn plane_has_expected_topology() {
        let plane = MeshData::plane(10.0, 4);
        assert_eq!(plane.vertices.len(), 25);
        assert_eq!(plane.indices.len(), 4 * 4 * 6);
        // Corners span the full size, centered.
        assert_eq!(plane.vertices[0].position, [-5.0, 0.0, -5.0]);
        assert_eq!(plane.vertices[24].position, [5.0, 0.0, 5.0]);
        // All indices in range.
        assert!(plane.indices.iter().all(|&i| (i as usize) < plane.vertices.len()));
    }

    #[test]
    fn vertex_layout_matches_shader_contract() {
        assert_eq!(Vertex::SIZE, 44);
        assert_eq!(std::mem::offset_of!(Vertex, position), 0);
        assert_eq!(std::mem::offset_of!(Vertex, color), 12);
        assert_eq!(std::mem::offset_of!(Vertex, normal), 24);
        assert_eq!(std::mem::offset_of!(Vertex, uv), 36);
    }
}
