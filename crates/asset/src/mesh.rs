//! CPU-side mesh representation filled by the mesh importer.

use anyhow::{Result, anyhow};

/// Vertex with position/normal/uv. Values are in object space.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl MeshVertex {
    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            uv,
        }
    }
}

/// Contiguous index range of a mesh drawn as one part.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubMesh {
    pub name: String,
    pub first_index: u32,
    pub index_count: u32,
}

/// Indexed triangle mesh with tightly-packed vertices and its sub-mesh table.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
    pub submeshes: Vec<SubMesh>,
}

impl MeshData {
    /// Mesh with a single sub-mesh spanning every index.
    pub fn new(vertices: Vec<MeshVertex>, indices: Vec<u32>) -> Result<Self> {
        let submeshes = vec![SubMesh {
            name: String::from("default"),
            first_index: 0,
            index_count: checked_u32(indices.len(), "indices")?,
        }];
        Ok(Self {
            vertices,
            indices,
            submeshes,
        })
    }

    pub fn with_submeshes(
        vertices: Vec<MeshVertex>,
        indices: Vec<u32>,
        submeshes: Vec<SubMesh>,
    ) -> Self {
        Self {
            vertices,
            indices,
            submeshes,
        }
    }

    /// Returns `true` if both buffers are non-empty and every sub-mesh range is in bounds.
    pub fn is_valid(&self) -> bool {
        !self.vertices.is_empty()
            && !self.indices.is_empty()
            && self.submeshes.iter().all(|s| {
                (s.first_index as usize + s.index_count as usize) <= self.indices.len()
            })
    }
}

/// Buffer length or offset as a 32-bit index, failing instead of wrapping.
pub(crate) fn checked_u32(value: usize, what: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| anyhow!("Too many {} in mesh (>{})", what, u32::MAX))
}
