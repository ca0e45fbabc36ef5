//! Minimal OBJ importer: positions, normals, texture coordinates and `o`/`g` groups.
//! Each group becomes one entry of the sub-mesh table.

use std::{
    collections::HashMap,
    fs::File,
    io::{self, BufRead, BufReader},
    path::Path,
};

use anyhow::{Context, Result, anyhow, bail};

use crate::mesh::{MeshData, MeshVertex, SubMesh, checked_u32};

/// Load an OBJ mesh from a file path.
pub fn load_obj_from_path(path: impl AsRef<Path>) -> Result<MeshData> {
    let file = File::open(&path)
        .with_context(|| format!("Failed to open OBJ file: {}", path.as_ref().display()))?;
    load_obj_from_reader(BufReader::new(file))
}

/// Load an OBJ mesh from a [`BufRead`] implementation.
pub fn load_obj_from_reader<R: BufRead>(reader: R) -> Result<MeshData> {
    parse_obj(reader)
}

/// Convenience helper to parse an OBJ string literal.
pub fn load_obj_from_str(contents: &str) -> Result<MeshData> {
    parse_obj(io::Cursor::new(contents))
}

fn parse_obj<R: BufRead>(reader: R) -> Result<MeshData> {
    let mut builder = ObjBuilder::default();

    for (line_no, line) in reader.lines().enumerate() {
        let line_no = line_no + 1;
        let line = line.with_context(|| format!("Failed to read line {}", line_no))?;
        let mut parts = line.split_whitespace();
        let Some(tag) = parts.next() else {
            continue;
        };

        match tag {
            "v" => {
                let position = parse_floats::<3>(&mut parts, line_no, "position")?;
                builder.positions.push(position);
            }
            "vt" => {
                let uv = parse_floats::<2>(&mut parts, line_no, "texture coordinate")?;
                builder.texcoords.push(uv);
            }
            "vn" => {
                let normal = parse_floats::<3>(&mut parts, line_no, "normal")?;
                builder.normals.push(normal);
            }
            "f" => builder.push_face(parts, line_no)?,
            "o" | "g" => builder.begin_group(parts.collect::<Vec<_>>().join(" "))?,
            // Comments, smoothing groups and material directives carry no geometry.
            _ => {}
        }
    }

    builder.finish()
}

/// `v/vt/vn` triple of a face corner, already resolved to 0-based indices.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
struct Corner {
    position: usize,
    texcoord: Option<usize>,
    normal: Option<usize>,
}

#[derive(Default)]
struct ObjBuilder {
    positions: Vec<[f32; 3]>,
    normals: Vec<[f32; 3]>,
    texcoords: Vec<[f32; 2]>,
    corners: HashMap<Corner, u32>,
    vertices: Vec<MeshVertex>,
    indices: Vec<u32>,
    submeshes: Vec<SubMesh>,
    group: Option<String>,
    group_start: usize,
}

impl ObjBuilder {
    fn push_face<'a>(&mut self, tokens: impl Iterator<Item = &'a str>, line_no: usize) -> Result<()> {
        let mut face = Vec::with_capacity(4);
        for token in tokens {
            let corner = self.parse_corner(token, line_no)?;
            face.push(self.vertex_for(corner)?);
        }
        // Points and lines are skipped, polygons are fan-triangulated.
        for pair in face.windows(2).skip(1) {
            self.indices.extend_from_slice(&[face[0], pair[0], pair[1]]);
        }
        Ok(())
    }

    fn vertex_for(&mut self, corner: Corner) -> Result<u32> {
        if let Some(&index) = self.corners.get(&corner) {
            return Ok(index);
        }
        let index = checked_u32(self.vertices.len(), "vertices")?;
        let uv = corner
            .texcoord
            .map_or([0.0, 0.0], |i| self.texcoords[i]);
        let normal = corner
            .normal
            .map_or([0.0, 0.0, 1.0], |i| self.normals[i]);
        self.vertices
            .push(MeshVertex::new(self.positions[corner.position], normal, uv));
        self.corners.insert(corner, index);
        Ok(index)
    }

    fn parse_corner(&self, token: &str, line_no: usize) -> Result<Corner> {
        let mut fields = token.split('/');
        let position = match fields.next() {
            Some(value) if !value.is_empty() => resolve_index(value, self.positions.len(), line_no)?,
            _ => bail!("Malformed face element '{}' on line {}", token, line_no),
        };
        let mut optional = |len: usize| -> Result<Option<usize>> {
            match fields.next() {
                Some(value) if !value.is_empty() => resolve_index(value, len, line_no).map(Some),
                _ => Ok(None),
            }
        };
        let texcoord = optional(self.texcoords.len())?;
        let normal = optional(self.normals.len())?;
        Ok(Corner {
            position,
            texcoord,
            normal,
        })
    }

    /// Close the running group and open a new one starting at the current index.
    fn begin_group(&mut self, name: String) -> Result<()> {
        self.close_group()?;
        self.group = Some(name).filter(|n| !n.is_empty());
        self.group_start = self.indices.len();
        Ok(())
    }

    fn close_group(&mut self) -> Result<()> {
        let end = self.indices.len();
        if end == self.group_start {
            return Ok(());
        }
        let name = match self.group.take() {
            Some(name) => name,
            None if self.submeshes.is_empty() && self.group_start == 0 => "default".to_owned(),
            None => format!("group{}", self.submeshes.len()),
        };
        self.submeshes.push(SubMesh {
            name,
            first_index: checked_u32(self.group_start, "indices")?,
            index_count: checked_u32(end - self.group_start, "indices")?,
        });
        Ok(())
    }

    fn finish(mut self) -> Result<MeshData> {
        if self.indices.is_empty() {
            bail!("OBJ contained no triangles");
        }
        self.close_group()?;
        Ok(MeshData::with_submeshes(
            self.vertices,
            self.indices,
            self.submeshes,
        ))
    }
}

fn parse_floats<'a, const N: usize>(
    parts: &mut impl Iterator<Item = &'a str>,
    line_no: usize,
    what: &str,
) -> Result<[f32; N]> {
    let mut out = [0.0; N];
    for (axis, slot) in out.iter_mut().enumerate() {
        let token = parts
            .next()
            .ok_or_else(|| anyhow!("Missing {} component {} on line {}", what, axis, line_no))?;
        *slot = token
            .parse()
            .with_context(|| format!("Failed to parse {} '{}' on line {}", what, token, line_no))?;
    }
    Ok(out)
}

/// OBJ indices are 1-based; negative values count back from the last element.
fn resolve_index(token: &str, len: usize, line_no: usize) -> Result<usize> {
    let raw: i64 = token
        .parse()
        .with_context(|| format!("Invalid index '{}' on line {}", token, line_no))?;
    let resolved = match raw {
        0 => bail!("OBJ indices are 1-based; found 0 on line {}", line_no),
        r if r > 0 => r - 1,
        r => len as i64 + r,
    };
    if resolved < 0 || resolved as usize >= len {
        bail!(
            "OBJ index {} out of bounds (len={}) on line {}",
            raw,
            len,
            line_no
        );
    }
    Ok(resolved as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_triangle() {
        let src = r#"
            v 0.0 0.0 0.0
            v 1.0 0.0 0.0
            v 0.0 1.0 0.0
            vn 0.0 0.0 1.0
            vt 0.0 0.0
            vt 1.0 0.0
            vt 0.0 1.0
            f 1/1/1 2/2/1 3/3/1
        "#;
        let mesh = load_obj_from_str(src).expect("parse triangle");
        assert_eq!(mesh.vertices.len(), 3);
        assert_eq!(mesh.indices.len(), 3);
        assert!(mesh.is_valid());
        assert_eq!(mesh.submeshes.len(), 1);
        assert_eq!(mesh.submeshes[0].name, "default");
    }

    #[test]
    fn groups_become_submeshes() {
        let src = r#"
            v 0.0 0.0 0.0
            v 1.0 0.0 0.0
            v 0.0 1.0 0.0
            v 1.0 1.0 0.0
            g body
            f 1 2 3
            g lid cap
            f 2 4 3 1
        "#;
        let mesh = load_obj_from_str(src).expect("parse groups");
        assert_eq!(mesh.submeshes.len(), 2);
        assert_eq!(mesh.submeshes[0].name, "body");
        assert_eq!(mesh.submeshes[0].first_index, 0);
        assert_eq!(mesh.submeshes[0].index_count, 3);
        assert_eq!(mesh.submeshes[1].name, "lid cap");
        assert_eq!(mesh.submeshes[1].first_index, 3);
        // Quad is fan-triangulated into two triangles.
        assert_eq!(mesh.submeshes[1].index_count, 6);
        assert!(mesh.is_valid());
    }

    #[test]
    fn empty_obj_is_rejected() {
        let err = load_obj_from_str("# nothing here\nv 0 0 0\n").unwrap_err();
        assert!(err.to_string().contains("no triangles"));
    }

    #[test]
    fn zero_index_is_rejected() {
        let src = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 0 1 2\n";
        assert!(load_obj_from_str(src).is_err());
    }
}
