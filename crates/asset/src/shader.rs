//! Compiled shader bytes loader.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Pipeline stage a shader module is compiled for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Compute,
    Geometry,
    TessControl,
    TessEvaluation,
}

impl ShaderStage {
    /// Derive the stage from the file name: `lit.frag`, `lit.frag.spv`, `skin.vert.spv`.
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        let name = name.strip_suffix(".spv").unwrap_or(name);
        let ext = Path::new(name).extension()?.to_str()?;
        match ext.to_ascii_lowercase().as_str() {
            "vert" | "vs" => Some(Self::Vertex),
            "frag" | "fs" => Some(Self::Fragment),
            "comp" | "cs" => Some(Self::Compute),
            "geom" | "gs" => Some(Self::Geometry),
            "tesc" => Some(Self::TessControl),
            "tese" => Some(Self::TessEvaluation),
            _ => None,
        }
    }
}

/// Raw shader module as read from disk.
#[derive(Clone, Debug, PartialEq)]
pub struct ShaderData {
    pub path: PathBuf,
    pub stage: ShaderStage,
    pub bytes: Vec<u8>,
}

impl ShaderData {
    /// Read a compiled shader. `.spv` files must carry the SPIR-V magic word.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let stage = ShaderStage::from_path(path)
            .with_context(|| format!("Cannot infer shader stage from {:?}", path))?;
        let bytes =
            std::fs::read(path).with_context(|| format!("Failed to read shader {:?}", path))?;

        if bytes.is_empty() {
            bail!("Shader {:?} is empty", path);
        }
        let is_spirv = path.extension().is_some_and(|e| e.eq_ignore_ascii_case("spv"));
        if is_spirv {
            if bytes.len() % 4 != 0 {
                bail!("SPIR-V module {:?} is not word aligned ({} bytes)", path, bytes.len());
            }
            let magic = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            if magic != SPIRV_MAGIC {
                bail!("SPIR-V module {:?} has bad magic 0x{:08x}", path, magic);
            }
        }

        log::debug!("Read {:?} shader {:?} ({} bytes)", stage, path, bytes.len());
        Ok(Self {
            path: path.to_path_buf(),
            stage,
            bytes,
        })
    }

    /// Bytes reinterpreted as little-endian SPIR-V words.
    pub fn words(&self) -> Vec<u32> {
        self.bytes
            .chunks_exact(4)
            .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]))
            .collect()
    }
}
