//! Format decoders invoked by load jobs: shaders, images, meshes, animations.
//! Each decoder is a synchronous path-to-data call returning `anyhow::Result`.

pub mod animation;
pub mod mesh;
pub mod obj;
pub mod shader;
pub mod texture;

pub use animation::{AnimationClip, AnimationData, Bone, Keyframe};
pub use mesh::{MeshData, MeshVertex, SubMesh};
pub use shader::{ShaderData, ShaderStage};
pub use texture::{TextureData, TextureFormat};
