//! Kind-tag to decoder registry used by load jobs.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Result, bail};

use crate::resource::{Payload, ResourceKind};

/// Turns the file behind a resource into its payload. Runs on a worker thread.
pub trait Decoder: Send + Sync {
    fn decode(&self, path: &Path) -> Result<Payload>;
}

impl<F> Decoder for F
where
    F: Fn(&Path) -> Result<Payload> + Send + Sync,
{
    fn decode(&self, path: &Path) -> Result<Payload> {
        self(path)
    }
}

/// Decoders by resource kind. Adding a kind only needs a [`register`](Self::register) call.
#[derive(Clone, Default)]
pub struct DecoderRegistry {
    decoders: HashMap<ResourceKind, Arc<dyn Decoder>>,
}

impl DecoderRegistry {
    /// Registry with no decoders at all.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the shader, image, mesh and animation decoders from `asset`.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(ResourceKind::SHADER, |path: &Path| -> Result<Payload> {
            Ok(Payload::Shader(asset::ShaderData::load(path)?))
        });
        registry.register(ResourceKind::IMAGE, |path: &Path| -> Result<Payload> {
            Ok(Payload::Image(asset::TextureData::load(path)?))
        });
        registry.register(ResourceKind::MESH, |path: &Path| -> Result<Payload> {
            Ok(Payload::Mesh(asset::obj::load_obj_from_path(path)?))
        });
        registry.register(ResourceKind::ANIMATION, |path: &Path| -> Result<Payload> {
            Ok(Payload::Animation(asset::animation::load_animation_from_path(path)?))
        });
        registry
    }

    /// Install `decoder` for `kind`, returning the one it replaces.
    pub fn register(
        &mut self,
        kind: ResourceKind,
        decoder: impl Decoder + 'static,
    ) -> Option<Arc<dyn Decoder>> {
        self.decoders.insert(kind, Arc::new(decoder))
    }

    pub fn get(&self, kind: ResourceKind) -> Option<&dyn Decoder> {
        self.decoders.get(&kind).map(Arc::as_ref)
    }

    pub fn contains(&self, kind: ResourceKind) -> bool {
        self.decoders.contains_key(&kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = ResourceKind> + '_ {
        self.decoders.keys().copied()
    }

    pub fn decode(&self, kind: ResourceKind, path: &Path) -> Result<Payload> {
        match self.get(kind) {
            Some(decoder) => decoder.decode(path),
            None => bail!("No decoder registered for kind '{}'", kind),
        }
    }
}

impl fmt::Debug for DecoderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.kinds().collect();
        kinds.sort();
        f.debug_struct("DecoderRegistry").field("kinds", &kinds).finish()
    }
}
