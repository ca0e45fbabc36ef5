//! Resources, their kind tags and the counted handles the cache hands out.

use std::any::Any;
use std::fmt;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use asset::{AnimationData, MeshData, ShaderData, TextureData};
use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard};

/// Tag selecting the decoder for a resource. Kinds are open: any crate can
/// declare its own with [`ResourceKind::new`] and register a decoder for it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKind(&'static str);

impl ResourceKind {
    pub const SHADER: Self = Self("shader");
    pub const IMAGE: Self = Self("image");
    pub const MESH: Self = Self("mesh");
    pub const ANIMATION: Self = Self("animation");

    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub const fn name(&self) -> &'static str {
        self.0
    }

    /// Guess a built-in kind from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        if asset::ShaderStage::from_path(path).is_some() {
            return Some(Self::SHADER);
        }
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "png" => Some(Self::IMAGE),
            "obj" => Some(Self::MESH),
            "anim" => Some(Self::ANIMATION),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ResourceState {
    #[default]
    Unloaded,
    Loaded,
    Failed,
}

/// Decoded data held by a resource.
pub enum Payload {
    Shader(ShaderData),
    Image(TextureData),
    Mesh(MeshData),
    Animation(AnimationData),
    /// Data produced by a decoder registered for a custom kind.
    Custom(Box<dyn Any + Send + Sync>),
}

impl Payload {
    pub fn as_shader(&self) -> Option<&ShaderData> {
        match self {
            Payload::Shader(shader) => Some(shader),
            _ => None,
        }
    }

    pub fn as_image(&self) -> Option<&TextureData> {
        match self {
            Payload::Image(image) => Some(image),
            _ => None,
        }
    }

    pub fn as_mesh(&self) -> Option<&MeshData> {
        match self {
            Payload::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    pub fn as_animation(&self) -> Option<&AnimationData> {
        match self {
            Payload::Animation(animation) => Some(animation),
            _ => None,
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Payload::Custom(data) => data.downcast_ref(),
            _ => None,
        }
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Shader(s) => write!(f, "Shader({:?}, {} bytes)", s.stage, s.bytes.len()),
            Payload::Image(i) => write!(f, "Image({}x{})", i.width, i.height),
            Payload::Mesh(m) => write!(
                f,
                "Mesh({} vertices, {} indices, {} submeshes)",
                m.vertices.len(),
                m.indices.len(),
                m.submeshes.len()
            ),
            Payload::Animation(a) => {
                write!(f, "Animation({} bones, {} clips)", a.bones.len(), a.clips.len())
            }
            Payload::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Process-unique resource identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u64);

impl ResourceId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Default)]
struct Slot {
    state: ResourceState,
    payload: Option<Payload>,
    error: Option<String>,
}

/// A loadable unit of data: identity, load state and payload.
///
/// The payload slot is written by exactly one worker per load and read by anyone
/// holding a handle.
pub struct Resource {
    id: ResourceId,
    kind: ResourceKind,
    path: Option<PathBuf>,
    slot: RwLock<Slot>,
    handles: AtomicUsize,
}

impl Resource {
    pub fn new(kind: ResourceKind, path: Option<PathBuf>) -> Self {
        Self {
            id: ResourceId::next(),
            kind,
            path,
            slot: RwLock::new(Slot::default()),
            handles: AtomicUsize::new(0),
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn state(&self) -> ResourceState {
        self.slot.read().state
    }

    pub fn is_loaded(&self) -> bool {
        self.state() == ResourceState::Loaded
    }

    pub fn is_failed(&self) -> bool {
        self.state() == ResourceState::Failed
    }

    /// Decoder message of the last failed load.
    pub fn error(&self) -> Option<String> {
        self.slot.read().error.clone()
    }

    /// Read access to the payload, if loaded.
    pub fn payload(&self) -> Option<MappedRwLockReadGuard<'_, Payload>> {
        RwLockReadGuard::try_map(self.slot.read(), |slot| slot.payload.as_ref()).ok()
    }

    /// Owners of this resource: outstanding handles plus the cache itself.
    pub fn owner_count(&self) -> usize {
        self.handles.load(Ordering::Acquire) + 1
    }

    pub(crate) fn set_path(&mut self, path: PathBuf) {
        self.path = Some(path);
    }

    pub(crate) fn fill(&self, payload: Payload) {
        let mut slot = self.slot.write();
        slot.state = ResourceState::Loaded;
        slot.payload = Some(payload);
        slot.error = None;
    }

    pub(crate) fn fail(&self, message: String) {
        let mut slot = self.slot.write();
        slot.state = ResourceState::Failed;
        slot.payload = None;
        slot.error = Some(message);
    }

    /// Drop the payload and return to Unloaded.
    pub(crate) fn teardown(&self) {
        *self.slot.write() = Slot::default();
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("path", &self.path)
            .field("state", &self.state())
            .field("owners", &self.owner_count())
            .finish()
    }
}

/// Counted reference to a cached [`Resource`].
///
/// Every live handle (clones included) counts as one external owner; dropping
/// a handle gives that ownership back.
pub struct ResourceHandle {
    resource: Arc<Resource>,
}

impl ResourceHandle {
    pub(crate) fn new(resource: Arc<Resource>) -> Self {
        resource.handles.fetch_add(1, Ordering::AcqRel);
        Self { resource }
    }

    /// Both handles refer to the same underlying resource.
    pub fn same_resource(&self, other: &ResourceHandle) -> bool {
        Arc::ptr_eq(&self.resource, &other.resource)
    }
}

impl Clone for ResourceHandle {
    fn clone(&self) -> Self {
        Self::new(Arc::clone(&self.resource))
    }
}

impl Drop for ResourceHandle {
    fn drop(&mut self) {
        self.resource.handles.fetch_sub(1, Ordering::AcqRel);
    }
}

impl Deref for ResourceHandle {
    type Target = Resource;

    fn deref(&self) -> &Resource {
        &self.resource
    }
}

impl fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.resource, f)
    }
}
