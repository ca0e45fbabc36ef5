//! Identity cache of resources with counted release.
//!
//! Membership is only changed through `&mut ResourceCache`, so it stays on the
//! thread that owns the cache. Workers only ever touch the payload slot of a
//! resource that is already registered.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{LoaderError, Result};
use crate::resource::{Resource, ResourceHandle, ResourceId, ResourceKind};

/// Per-kind search folders used to resolve relative paths in [`ResourceCache::open`].
#[derive(Clone, Debug, Default)]
pub struct ResourceFolders {
    folders: HashMap<ResourceKind, PathBuf>,
}

impl ResourceFolders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the folder for `kind`. The folder must exist and `kind` must not
    /// have one yet.
    pub fn add(&mut self, kind: ResourceKind, folder: impl Into<PathBuf>) -> Result<()> {
        let folder = folder.into();
        if !folder.is_dir() {
            return Err(LoaderError::ResourceNotFound { path: folder });
        }
        if let Some(existing) = self.folders.get(&kind) {
            return Err(LoaderError::FolderAlreadyRegistered {
                kind,
                folder: existing.clone(),
            });
        }
        log::debug!("Added {} folder {:?}", kind, folder);
        self.folders.insert(kind, folder);
        Ok(())
    }

    pub fn get(&self, kind: ResourceKind) -> Option<&Path> {
        self.folders.get(&kind).map(PathBuf::as_path)
    }

    /// `path` if it exists, else `path` joined onto the folder registered for `kind`.
    pub fn resolve(&self, kind: ResourceKind, path: &Path) -> Option<PathBuf> {
        if path.exists() {
            return Some(path.to_path_buf());
        }
        if path.is_absolute() {
            return None;
        }
        let candidate = self.get(kind)?.join(path);
        candidate.exists().then_some(candidate)
    }
}

type IdentityKey = (ResourceKind, PathBuf);

/// Owns every registered resource and hands out counted handles to them.
#[derive(Default)]
pub struct ResourceCache {
    entries: HashMap<ResourceId, Arc<Resource>>,
    index: HashMap<IdentityKey, ResourceId>,
    folders: ResourceFolders,
}

impl ResourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_folders(folders: ResourceFolders) -> Self {
        Self {
            folders,
            ..Self::default()
        }
    }

    pub fn folders(&self) -> &ResourceFolders {
        &self.folders
    }

    pub fn folders_mut(&mut self) -> &mut ResourceFolders {
        &mut self.folders
    }

    /// Handle to the resource `(kind, path)`, registering an Unloaded one on first use.
    pub fn open(&mut self, path: impl AsRef<Path>, kind: ResourceKind) -> Result<ResourceHandle> {
        let key = (kind, self.canonical_path(kind, path.as_ref())?);
        if let Some(id) = self.index.get(&key) {
            return Ok(ResourceHandle::new(Arc::clone(&self.entries[id])));
        }

        let resource = Resource::new(kind, Some(key.1.clone()));
        log::debug!("Registered {} {:?} as {:?}", kind, key.1, resource.id());
        Ok(self.insert_indexed(key, resource))
    }

    /// Fresh write-target resource with no path identity.
    pub fn create(&mut self, kind: ResourceKind) -> ResourceHandle {
        self.insert_unindexed(Resource::new(kind, None))
    }

    /// Fresh write-target resource that remembers `path` without being found by it.
    pub fn create_at(&mut self, kind: ResourceKind, path: impl Into<PathBuf>) -> ResourceHandle {
        self.insert_unindexed(Resource::new(kind, Some(path.into())))
    }

    /// Adopt a resource built elsewhere. Its path is resolved like in
    /// [`open`](Self::open) and must exist; a second resource with the same
    /// `(kind, path)` identity is rejected.
    pub fn register(&mut self, mut resource: Resource) -> Result<ResourceHandle> {
        let Some(path) = resource.path() else {
            return Ok(self.insert_unindexed(resource));
        };
        let key = (resource.kind(), self.canonical_path(resource.kind(), path)?);
        if self.index.contains_key(&key) {
            return Err(LoaderError::DuplicateRegistration {
                kind: key.0,
                path: key.1,
            });
        }

        resource.set_path(key.1.clone());
        Ok(self.insert_indexed(key, resource))
    }

    /// Give back `handle`. When it was the last external owner the resource is
    /// torn down and removed from the cache; returns whether that happened.
    pub fn release(&mut self, handle: ResourceHandle) -> bool {
        let id = handle.id();
        if !self.entries.contains_key(&id) {
            log::warn!("Released {:?} which is not in this cache", handle);
            return false;
        }
        if handle.owner_count() > 2 {
            return false;
        }

        handle.teardown();
        self.entries.remove(&id);
        if let Some(path) = handle.path() {
            let key = (handle.kind(), path.to_path_buf());
            // Resources from `create_at` keep a path but are not indexed by it.
            if self.index.get(&key) == Some(&id) {
                self.index.remove(&key);
            }
        }
        log::debug!("Evicted {} {:?}", handle.kind(), handle.path());
        true
    }

    /// Tear down every resource. Fails without touching the cache if any
    /// resource still has an outstanding handle.
    pub fn release_all(&mut self) -> Result<()> {
        if let Some(busy) = self.entries.values().find(|r| r.owner_count() != 1) {
            return Err(LoaderError::ResourceInUse {
                kind: busy.kind(),
                path: busy.path().map(Path::to_path_buf).unwrap_or_default(),
                owners: busy.owner_count(),
            });
        }

        for resource in self.entries.values() {
            resource.teardown();
        }
        log::debug!("Released {} resources", self.entries.len());
        self.entries.clear();
        self.index.clear();
        Ok(())
    }

    /// New handle to the cached `(kind, path)` resource, without registering anything.
    pub fn find(&self, path: impl AsRef<Path>, kind: ResourceKind) -> Option<ResourceHandle> {
        let canonical = self.canonical_path(kind, path.as_ref()).ok()?;
        let id = self.index.get(&(kind, canonical))?;
        Some(ResourceHandle::new(Arc::clone(&self.entries[id])))
    }

    pub fn contains(&self, handle: &ResourceHandle) -> bool {
        self.entries.contains_key(&handle.id())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Resource> + '_ {
        self.entries.values().map(Arc::as_ref)
    }

    /// Identity path: resolved through the kind folder, then canonicalized.
    fn canonical_path(&self, kind: ResourceKind, path: &Path) -> Result<PathBuf> {
        let resolved = self
            .folders
            .resolve(kind, path)
            .ok_or_else(|| LoaderError::ResourceNotFound {
                path: path.to_path_buf(),
            })?;
        std::fs::canonicalize(&resolved).map_err(|_| LoaderError::ResourceNotFound { path: resolved })
    }

    fn insert_indexed(&mut self, key: IdentityKey, resource: Resource) -> ResourceHandle {
        let resource = Arc::new(resource);
        self.index.insert(key, resource.id());
        self.entries.insert(resource.id(), Arc::clone(&resource));
        ResourceHandle::new(resource)
    }

    fn insert_unindexed(&mut self, resource: Resource) -> ResourceHandle {
        let resource = Arc::new(resource);
        self.entries.insert(resource.id(), Arc::clone(&resource));
        ResourceHandle::new(resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{Payload, ResourceState};

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"x").unwrap();
        path
    }

    #[test]
    fn open_deduplicates_by_kind_and_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = touch(dir.path(), "rock.png");
        let mut cache = ResourceCache::new();

        let first = cache.open(&path, ResourceKind::IMAGE).unwrap();
        let second = cache
            .open(dir.path().join(".").join("rock.png"), ResourceKind::IMAGE)
            .unwrap();
        assert!(first.same_resource(&second));
        assert_eq!(cache.len(), 1);
        assert_eq!(first.owner_count(), 3);

        // Same file under another kind is another resource.
        let raw = cache.open(&path, ResourceKind::new("bytes")).unwrap();
        assert!(!raw.same_resource(&first));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn open_missing_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = ResourceCache::new();
        let err = cache
            .open(dir.path().join("nope.obj"), ResourceKind::MESH)
            .unwrap_err();
        assert!(matches!(err, LoaderError::ResourceNotFound { .. }));
        assert!(cache.is_empty());
    }

    #[test]
    fn open_resolves_through_kind_folder() {
        let dir = tempfile::tempdir().unwrap();
        let shaders = dir.path().join("shaders");
        std::fs::create_dir(&shaders).unwrap();
        let full = touch(&shaders, "lit.frag.spv");

        let mut cache = ResourceCache::new();
        cache
            .folders_mut()
            .add(ResourceKind::SHADER, &shaders)
            .unwrap();

        let by_name = cache.open("lit.frag.spv", ResourceKind::SHADER).unwrap();
        let by_path = cache.open(&full, ResourceKind::SHADER).unwrap();
        assert!(by_name.same_resource(&by_path));
        // Folders are per kind.
        assert!(cache.open("lit.frag.spv", ResourceKind::IMAGE).is_err());
    }

    #[test]
    fn missing_folder_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut folders = ResourceFolders::new();
        assert!(folders
            .add(ResourceKind::MESH, dir.path().join("missing"))
            .is_err());
        assert!(folders.get(ResourceKind::MESH).is_none());
    }

    #[test]
    fn release_last_owner_evicts() {
        let dir = tempfile::tempdir().unwrap();
        let path = touch(dir.path(), "crate.obj");
        let mut cache = ResourceCache::new();

        let handle = cache.open(&path, ResourceKind::MESH).unwrap();
        handle.fill(Payload::Custom(Box::new(())));
        let resource = handle.id();
        assert!(cache.release(handle));
        assert!(cache.is_empty());
        assert!(cache.find(&path, ResourceKind::MESH).is_none());

        let reopened = cache.open(&path, ResourceKind::MESH).unwrap();
        assert_ne!(reopened.id(), resource);
        assert_eq!(reopened.state(), ResourceState::Unloaded);
    }

    #[test]
    fn release_shared_handle_keeps_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = touch(dir.path(), "crate.obj");
        let mut cache = ResourceCache::new();

        let first = cache.open(&path, ResourceKind::MESH).unwrap();
        let second = cache.open(&path, ResourceKind::MESH).unwrap();
        first.fill(Payload::Custom(Box::new(1u8)));

        assert!(!cache.release(first));
        assert_eq!(cache.len(), 1);
        assert!(second.is_loaded());
        assert_eq!(second.owner_count(), 2);

        assert!(cache.release(second));
        assert!(cache.is_empty());
    }

    #[test]
    fn release_all_requires_no_handles() {
        let dir = tempfile::tempdir().unwrap();
        let path = touch(dir.path(), "a.png");
        let mut cache = ResourceCache::new();

        let held = cache.open(&path, ResourceKind::IMAGE).unwrap();
        drop(cache.create(ResourceKind::IMAGE));
        let err = cache.release_all().unwrap_err();
        assert!(matches!(err, LoaderError::ResourceInUse { owners: 2, .. }));
        assert_eq!(cache.len(), 2);

        drop(held);
        cache.release_all().unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn create_is_never_deduplicated() {
        let dir = tempfile::tempdir().unwrap();
        let path = touch(dir.path(), "out.png");
        let mut cache = ResourceCache::new();

        let a = cache.create(ResourceKind::IMAGE);
        let b = cache.create_at(ResourceKind::IMAGE, &path);
        let c = cache.open(&path, ResourceKind::IMAGE).unwrap();
        assert!(!a.same_resource(&b));
        assert!(!b.same_resource(&c));
        assert_eq!(b.path(), Some(path.as_path()));
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn register_rejects_duplicate_identity() {
        let dir = tempfile::tempdir().unwrap();
        let path = touch(dir.path(), "walk.anim");
        let mut cache = ResourceCache::new();

        let opened = cache.open(&path, ResourceKind::ANIMATION).unwrap();
        let err = cache
            .register(Resource::new(ResourceKind::ANIMATION, Some(path.clone())))
            .unwrap_err();
        assert!(matches!(err, LoaderError::DuplicateRegistration { .. }));

        let adopted = cache
            .register(Resource::new(ResourceKind::MESH, Some(path)))
            .unwrap();
        assert!(!adopted.same_resource(&opened));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn registered_path_shares_identity_with_open() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let roundabout = dir.path().join("sub").join("..").join("later.png");
        let mut cache = ResourceCache::new();

        // Nothing on disk yet: no identity to key the resource by.
        let err = cache
            .register(Resource::new(ResourceKind::IMAGE, Some(roundabout.clone())))
            .unwrap_err();
        assert!(matches!(err, LoaderError::ResourceNotFound { .. }));
        assert!(cache.is_empty());

        let direct = touch(dir.path(), "later.png");
        let adopted = cache
            .register(Resource::new(ResourceKind::IMAGE, Some(roundabout.clone())))
            .unwrap();
        assert_eq!(adopted.path(), Some(std::fs::canonicalize(&direct).unwrap().as_path()));

        let opened = cache.open(&direct, ResourceKind::IMAGE).unwrap();
        assert!(adopted.same_resource(&opened));
        assert_eq!(cache.len(), 1);

        let err = cache
            .register(Resource::new(ResourceKind::IMAGE, Some(direct.clone())))
            .unwrap_err();
        assert!(matches!(err, LoaderError::DuplicateRegistration { .. }));

        drop(opened);
        assert!(cache.release(adopted));
        assert!(cache.find(&roundabout, ResourceKind::IMAGE).is_none());
        let reopened = cache.open(&roundabout, ResourceKind::IMAGE).unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(reopened.state(), ResourceState::Unloaded);
    }

    #[test]
    fn release_keeps_index_of_path_twins() {
        let dir = tempfile::tempdir().unwrap();
        let path = touch(dir.path(), "shot.png");
        let mut cache = ResourceCache::new();

        let opened = cache.open(&path, ResourceKind::IMAGE).unwrap();
        let canonical = opened.path().unwrap().to_path_buf();
        // Same path, not indexed: evicting it must leave the opened entry findable.
        let target = cache.create_at(ResourceKind::IMAGE, canonical);
        assert!(cache.release(target));
        assert!(cache.find(&path, ResourceKind::IMAGE).is_some());
        drop(opened);
    }

    #[test]
    fn folder_is_registered_once_per_kind() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("meshes");
        let second = dir.path().join("models");
        std::fs::create_dir(&first).unwrap();
        std::fs::create_dir(&second).unwrap();

        let mut folders = ResourceFolders::new();
        folders.add(ResourceKind::MESH, &first).unwrap();
        let err = folders.add(ResourceKind::MESH, &second).unwrap_err();
        assert!(matches!(err, LoaderError::FolderAlreadyRegistered { .. }));
        assert_eq!(folders.get(ResourceKind::MESH), Some(first.as_path()));

        // Other kinds are unaffected.
        folders.add(ResourceKind::IMAGE, &second).unwrap();
    }
}
