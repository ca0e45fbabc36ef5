//! Load jobs and their priority classes.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::decoder::DecoderRegistry;
use crate::error::{LoaderError, Result};
use crate::resource::{Payload, ResourceHandle};

/// Priority class of a job. Direct sorts before Deferred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LoadClass {
    /// Needed before the caller continues; `load_resources` waits for it.
    Direct = 0,
    /// Needed soon; only `synchronize` waits for it.
    Deferred = 1,
}

/// One resource to load, with its class.
#[derive(Clone, Debug)]
pub struct LoadingItem {
    resource: ResourceHandle,
    class: LoadClass,
}

impl LoadingItem {
    pub fn new(resource: ResourceHandle, class: LoadClass) -> Self {
        Self { resource, class }
    }

    pub fn direct(resource: ResourceHandle) -> Self {
        Self::new(resource, LoadClass::Direct)
    }

    pub fn deferred(resource: ResourceHandle) -> Self {
        Self::new(resource, LoadClass::Deferred)
    }

    pub fn resource(&self) -> &ResourceHandle {
        &self.resource
    }

    pub fn class(&self) -> LoadClass {
        self.class
    }

    pub fn is_direct(&self) -> bool {
        self.class == LoadClass::Direct
    }

    /// Decode the resource on the calling thread and store the outcome on it.
    ///
    /// Decoder errors and panics never escape: they are logged and the
    /// resource is marked Failed. Returns whether the resource is now Loaded.
    pub fn execute(&self, decoders: &DecoderRegistry) -> bool {
        match self.try_execute(decoders) {
            Ok(payload) => {
                self.resource.fill(payload);
                true
            }
            Err(err) => {
                log::warn!("{}", err);
                self.resource.fail(match err {
                    LoaderError::Decode { message, .. } => message,
                    other => other.to_string(),
                });
                false
            }
        }
    }

    fn try_execute(&self, decoders: &DecoderRegistry) -> Result<Payload> {
        let kind = self.resource.kind();
        let path = self
            .resource
            .path()
            .ok_or(LoaderError::LifecycleViolation("resource has no path to load from"))?;

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| decoders.decode(kind, path)));
        let message = match outcome {
            Ok(Ok(payload)) => return Ok(payload),
            Ok(Err(err)) => format!("{:#}", err),
            Err(panic) => format!("decoder panicked: {}", panic_message(panic.as_ref())),
        };
        Err(LoaderError::Decode {
            path: path.to_path_buf(),
            message,
        })
    }
}

/// Stable sort by class: Direct first, submission order kept within a class.
pub fn sort_by_class(items: &mut [LoadingItem]) {
    items.sort_by_key(LoadingItem::class);
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ResourceCache;
    use crate::resource::{ResourceKind, ResourceState};
    use std::path::Path;

    fn probe_registry() -> DecoderRegistry {
        let mut registry = DecoderRegistry::new();
        registry.register(ResourceKind::new("ok"), |_: &Path| -> anyhow::Result<Payload> {
            Ok(Payload::Custom(Box::new(42u32)))
        });
        registry.register(ResourceKind::new("err"), |_: &Path| -> anyhow::Result<Payload> {
            anyhow::bail!("truncated file")
        });
        registry.register(ResourceKind::new("panic"), |_: &Path| -> anyhow::Result<Payload> {
            panic!("decoder bug")
        });
        registry
    }

    #[test]
    fn sort_is_stable_within_class() {
        let mut cache = ResourceCache::new();
        let kind = ResourceKind::new("ok");
        let handles: Vec<_> = (0..5).map(|_| cache.create_at(kind, "x")).collect();
        let ids: Vec<_> = handles.iter().map(|h| h.id()).collect();

        let mut items = vec![
            LoadingItem::deferred(handles[0].clone()),
            LoadingItem::direct(handles[1].clone()),
            LoadingItem::deferred(handles[2].clone()),
            LoadingItem::direct(handles[3].clone()),
            LoadingItem::direct(handles[4].clone()),
        ];
        sort_by_class(&mut items);

        let order: Vec<_> = items.iter().map(|i| i.resource().id()).collect();
        assert_eq!(order, vec![ids[1], ids[3], ids[4], ids[0], ids[2]]);
    }

    #[test]
    fn execute_fills_payload() {
        let mut cache = ResourceCache::new();
        let handle = cache.create_at(ResourceKind::new("ok"), "answer.bin");
        let item = LoadingItem::direct(handle.clone());

        assert!(item.execute(&probe_registry()));
        assert!(handle.is_loaded());
        assert_eq!(handle.payload().unwrap().downcast_ref::<u32>(), Some(&42));
    }

    #[test]
    fn decoder_error_marks_failed() {
        let mut cache = ResourceCache::new();
        let handle = cache.create_at(ResourceKind::new("err"), "broken.bin");

        assert!(!LoadingItem::deferred(handle.clone()).execute(&probe_registry()));
        assert_eq!(handle.state(), ResourceState::Failed);
        assert!(handle.error().unwrap().contains("truncated file"));
    }

    #[test]
    fn decoder_panic_is_contained() {
        let mut cache = ResourceCache::new();
        let handle = cache.create_at(ResourceKind::new("panic"), "boom.bin");

        assert!(!LoadingItem::direct(handle.clone()).execute(&probe_registry()));
        assert!(handle.is_failed());
        assert!(handle.error().unwrap().contains("decoder bug"));
    }

    #[test]
    fn missing_path_or_decoder_fails() {
        let mut cache = ResourceCache::new();
        let pathless = cache.create(ResourceKind::new("ok"));
        assert!(!LoadingItem::direct(pathless.clone()).execute(&probe_registry()));
        assert!(pathless.is_failed());

        let unknown = cache.create_at(ResourceKind::new("font"), "a.ttf");
        assert!(!LoadingItem::direct(unknown.clone()).execute(&probe_registry()));
        assert!(unknown.error().unwrap().contains("No decoder"));
    }
}
