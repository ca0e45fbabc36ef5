//! Concurrent asset loading.
//!
//! A [`ResourceCache`] hands out counted handles keyed by `(kind, path)`; a
//! [`Scheduler`] runs load jobs for those handles on a fixed pool of worker
//! threads. `load_resources` blocks until the Direct jobs of the batch are
//! done, `synchronize` until every submitted job is done.
//!
//! ```ignore
//! use loader::{DecoderRegistry, LoaderConfig, LoadingItem, ResourceCache, ResourceKind, Scheduler};
//!
//! let mut cache = ResourceCache::new();
//! let mut scheduler = Scheduler::start(DecoderRegistry::with_builtin(), LoaderConfig::default())?;
//!
//! let albedo = cache.open("textures/albedo.png", ResourceKind::IMAGE)?;
//! let hero = cache.open("meshes/hero.obj", ResourceKind::MESH)?;
//! scheduler.load_resources([
//!     LoadingItem::direct(albedo.clone()),
//!     LoadingItem::deferred(hero.clone()),
//! ])?;
//! assert!(albedo.is_loaded() || albedo.is_failed());
//!
//! scheduler.synchronize()?;
//! scheduler.release()?;
//! cache.release(albedo);
//! cache.release(hero);
//! ```

pub mod barrier;
pub mod cache;
pub mod config;
pub mod decoder;
pub mod job;
pub mod resource;
pub mod scheduler;
pub mod worker;

mod error;
pub use error::{LoaderError, Result};

pub use barrier::Barrier;
pub use cache::{ResourceCache, ResourceFolders};
pub use config::{LoaderConfig, MAX_WORKERS};
pub use decoder::{Decoder, DecoderRegistry};
pub use job::{LoadClass, LoadingItem};
pub use resource::{Payload, Resource, ResourceHandle, ResourceId, ResourceKind, ResourceState};
pub use scheduler::Scheduler;
pub use worker::{Worker, WorkerState};
