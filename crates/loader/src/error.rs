//! Error types for the loader.

use std::path::PathBuf;

use thiserror::Error;

use crate::resource::ResourceKind;

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("Resource not found: {}", path.display())]
    ResourceNotFound { path: PathBuf },

    #[error("Resource {kind} {} is already registered", path.display())]
    DuplicateRegistration { kind: ResourceKind, path: PathBuf },

    #[error("A {kind} folder is already registered: {}", folder.display())]
    FolderAlreadyRegistered { kind: ResourceKind, folder: PathBuf },

    #[error("Failed to decode {}: {message}", path.display())]
    Decode { path: PathBuf, message: String },

    #[error("Resource {kind} {} still has {owners} owners", path.display())]
    ResourceInUse {
        kind: ResourceKind,
        path: PathBuf,
        owners: usize,
    },

    #[error("Lifecycle violation: {0}")]
    LifecycleViolation(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LoaderError>;
