//! Asset loader demo.
//! Scans a directory, loads everything it recognizes and reports the outcome.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use loader::{
    DecoderRegistry, LoaderConfig, LoadingItem, MAX_WORKERS, ResourceCache, ResourceHandle,
    ResourceKind, ResourceState, Scheduler,
};

fn parse_workers_arg() -> usize {
    // Accept: --workers=N (1..=64), default 5
    let mut workers = LoaderConfig::default().workers;
    for arg in std::env::args() {
        if let Some(val) = arg.strip_prefix("--workers=") {
            match val.parse::<usize>() {
                Ok(n) if (1..=MAX_WORKERS).contains(&n) => workers = n,
                _ => log::warn!(
                    "Invalid worker count '{}', keeping {}.",
                    val,
                    workers
                ),
            }
        }
    }
    workers
}

fn parse_assets_arg() -> PathBuf {
    for arg in std::env::args() {
        if let Some(val) = arg.strip_prefix("--assets=") {
            return PathBuf::from(val);
        }
    }
    PathBuf::from("assets")
}

fn parse_deferred_arg() -> Vec<ResourceKind> {
    // --deferred=mesh,animation; kinds listed here go to the background class
    let mut kinds = vec![ResourceKind::MESH, ResourceKind::ANIMATION];
    for arg in std::env::args() {
        if let Some(val) = arg.strip_prefix("--deferred=") {
            kinds = val
                .split(',')
                .filter(|s| !s.is_empty())
                .filter_map(|name| match name.to_ascii_lowercase().as_str() {
                    "shader" => Some(ResourceKind::SHADER),
                    "image" => Some(ResourceKind::IMAGE),
                    "mesh" => Some(ResourceKind::MESH),
                    "animation" => Some(ResourceKind::ANIMATION),
                    other => {
                        log::warn!("Unknown resource kind '{}', ignored.", other);
                        None
                    }
                })
                .collect();
        }
    }
    kinds
}

fn collect_assets(dir: &Path, out: &mut Vec<(PathBuf, ResourceKind)>) -> Result<()> {
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            collect_assets(&path, out)?;
        } else if let Some(kind) = ResourceKind::from_path(&path) {
            out.push((path, kind));
        } else {
            log::debug!("Skipping {}", path.display());
        }
    }
    Ok(())
}

fn report(handles: &[ResourceHandle]) {
    for handle in handles {
        let path = handle.path().unwrap_or(Path::new("<unnamed>")).display();
        match handle.state() {
            ResourceState::Loaded => log::info!("[{}] loaded {}", handle.kind(), path),
            ResourceState::Failed => log::warn!(
                "[{}] failed {}: {}",
                handle.kind(),
                path,
                handle.error().unwrap_or_default()
            ),
            ResourceState::Unloaded => log::warn!("[{}] never loaded {}", handle.kind(), path),
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let workers = parse_workers_arg();
    let assets = parse_assets_arg();
    let deferred = parse_deferred_arg();
    log::info!(
        "Starting asset loader. workers={}, assets={}, deferred={:?}",
        workers,
        assets.display(),
        deferred
    );

    let mut files = Vec::new();
    collect_assets(&assets, &mut files)?;
    files.sort();

    let mut cache = ResourceCache::new();
    let mut handles = Vec::with_capacity(files.len());
    for (path, kind) in &files {
        handles.push(cache.open(path, *kind)?);
    }

    let mut scheduler = Scheduler::start(
        DecoderRegistry::with_builtin(),
        LoaderConfig::default().with_workers(workers),
    )?;

    let items = handles.iter().cloned().map(|handle| {
        if deferred.contains(&handle.kind()) {
            LoadingItem::deferred(handle)
        } else {
            LoadingItem::direct(handle)
        }
    });
    scheduler.load_resources(items)?;
    log::info!("Direct resources ready.");
    scheduler.synchronize()?;
    log::info!("All resources ready.");

    report(&handles);
    let failed = handles.iter().filter(|h| h.is_failed()).count();
    log::info!("{} of {} resources loaded.", handles.len() - failed, handles.len());

    scheduler.release()?;
    for handle in handles {
        cache.release(handle);
    }
    cache.release_all()?;

    log::info!("Graceful shutdown. Bye!");
    Ok(())
}
