//! Atomic JSON document storage.
//!
//! `Config<T>` is a typed handle over a JSON file: `write()` serializes to a
//! temporary file in the same directory and atomically renames it over the
//! destination, the same pattern used throughout this codebase for
//! persisted state. `Delayed<T>` coalesces writes behind a dirty flag and
//! flushes on a fixed period instead of on every mutation. `Child<T, P>`
//! shares a `Delayed<P>` parent's persistence for a sub-document that has no
//! file of its own (e.g. the rollout list living inside the server config).

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::CoreResult;

/// A typed handle over a single JSON document on disk.
pub struct Config<T> {
    path: PathBuf,
    data: T,
}

impl<T> fmt::Debug for Config<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config").field("path", &self.path).finish_non_exhaustive()
    }
}

impl<T: Default + Serialize + DeserializeOwned> Config<T> {
    /// Load the document at `path`. A missing file, or one that fails to
    /// parse, yields `T::default()` — a malformed config is logged, not
    /// fatal.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let data = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(parsed) => parsed,
                Err(err) => {
                    warn!(path = %path.display(), %err, "malformed config, using default");
                    T::default()
                },
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => T::default(),
            Err(err) => {
                warn!(path = %path.display(), %err, "could not read config, using default");
                T::default()
            },
        };
        Self { path, data }
    }

    pub fn data(&self) -> &T {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut T {
        &mut self.data
    }

    /// Serialize the current data to a temp file beside `path`, then
    /// atomically rename it into place.
    pub fn write(&self) -> CoreResult<()> {
        let contents = serde_json::to_string_pretty(&self.data)?;
        atomic_write(&self.path, contents.as_bytes())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Write `contents` to a temp file beside `path`, then atomically rename it
/// into place. Shared by the JSON `Config<T>` above and the YAML writers the
/// proxy and scraper supervisors use for their child processes' config
/// files.
pub fn atomic_write(path: &Path, contents: &[u8]) -> CoreResult<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;
    let tmp_path = tmp_path_for(path);
    fs::write(&tmp_path, contents)?;
    fs::rename(&tmp_path, path)?;
    debug!(path = %path.display(), "config written");
    Ok(())
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("config");
    path.with_file_name(format!("{file_name}.tmp"))
}

/// Wraps a `Config<T>` behind a dirty flag, flushing on a fixed period
/// instead of synchronously on every mutation.
pub struct Delayed<T> {
    inner: Arc<Mutex<DelayedInner<T>>>,
}

struct DelayedInner<T> {
    config: Config<T>,
    dirty: bool,
}

impl<T> Clone for Delayed<T> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<T: Default + Serialize + DeserializeOwned + Send + 'static> Delayed<T> {
    pub fn new(config: Config<T>, flush_period: Duration) -> Self {
        let delayed =
            Self { inner: Arc::new(Mutex::new(DelayedInner { config, dirty: false })) };

        let flush_handle = delayed.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(flush_period);
            loop {
                ticker.tick().await;
                if let Err(err) = flush_handle.flush().await {
                    warn!(%err, "periodic config flush failed");
                }
            }
        });

        delayed
    }

    /// Read the current document without marking it dirty.
    pub async fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let guard = self.inner.lock().await;
        f(guard.config.data())
    }

    /// Mutate the document and mark it dirty for the next periodic flush.
    pub async fn mutate<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.inner.lock().await;
        let result = f(guard.config.data_mut());
        guard.dirty = true;
        result
    }

    /// Mutate the document and write it to disk immediately, bypassing the
    /// delayed-flush period. Used wherever a caller must observe the
    /// mutation durably before responding (e.g. limit changes that gate an
    /// immediate enforcement tick).
    pub async fn mutate_and_flush<R>(&self, f: impl FnOnce(&mut T) -> R) -> CoreResult<R> {
        let mut guard = self.inner.lock().await;
        let result = f(guard.config.data_mut());
        guard.config.write()?;
        guard.dirty = false;
        Ok(result)
    }

    pub async fn flush(&self) -> CoreResult<()> {
        let mut guard = self.inner.lock().await;
        if !guard.dirty {
            return Ok(());
        }
        guard.config.write()?;
        guard.dirty = false;
        Ok(())
    }
}

/// A view onto a sub-document inside a `Delayed<P>` parent, sharing the
/// parent's file and flush schedule rather than owning a file of its own.
pub struct Child<T, P> {
    parent: Delayed<P>,
    get: fn(&P) -> &T,
    get_mut: fn(&mut P) -> &mut T,
}

impl<T, P> Clone for Child<T, P> {
    fn clone(&self) -> Self {
        Self { parent: self.parent.clone(), get: self.get, get_mut: self.get_mut }
    }
}

impl<T, P> Child<T, P>
where
    P: Default + Serialize + DeserializeOwned + Send + 'static,
{
    pub fn new(parent: Delayed<P>, get: fn(&P) -> &T, get_mut: fn(&mut P) -> &mut T) -> Self {
        Self { parent, get, get_mut }
    }

    pub async fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let get = self.get;
        self.parent.read(|parent| f(get(parent))).await
    }

    pub async fn mutate<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let get_mut = self.get_mut;
        self.parent.mutate(|parent| f(get_mut(parent))).await
    }

    pub async fn mutate_and_flush<R>(&self, f: impl FnOnce(&mut T) -> R) -> CoreResult<R> {
        let get_mut = self.get_mut;
        self.parent.mutate_and_flush(|parent| f(get_mut(parent))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
    struct Doc {
        counter: u64,
    }

    #[test]
    fn missing_file_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::<Doc>::load(dir.path().join("nope.json"));
        assert_eq!(config.data(), &Doc::default());
    }

    #[test]
    fn malformed_file_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "not json").unwrap();
        let config = Config::<Doc>::load(&path);
        assert_eq!(config.data(), &Doc::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        let mut config = Config::<Doc>::load(&path);
        config.data_mut().counter = 7;
        config.write().unwrap();

        let reloaded = Config::<Doc>::load(&path);
        assert_eq!(reloaded.data().counter, 7);
    }

    #[tokio::test]
    async fn delayed_flush_is_a_noop_when_clean() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        let delayed = Delayed::new(Config::<Doc>::load(&path), Duration::from_secs(3600));
        delayed.flush().await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn mutate_and_flush_writes_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        let delayed = Delayed::new(Config::<Doc>::load(&path), Duration::from_secs(3600));
        delayed.mutate_and_flush(|doc| doc.counter = 3).await.unwrap();
        assert!(path.exists());
    }
}
