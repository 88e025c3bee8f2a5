// Build-once shared handle.
//
// The fingerprint index and the archive location cache are expensive to
// build and read-only afterwards. `LazyShared` runs the builder at most once
// per handle even when several threads ask at the same time: the first
// caller takes the build lock, re-checks, builds and publishes; everyone
// else either sees the published value or waits on the lock and then sees
// it. A failed build publishes nothing, so the next caller retries.

use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

pub struct LazyShared<T> {
    value: OnceLock<Arc<T>>,
    build_lock: Mutex<()>,
}

impl<T> LazyShared<T> {
    pub fn new() -> Self {
        Self {
            value: OnceLock::new(),
            build_lock: Mutex::new(()),
        }
    }

    /// Wrap an already-built value.
    pub fn ready(value: T) -> Self {
        let lazy = Self::new();
        let _ = lazy.value.set(Arc::new(value));
        lazy
    }

    /// The value, if some caller already built it.
    pub fn get(&self) -> Option<Arc<T>> {
        self.value.get().cloned()
    }

    pub fn is_built(&self) -> bool {
        self.value.get().is_some()
    }

    /// Return the shared value, running `build` first if nobody has yet.
    pub fn get_or_try_build<E>(&self, build: impl FnOnce() -> Result<T, E>) -> Result<Arc<T>, E> {
        if let Some(v) = self.value.get() {
            return Ok(Arc::clone(v));
        }
        let _guard = self.build_lock.lock();
        if let Some(v) = self.value.get() {
            return Ok(Arc::clone(v));
        }
        let built = Arc::new(build()?);
        let _ = self.value.set(Arc::clone(&built));
        Ok(built)
    }
}

impl<T> Default for LazyShared<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for LazyShared<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyShared")
            .field("value", &self.value.get())
            .finish()
    }
}
