//! Lazily opened, relocatable repository handle.
//!
//! The handle is bound to one working directory. It is opened on first
//! use, thrown away when the directory changes, and released on close.
//! All access goes through one mutex, so the handle is never opened twice
//! concurrently and never used while it is being replaced.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::Result;

type Opener<R> = Box<dyn Fn(&Path) -> cfgsync_git::Result<R> + Send + Sync>;

struct Slot<R> {
    dir: PathBuf,
    handle: Option<R>,
}

/// Memoizing owner of exactly one handle per directory.
pub struct HandleCell<R> {
    opener: Opener<R>,
    slot: Mutex<Slot<R>>,
}

impl<R> HandleCell<R> {
    /// Create an empty cell for `dir`; `opener` runs on first access.
    pub fn new(
        dir: impl Into<PathBuf>,
        opener: impl Fn(&Path) -> cfgsync_git::Result<R> + Send + Sync + 'static,
    ) -> Self {
        Self {
            opener: Box::new(opener),
            slot: Mutex::new(Slot {
                dir: dir.into(),
                handle: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot<R>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` against the handle, opening it first if needed.
    ///
    /// # Errors
    /// Returns the opener's error, or whatever `f` returns.
    pub fn with<T>(&self, f: impl FnOnce(&R) -> Result<T>) -> Result<T> {
        let mut slot = self.lock();
        let handle = match slot.handle.take() {
            Some(handle) => handle,
            None => {
                let opened = (self.opener)(&slot.dir)?;
                log::debug!("opened repository at {}", slot.dir.display());
                opened
            }
        };
        f(slot.handle.insert(handle))
    }

    /// Install an already opened handle, dropping the previous one.
    pub fn install(&self, handle: R) {
        self.lock().handle = Some(handle);
    }

    /// Bind the cell to `dir`. The current handle is discarded, never
    /// reused, and the next access opens a new one.
    ///
    /// Returns whether a handle was discarded.
    pub fn relocate(&self, dir: impl Into<PathBuf>) -> bool {
        let mut slot = self.lock();
        slot.dir = dir.into();
        let discarded = slot.handle.take().is_some();
        if discarded {
            log::debug!("discarded handle, now bound to {}", slot.dir.display());
        }
        discarded
    }

    /// Release the handle. Closing an empty cell is a no-op.
    ///
    /// Returns whether a handle was released.
    pub fn close(&self) -> bool {
        let mut slot = self.lock();
        let closed = slot.handle.take().is_some();
        if closed {
            log::debug!("closed repository at {}", slot.dir.display());
        }
        closed
    }

    /// Directory the cell is bound to.
    #[must_use]
    pub fn dir(&self) -> PathBuf {
        self.lock().dir.clone()
    }

    /// Whether a handle is currently open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.lock().handle.is_some()
    }
}

impl<R> std::fmt::Debug for HandleCell<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slot = self.lock();
        f.debug_struct("HandleCell")
            .field("dir", &slot.dir)
            .field("open", &slot.handle.is_some())
            .finish()
    }
}
