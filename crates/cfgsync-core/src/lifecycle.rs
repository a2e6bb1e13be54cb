//! Process shutdown hooks.

use std::sync::{Mutex, PoisonError};

type Task = Box<dyn FnOnce() + Send>;

/// Teardown callbacks run once when the process shuts down.
///
/// Managers register one callback each; [`run`](Self::run) drains the
/// list, so running it twice only runs every callback once.
pub struct ShutdownRegistry {
    tasks: Mutex<Vec<(String, Task)>>,
}

impl ShutdownRegistry {
    /// Create an empty registry.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// The process-wide registry.
    #[must_use]
    pub fn global() -> &'static Self {
        static GLOBAL: ShutdownRegistry = ShutdownRegistry::new();
        &GLOBAL
    }

    /// Register `task` under a descriptive `name`.
    pub fn register(&self, name: impl Into<String>, task: impl FnOnce() + Send + 'static) {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((name.into(), Box::new(task)));
    }

    /// Run and forget every registered task, in registration order.
    ///
    /// Returns how many tasks ran.
    pub fn run(&self) -> usize {
        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner));
        let count = tasks.len();
        for (name, task) in tasks {
            log::debug!("shutdown: {name}");
            task();
        }
        count
    }

    /// Number of tasks waiting to run.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Default for ShutdownRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ShutdownRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownRegistry")
            .field("pending", &self.pending())
            .finish()
    }
}
