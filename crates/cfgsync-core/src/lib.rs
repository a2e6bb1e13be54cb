//! # cfgsync-core
//!
//! Keeps a directory of settings synchronized with an upstream git
//! repository: staging and committing local changes, pushing with a
//! credential-reset retry, fetching and merging, resolving conflicts in
//! either direction, and moving directories in one commit.
//!
//! The entry point is [`SyncManager`].

pub mod batch;
pub mod config;
pub mod error;
pub mod handle;
pub mod lifecycle;
pub mod manager;
pub mod message;
pub mod pull;
pub mod rename;
pub mod reset;
pub mod retry;
pub mod validity;

pub use batch::{BatchFailure, BatchReport, commit_all, run_batch};
pub use config::Config;
pub use error::{Error, Result};
pub use handle::HandleCell;
pub use lifecycle::ShutdownRegistry;
pub use manager::SyncManager;
pub use message::{CommitMessageFormatter, PrefixFormatter};
pub use pull::{UpdateResult, Updater};
pub use rename::RENAME_COMMIT_MESSAGE;
pub use reset::{LocalInitializer, LocalStager};
pub use validity::{GitRepositoryService, RepositoryService, is_valid_repository};
