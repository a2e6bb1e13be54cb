//! # cfgsync-git
//!
//! Versioned backend for cfgsync, built on git2-rs.
//! Provides the repository wrapper, per-attempt transports with
//! classified failures, and per-endpoint credentials.

mod credentials;
mod error;
mod progress;
mod repository;
mod traits;
mod transport;

pub use credentials::{
    Credentials, CredentialsProvider, CredentialsStore, GitCredentialHelperStore,
    StaticCredentialsStore, endpoint_key,
};
pub use error::{Error, Result};
pub use git2::{Oid, RepositoryState};
pub use progress::{CancellationFlag, NoProgress, Progress, or_noop};
pub use repository::{
    ChangeSet, Identity, MergeOutcome, Repository, checked_path, tracking_ref,
};
pub use traits::GitOps;
pub use transport::{
    GitTransport, PushReport, RefUpdate, Transport, TransportFailure, TransportOpener,
};
