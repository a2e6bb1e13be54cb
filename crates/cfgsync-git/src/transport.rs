//! Per-attempt transports to a remote endpoint.
//!
//! A transport is opened for exactly one push or fetch attempt and
//! released when it is dropped, so every exit path (success, failure,
//! cancellation) gives the connection back before the next attempt.

use std::cell::RefCell;

use git2::{AutotagOption, Cred, ErrorClass, ErrorCode, FetchOptions, PushOptions, RemoteCallbacks};

use crate::credentials::CredentialsProvider;
use crate::error::Result;
use crate::progress::Progress;

/// Classified outcome of a failed transport attempt.
#[derive(Debug)]
pub enum TransportFailure {
    /// The remote refused the supplied credentials.
    NotPermitted(String),
    /// The progress token asked to stop.
    Cancelled,
    /// Any other network or protocol failure.
    Other(String),
}

impl TransportFailure {
    /// Classify a backend error raised during an attempt.
    #[must_use]
    pub fn classify(err: &git2::Error, progress: &dyn Progress) -> Self {
        if progress.is_cancelled() {
            return Self::Cancelled;
        }

        let message = err.message().to_string();
        if err.code() == ErrorCode::Auth || mentions_auth_status(&message) {
            Self::NotPermitted(message)
        } else {
            Self::Other(message)
        }
    }

    /// Whether this is an authentication failure.
    #[must_use]
    pub const fn is_not_permitted(&self) -> bool {
        matches!(self, Self::NotPermitted(_))
    }
}

impl std::fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotPermitted(msg) => write!(f, "not permitted: {msg}"),
            Self::Cancelled => f.write_str("cancelled"),
            Self::Other(msg) => f.write_str(msg),
        }
    }
}

fn mentions_auth_status(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("status code: 401")
        || lower.contains("status code: 403")
        || lower.contains("authentication required")
        || lower.contains("not authorized")
}

/// Result reported by the remote for one pushed ref.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefUpdate {
    /// Remote ref name.
    pub refname: String,
    /// Rejection reason, `None` when the ref was updated.
    pub rejection: Option<String>,
}

/// Telemetry collected during one push.
#[derive(Debug, Clone, Default)]
pub struct PushReport {
    /// Endpoint the push went to.
    pub endpoint: String,
    /// Per-ref results.
    pub updates: Vec<RefUpdate>,
    /// Server side-band messages.
    pub messages: Vec<String>,
}

impl PushReport {
    /// Refs the remote refused to update.
    pub fn rejected(&self) -> impl Iterator<Item = &RefUpdate> {
        self.updates.iter().filter(|u| u.rejection.is_some())
    }

    fn log(&self) {
        if !log::log_enabled!(log::Level::Debug) {
            return;
        }
        for message in self.messages.iter().filter(|m| !m.trim().is_empty()) {
            log::debug!("remote: {}", message.trim_end());
        }
        for update in &self.updates {
            match &update.rejection {
                None => log::debug!("{} -> {}: ok", self.endpoint, update.refname),
                Some(reason) => log::debug!("{} -> {}: {reason}", self.endpoint, update.refname),
            }
        }
    }
}

/// One open connection to a remote endpoint.
pub trait Transport {
    /// The URL this transport talks to.
    fn endpoint(&self) -> &str;

    /// Push exactly `refspecs`.
    ///
    /// # Errors
    /// Returns the classified failure of this attempt.
    fn push(
        &mut self,
        refspecs: &[String],
        credentials: &CredentialsProvider,
        progress: &dyn Progress,
    ) -> std::result::Result<PushReport, TransportFailure>;

    /// Fetch exactly `refspecs`, returning the number of received objects.
    ///
    /// # Errors
    /// Returns the classified failure of this attempt.
    fn fetch(
        &mut self,
        refspecs: &[String],
        credentials: &CredentialsProvider,
        progress: &dyn Progress,
    ) -> std::result::Result<usize, TransportFailure>;
}

/// Something that can open transports to its remotes.
pub trait TransportOpener {
    /// Open a fresh transport to `endpoint`.
    ///
    /// # Errors
    /// Returns error if the endpoint URL is unusable.
    fn open_transport(&self, endpoint: &str) -> Result<Box<dyn Transport + '_>>;
}

/// Transport backed by an anonymous git2 remote.
pub struct GitTransport<'repo> {
    remote: git2::Remote<'repo>,
    endpoint: String,
}

impl<'repo> GitTransport<'repo> {
    /// Open an anonymous remote on `repo` for `endpoint`.
    ///
    /// # Errors
    /// Returns error if git2 rejects the URL.
    pub fn open(repo: &'repo git2::Repository, endpoint: &str) -> Result<Self> {
        let remote = repo.remote_anonymous(endpoint)?;
        log::debug!("opened transport to {endpoint}");
        Ok(Self {
            remote,
            endpoint: endpoint.to_string(),
        })
    }
}

impl Transport for GitTransport<'_> {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn push(
        &mut self,
        refspecs: &[String],
        credentials: &CredentialsProvider,
        progress: &dyn Progress,
    ) -> std::result::Result<PushReport, TransportFailure> {
        let updates = RefCell::new(Vec::new());
        let messages = RefCell::new(Vec::new());

        let result = {
            let mut callbacks = remote_callbacks(credentials, progress);
            callbacks.push_update_reference(|refname, status| {
                updates.borrow_mut().push(RefUpdate {
                    refname: refname.to_string(),
                    rejection: status.map(String::from),
                });
                if progress.is_cancelled() {
                    return Err(git2::Error::new(
                        ErrorCode::User,
                        ErrorClass::Callback,
                        "push cancelled",
                    ));
                }
                Ok(())
            });
            callbacks.sideband_progress(|data| {
                messages
                    .borrow_mut()
                    .push(String::from_utf8_lossy(data).into_owned());
                true
            });

            let mut options = PushOptions::new();
            options.remote_callbacks(callbacks);
            self.remote.push(refspecs, Some(&mut options))
        };

        let report = PushReport {
            endpoint: self.endpoint.clone(),
            updates: updates.into_inner(),
            messages: messages.into_inner(),
        };
        report.log();

        result.map_err(|e| TransportFailure::classify(&e, progress))?;
        Ok(report)
    }

    fn fetch(
        &mut self,
        refspecs: &[String],
        credentials: &CredentialsProvider,
        progress: &dyn Progress,
    ) -> std::result::Result<usize, TransportFailure> {
        let mut options = FetchOptions::new();
        options.remote_callbacks(remote_callbacks(credentials, progress));
        options.download_tags(AutotagOption::None);

        self.remote
            .fetch(refspecs, Some(&mut options), Some("cfgsync: fetch"))
            .map_err(|e| TransportFailure::classify(&e, progress))?;

        let stats = self.remote.stats();
        log::debug!(
            "fetched {} objects from {}",
            stats.received_objects(),
            self.endpoint
        );
        Ok(stats.received_objects())
    }
}

impl Drop for GitTransport<'_> {
    fn drop(&mut self) {
        if self.remote.connected() {
            if let Err(e) = self.remote.disconnect() {
                log::debug!("disconnect from {} failed: {e}", self.endpoint);
            }
        }
        log::debug!("closed transport to {}", self.endpoint);
    }
}

/// Callbacks shared by push and fetch: credentials and progress.
///
/// The credentials callback answers once per attempt. libgit2 calls it
/// again when the remote rejects what it got, and that second call fails
/// with an `Auth` error instead of looping.
fn remote_callbacks<'a>(
    credentials: &'a CredentialsProvider,
    progress: &'a dyn Progress,
) -> RemoteCallbacks<'a> {
    let mut asked = false;
    let mut callbacks = RemoteCallbacks::new();

    callbacks.credentials(move |url, username_from_url, allowed| {
        if asked {
            return Err(git2::Error::new(
                ErrorCode::Auth,
                ErrorClass::Callback,
                format!("credentials rejected by {url}"),
            ));
        }
        asked = true;

        if allowed.is_ssh_key() {
            if let Some(user) = username_from_url {
                return Cred::ssh_key_from_agent(user);
            }
        }
        if allowed.is_user_pass_plaintext() {
            if let Some(found) = credentials.get(url, username_from_url) {
                return Cred::userpass_plaintext(&found.username, found.password());
            }
        }
        if allowed.is_default() {
            return Cred::default();
        }

        Err(git2::Error::new(
            ErrorCode::Auth,
            ErrorClass::Callback,
            format!("no credentials available for {url}"),
        ))
    });

    callbacks.transfer_progress(move |stats| {
        let total = stats.total_objects();
        if total > 0 {
            #[allow(clippy::cast_precision_loss)]
            progress.set_fraction(stats.received_objects() as f64 / total as f64);
        }
        true
    });

    callbacks
}
