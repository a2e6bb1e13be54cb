//! Credential-aware retry around transport attempts.
//!
//! Every push or fetch against one endpoint runs through a small state
//! machine. The first "not permitted" failure resets the cached
//! credentials for that endpoint and tries again; a second one is fatal.
//! Any other failure ends the call immediately. Each attempt gets its own
//! transport, dropped before the next attempt starts.

use cfgsync_git::{
    CredentialsProvider, GitOps, Progress, PushReport, Transport, TransportFailure,
    TransportOpener,
};

use crate::error::{Error, Result};

#[derive(Debug)]
enum RetryState {
    /// First attempt with whatever credentials are cached.
    Attempt,
    /// Credentials were reset once; this is the last attempt.
    AuthRetry,
    /// Stop and report.
    Fail(Error),
}

impl RetryState {
    fn on_failure(
        self,
        failure: TransportFailure,
        endpoint: &str,
        credentials: &CredentialsProvider,
    ) -> Self {
        match (self, failure) {
            (_, TransportFailure::Cancelled) => Self::Fail(Error::Cancelled),
            (Self::Attempt, TransportFailure::NotPermitted(message)) => {
                log::debug!("{endpoint} refused credentials: {message}");
                credentials.reset(endpoint);
                Self::AuthRetry
            }
            (_, TransportFailure::NotPermitted(message)) => {
                log::debug!("{endpoint} refused fresh credentials: {message}");
                Self::Fail(Error::Authentication {
                    endpoint: endpoint.to_string(),
                })
            }
            (_, TransportFailure::Other(message)) => Self::Fail(Error::Transport {
                endpoint: endpoint.to_string(),
                message,
            }),
        }
    }
}

/// Run `attempt` against fresh transports to `endpoint` until it
/// succeeds or the retry budget is spent.
///
/// # Errors
/// Returns `Authentication` after two refusals, `Transport` for any
/// other failure, and `Cancelled` when the token asks to stop.
pub fn run_with_retry<O, T>(
    opener: &O,
    endpoint: &str,
    credentials: &CredentialsProvider,
    progress: &dyn Progress,
    mut attempt: impl FnMut(&mut dyn Transport) -> std::result::Result<T, TransportFailure>,
) -> Result<T>
where
    O: TransportOpener + ?Sized,
{
    let mut state = RetryState::Attempt;
    loop {
        if let RetryState::Fail(err) = state {
            return Err(err);
        }
        if progress.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let outcome = {
            let mut transport = opener.open_transport(endpoint)?;
            attempt(transport.as_mut())
        };

        match outcome {
            Ok(value) => return Ok(value),
            Err(failure) => state = state.on_failure(failure, endpoint, credentials),
        }
    }
}

/// Push `refspecs` to every endpoint, each with its own retry budget.
///
/// Nothing is opened when `refspecs` is empty.
///
/// # Errors
/// Returns the first endpoint's failure; later endpoints are not tried.
pub fn push_with_retry<O>(
    opener: &O,
    endpoints: &[String],
    refspecs: &[String],
    credentials: &CredentialsProvider,
    progress: &dyn Progress,
) -> Result<Vec<PushReport>>
where
    O: TransportOpener + ?Sized,
{
    if refspecs.is_empty() {
        log::debug!("no ref-specs to push");
        return Ok(Vec::new());
    }

    let mut reports = Vec::with_capacity(endpoints.len());
    for endpoint in endpoints {
        progress.set_text(&format!("Pushing to {endpoint}"));
        let report = run_with_retry(opener, endpoint, credentials, progress, |transport| {
            transport.push(refspecs, credentials, progress)
        })?;
        reports.push(report);
    }
    Ok(reports)
}

/// Ref-specs to push for `remote`: the configured push mapping, else the
/// branch HEAD points at. Empty when neither exists.
///
/// # Errors
/// Returns error if the repository configuration can't be read.
pub fn resolve_push_refspecs<G>(repo: &G, remote: &str) -> Result<Vec<String>>
where
    G: GitOps + ?Sized,
{
    let configured = repo.push_ref_specs(remote)?;
    if !configured.is_empty() {
        return Ok(configured);
    }
    Ok(repo.head_symbolic_target()?.into_iter().collect())
}

/// Turn ref-specs into forced ones.
#[must_use]
pub fn forced(refspecs: &[String]) -> Vec<String> {
    refspecs
        .iter()
        .map(|spec| {
            if spec.starts_with('+') {
                spec.clone()
            } else {
                format!("+{spec}")
            }
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::rc::Rc;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use cfgsync_git::{
        CancellationFlag, Credentials, CredentialsStore, NoProgress, RefUpdate,
    };

    #[derive(Default)]
    struct Counters {
        opened: Cell<usize>,
        closed: Cell<usize>,
        refs_sent: Cell<usize>,
    }

    /// Scripted transport outcomes, one per attempt.
    struct MockOpener {
        script: RefCell<VecDeque<std::result::Result<(), TransportFailure>>>,
        counters: Rc<Counters>,
    }

    impl MockOpener {
        fn new(script: Vec<std::result::Result<(), TransportFailure>>) -> Self {
            Self {
                script: RefCell::new(script.into()),
                counters: Rc::default(),
            }
        }
    }

    struct MockTransport {
        endpoint: String,
        outcome: std::result::Result<(), TransportFailure>,
        counters: Rc<Counters>,
    }

    impl Transport for MockTransport {
        fn endpoint(&self) -> &str {
            &self.endpoint
        }

        fn push(
            &mut self,
            refspecs: &[String],
            _credentials: &CredentialsProvider,
            _progress: &dyn Progress,
        ) -> std::result::Result<PushReport, TransportFailure> {
            std::mem::replace(&mut self.outcome, Ok(()))?;
            self.counters
                .refs_sent
                .set(self.counters.refs_sent.get() + refspecs.len());
            Ok(PushReport {
                endpoint: self.endpoint.clone(),
                updates: refspecs
                    .iter()
                    .map(|spec| RefUpdate {
                        refname: spec.clone(),
                        rejection: None,
                    })
                    .collect(),
                messages: Vec::new(),
            })
        }

        fn fetch(
            &mut self,
            _refspecs: &[String],
            _credentials: &CredentialsProvider,
            _progress: &dyn Progress,
        ) -> std::result::Result<usize, TransportFailure> {
            std::mem::replace(&mut self.outcome, Ok(()))?;
            Ok(3)
        }
    }

    impl Drop for MockTransport {
        fn drop(&mut self) {
            self.counters.closed.set(self.counters.closed.get() + 1);
        }
    }

    impl TransportOpener for MockOpener {
        fn open_transport(&self, endpoint: &str) -> cfgsync_git::Result<Box<dyn Transport + '_>> {
            self.counters.opened.set(self.counters.opened.get() + 1);
            let outcome = self.script.borrow_mut().pop_front().unwrap_or(Ok(()));
            Ok(Box::new(MockTransport {
                endpoint: endpoint.to_string(),
                outcome,
                counters: Rc::clone(&self.counters),
            }))
        }
    }

    #[derive(Default)]
    struct ResetCounter {
        resets: AtomicUsize,
    }

    impl CredentialsStore for ResetCounter {
        fn get(&self, _endpoint: &str, _hint: Option<&str>) -> Option<Credentials> {
            Some(Credentials::new("user", "pw"))
        }

        fn reset(&self, _endpoint: &str) {
            self.resets.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn provider() -> (Arc<ResetCounter>, CredentialsProvider) {
        let store = Arc::new(ResetCounter::default());
        let provider = CredentialsProvider::new(store.clone());
        (store, provider)
    }

    fn denied() -> std::result::Result<(), TransportFailure> {
        Err(TransportFailure::NotPermitted("403".into()))
    }

    fn master() -> Vec<String> {
        vec!["refs/heads/master".to_string()]
    }

    fn endpoint() -> Vec<String> {
        vec!["https://example.com/settings.git".to_string()]
    }

    #[test]
    fn test_push_first_attempt() {
        let opener = MockOpener::new(vec![Ok(())]);
        let (store, creds) = provider();

        let reports = push_with_retry(&opener, &endpoint(), &master(), &creds, &NoProgress).unwrap();

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].updates.len(), 1);
        assert_eq!(opener.counters.opened.get(), 1);
        assert_eq!(opener.counters.closed.get(), 1);
        assert_eq!(store.resets.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_push_auth_retry_succeeds() {
        let opener = MockOpener::new(vec![denied(), Ok(())]);
        let (store, creds) = provider();

        push_with_retry(&opener, &endpoint(), &master(), &creds, &NoProgress).unwrap();

        assert_eq!(opener.counters.opened.get(), 2);
        assert_eq!(opener.counters.closed.get(), 2);
        assert_eq!(store.resets.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_push_two_refusals_is_authentication_error() {
        let opener = MockOpener::new(vec![denied(), denied(), Ok(())]);
        let (store, creds) = provider();

        let err = push_with_retry(&opener, &endpoint(), &master(), &creds, &NoProgress).unwrap_err();

        assert!(matches!(err, Error::Authentication { ref endpoint } if endpoint.contains("example.com")));
        // No third attempt
        assert_eq!(opener.counters.opened.get(), 2);
        assert_eq!(opener.counters.closed.get(), 2);
        assert_eq!(store.resets.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_push_other_failure_not_retried() {
        let opener = MockOpener::new(vec![Err(TransportFailure::Other("reset by peer".into()))]);
        let (store, creds) = provider();

        let err = push_with_retry(&opener, &endpoint(), &master(), &creds, &NoProgress).unwrap_err();

        assert!(matches!(err, Error::Transport { ref message, .. } if message == "reset by peer"));
        assert_eq!(opener.counters.opened.get(), 1);
        assert_eq!(opener.counters.closed.get(), 1);
        assert_eq!(store.resets.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_push_refusal_then_other_failure() {
        let opener = MockOpener::new(vec![denied(), Err(TransportFailure::Other("timeout".into()))]);
        let (store, creds) = provider();

        let err = push_with_retry(&opener, &endpoint(), &master(), &creds, &NoProgress).unwrap_err();

        assert!(matches!(err, Error::Transport { .. }));
        assert_eq!(store.resets.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_empty_refspecs_open_nothing() {
        let opener = MockOpener::new(vec![]);
        let (_store, creds) = provider();

        let reports = push_with_retry(&opener, &endpoint(), &[], &creds, &NoProgress).unwrap();

        assert!(reports.is_empty());
        assert_eq!(opener.counters.opened.get(), 0);
        assert_eq!(opener.counters.refs_sent.get(), 0);
    }

    #[test]
    fn test_cancelled_before_attempt() {
        let opener = MockOpener::new(vec![]);
        let (_store, creds) = provider();
        let flag = CancellationFlag::new();
        flag.cancel();

        let err = push_with_retry(&opener, &endpoint(), &master(), &creds, &flag).unwrap_err();

        assert!(matches!(err, Error::Cancelled));
        assert_eq!(opener.counters.opened.get(), 0);
    }

    #[test]
    fn test_each_endpoint_has_own_budget() {
        let opener = MockOpener::new(vec![denied(), Ok(()), denied(), Ok(())]);
        let (store, creds) = provider();
        let endpoints = vec![
            "https://one.example.com/s.git".to_string(),
            "https://two.example.com/s.git".to_string(),
        ];

        let reports = push_with_retry(&opener, &endpoints, &master(), &creds, &NoProgress).unwrap();

        assert_eq!(reports.len(), 2);
        assert_eq!(opener.counters.opened.get(), 4);
        assert_eq!(opener.counters.closed.get(), 4);
        assert_eq!(store.resets.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_fetch_uses_same_rule() {
        let opener = MockOpener::new(vec![denied(), denied()]);
        let (store, creds) = provider();
        let url = "https://example.com/settings.git";

        let err = run_with_retry(&opener, url, &creds, &NoProgress, |t| {
            t.fetch(&master(), &creds, &NoProgress)
        })
        .unwrap_err();

        assert!(matches!(err, Error::Authentication { .. }));
        assert_eq!(store.resets.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_forced() {
        let specs = vec!["refs/heads/a".to_string(), "+refs/heads/b".to_string()];
        assert_eq!(forced(&specs), vec!["+refs/heads/a", "+refs/heads/b"]);
    }
}
