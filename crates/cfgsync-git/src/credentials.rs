//! Credentials for authenticated remote operations.
//!
//! Passwords are held in [`SecretString`] so they are zeroized on drop.
//! The [`CredentialsProvider`] caches one entry per remote endpoint and
//! supports evicting a single entry after the remote rejected it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use secrecy::{ExposeSecret, SecretString};

/// Username/password pair for one remote endpoint.
pub struct Credentials {
    /// User name sent to the remote.
    pub username: String,
    password: SecretString,
}

impl Credentials {
    /// Create credentials from a username and password.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }

    /// The password in clear text, for handing to the transport.
    #[must_use]
    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }

    fn duplicate(&self) -> Self {
        Self::new(self.username.clone(), self.password().to_owned())
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Backing store that can obtain credentials for an endpoint.
pub trait CredentialsStore: Send + Sync {
    /// Obtain credentials for `endpoint`, creating them if the store can.
    fn get(&self, endpoint: &str, username_hint: Option<&str>) -> Option<Credentials>;

    /// Forget whatever the store remembers for `endpoint`.
    fn reset(&self, endpoint: &str);
}

/// In-memory store, keyed by endpoint with an optional catch-all entry.
#[derive(Default)]
pub struct StaticCredentialsStore {
    entries: Mutex<HashMap<String, Credentials>>,
    fallback: Option<Credentials>,
}

impl StaticCredentialsStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that answers every endpoint with `credentials`.
    #[must_use]
    pub fn any(credentials: Credentials) -> Self {
        Self {
            entries: Mutex::default(),
            fallback: Some(credentials),
        }
    }

    /// Add credentials for a specific endpoint.
    #[must_use]
    pub fn with(self, endpoint: &str, credentials: Credentials) -> Self {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(endpoint_key(endpoint), credentials);
        self
    }
}

impl CredentialsStore for StaticCredentialsStore {
    fn get(&self, endpoint: &str, _username_hint: Option<&str>) -> Option<Credentials> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(&endpoint_key(endpoint))
            .or(self.fallback.as_ref())
            .map(Credentials::duplicate)
    }

    fn reset(&self, endpoint: &str) {
        // Static entries are configuration, they survive a reset.
        log::debug!("static credentials kept for {}", endpoint_key(endpoint));
    }
}

/// Store backed by the user's git credential helpers.
#[derive(Debug, Default, Clone, Copy)]
pub struct GitCredentialHelperStore;

impl CredentialsStore for GitCredentialHelperStore {
    fn get(&self, endpoint: &str, username_hint: Option<&str>) -> Option<Credentials> {
        let config = git2::Config::open_default().ok()?;
        let mut helper = git2::CredentialHelper::new(endpoint);
        helper.config(&config);
        if username_hint.is_some() {
            helper.username(username_hint);
        }
        let (username, password) = helper.execute()?;
        Some(Credentials::new(username, password))
    }

    fn reset(&self, endpoint: &str) {
        log::debug!("credential helper will be asked again for {endpoint}");
    }
}

/// Per-endpoint cache in front of a [`CredentialsStore`].
///
/// Shared by every transport attempt of one manager.
pub struct CredentialsProvider {
    store: Arc<dyn CredentialsStore>,
    cache: Mutex<HashMap<String, Arc<Credentials>>>,
}

impl CredentialsProvider {
    /// Create a provider over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn CredentialsStore>) -> Self {
        Self {
            store,
            cache: Mutex::default(),
        }
    }

    /// Credentials for `url`, from the cache or the store.
    #[must_use]
    pub fn get(&self, url: &str, username_hint: Option<&str>) -> Option<Arc<Credentials>> {
        let key = endpoint_key(url);
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(cached) = cache.get(&key) {
            return Some(Arc::clone(cached));
        }

        let credentials = Arc::new(self.store.get(url, username_hint)?);
        cache.insert(key, Arc::clone(&credentials));
        Some(credentials)
    }

    /// Evict the cached entry for `url` and reset it in the store.
    pub fn reset(&self, url: &str) {
        let key = endpoint_key(url);
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key);
        self.store.reset(url);
        log::warn!("credentials for {key} were rejected and have been reset");
    }

    /// Whether an entry for `url` is currently cached.
    #[must_use]
    pub fn is_cached(&self, url: &str) -> bool {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&endpoint_key(url))
    }
}

impl std::fmt::Debug for CredentialsProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("CredentialsProvider")
            .field("cached_endpoints", &cache.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Normalize a remote URL into a cache key: user-info and trailing
/// slashes are dropped, scp-like URLs are kept as they are.
#[must_use]
pub fn endpoint_key(url: &str) -> String {
    let url = url.trim().trim_end_matches('/');
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };

    let (authority, path) = rest.split_once('/').unwrap_or((rest, ""));
    let host = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
    if path.is_empty() {
        format!("{scheme}://{host}")
    } else {
        format!("{scheme}://{host}/{path}")
    }
}
