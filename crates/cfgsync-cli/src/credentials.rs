//! Credentials for the CLI.
//!
//! `--username` together with `CFGSYNC_PASSWORD` gives fixed credentials,
//! otherwise git credential helpers are asked. Once the remote rejected
//! what a store handed out, the user is prompted instead (on a terminal).

use std::collections::HashSet;
use std::io::IsTerminal;
use std::sync::{Arc, Mutex, PoisonError};

use cfgsync_git::{
    Credentials, CredentialsStore, GitCredentialHelperStore, StaticCredentialsStore, endpoint_key,
};
use inquire::{Password, Text};

use crate::output;

/// Environment variable holding the password for `--username`.
pub const PASSWORD_ENV: &str = "CFGSYNC_PASSWORD";

/// Build the credentials store for this invocation.
pub fn store(username: Option<&str>) -> Arc<dyn CredentialsStore> {
    let password = std::env::var(PASSWORD_ENV).ok();
    let inner: Box<dyn CredentialsStore> = match (username, password) {
        (Some(user), Some(password)) => Box::new(StaticCredentialsStore::any(Credentials::new(
            user, password,
        ))),
        _ => Box::new(GitCredentialHelperStore),
    };
    Arc::new(PromptingStore::new(inner, std::io::stdin().is_terminal()))
}

/// Store that falls back to asking the user.
pub struct PromptingStore {
    inner: Box<dyn CredentialsStore>,
    interactive: bool,
    rejected: Mutex<HashSet<String>>,
}

impl PromptingStore {
    /// Wrap `inner`; prompts only happen when `interactive` is set.
    pub fn new(inner: Box<dyn CredentialsStore>, interactive: bool) -> Self {
        Self {
            inner,
            interactive,
            rejected: Mutex::default(),
        }
    }

    fn was_rejected(&self, endpoint: &str) -> bool {
        self.rejected
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&endpoint_key(endpoint))
    }
}

impl CredentialsStore for PromptingStore {
    fn get(&self, endpoint: &str, username_hint: Option<&str>) -> Option<Credentials> {
        if !self.was_rejected(endpoint) {
            if let Some(found) = self.inner.get(endpoint, username_hint) {
                return Some(found);
            }
        }
        if !self.interactive {
            return None;
        }
        prompt(endpoint, username_hint)
    }

    fn reset(&self, endpoint: &str) {
        self.inner.reset(endpoint);
        self.rejected
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(endpoint_key(endpoint));
    }
}

fn prompt(endpoint: &str, username_hint: Option<&str>) -> Option<Credentials> {
    output::warn(&format!("Credentials needed for {}", endpoint_key(endpoint)));
    let username = match username_hint {
        Some(user) => user.to_string(),
        None => Text::new("Username:").prompt().ok()?,
    };
    let password = Password::new("Password:")
        .without_confirmation()
        .prompt()
        .ok()?;
    Some(Credentials::new(username, password))
}
