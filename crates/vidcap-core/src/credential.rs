//! Request-scoped credentials.
//!
//! A credential is bound to one logical request with [`CredentialScope::run`]
//! and read back anywhere inside that request's future with
//! [`CredentialScope::current`], without threading it through call
//! signatures. The binding is a tokio task-local, so it follows the future
//! across `.await` points and never leaks into other requests interleaved on
//! the same worker thread. Work moved onto a new task with `tokio::spawn`
//! does not inherit the scope and must re-enter it explicitly.

use std::future::Future;
use std::sync::OnceLock;

use secrecy::{ExposeSecret, SecretString};

/// Accepted credential length, in characters, inclusive.
pub const MIN_CREDENTIAL_LEN: usize = 10;
pub const MAX_CREDENTIAL_LEN: usize = 200;

/// An API credential, zeroized on drop and redacted in `Debug`.
#[derive(Clone)]
pub struct Credential(SecretString);

impl Credential {
    /// Wrap a value without validation. Used for trusted sources such as the
    /// process environment.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(SecretString::from(raw.into()))
    }

    /// Validate a caller-supplied credential.
    pub fn parse(raw: &str) -> Result<Self, CredentialFormatError> {
        let length = raw.chars().count();
        if !(MIN_CREDENTIAL_LEN..=MAX_CREDENTIAL_LEN).contains(&length) {
            return Err(CredentialFormatError { length });
        }
        Ok(Self::new(raw))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}

impl PartialEq for Credential {
    fn eq(&self, other: &Self) -> bool {
        self.expose() == other.expose()
    }
}

impl Eq for Credential {}

/// Credential rejected before any scope was established.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error(
    "invalid API key format: length {length} outside {}..={}",
    MIN_CREDENTIAL_LEN,
    MAX_CREDENTIAL_LEN
)]
pub struct CredentialFormatError {
    pub length: usize,
}

tokio::task_local! {
    static SCOPED: Option<Credential>;
}

static PROCESS_DEFAULT: OnceLock<Option<Credential>> = OnceLock::new();

/// Accessors for the request-scoped credential.
pub struct CredentialScope;

impl CredentialScope {
    /// Run `fut` with `credential` visible to [`CredentialScope::current`].
    /// Nested scopes shadow outer ones for their duration.
    pub async fn run<F>(credential: Option<Credential>, fut: F) -> F::Output
    where
        F: Future,
    {
        SCOPED.scope(credential, fut).await
    }

    /// The credential of the enclosing scope only, ignoring the fallback.
    pub fn scoped() -> Option<Credential> {
        SCOPED.try_with(Clone::clone).ok().flatten()
    }

    /// Nearest scope value, else the installed process default, else `None`.
    pub fn current() -> Option<Credential> {
        Self::scoped().or_else(Self::process_default)
    }

    /// Install the process-wide fallback. Only the first call takes effect;
    /// returns `false` when a default was already installed.
    pub fn install_default(credential: Option<Credential>) -> bool {
        PROCESS_DEFAULT.set(credential).is_ok()
    }

    pub fn process_default() -> Option<Credential> {
        PROCESS_DEFAULT.get().cloned().flatten()
    }
}
