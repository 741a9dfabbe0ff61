//! Per-credential client reuse.
//!
//! Every distinct credential maps to one [`ApiClient`], built on first use
//! and shared by all later requests carrying the same credential. The cache
//! is bounded; when full, the entry inserted earliest is dropped regardless
//! of how recently it was used.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use vidcap_core::{Credential, CredentialScope};

use crate::client::{ApiClient, ClientConfig};
use crate::error::ApiError;

pub const DEFAULT_CAPACITY: usize = 100;

struct Inner {
    clients: HashMap<String, Arc<ApiClient>>,
    /// Keys in insertion order, oldest first.
    order: VecDeque<String>,
}

/// Bounded FIFO cache of downstream clients keyed by credential.
pub struct ClientCache {
    inner: Mutex<Inner>,
    config: ClientConfig,
    capacity: usize,
}

impl ClientCache {
    pub fn new(config: ClientConfig) -> Self {
        Self::with_capacity(config, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(config: ClientConfig, capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                clients: HashMap::new(),
                order: VecDeque::new(),
            }),
            config,
            capacity: capacity.max(1),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Cached client for `credential`, building and inserting one if absent.
    pub fn get(&self, credential: &Credential) -> Result<Arc<ApiClient>, ApiError> {
        let key = credential.expose();
        let mut inner = self.inner.lock();

        if let Some(client) = inner.clients.get(key) {
            return Ok(Arc::clone(client));
        }

        let client = Arc::new(ApiClient::new(credential, &self.config)?);

        while inner.clients.len() >= self.capacity {
            let Some(oldest) = inner.order.pop_front() else {
                break;
            };
            inner.clients.remove(&oldest);
            tracing::debug!(size = inner.clients.len(), "evicted oldest cached client");
        }

        inner.clients.insert(key.to_string(), Arc::clone(&client));
        inner.order.push_back(key.to_string());
        tracing::debug!(size = inner.clients.len(), "cached new client");
        Ok(client)
    }

    /// Client for the credential visible to the current request.
    pub fn current(&self) -> Result<Arc<ApiClient>, ApiError> {
        let credential = CredentialScope::current().ok_or(ApiError::MissingCredential)?;
        self.get(&credential)
    }

    pub fn contains(&self, credential: &Credential) -> bool {
        self.inner.lock().clients.contains_key(credential.expose())
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.clients.clear();
        inner.order.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
