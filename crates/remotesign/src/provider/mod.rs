/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Signing backends.
//!
//! This module provides:
//! - [`SignatureProvider`] trait implemented by every backend
//! - [`DummySignatureProvider`] for offline tests
//! - [`RemoteSignatureProvider`] talking to the signing service
//! - [`signature_provider`] factory selecting one from configuration

mod dummy;
mod remote;
mod retry;

pub use dummy::DummySignatureProvider;
pub use remote::{ErrorBody, RemoteSignatureProvider, PROTOCOL_VERSION};
pub use retry::RetryPolicy;

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::RemoteSignConfig;
use crate::error::{SignError, SigningFailure};
use crate::method::SignatureMethod;
use crate::transport::{HttpTransport, ReqwestTransport};

/// A backend that turns an input artifact into its signed output.
///
/// Implementations must write the output atomically: on failure nothing
/// readable is left at `output`. Calls for different outputs may run
/// concurrently.
#[async_trait]
pub trait SignatureProvider: Send + Sync {
    /// The method this provider signs with.
    fn method(&self) -> SignatureMethod;

    /// Short backend name used in logs.
    fn name(&self) -> &'static str;

    /// Sign `input`, writing the result to `output`, and return `output`.
    async fn sign(&self, input: &Path, output: &Path) -> Result<PathBuf, SigningFailure>;
}

/// Resolves the provider for `method` from a frozen configuration.
///
/// With `use_dummy_for_testing` set this is always the dummy provider.
/// Otherwise it is a remote provider using `request_url` and the credential
/// registered for `method`; a missing URL or credential is a configuration
/// error.
pub fn signature_provider(
    config: &RemoteSignConfig,
    method: SignatureMethod,
) -> Result<Arc<dyn SignatureProvider>, SignError> {
    if config.use_dummy_for_testing() {
        return Ok(Arc::new(DummySignatureProvider::new(method)));
    }

    let transport = ReqwestTransport::with_timeout(config.timeout())
        .map_err(|e| SignError::Configuration(format!("cannot build HTTP client: {e}")))?;
    signature_provider_with_transport(config, method, Arc::new(transport))
}

/// Like [`signature_provider`], with a caller-supplied transport for the
/// remote case.
pub fn signature_provider_with_transport(
    config: &RemoteSignConfig,
    method: SignatureMethod,
    transport: Arc<dyn HttpTransport>,
) -> Result<Arc<dyn SignatureProvider>, SignError> {
    if config.use_dummy_for_testing() {
        return Ok(Arc::new(DummySignatureProvider::new(method)));
    }

    let provider = RemoteSignatureProvider::from_config(config, method, transport)?;
    Ok(Arc::new(provider))
}

/// Resolves providers lazily and keeps one per method for the session.
pub struct ProviderCache {
    config: Arc<RemoteSignConfig>,
    transport: Option<Arc<dyn HttpTransport>>,
    resolved: Mutex<HashMap<SignatureMethod, Arc<dyn SignatureProvider>>>,
}

impl ProviderCache {
    pub fn new(config: Arc<RemoteSignConfig>) -> Self {
        Self {
            config,
            transport: None,
            resolved: Mutex::new(HashMap::new()),
        }
    }

    /// Remote providers created by this cache use `transport`.
    pub fn with_transport(config: Arc<RemoteSignConfig>, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            config,
            transport: Some(transport),
            resolved: Mutex::new(HashMap::new()),
        }
    }

    /// Installs `provider` for its method, replacing any resolved one.
    pub fn register(&self, provider: Arc<dyn SignatureProvider>) {
        self.resolved.lock().insert(provider.method(), provider);
    }

    /// Returns the provider for `method`, resolving it on first use.
    pub fn get(&self, method: SignatureMethod) -> Result<Arc<dyn SignatureProvider>, SignError> {
        let mut resolved = self.resolved.lock();
        if let Some(provider) = resolved.get(&method) {
            return Ok(provider.clone());
        }

        let provider = match &self.transport {
            Some(transport) => {
                signature_provider_with_transport(&self.config, method, transport.clone())?
            }
            None => signature_provider(&self.config, method)?,
        };
        tracing::debug!(method = %method, provider = provider.name(), "Resolved signature provider");
        resolved.insert(method, provider.clone());
        Ok(provider)
    }
}

impl fmt::Debug for ProviderCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let resolved: Vec<SignatureMethod> = self.resolved.lock().keys().copied().collect();
        f.debug_struct("ProviderCache")
            .field("resolved", &resolved)
            .finish_non_exhaustive()
    }
}
