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

//! Configuration for remote signing.
//!
//! Settings are collected through [`RemoteSignSettings`] and frozen into an
//! immutable [`RemoteSignConfig`] the first time they are read. Every setter
//! fails with [`ConfigError::Finalized`] from then on, so all signing
//! operations of a session observe the same endpoint and credentials.
//!
//! ```rust,ignore
//! let settings = RemoteSignSettings::new("build");
//! settings.set_request_url("https://sign.example.com/api/sign")?;
//! settings.set_pgp_auth_key("pgp-token")?;
//! settings.set_jar_auth_key("jar-token")?;
//!
//! let config = settings.get();
//! assert!(settings.set_jar_auth_key("other").is_err());
//! ```

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::audit;
use crate::error::ConfigError;
use crate::method::SignatureMethod;

/// Name of the directory under the build directory that holds signed outputs.
pub const TEMP_DIR_NAME: &str = "remotesign";

const ENV_REQUEST_URL: &str = "REMOTESIGN_REQUEST_URL";
const ENV_PGP_AUTH_KEY: &str = "REMOTESIGN_PGP_AUTH_KEY";
const ENV_JAR_AUTH_KEY: &str = "REMOTESIGN_JAR_AUTH_KEY";
const ENV_USE_DUMMY: &str = "REMOTESIGN_USE_DUMMY";
const ENV_TIMEOUT_SECS: &str = "REMOTESIGN_TIMEOUT_SECS";
const ENV_MAX_ATTEMPTS: &str = "REMOTESIGN_MAX_ATTEMPTS";

/// Frozen signing configuration.
///
/// Obtained from [`RemoteSignSettings::get`]. Cheap to share behind an `Arc`
/// and never mutated after creation.
#[derive(Clone)]
pub struct RemoteSignConfig {
    request_url: Option<String>,
    credentials: HashMap<SignatureMethod, String>,
    use_dummy_for_testing: bool,
    timeout: Duration,
    max_attempts: u32,
    max_concurrent_signings: usize,
    temp_dir: PathBuf,
}

impl RemoteSignConfig {
    /// Endpoint of the remote signing service.
    pub fn request_url(&self) -> Option<&str> {
        self.request_url.as_deref()
    }

    /// Credential used for the given method.
    ///
    /// Methods without a configured credential return `None`; there is no
    /// fallback to another method's key.
    pub fn auth_key(&self, method: SignatureMethod) -> Option<&str> {
        self.credentials.get(&method).map(String::as_str)
    }

    /// Whether the dummy provider replaces the remote one.
    pub fn use_dummy_for_testing(&self) -> bool {
        self.use_dummy_for_testing
    }

    /// Per-request timeout against the signing service.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Maximum attempts per signing request, first attempt included.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Upper bound on signing tasks running at once.
    pub fn max_concurrent_signings(&self) -> usize {
        self.max_concurrent_signings
    }

    /// Root directory for signed outputs.
    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }
}

impl fmt::Debug for RemoteSignConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut methods: Vec<&str> = self.credentials.keys().map(|m| m.as_str()).collect();
        methods.sort_unstable();

        f.debug_struct("RemoteSignConfig")
            .field("request_url", &self.request_url)
            .field("credentials_for", &methods)
            .field("use_dummy_for_testing", &self.use_dummy_for_testing)
            .field("timeout", &self.timeout)
            .field("max_attempts", &self.max_attempts)
            .field("max_concurrent_signings", &self.max_concurrent_signings)
            .field("temp_dir", &self.temp_dir)
            .finish()
    }
}

struct PendingSettings {
    config: RemoteSignConfig,
    finalized: bool,
}

/// Mutable signing settings with finalize-on-first-read semantics.
pub struct RemoteSignSettings {
    pending: Mutex<PendingSettings>,
    frozen: OnceCell<Arc<RemoteSignConfig>>,
}

impl RemoteSignSettings {
    /// Creates settings with defaults, rooting signed outputs at
    /// `{build_dir}/remotesign`.
    pub fn new(build_dir: impl AsRef<Path>) -> Self {
        Self {
            pending: Mutex::new(PendingSettings {
                config: RemoteSignConfig {
                    request_url: None,
                    credentials: HashMap::new(),
                    use_dummy_for_testing: false,
                    timeout: Duration::from_secs(30),
                    max_attempts: 3,
                    max_concurrent_signings: 4,
                    temp_dir: build_dir.as_ref().join(TEMP_DIR_NAME),
                },
                finalized: false,
            }),
            frozen: OnceCell::new(),
        }
    }

    /// Creates settings from `REMOTESIGN_*` environment variables.
    ///
    /// A `.env` file in the working directory is loaded first if present.
    /// Unset variables keep their defaults.
    pub fn from_env(build_dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        let settings = Self::new(build_dir);

        if let Ok(url) = std::env::var(ENV_REQUEST_URL) {
            settings.set_request_url(url)?;
        }
        if let Ok(key) = std::env::var(ENV_PGP_AUTH_KEY) {
            settings.set_pgp_auth_key(key)?;
        }
        if let Ok(key) = std::env::var(ENV_JAR_AUTH_KEY) {
            settings.set_jar_auth_key(key)?;
        }
        if let Ok(raw) = std::env::var(ENV_USE_DUMMY) {
            settings.set_use_dummy_for_testing(parse_bool(ENV_USE_DUMMY, &raw)?)?;
        }
        if let Ok(raw) = std::env::var(ENV_TIMEOUT_SECS) {
            let secs = raw.trim().parse::<u64>().map_err(|e| ConfigError::InvalidValue {
                key: ENV_TIMEOUT_SECS.to_string(),
                reason: e.to_string(),
            })?;
            settings.set_timeout(Duration::from_secs(secs))?;
        }
        if let Ok(raw) = std::env::var(ENV_MAX_ATTEMPTS) {
            let attempts = raw.trim().parse::<u32>().map_err(|e| ConfigError::InvalidValue {
                key: ENV_MAX_ATTEMPTS.to_string(),
                reason: e.to_string(),
            })?;
            settings.set_max_attempts(attempts)?;
        }

        Ok(settings)
    }

    /// Sets the signing service endpoint. Must be an absolute http(s) URL.
    pub fn set_request_url(&self, url: impl Into<String>) -> Result<(), ConfigError> {
        let url = url.into();
        let parsed = url::Url::parse(&url).map_err(|e| ConfigError::InvalidValue {
            key: "request_url".to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidValue {
                key: "request_url".to_string(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }
        self.update("request_url", |config| config.request_url = Some(url))
    }

    /// Sets the credential used for [`SignatureMethod::PgpSign`].
    pub fn set_pgp_auth_key(&self, key: impl Into<String>) -> Result<(), ConfigError> {
        self.set_auth_key(SignatureMethod::PgpSign, key)
    }

    /// Sets the credential used for [`SignatureMethod::JarSign`].
    pub fn set_jar_auth_key(&self, key: impl Into<String>) -> Result<(), ConfigError> {
        self.set_auth_key(SignatureMethod::JarSign, key)
    }

    /// Sets the credential for an arbitrary method.
    pub fn set_auth_key(
        &self,
        method: SignatureMethod,
        key: impl Into<String>,
    ) -> Result<(), ConfigError> {
        let key = key.into();
        let property = match method {
            SignatureMethod::PgpSign => "pgp_auth_key",
            SignatureMethod::JarSign => "jar_auth_key",
        };
        // The key travels as a bearer token and must form a valid header value.
        if reqwest::header::HeaderValue::from_str(&format!("Bearer {key}")).is_err() {
            return Err(ConfigError::InvalidValue {
                key: property.to_string(),
                reason: "not a valid HTTP header value".to_string(),
            });
        }
        self.update(property, |config| {
            config.credentials.insert(method, key);
        })
    }

    /// Routes all signing through the dummy provider.
    pub fn set_use_dummy_for_testing(&self, value: bool) -> Result<(), ConfigError> {
        self.update("use_dummy_for_testing", |config| {
            config.use_dummy_for_testing = value
        })
    }

    /// Sets the per-request timeout.
    pub fn set_timeout(&self, value: Duration) -> Result<(), ConfigError> {
        if value.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "timeout".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        self.update("timeout", |config| config.timeout = value)
    }

    /// Sets the maximum number of attempts per signing request.
    pub fn set_max_attempts(&self, value: u32) -> Result<(), ConfigError> {
        if value == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_attempts".to_string(),
                reason: "at least one attempt is required".to_string(),
            });
        }
        self.update("max_attempts", |config| config.max_attempts = value)
    }

    /// Sets how many signing tasks may run concurrently.
    pub fn set_max_concurrent_signings(&self, value: usize) -> Result<(), ConfigError> {
        if value == 0 || value > Semaphore::MAX_PERMITS {
            return Err(ConfigError::InvalidValue {
                key: "max_concurrent_signings".to_string(),
                reason: format!("must be between 1 and {}", Semaphore::MAX_PERMITS),
            });
        }
        self.update("max_concurrent_signings", |config| {
            config.max_concurrent_signings = value
        })
    }

    /// Whether the settings have been read and frozen.
    pub fn is_finalized(&self) -> bool {
        self.frozen.get().is_some()
    }

    /// Reads the settings, freezing them on first call.
    pub fn get(&self) -> Arc<RemoteSignConfig> {
        self.frozen
            .get_or_init(|| {
                let mut pending = self.pending.lock();
                pending.finalized = true;
                let config = pending.config.clone();
                audit::log_config_finalized(&config);
                Arc::new(config)
            })
            .clone()
    }

    fn update<F>(&self, property: &'static str, apply: F) -> Result<(), ConfigError>
    where
        F: FnOnce(&mut RemoteSignConfig),
    {
        let mut pending = self.pending.lock();
        if pending.finalized {
            return Err(ConfigError::Finalized(property));
        }
        apply(&mut pending.config);
        Ok(())
    }
}

impl fmt::Debug for RemoteSignSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteSignSettings")
            .field("finalized", &self.is_finalized())
            .finish_non_exhaustive()
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            reason: format!("expected a boolean, got '{other}'"),
        }),
    }
}
