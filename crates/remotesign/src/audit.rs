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

//! Structured audit logging for signing operations.
//!
//! Every event carries an `event_type` field from [`events`] so that log
//! pipelines can filter on it. Credentials are never logged; only the
//! method they belong to.

use std::path::Path;

use crate::config::RemoteSignConfig;
use crate::method::SignatureMethod;

/// Event types for signing operations.
pub mod events {
    /// A signing task was registered.
    pub const TASK_REGISTERED: &str = "sign.task.registered";
    /// An artifact was signed.
    pub const SIGN_SUCCESS: &str = "sign.success";
    /// Signing an artifact failed.
    pub const SIGN_FAILURE: &str = "sign.failure";
    /// A transient failure is being retried.
    pub const SIGN_RETRY: &str = "sign.retry";
    /// Settings were read and frozen.
    pub const CONFIG_FINALIZED: &str = "config.finalized";
}

/// Log the registration of a signing task.
pub fn log_task_registered(task_name: &str, method: SignatureMethod, input: &Path, output: &Path) {
    tracing::debug!(
        event_type = events::TASK_REGISTERED,
        task_name = %task_name,
        method = %method,
        input = %input.display(),
        output = %output.display(),
        "Signing task registered"
    );
}

/// Log a successful signing operation.
pub fn log_signed(method: SignatureMethod, input: &Path, output: &Path, provider: &str) {
    tracing::info!(
        event_type = events::SIGN_SUCCESS,
        method = %method,
        provider = %provider,
        input = %input.display(),
        output = %output.display(),
        "Artifact signed"
    );
}

/// Log a failed signing operation.
pub fn log_sign_failed(method: SignatureMethod, input: &Path, error: &str) {
    tracing::error!(
        event_type = events::SIGN_FAILURE,
        method = %method,
        input = %input.display(),
        error = %error,
        "Artifact signing failed"
    );
}

/// Log a retry after a transient failure.
pub fn log_sign_retry(method: SignatureMethod, input: &Path, attempt: u32, error: &str) {
    tracing::warn!(
        event_type = events::SIGN_RETRY,
        method = %method,
        input = %input.display(),
        attempt = attempt,
        error = %error,
        "Transient signing failure, retrying"
    );
}

/// Log the frozen configuration.
pub fn log_config_finalized(config: &RemoteSignConfig) {
    tracing::debug!(
        event_type = events::CONFIG_FINALIZED,
        request_url = config.request_url().unwrap_or("<unset>"),
        use_dummy_for_testing = config.use_dummy_for_testing(),
        pgp_credential = config.auth_key(SignatureMethod::PgpSign).is_some(),
        jar_credential = config.auth_key(SignatureMethod::JarSign).is_some(),
        "Signing configuration finalized"
    );
}
