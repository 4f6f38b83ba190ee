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

//! Signing through the remote signing service.
//!
//! # Wire protocol (version 1)
//!
//! Request: `POST {request_url}` with
//!
//! | Header                  | Value                                  |
//! |-------------------------|----------------------------------------|
//! | `Authorization`         | `Bearer {auth_key}`                    |
//! | `X-Signature-Method`    | `pgpsign` or `jarsign`                 |
//! | `X-Remotesign-Protocol` | `1`                                    |
//! | `X-Artifact-Name`       | file name of the artifact              |
//! | `Content-Type`          | `application/octet-stream`             |
//!
//! and the raw artifact bytes as the body. The credential only ever travels
//! in the `Authorization` header.
//!
//! Response: any `2xx` carries the signed payload as the raw body (an
//! armored or binary detached signature for `pgpsign`, the signed jar for
//! `jarsign`). Any other status is an error, optionally described by a JSON
//! body `{"error": "<code>", "message": "<text>"}`. `401` and `403` mean the
//! credential was rejected.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::retry::RetryPolicy;
use super::SignatureProvider;
use crate::audit;
use crate::config::RemoteSignConfig;
use crate::error::{SignError, SigningFailure};
use crate::method::SignatureMethod;
use crate::output::{read_input, write_output};
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, TransportError};

/// Protocol version announced in `X-Remotesign-Protocol`.
pub const PROTOCOL_VERSION: &str = "1";

/// Longest error body quoted verbatim in an error message.
const MAX_QUOTED_BODY: usize = 512;

/// JSON error body returned by the signing service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable error code
    pub error: String,
    /// Human-readable description
    #[serde(default)]
    pub message: Option<String>,
}

/// Provider that uploads the artifact to the signing service and stores the
/// returned payload.
pub struct RemoteSignatureProvider {
    method: SignatureMethod,
    request_url: String,
    auth_key: String,
    transport: Arc<dyn HttpTransport>,
    timeout: Duration,
    retry: RetryPolicy,
}

impl RemoteSignatureProvider {
    /// Create a provider with a 30 second timeout and the default retry policy.
    pub fn new(
        method: SignatureMethod,
        request_url: impl Into<String>,
        auth_key: impl Into<String>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            method,
            request_url: request_url.into(),
            auth_key: auth_key.into(),
            transport,
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }

    /// Create a provider from frozen configuration, picking the credential
    /// registered for `method`.
    pub fn from_config(
        config: &RemoteSignConfig,
        method: SignatureMethod,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, SignError> {
        let request_url = config
            .request_url()
            .ok_or_else(|| SignError::Configuration("request_url is not set".to_string()))?;
        let auth_key = config.auth_key(method).ok_or_else(|| {
            SignError::Configuration(format!("no auth key configured for {method}"))
        })?;

        let retry = RetryPolicy::new(
            config.max_attempts(),
            Duration::from_millis(250),
            Duration::from_secs(5),
        );

        Ok(Self::new(method, request_url, auth_key, transport)
            .with_timeout(config.timeout())
            .with_retry_policy(retry))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn request_url(&self) -> &str {
        &self.request_url
    }

    #[cfg(test)]
    pub(crate) fn auth_key(&self) -> &str {
        &self.auth_key
    }

    fn build_request(&self, input: &Path, body: Vec<u8>) -> HttpRequest {
        let artifact_name = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        HttpRequest {
            url: self.request_url.clone(),
            headers: vec![
                ("Authorization".to_string(), format!("Bearer {}", self.auth_key)),
                ("X-Signature-Method".to_string(), self.method.as_str().to_string()),
                ("X-Remotesign-Protocol".to_string(), PROTOCOL_VERSION.to_string()),
                ("X-Artifact-Name".to_string(), artifact_name),
                (
                    "Content-Type".to_string(),
                    "application/octet-stream".to_string(),
                ),
            ],
            body: Bytes::from(body),
        }
    }

    async fn attempt(&self, request: HttpRequest) -> Result<Vec<u8>, SignError> {
        match tokio::time::timeout(self.timeout, self.transport.post(request)).await {
            Err(_) => Err(SignError::Transport(format!(
                "no response within {:?}",
                self.timeout
            ))),
            Ok(Err(TransportError::InvalidRequest(reason))) => Err(SignError::Configuration(
                format!("cannot build signing request: {reason}"),
            )),
            Ok(Err(e)) => Err(SignError::Transport(e.to_string())),
            Ok(Ok(response)) => self.interpret(response),
        }
    }

    fn interpret(&self, response: HttpResponse) -> Result<Vec<u8>, SignError> {
        if response.is_success() {
            self.method
                .validate_payload(&response.body)
                .map_err(SignError::MalformedResponse)?;
            return Ok(response.body);
        }

        let parsed: Option<ErrorBody> = serde_json::from_slice(&response.body).ok();
        let raw = quote_body(&response.body);

        if matches!(response.status, 401 | 403) {
            let message = parsed
                .map(|b| b.message.unwrap_or(b.error))
                .unwrap_or(raw);
            return Err(SignError::Authentication {
                status: response.status,
                message,
            });
        }

        let (code, message) = match parsed {
            Some(body) => (body.error, body.message.unwrap_or_default()),
            None => (format!("http_{}", response.status), raw),
        };
        Err(SignError::Remote {
            status: response.status,
            code,
            message,
        })
    }

    fn fail(&self, input: &Path, cause: SignError) -> SigningFailure {
        audit::log_sign_failed(self.method, input, &cause.to_string());
        SigningFailure::new(self.method, input, cause)
    }
}

impl fmt::Debug for RemoteSignatureProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteSignatureProvider")
            .field("method", &self.method)
            .field("request_url", &self.request_url)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SignatureProvider for RemoteSignatureProvider {
    fn method(&self) -> SignatureMethod {
        self.method
    }

    fn name(&self) -> &'static str {
        "remote"
    }

    async fn sign(&self, input: &Path, output: &Path) -> Result<PathBuf, SigningFailure> {
        let artifact = read_input(input).await.map_err(|e| self.fail(input, e))?;
        let request = self.build_request(input, artifact);

        let mut attempt = 1;
        let payload = loop {
            match self.attempt(request.clone()).await {
                Ok(payload) => break payload,
                Err(e) if e.is_transient() && attempt < self.retry.max_attempts() => {
                    audit::log_sign_retry(self.method, input, attempt, &e.to_string());
                    tokio::time::sleep(self.retry.delay_for(attempt)).await;
                    attempt += 1;
                }
                Err(e) => return Err(self.fail(input, e)),
            }
        };

        write_output(output, payload)
            .await
            .map_err(|e| self.fail(input, e))?;

        audit::log_signed(self.method, input, output, self.name());
        Ok(output.to_path_buf())
    }
}

fn quote_body(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.chars().count() > MAX_QUOTED_BODY {
        let truncated: String = text.chars().take(MAX_QUOTED_BODY).collect();
        format!("{truncated}...")
    } else {
        text.to_string()
    }
}
