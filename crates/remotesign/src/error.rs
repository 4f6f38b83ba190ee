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

//! Error types for signing, configuration and task registration.

use std::path::PathBuf;
use thiserror::Error;

use crate::method::SignatureMethod;

/// The underlying reason a signing operation failed.
#[derive(Debug, Error)]
pub enum SignError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Signing service rejected the credential (HTTP {status}): {message}")]
    Authentication {
        /// HTTP status returned by the service (401 or 403)
        status: u16,
        /// Error body returned by the service
        message: String,
    },

    #[error("Signing service returned HTTP {status} ({code}): {message}")]
    Remote {
        /// HTTP status returned by the service
        status: u16,
        /// Machine-readable error code from the response body
        code: String,
        /// Human-readable error text
        message: String,
    },

    #[error("Malformed response from signing service: {0}")]
    MalformedResponse(String),

    #[error("Input artifact not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("Failed to read input artifact {}: {source}", path.display())]
    InputRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write signed output {}: {source}", path.display())]
    OutputWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Build dependency '{name}' failed: {reason}")]
    DependencyFailed { name: String, reason: String },

    #[error("Signing task '{0}' is disabled")]
    TaskDisabled(String),
}

impl SignError {
    /// Whether another attempt against the signing service could succeed.
    ///
    /// Only transport failures and gateway-class statuses qualify. Client
    /// errors, authentication rejections included, never do.
    pub fn is_transient(&self) -> bool {
        match self {
            SignError::Transport(_) => true,
            SignError::Remote { status, .. } => matches!(status, 502 | 503 | 504),
            _ => false,
        }
    }
}

/// A failed signing operation, naming the artifact and method involved.
#[derive(Debug, Error)]
#[error("Failed to sign {} with {method}: {cause}", input.display())]
pub struct SigningFailure {
    pub method: SignatureMethod,
    pub input: PathBuf,
    #[source]
    pub cause: SignError,
}

impl SigningFailure {
    pub fn new(method: SignatureMethod, input: impl Into<PathBuf>, cause: SignError) -> Self {
        Self {
            method,
            input: input.into(),
            cause,
        }
    }
}

/// Errors raised by the settings layer.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Property '{0}' is final and cannot be changed after it has been read")]
    Finalized(&'static str),

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Errors raised while registering signing tasks.
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("A task named '{0}' is already registered")]
    DuplicateTask(String),

    #[error("Artifact has no file name: {}", .0.display())]
    MissingFileName(PathBuf),
}
