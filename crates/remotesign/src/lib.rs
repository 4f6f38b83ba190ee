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

//! # Remotesign
//!
//! Build-time artifact signing through a remote signing service.
//!
//! The crate registers deferred signing tasks for build artifacts, dispatches
//! each artifact to a signing backend, and attaches the signed results to
//! publications as derived artifacts.
//!
//! ## Key Features
//!
//! - Two signature methods: detached PGP signatures (`pgpsign`) and signed
//!   jars (`jarsign`)
//! - Remote provider speaking a small HTTP protocol, with per-method
//!   credentials, timeouts and bounded retries
//! - Dummy provider that copies artifacts unchanged, for offline builds
//! - Settings that freeze on first read
//! - Deterministic task names and output paths under `{build}/remotesign`
//!
//! ## Example
//!
//! ```rust,ignore
//! use remotesign::{ArchiveTask, BuildStep, RemoteSign, RemoteSignSettings};
//!
//! let settings = RemoteSignSettings::from_env("build")?;
//! let session = RemoteSign::new(&settings);
//!
//! let jar = BuildStep::new("jar");
//! let task = session.sign_archive(&ArchiveTask::new("jar", "build/libs/app.jar", jar.clone()))?;
//!
//! // ... the host build writes build/libs/app.jar ...
//! jar.succeed();
//! let signed = task.execute().await?;
//! ```

pub mod artifact;
pub mod audit;
pub mod config;
pub mod error;
pub mod extension;
pub mod method;
pub mod naming;
mod output;
pub mod provider;
pub mod registry;
pub mod task;
pub mod transport;

pub use artifact::{
    DerivedArtifact, DerivedEntry, Publication, PublicationArtifact, SignedArtifact,
    SimplePublication,
};
pub use config::{RemoteSignConfig, RemoteSignSettings, TEMP_DIR_NAME};
pub use error::{ConfigError, RegistrationError, SignError, SigningFailure};
pub use extension::{ArchiveTask, RemoteSign, TaskOutcome};
pub use method::SignatureMethod;
pub use provider::{
    signature_provider, DummySignatureProvider, ProviderCache, RemoteSignatureProvider,
    RetryPolicy, SignatureProvider,
};
pub use registry::TaskRegistry;
pub use task::{BuildStep, SignTask, StepState};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport, TransportError};

/// Installs a formatting subscriber filtered by `RUST_LOG`, defaulting to
/// `info`. Does nothing if a global subscriber is already set.
pub fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .try_init();
}
