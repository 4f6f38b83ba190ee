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

//! Deferred signing tasks and the build steps they depend on.
//!
//! A [`SignTask`] is registered long before it runs. When it runs it:
//! 1. Waits for every [`BuildStep`] it depends on to succeed
//! 2. Takes one of the session's concurrency slots
//! 3. Resolves the provider for its method and signs input into output
//!
//! A successful run is recorded, and later calls to [`SignTask::execute`]
//! return the same output without signing again. Concurrent callers share
//! the in-flight run.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{watch, OnceCell, Semaphore};
use tracing::debug;

use crate::error::{SignError, SigningFailure};
use crate::method::SignatureMethod;
use crate::provider::ProviderCache;

/// Group every signing task belongs to.
pub const SIGN_GROUP: &str = "sign";

/// Completion state of a [`BuildStep`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepState {
    Pending,
    Succeeded,
    Failed(String),
}

/// Completion token for a unit of work owned by the host build.
///
/// Clones share state: the host keeps one clone and marks it done, signing
/// tasks hold the others and wait on it.
#[derive(Debug, Clone)]
pub struct BuildStep {
    name: Arc<str>,
    state: Arc<watch::Sender<StepState>>,
}

impl BuildStep {
    /// A pending step.
    pub fn new(name: impl AsRef<str>) -> Self {
        let (state, _) = watch::channel(StepState::Pending);
        Self {
            name: Arc::from(name.as_ref()),
            state: Arc::new(state),
        }
    }

    /// A step that has already succeeded.
    pub fn completed(name: impl AsRef<str>) -> Self {
        let step = Self::new(name);
        step.succeed();
        step
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> StepState {
        self.state.borrow().clone()
    }

    pub fn succeed(&self) {
        self.state.send_replace(StepState::Succeeded);
    }

    pub fn fail(&self, reason: impl Into<String>) {
        self.state.send_replace(StepState::Failed(reason.into()));
    }

    /// Waits until the step leaves [`StepState::Pending`].
    pub async fn wait(&self) -> Result<(), SignError> {
        let mut rx = self.state.subscribe();
        let state = match rx.wait_for(|s| *s != StepState::Pending).await {
            Ok(state) => state.clone(),
            Err(_) => StepState::Failed("step was dropped before completing".to_string()),
        };

        match state {
            StepState::Succeeded => Ok(()),
            StepState::Failed(reason) => Err(SignError::DependencyFailed {
                name: self.name.to_string(),
                reason,
            }),
            StepState::Pending => unreachable!("wait_for only returns settled states"),
        }
    }
}

/// A registered, deferred signing operation.
pub struct SignTask {
    name: String,
    input: PathBuf,
    output: PathBuf,
    method: SignatureMethod,
    dependencies: Vec<BuildStep>,
    enabled: AtomicBool,
    providers: Arc<ProviderCache>,
    slots: Arc<Semaphore>,
    completed: OnceCell<PathBuf>,
}

impl SignTask {
    pub(crate) fn new(
        name: String,
        input: PathBuf,
        output: PathBuf,
        method: SignatureMethod,
        dependencies: Vec<BuildStep>,
        providers: Arc<ProviderCache>,
        slots: Arc<Semaphore>,
    ) -> Self {
        Self {
            name,
            input,
            output,
            method,
            dependencies,
            enabled: AtomicBool::new(true),
            providers,
            slots,
            completed: OnceCell::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn signature_method(&self) -> SignatureMethod {
        self.method
    }

    pub fn group(&self) -> &'static str {
        SIGN_GROUP
    }

    pub fn dependencies(&self) -> &[BuildStep] {
        &self.dependencies
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Enables or disables the task without unregistering it.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    /// Whether the task has already produced its output.
    pub fn is_complete(&self) -> bool {
        self.completed.initialized()
    }

    /// Runs the task if it has not succeeded yet and returns its output.
    ///
    /// Once the task has succeeded its output is returned whether or not
    /// the task is still enabled.
    ///
    /// # Errors
    ///
    /// Fails with [`SignError::TaskDisabled`] when a disabled task would have
    /// to run, or with whatever stopped the dependencies or the provider.
    /// Failures are not cached; the next call tries again.
    pub async fn execute(&self) -> Result<PathBuf, SigningFailure> {
        if let Some(output) = self.completed.get() {
            return Ok(output.clone());
        }
        if !self.is_enabled() {
            return Err(self.failure(SignError::TaskDisabled(self.name.clone())));
        }

        self.completed
            .get_or_try_init(|| self.run())
            .await
            .cloned()
    }

    async fn run(&self) -> Result<PathBuf, SigningFailure> {
        for dependency in &self.dependencies {
            debug!(task = %self.name, dependency = %dependency.name(), "Waiting for build dependency");
            dependency.wait().await.map_err(|e| self.failure(e))?;
        }

        let _slot = self.slots.acquire().await.map_err(|_| {
            self.failure(SignError::Configuration(
                "signing slots were closed".to_string(),
            ))
        })?;

        let provider = self
            .providers
            .get(self.method)
            .map_err(|e| self.failure(e))?;

        debug!(task = %self.name, provider = provider.name(), "Running signing task");
        provider.sign(&self.input, &self.output).await
    }

    fn failure(&self, cause: SignError) -> SigningFailure {
        SigningFailure::new(self.method, &self.input, cause)
    }
}

impl std::fmt::Debug for SignTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignTask")
            .field("name", &self.name)
            .field("input", &self.input)
            .field("output", &self.output)
            .field("method", &self.method)
            .field("enabled", &self.is_enabled())
            .field("complete", &self.is_complete())
            .finish_non_exhaustive()
    }
}
