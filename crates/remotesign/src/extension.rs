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

//! Registration and execution of signing tasks.
//!
//! [`RemoteSign`] is the entry point a host build talks to. It offers three
//! ways to register signing work:
//!
//! | Call                                  | Task name                    | Output                                  | Method    |
//! |---------------------------------------|------------------------------|-----------------------------------------|-----------|
//! | [`sign_publication`]                  | `sign{Publication}{index}`   | `{temp}/{task}/{file}.asc`              | `pgpsign` |
//! | [`sign_archive`]                      | `sign{Task}`                 | `{temp}/{task}/{file}`                  | `jarsign` |
//! | [`sign_file`]                         | `sign{Name}`                 | caller supplied                         | `jarsign` |
//!
//! Tasks are deferred: nothing is signed until a task is executed, either
//! directly, through the derived artifact attached to a publication, or via
//! [`run_all`].
//!
//! [`sign_publication`]: RemoteSign::sign_publication
//! [`sign_archive`]: RemoteSign::sign_archive
//! [`sign_file`]: RemoteSign::sign_file
//! [`run_all`]: RemoteSign::run_all

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::artifact::{Publication, PublicationArtifact, SignedArtifact};
use crate::audit;
use crate::config::{RemoteSignConfig, RemoteSignSettings};
use crate::error::{RegistrationError, SignError, SigningFailure};
use crate::method::SignatureMethod;
use crate::naming;
use crate::provider::{ProviderCache, SignatureProvider};
use crate::registry::TaskRegistry;
use crate::task::{BuildStep, SignTask};
use crate::transport::HttpTransport;

/// An archive-producing task of the host build, such as a jar task.
#[derive(Debug, Clone)]
pub struct ArchiveTask {
    name: String,
    archive_file: PathBuf,
    step: BuildStep,
}

impl ArchiveTask {
    /// `step` completes when the archive has been written.
    pub fn new(name: impl Into<String>, archive_file: impl Into<PathBuf>, step: BuildStep) -> Self {
        Self {
            name: name.into(),
            archive_file: archive_file.into(),
            step,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn archive_file(&self) -> &Path {
        &self.archive_file
    }

    pub fn step(&self) -> &BuildStep {
        &self.step
    }
}

/// Outcome of one task in [`RemoteSign::run_all`].
#[derive(Debug)]
pub struct TaskOutcome {
    pub task: String,
    pub result: Result<PathBuf, SigningFailure>,
}

/// Signing orchestrator for one build session.
#[derive(Debug)]
pub struct RemoteSign {
    config: Arc<RemoteSignConfig>,
    providers: Arc<ProviderCache>,
    registry: TaskRegistry,
    slots: Arc<Semaphore>,
}

impl RemoteSign {
    /// Creates the orchestrator, freezing `settings`.
    pub fn new(settings: &RemoteSignSettings) -> Self {
        Self::from_config(settings.get())
    }

    pub fn from_config(config: Arc<RemoteSignConfig>) -> Self {
        let providers = Arc::new(ProviderCache::new(config.clone()));
        Self::assemble(config, providers)
    }

    /// Like [`from_config`](Self::from_config), sending remote requests
    /// through `transport`.
    pub fn with_transport(config: Arc<RemoteSignConfig>, transport: Arc<dyn HttpTransport>) -> Self {
        let providers = Arc::new(ProviderCache::with_transport(config.clone(), transport));
        Self::assemble(config, providers)
    }

    fn assemble(config: Arc<RemoteSignConfig>, providers: Arc<ProviderCache>) -> Self {
        let slots = Arc::new(Semaphore::new(config.max_concurrent_signings()));
        Self {
            config,
            providers,
            registry: TaskRegistry::new(),
            slots,
        }
    }

    pub fn config(&self) -> &RemoteSignConfig {
        &self.config
    }

    /// Root of all computed output paths.
    pub fn temp_dir(&self) -> &Path {
        self.config.temp_dir()
    }

    /// The provider used for `method` this session.
    pub fn signature_provider(
        &self,
        method: SignatureMethod,
    ) -> Result<Arc<dyn SignatureProvider>, SignError> {
        self.providers.get(method)
    }

    /// Replaces the provider used for its method.
    pub fn register_provider(&self, provider: Arc<dyn SignatureProvider>) {
        self.providers.register(provider);
    }

    /// Registers one PGP signing task per publishable artifact and attaches
    /// each as a derived artifact of its original.
    ///
    /// Registration is all or nothing: on error no task is registered and
    /// the publication is left untouched.
    pub fn sign_publication(
        &self,
        publication: &mut dyn Publication,
    ) -> Result<Vec<Arc<SignTask>>, RegistrationError> {
        let (artifacts, pending): (Vec<_>, Vec<_>) =
            self.plan_publication(&*publication)?.into_iter().unzip();
        let tasks = self.register_batch(pending)?;

        for (artifact, task) in artifacts.iter().zip(&tasks) {
            publication.add_derived_artifact(artifact, Arc::new(SignedArtifact::new(task.clone())));
        }
        Ok(tasks)
    }

    /// Like [`sign_publication`](Self::sign_publication) for several
    /// publications at once, registering all of their tasks or none.
    pub fn sign_publications(
        &self,
        publications: &mut [&mut dyn Publication],
    ) -> Result<Vec<Arc<SignTask>>, RegistrationError> {
        let mut owners = Vec::new();
        let mut artifacts = Vec::new();
        let mut pending = Vec::new();
        for (owner, publication) in publications.iter().enumerate() {
            for (artifact, task) in self.plan_publication(&**publication)? {
                owners.push(owner);
                artifacts.push(artifact);
                pending.push(task);
            }
        }

        let tasks = self.register_batch(pending)?;
        for ((owner, artifact), task) in owners.into_iter().zip(&artifacts).zip(&tasks) {
            publications[owner]
                .add_derived_artifact(artifact, Arc::new(SignedArtifact::new(task.clone())));
        }
        Ok(tasks)
    }

    /// Registers a jar signing task for the archive produced by `archive`.
    pub fn sign_archive(&self, archive: &ArchiveTask) -> Result<Arc<SignTask>, RegistrationError> {
        let task = self.plan_archive(archive)?;
        self.register_one(task)
    }

    /// Registers a jar signing task per archive, all or nothing.
    pub fn sign_archives(
        &self,
        archives: &[ArchiveTask],
    ) -> Result<Vec<Arc<SignTask>>, RegistrationError> {
        let pending = archives
            .iter()
            .map(|archive| self.plan_archive(archive))
            .collect::<Result<Vec<_>, _>>()?;
        self.register_batch(pending)
    }

    /// Registers a jar signing task with explicit input and output.
    pub fn sign_file(
        &self,
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        name: &str,
    ) -> Result<Arc<SignTask>, RegistrationError> {
        let task = self.new_task(
            naming::task_name(name),
            input.into(),
            output.into(),
            SignatureMethod::JarSign,
            Vec::new(),
        );
        self.register_one(task)
    }

    pub fn task(&self, name: &str) -> Option<Arc<SignTask>> {
        self.registry.get(name)
    }

    pub fn tasks(&self) -> Vec<Arc<SignTask>> {
        self.registry.all()
    }

    /// Executes every enabled task, concurrently, and reports each outcome
    /// in registration order.
    pub async fn run_all(&self) -> Vec<TaskOutcome> {
        let runs = self
            .registry
            .all()
            .into_iter()
            .filter(|task| task.is_enabled())
            .map(|task| async move {
                let result = task.execute().await;
                TaskOutcome {
                    task: task.name().to_string(),
                    result,
                }
            });

        futures::future::join_all(runs).await
    }

    fn plan_publication(
        &self,
        publication: &dyn Publication,
    ) -> Result<Vec<(PublicationArtifact, SignTask)>, RegistrationError> {
        let publication_name = publication.name();

        publication
            .publishable_artifacts()
            .into_iter()
            .enumerate()
            .map(|(index, artifact)| {
                let name = naming::publication_task_name(publication_name, index);
                let output = naming::output_file(
                    self.temp_dir(),
                    &name,
                    artifact.file(),
                    SignatureMethod::PgpSign,
                )?;
                let task = self.new_task(
                    name,
                    artifact.file().to_path_buf(),
                    output,
                    SignatureMethod::PgpSign,
                    artifact.build_dependencies().to_vec(),
                );
                Ok((artifact, task))
            })
            .collect()
    }

    fn plan_archive(&self, archive: &ArchiveTask) -> Result<SignTask, RegistrationError> {
        let name = naming::task_name(archive.name());
        let output = naming::output_file(
            self.temp_dir(),
            &name,
            archive.archive_file(),
            SignatureMethod::JarSign,
        )?;

        Ok(self.new_task(
            name,
            archive.archive_file().to_path_buf(),
            output,
            SignatureMethod::JarSign,
            vec![archive.step().clone()],
        ))
    }

    fn new_task(
        &self,
        name: String,
        input: PathBuf,
        output: PathBuf,
        method: SignatureMethod,
        dependencies: Vec<BuildStep>,
    ) -> SignTask {
        SignTask::new(
            name,
            input,
            output,
            method,
            dependencies,
            self.providers.clone(),
            self.slots.clone(),
        )
    }

    fn register_one(&self, task: SignTask) -> Result<Arc<SignTask>, RegistrationError> {
        let task = self.registry.register(task)?;
        log_registered(&task);
        Ok(task)
    }

    fn register_batch(
        &self,
        tasks: Vec<SignTask>,
    ) -> Result<Vec<Arc<SignTask>>, RegistrationError> {
        let tasks = self.registry.register_all(tasks)?;
        tasks.iter().for_each(|task| log_registered(task));
        Ok(tasks)
    }
}

fn log_registered(task: &SignTask) {
    audit::log_task_registered(task.name(), task.signature_method(), task.input(), task.output());
}
