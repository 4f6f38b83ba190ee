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

//! Publication-facing types: artifacts, publications and the derived
//! artifacts produced by signing.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::SigningFailure;
use crate::task::{BuildStep, SignTask};

/// A file produced from an original artifact and published alongside it.
///
/// The file need not exist until [`create`](DerivedArtifact::create) is
/// called, and publishers must check
/// [`should_be_published`](DerivedArtifact::should_be_published) before
/// every use.
#[async_trait]
pub trait DerivedArtifact: Send + Sync {
    /// Whether the artifact is currently meant to be published.
    fn should_be_published(&self) -> bool;

    /// Produces the file, waiting for whatever creates it, and returns it.
    async fn create(&self) -> Result<PathBuf, SigningFailure>;
}

/// Derived artifact backed by a signing task.
#[derive(Debug, Clone)]
pub struct SignedArtifact {
    task: Arc<SignTask>,
}

impl SignedArtifact {
    pub fn new(task: Arc<SignTask>) -> Self {
        Self { task }
    }

    /// The task that builds this artifact.
    pub fn task(&self) -> &Arc<SignTask> {
        &self.task
    }
}

#[async_trait]
impl DerivedArtifact for SignedArtifact {
    fn should_be_published(&self) -> bool {
        self.task.is_enabled()
    }

    async fn create(&self) -> Result<PathBuf, SigningFailure> {
        self.task.execute().await
    }
}

/// An artifact of a publication and the build steps that produce it.
#[derive(Debug, Clone)]
pub struct PublicationArtifact {
    file: PathBuf,
    build_dependencies: Vec<BuildStep>,
}

impl PublicationArtifact {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            build_dependencies: Vec::new(),
        }
    }

    pub fn built_by(mut self, step: BuildStep) -> Self {
        self.build_dependencies.push(step);
        self
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn build_dependencies(&self) -> &[BuildStep] {
        &self.build_dependencies
    }
}

/// The part of a host publication that signing needs.
pub trait Publication {
    fn name(&self) -> &str;

    /// Artifacts to sign, in a stable order.
    fn publishable_artifacts(&self) -> Vec<PublicationArtifact>;

    /// Attaches `derived` as a derived artifact of `original`.
    fn add_derived_artifact(
        &mut self,
        original: &PublicationArtifact,
        derived: Arc<dyn DerivedArtifact>,
    );
}

/// A derived artifact attached to a [`SimplePublication`].
#[derive(Clone)]
pub struct DerivedEntry {
    pub original: PathBuf,
    pub artifact: Arc<dyn DerivedArtifact>,
}

/// In-memory [`Publication`] for hosts without a publication model of their
/// own, and for tests.
#[derive(Default)]
pub struct SimplePublication {
    name: String,
    artifacts: Vec<PublicationArtifact>,
    derived: Vec<DerivedEntry>,
}

impl SimplePublication {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            artifacts: Vec::new(),
            derived: Vec::new(),
        }
    }

    pub fn with_artifact(mut self, artifact: PublicationArtifact) -> Self {
        self.artifacts.push(artifact);
        self
    }

    pub fn derived_artifacts(&self) -> &[DerivedEntry] {
        &self.derived
    }

    /// Derived artifacts that should currently be published.
    pub fn published_derived_artifacts(&self) -> Vec<&DerivedEntry> {
        self.derived
            .iter()
            .filter(|entry| entry.artifact.should_be_published())
            .collect()
    }
}

impl Publication for SimplePublication {
    fn name(&self) -> &str {
        &self.name
    }

    fn publishable_artifacts(&self) -> Vec<PublicationArtifact> {
        self.artifacts.clone()
    }

    fn add_derived_artifact(
        &mut self,
        original: &PublicationArtifact,
        derived: Arc<dyn DerivedArtifact>,
    ) {
        self.derived.push(DerivedEntry {
            original: original.file().to_path_buf(),
            artifact: derived,
        });
    }
}
