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

//! Offline signing runs with the dummy provider and custom providers.

use async_trait::async_trait;
use remotesign::{
    ArchiveTask, BuildStep, RemoteSign, RemoteSignSettings, SignError, SignatureMethod,
    SignatureProvider, SigningFailure,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn dummy_session(build_dir: &Path) -> RemoteSign {
    let settings = RemoteSignSettings::new(build_dir);
    settings.set_use_dummy_for_testing(true).unwrap();
    RemoteSign::new(&settings)
}

/// Copies input to output, counting calls and the peak number in flight.
#[derive(Default)]
struct CountingProvider {
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl SignatureProvider for CountingProvider {
    fn method(&self) -> SignatureMethod {
        SignatureMethod::JarSign
    }

    fn name(&self) -> &'static str {
        "counting"
    }

    async fn sign(&self, input: &Path, output: &Path) -> Result<PathBuf, SigningFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(30)).await;
        let result = tokio::fs::copy(input, output)
            .await
            .map(|_| output.to_path_buf())
            .map_err(|e| {
                SigningFailure::new(
                    SignatureMethod::JarSign,
                    input,
                    SignError::Transport(e.to_string()),
                )
            });

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

#[tokio::test]
async fn test_archive_signed_by_dummy_is_byte_identical() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("a.jar");
    let contents = b"PK\x03\x04 not really a jar".to_vec();
    std::fs::write(&input, &contents).unwrap();

    let session = dummy_session(&dir.path().join("build"));
    let jar = BuildStep::new("jar");
    let task = session
        .sign_archive(&ArchiveTask::new("jar", &input, jar.clone()))
        .unwrap();
    jar.succeed();

    let output = task.execute().await.unwrap();

    let expected = dir
        .path()
        .join("build")
        .join("remotesign")
        .join("signJar")
        .join("a.jar");
    assert_eq!(output, expected);
    assert_eq!(std::fs::read(&output).unwrap(), contents);
}

#[tokio::test]
async fn test_sign_file_creates_missing_output_directories() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("fat.jar");
    std::fs::write(&input, b"PK\x03\x04fat").unwrap();
    let output = dir.path().join("deep").join("nested").join("fat-signed.jar");

    let session = dummy_session(dir.path());
    let task = session.sign_file(&input, &output, "fatJar").unwrap();

    assert_eq!(task.execute().await.unwrap(), output);
    assert_eq!(std::fs::read(&output).unwrap(), b"PK\x03\x04fat");
}

#[tokio::test]
async fn test_missing_input_reports_method_and_path() {
    let dir = TempDir::new().unwrap();
    let session = dummy_session(dir.path());
    let input = dir.path().join("missing.jar");
    let task = session
        .sign_file(&input, dir.path().join("out.jar"), "missing")
        .unwrap();

    let failure = task.execute().await.unwrap_err();

    assert_eq!(failure.method, SignatureMethod::JarSign);
    assert_eq!(failure.input, input);
    assert!(matches!(failure.cause, SignError::InputNotFound(_)));
    assert!(!dir.path().join("out.jar").exists());
}

#[tokio::test]
async fn test_repeated_execution_signs_once() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("a.jar");
    std::fs::write(&input, b"PK\x03\x04a").unwrap();

    std::fs::create_dir_all(dir.path().join("out")).unwrap();

    let session = dummy_session(dir.path());
    let provider = Arc::new(CountingProvider::default());
    session.register_provider(provider.clone());
    let task = session
        .sign_file(&input, dir.path().join("out/a.jar"), "a")
        .unwrap();

    let (first, second) = tokio::join!(task.execute(), task.execute());
    let third = task.execute().await;

    assert_eq!(first.unwrap(), second.unwrap());
    assert!(third.is_ok());
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_concurrent_signings_are_bounded() {
    let dir = TempDir::new().unwrap();
    let settings = RemoteSignSettings::new(dir.path());
    settings.set_use_dummy_for_testing(true).unwrap();
    settings.set_max_concurrent_signings(2).unwrap();
    let session = RemoteSign::new(&settings);

    let provider = Arc::new(CountingProvider::default());
    session.register_provider(provider.clone());

    for i in 0..6 {
        let input = dir.path().join(format!("lib{i}.jar"));
        std::fs::write(&input, b"PK\x03\x04").unwrap();
        session
            .sign_file(&input, dir.path().join(format!("out/lib{i}.jar")), &format!("lib{i}"))
            .unwrap();
    }
    std::fs::create_dir_all(dir.path().join("out")).unwrap();

    let outcomes = session.run_all().await;

    assert_eq!(outcomes.len(), 6);
    assert!(outcomes.iter().all(|o| o.result.is_ok()));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 6);
    assert!(provider.peak.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn test_failed_build_step_blocks_signing_until_retried() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("a.jar");
    let session = dummy_session(dir.path());

    let jar = BuildStep::new("jar");
    let task = session
        .sign_archive(&ArchiveTask::new("jar", &input, jar.clone()))
        .unwrap();
    jar.fail("compilation failed");

    let failure = task.execute().await.unwrap_err();
    assert!(matches!(
        failure.cause,
        SignError::DependencyFailed { ref name, .. } if name == "jar"
    ));
    assert!(!task.is_complete());

    std::fs::write(&input, b"PK\x03\x04a").unwrap();
    jar.succeed();

    let output = task.execute().await.unwrap();
    assert!(output.exists());
    assert!(task.is_complete());
}
