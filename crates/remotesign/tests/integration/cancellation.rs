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

//! Abandoning signing tasks part way through.

use async_trait::async_trait;
use remotesign::{
    HttpRequest, HttpResponse, HttpTransport, RemoteSign, RemoteSignSettings, TransportError,
};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Never answers the first request; answers later ones with a signed jar.
#[derive(Default)]
struct StallOnce {
    calls: AtomicUsize,
}

#[async_trait]
impl HttpTransport for StallOnce {
    async fn post(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            std::future::pending::<()>().await;
        }
        Ok(HttpResponse {
            status: 200,
            headers: Vec::new(),
            body: request.body.to_vec(),
        })
    }
}

fn leftover_files(dir: &Path) -> Vec<String> {
    if !dir.exists() {
        return Vec::new();
    }
    std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect()
}

#[tokio::test]
async fn test_aborted_task_leaves_no_output() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("app.jar");
    std::fs::write(&input, b"PK\x03\x04app").unwrap();
    let output_dir = dir.path().join("signed");
    let output = output_dir.join("app.jar");

    let settings = RemoteSignSettings::new(dir.path());
    settings.set_request_url("https://sign.example.com/sign").unwrap();
    settings.set_jar_auth_key("jar-token").unwrap();
    settings.set_timeout(Duration::from_secs(60)).unwrap();
    let transport = Arc::new(StallOnce::default());
    let session = RemoteSign::with_transport(settings.get(), transport.clone());
    let task = session.sign_file(&input, &output, "app").unwrap();

    let running = {
        let task = task.clone();
        tokio::spawn(async move { task.execute().await })
    };
    while transport.calls.load(Ordering::SeqCst) == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    running.abort();
    assert!(running.await.unwrap_err().is_cancelled());

    assert!(!output.exists());
    assert!(leftover_files(&output_dir)
        .iter()
        .all(|name| !name.starts_with(".remotesign-")));
    assert!(!task.is_complete());

    // The abandoned run is not remembered; the next one signs normally.
    let signed = task.execute().await.unwrap();
    assert_eq!(signed, output);
    assert_eq!(leftover_files(&output_dir), vec!["app.jar".to_string()]);
}
