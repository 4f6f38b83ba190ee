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

//! Remote signing against a local fake signing service.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Router,
};
use remotesign::{
    ArchiveTask, BuildStep, PublicationArtifact, RemoteSign, RemoteSignSettings, SignError,
    SimplePublication,
};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::net::TcpListener;

const PGP_KEY: &str = "pgp-token";
const JAR_KEY: &str = "jar-token";
const ARMORED: &str = "-----BEGIN PGP SIGNATURE-----\n\niQEzBAABCAAdFiEE\n-----END PGP SIGNATURE-----\n";

#[derive(Debug, Clone)]
struct Received {
    headers: HeaderMap,
    body: Vec<u8>,
}

#[derive(Clone, Default)]
struct FakeService {
    received: Arc<Mutex<Vec<Received>>>,
    unavailable_responses: Arc<AtomicUsize>,
}

impl FakeService {
    fn requests(&self) -> Vec<Received> {
        self.received.lock().unwrap().clone()
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

async fn sign(
    State(service): State<FakeService>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Vec<u8>) {
    service.received.lock().unwrap().push(Received {
        headers: headers.clone(),
        body: body.to_vec(),
    });

    if service
        .unavailable_responses
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
    {
        return (StatusCode::SERVICE_UNAVAILABLE, b"try later".to_vec());
    }

    let method = header(&headers, "x-signature-method");
    let expected_key = match method {
        "pgpsign" => PGP_KEY,
        "jarsign" => JAR_KEY,
        _ => {
            let body = br#"{"error":"unsupported_method","message":"unknown method"}"#;
            return (StatusCode::BAD_REQUEST, body.to_vec());
        }
    };
    if header(&headers, "authorization") != format!("Bearer {expected_key}") {
        let body = br#"{"error":"unauthorized","message":"invalid token"}"#;
        return (StatusCode::UNAUTHORIZED, body.to_vec());
    }

    match method {
        "pgpsign" => (StatusCode::OK, ARMORED.as_bytes().to_vec()),
        _ => {
            let mut signed = body.to_vec();
            signed.extend_from_slice(b"META-INF/SIGNED");
            (StatusCode::OK, signed)
        }
    }
}

async fn start(service: FakeService) -> SocketAddr {
    let app = Router::new().route("/sign", post(sign)).with_state(service);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn remote_session(build_dir: &std::path::Path, addr: SocketAddr, jar_key: &str) -> RemoteSign {
    let settings = RemoteSignSettings::new(build_dir);
    settings.set_request_url(format!("http://{addr}/sign")).unwrap();
    settings.set_pgp_auth_key(PGP_KEY).unwrap();
    settings.set_jar_auth_key(jar_key).unwrap();
    settings.set_max_attempts(3).unwrap();
    RemoteSign::new(&settings)
}

#[tokio::test]
async fn test_jar_signed_by_remote_service() -> anyhow::Result<()> {
    let service = FakeService::default();
    let addr = start(service.clone()).await;
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("app.jar");
    std::fs::write(&input, b"PK\x03\x04app")?;

    let session = remote_session(dir.path(), addr, JAR_KEY);
    let task = session.sign_archive(&ArchiveTask::new("jar", &input, BuildStep::completed("jar")))?;
    let output = task.execute().await?;

    assert_eq!(std::fs::read(&output)?, b"PK\x03\x04appMETA-INF/SIGNED");

    let requests = service.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.body, b"PK\x03\x04app");
    assert_eq!(header(&request.headers, "authorization"), "Bearer jar-token");
    assert_eq!(header(&request.headers, "x-signature-method"), "jarsign");
    assert_eq!(header(&request.headers, "x-remotesign-protocol"), "1");
    assert_eq!(header(&request.headers, "x-artifact-name"), "app.jar");
    assert_eq!(
        header(&request.headers, "content-type"),
        "application/octet-stream"
    );
    Ok(())
}

#[tokio::test]
async fn test_publication_uses_pgp_credential() {
    let service = FakeService::default();
    let addr = start(service.clone()).await;
    let dir = TempDir::new().unwrap();
    let pom = dir.path().join("app-1.0.pom");
    std::fs::write(&pom, b"<project/>").unwrap();

    let session = remote_session(dir.path(), addr, JAR_KEY);
    let mut publication =
        SimplePublication::new("maven").with_artifact(PublicationArtifact::new(&pom));
    session.sign_publication(&mut publication).unwrap();

    let signature = publication.derived_artifacts()[0]
        .artifact
        .create()
        .await
        .unwrap();

    assert!(signature.to_string_lossy().ends_with("app-1.0.pom.asc"));
    assert_eq!(std::fs::read_to_string(&signature).unwrap(), ARMORED);
    let requests = service.requests();
    assert_eq!(header(&requests[0].headers, "authorization"), "Bearer pgp-token");
    assert_eq!(header(&requests[0].headers, "x-signature-method"), "pgpsign");
}

#[tokio::test]
async fn test_rejected_credential_fails_without_retry() {
    let service = FakeService::default();
    let addr = start(service.clone()).await;
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("app.jar");
    std::fs::write(&input, b"PK\x03\x04app").unwrap();
    let output = dir.path().join("signed").join("app.jar");

    let session = remote_session(dir.path(), addr, "wrong-token");
    let task = session.sign_file(&input, &output, "app").unwrap();
    let failure = task.execute().await.unwrap_err();

    assert!(matches!(
        failure.cause,
        SignError::Authentication { status: 401, ref message } if message == "invalid token"
    ));
    assert_eq!(service.requests().len(), 1);
    assert!(!output.exists());
}

#[tokio::test]
async fn test_unavailable_service_is_retried() {
    let service = FakeService::default();
    service.unavailable_responses.store(1, Ordering::SeqCst);
    let addr = start(service.clone()).await;
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("app.jar");
    std::fs::write(&input, b"PK\x03\x04app").unwrap();

    let session = remote_session(dir.path(), addr, JAR_KEY);
    let task = session
        .sign_file(&input, dir.path().join("app-signed.jar"), "app")
        .unwrap();
    let output = task.execute().await.unwrap();

    assert!(output.exists());
    assert_eq!(service.requests().len(), 2);
}

#[tokio::test]
async fn test_persistent_unavailability_gives_up() {
    let service = FakeService::default();
    service.unavailable_responses.store(10, Ordering::SeqCst);
    let addr = start(service.clone()).await;
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("app.jar");
    std::fs::write(&input, b"PK\x03\x04app").unwrap();

    let session = remote_session(dir.path(), addr, JAR_KEY);
    let output = dir.path().join("app-signed.jar");
    let task = session.sign_file(&input, &output, "app").unwrap();
    let failure = task.execute().await.unwrap_err();

    assert!(matches!(
        failure.cause,
        SignError::Remote { status: 503, ref code, .. } if code == "http_503"
    ));
    assert_eq!(service.requests().len(), 3);
    assert!(!output.exists());
}
