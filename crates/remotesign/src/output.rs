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

//! Reading artifacts and publishing signed outputs.
//!
//! Outputs are staged in a temporary file inside the destination directory
//! and renamed into place once fully written. A reader of the output path
//! therefore sees either nothing, the previous file, or the complete new
//! file. The staging file is removed when dropped, including when the
//! operation is abandoned halfway: dropping the future returned by
//! [`write_output`] stops the staged file from being renamed into place.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::SignError;

/// Reads the whole input artifact.
pub(crate) async fn read_input(path: &Path) -> Result<Vec<u8>, SignError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(SignError::InputNotFound(path.to_path_buf()))
        }
        Err(e) => Err(SignError::InputRead {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Atomically writes `contents` to `output`, creating parent directories.
pub(crate) async fn write_output(output: &Path, contents: Vec<u8>) -> Result<(), SignError> {
    let abandoned = Arc::new(AtomicBool::new(false));
    let _guard = AbandonOnDrop(abandoned.clone());

    let path = output.to_path_buf();
    tokio::task::spawn_blocking(move || write_atomically(&path, &contents, &abandoned))
        .await
        .map_err(|e| SignError::OutputWrite {
            path: output.to_path_buf(),
            source: io::Error::other(e.to_string()),
        })?
}

/// Flags the write as abandoned when the awaiting future goes away.
struct AbandonOnDrop(Arc<AtomicBool>);

impl Drop for AbandonOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

fn write_atomically(
    output: &Path,
    contents: &[u8],
    abandoned: &AtomicBool,
) -> Result<(), SignError> {
    let write_error = |source: io::Error| SignError::OutputWrite {
        path: output.to_path_buf(),
        source,
    };

    let parent = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    // create_dir_all tolerates the directory appearing concurrently.
    std::fs::create_dir_all(&parent).map_err(write_error)?;

    let mut staged = tempfile::Builder::new()
        .prefix(".remotesign-")
        .suffix(".part")
        .tempfile_in(&parent)
        .map_err(write_error)?;
    staged.write_all(contents).map_err(write_error)?;
    staged.as_file().sync_all().map_err(write_error)?;

    if abandoned.load(Ordering::Acquire) {
        return Err(write_error(io::Error::new(
            io::ErrorKind::Interrupted,
            "signing was cancelled before the output was published",
        )));
    }
    staged.persist(output).map_err(|e| write_error(e.error))?;

    Ok(())
}
