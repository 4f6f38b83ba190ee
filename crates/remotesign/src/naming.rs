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

//! Task names and output locations for signing tasks.
//!
//! Output paths only depend on the task name, the input file name and the
//! signature method, so they can be computed before anything is built.

use std::path::{Path, PathBuf};

use crate::error::RegistrationError;
use crate::method::SignatureMethod;

/// Prefix shared by every signing task name.
pub const TASK_PREFIX: &str = "sign";

/// Uppercases the first character and leaves the rest untouched.
///
/// An empty name stays empty. Absent names are handled by mapping over the
/// `Option`: `None.map(capitalize)` stays `None`.
pub fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `"sign" + Capitalized(name)`.
pub fn task_name(name: &str) -> String {
    format!("{TASK_PREFIX}{}", capitalize(name))
}

/// Name of the signing task for the artifact at `index` of a publication.
pub fn publication_task_name(publication: &str, index: usize) -> String {
    format!("{}{index}", task_name(publication))
}

/// `{temp_dir}/{task_name}/{file_name}[.{ext}]`, the extension coming from
/// the signature method.
pub fn output_file(
    temp_dir: &Path,
    task_name: &str,
    input: &Path,
    method: SignatureMethod,
) -> Result<PathBuf, RegistrationError> {
    let file_name = input
        .file_name()
        .ok_or_else(|| RegistrationError::MissingFileName(input.to_path_buf()))?;

    let mut file_name = file_name.to_os_string();
    if let Some(ext) = method.output_extension() {
        file_name.push(".");
        file_name.push(ext);
    }

    Ok(temp_dir.join(task_name).join(file_name))
}
