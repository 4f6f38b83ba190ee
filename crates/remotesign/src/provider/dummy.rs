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

//! Offline provider for tests and local builds.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::SignatureProvider;
use crate::audit;
use crate::error::SigningFailure;
use crate::method::SignatureMethod;
use crate::output::{read_input, write_output};

/// Copies the input to the output unchanged. No network, no cryptography.
#[derive(Debug, Clone)]
pub struct DummySignatureProvider {
    method: SignatureMethod,
}

impl DummySignatureProvider {
    pub fn new(method: SignatureMethod) -> Self {
        Self { method }
    }
}

#[async_trait]
impl SignatureProvider for DummySignatureProvider {
    fn method(&self) -> SignatureMethod {
        self.method
    }

    fn name(&self) -> &'static str {
        "dummy"
    }

    async fn sign(&self, input: &Path, output: &Path) -> Result<PathBuf, SigningFailure> {
        let fail = |cause| {
            let failure = SigningFailure::new(self.method, input, cause);
            audit::log_sign_failed(self.method, input, &failure.cause.to_string());
            failure
        };

        let contents = read_input(input).await.map_err(fail)?;
        write_output(output, contents).await.map_err(fail)?;

        audit::log_signed(self.method, input, output, self.name());
        Ok(output.to_path_buf())
    }
}
