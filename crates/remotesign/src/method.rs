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

//! Signature methods understood by the remote signing service.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// ASCII armor header of a detached OpenPGP signature.
const PGP_ARMOR_HEADER: &[u8] = b"-----BEGIN PGP SIGNATURE-----";

/// Local file header magic that every jar (zip) archive starts with.
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// Which signing scheme to apply to an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignatureMethod {
    /// Detached OpenPGP signature written next to the artifact as `<name>.asc`.
    #[serde(rename = "pgpsign")]
    PgpSign,
    /// Signed replacement of a jar archive, same file name as the input.
    #[serde(rename = "jarsign")]
    JarSign,
}

impl SignatureMethod {
    /// All methods, in wire order.
    pub const ALL: [SignatureMethod; 2] = [SignatureMethod::PgpSign, SignatureMethod::JarSign];

    /// Identifier sent to the signing service.
    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureMethod::PgpSign => "pgpsign",
            SignatureMethod::JarSign => "jarsign",
        }
    }

    /// Extension appended to the input file name, if any.
    pub fn output_extension(&self) -> Option<&'static str> {
        match self {
            SignatureMethod::PgpSign => Some("asc"),
            SignatureMethod::JarSign => None,
        }
    }

    /// Cheap structural check of a payload returned by the signing service.
    ///
    /// This does not verify the signature. It only rejects payloads that
    /// cannot possibly be the requested kind of output, such as an empty body
    /// or an HTML error page served with a 200.
    pub fn validate_payload(&self, payload: &[u8]) -> Result<(), String> {
        if payload.is_empty() {
            return Err("empty payload".to_string());
        }

        match self {
            SignatureMethod::PgpSign => {
                let armored = payload
                    .iter()
                    .position(|b| !b.is_ascii_whitespace())
                    .map(|start| payload[start..].starts_with(PGP_ARMOR_HEADER))
                    .unwrap_or(false);
                let binary_packet = is_signature_packet_tag(payload[0]);

                if armored || binary_packet {
                    Ok(())
                } else {
                    Err("payload is neither an armored OpenPGP signature nor a signature packet"
                        .to_string())
                }
            }
            SignatureMethod::JarSign => {
                if payload.starts_with(ZIP_MAGIC) {
                    Ok(())
                } else {
                    Err("payload is not a jar archive".to_string())
                }
            }
        }
    }
}

/// Whether `tag` opens an OpenPGP signature packet (tag 2), in either the
/// old (`10 0010 ll`) or the new (`11 000010`) packet format.
fn is_signature_packet_tag(tag: u8) -> bool {
    matches!(tag, 0x88..=0x8B | 0xC2)
}

impl fmt::Display for SignatureMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignatureMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pgpsign" | "pgp" => Ok(SignatureMethod::PgpSign),
            "jarsign" | "jar" => Ok(SignatureMethod::JarSign),
            other => Err(format!("unknown signature method: {other}")),
        }
    }
}
