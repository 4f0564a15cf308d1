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

//! Pure parsing of raw license material into normalized fields.
//!
//! License files arrive as loosely structured `KEY=VALUE` text with no
//! schema version. Each normalized field is resolved once against a
//! fixed, priority-ordered list of recognized source keys; downstream
//! code never re-interprets the raw material.
//!
//! Two cases are deliberately distinct and must never be merged:
//!
//! - a *present but malformed* expiry date is a [`ParseError`];
//! - a *wholly absent* expiry field is not an error — it signals "no
//!   expiry known" and the engine substitutes the one-year default
//!   policy so callers always receive a concrete status.

use chrono::NaiveDate;
use thiserror::Error;

/// Recognized expiry keys, highest priority first. The first key present
/// in the material wins regardless of line position.
const EXPIRY_KEYS: &[&str] = &["EXPIRY", "ExpirationDate"];

/// Recognized issuer/organization keys, highest priority first.
const ISSUED_TO_KEYS: &[&str] = &["Organization", "IssuedTo"];

const PRODUCT_KEYS: &[&str] = &["Product"];
const VERSION_KEYS: &[&str] = &["Version"];
const LICENSE_ID_KEYS: &[&str] = &["ID"];

/// Errors raised for license material that is present but malformed.
#[derive(Debug, Error)]
pub enum ParseError {
    /// An expiry key was present but its value is not a `YYYY-MM-DD`
    /// calendar date.
    #[error("Invalid expiry date '{value}' for key '{key}': expected YYYY-MM-DD")]
    InvalidDate {
        key: String,
        value: String,
        #[source]
        source: chrono::format::ParseError,
    },

    /// The license material is not valid UTF-8 text.
    #[error("License content is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
}

/// Normalized license fields. Every field is explicitly optional;
/// absence of any field other than a malformed expiry is not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedFields {
    /// Expiry date, when the material carried a recognized expiry key.
    pub expiry_date: Option<NaiveDate>,
    /// Issuing organization, when present.
    pub issued_to: Option<String>,
    /// Licensed product, when present.
    pub product: Option<String>,
    /// Product version, when present.
    pub version: Option<String>,
    /// License key identifier, when present.
    pub license_id: Option<String>,
}

/// Parses raw license bytes into [`NormalizedFields`].
///
/// Lines without a `=` separator and unrecognized keys are ignored, not
/// errors. For a duplicated key, the first occurrence wins; across the
/// priority list of a field, the key listed first wins regardless of
/// where its line appears in the material.
pub fn parse(raw: &[u8]) -> Result<NormalizedFields, ParseError> {
    let text = std::str::from_utf8(raw)?;

    // First occurrence per key; later duplicates are ignored.
    let mut pairs: Vec<(&str, &str)> = Vec::new();
    for line in text.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();
        if key.is_empty() || pairs.iter().any(|(k, _)| *k == key) {
            continue;
        }
        pairs.push((key, value));
    }

    let lookup = |keys: &[&str]| -> Option<String> {
        keys.iter().find_map(|wanted| {
            pairs
                .iter()
                .find(|(k, _)| k == wanted)
                .map(|(_, v)| (*v).to_string())
        })
    };

    let expiry_date = match lookup_with_key(&pairs, EXPIRY_KEYS) {
        Some((key, value)) => Some(
            NaiveDate::parse_from_str(&value, "%Y-%m-%d").map_err(|source| {
                ParseError::InvalidDate {
                    key,
                    value,
                    source,
                }
            })?,
        ),
        None => None,
    };

    Ok(NormalizedFields {
        expiry_date,
        issued_to: lookup(ISSUED_TO_KEYS),
        product: lookup(PRODUCT_KEYS),
        version: lookup(VERSION_KEYS),
        license_id: lookup(LICENSE_ID_KEYS),
    })
}

fn lookup_with_key(pairs: &[(&str, &str)], keys: &[&str]) -> Option<(String, String)> {
    keys.iter().find_map(|wanted| {
        pairs
            .iter()
            .find(|(k, _)| k == wanted)
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
    })
}
