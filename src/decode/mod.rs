//! Hand-off of extracted activity files to an external decoder.
//!
//! Decoding the binary activity format is not done here. A decoder
//! returns message-type name -> ordered records, each record a mapping of
//! field name or numeric tag to value; this module only locates the files
//! to hand over and summarizes what came back.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;

/// Key of a decoded field: a known name, or the raw numeric tag for
/// fields the decoder has no profile entry for.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(untagged)]
pub enum FieldKey {
    Name(String),
    Tag(u32),
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKey::Name(name) => f.write_str(name),
            FieldKey::Tag(tag) => write!(f, "{}", tag),
        }
    }
}

impl From<&str> for FieldKey {
    fn from(name: &str) -> Self {
        FieldKey::Name(name.to_string())
    }
}

impl From<u32> for FieldKey {
    fn from(tag: u32) -> Self {
        FieldKey::Tag(tag)
    }
}

/// One decoded record.
pub type Record = BTreeMap<FieldKey, Value>;

/// Message-type name -> records in file order.
pub type DecodedMessages = BTreeMap<String, Vec<Record>>;

/// An external decoder for extracted activity files.
#[async_trait]
pub trait ActivityDecoder: Send + Sync {
    async fn decode(&self, path: &Path) -> Result<DecodedMessages>;
}

/// Per-file decode results.
#[derive(Debug, Default)]
pub struct DecodeReport {
    /// File -> record count per message type.
    pub decoded: BTreeMap<PathBuf, BTreeMap<String, usize>>,
    pub failures: Vec<(PathBuf, String)>,
    /// Extracted files that are not activity files.
    pub skipped: u64,
}

/// Hand every file with `activity_extension` to `decoder`.
pub async fn decode_extracted(
    decoder: &dyn ActivityDecoder,
    files: &[PathBuf],
    activity_extension: &str,
) -> DecodeReport {
    let mut report = DecodeReport::default();

    for file in files {
        let is_target = file
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case(activity_extension))
            .unwrap_or(false);
        if !is_target {
            report.skipped += 1;
            continue;
        }

        match decoder.decode(file).await {
            Ok(messages) => {
                let counts: BTreeMap<String, usize> = messages
                    .iter()
                    .map(|(kind, records)| (kind.clone(), records.len()))
                    .collect();
                tracing::debug!("Decoded {}: {:?}", file.display(), counts);
                report.decoded.insert(file.clone(), counts);
            }
            Err(e) => {
                tracing::warn!("Failed to decode {}: {}", file.display(), e);
                report.failures.push((file.clone(), e.to_string()));
            }
        }
    }

    report
}
