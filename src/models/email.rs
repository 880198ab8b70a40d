//! Email samples and the header set derived from them

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use super::RecordId;
use crate::{Result, SpamGenieError};

/// An uploaded sample email. Immutable once uploaded, except for deletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailSample {
    pub id: RecordId,
    pub original_filename: String,
    pub workspace: RecordId,
    pub uploaded_at: DateTime<Utc>,
}

/// A file offered for upload, before the extension filter has run
#[derive(Debug, Clone)]
pub struct CandidateFile {
    pub filename: String,
    pub content: Bytes,
}

impl CandidateFile {
    pub fn new(filename: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            content: content.into(),
        }
    }

    /// Read a candidate from disk, keeping only the file name part of the path
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                SpamGenieError::Validation(format!("Invalid file name: {}", path.display()))
            })?
            .to_string();
        let content = tokio::fs::read(path).await?;
        Ok(Self::new(filename, content))
    }

    /// Case-insensitive suffix match, `extension` includes the leading dot
    pub fn has_extension(&self, extension: &str) -> bool {
        self.filename
            .to_lowercase()
            .ends_with(&extension.to_lowercase())
    }
}

/// Header name → one example value, derived by scanning every sample in a
/// workspace. Never stored; refetched whenever the sample set changes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HeaderSet(BTreeMap<String, String>);

impl HeaderSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, example: impl Into<String>) {
        self.0.entry(name.into()).or_insert_with(|| example.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn example(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, String)> for HeaderSet {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut set = HeaderSet::new();
        for (name, example) in iter {
            set.insert(name, example);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_match_is_case_insensitive() {
        assert!(CandidateFile::new("Sample.EML", "x").has_extension(".eml"));
        assert!(!CandidateFile::new("notes.txt", "x").has_extension(".eml"));
        assert!(!CandidateFile::new("eml", "x").has_extension(".eml"));
    }

    #[test]
    fn test_header_set_keeps_first_example() {
        let mut set = HeaderSet::new();
        set.insert("Subject", "first");
        set.insert("Subject", "second");
        assert_eq!(set.example("Subject"), Some("first"));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_header_set_wire_format() {
        let set: HeaderSet =
            serde_json::from_str(r#"{"From": "a@b.c", "Subject": "Win"}"#).unwrap();
        assert_eq!(set.names().collect::<Vec<_>>(), vec!["From", "Subject"]);
    }

    #[tokio::test]
    async fn test_candidate_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spam.eml");
        tokio::fs::write(&path, b"Subject: hi\r\n\r\nbody").await.unwrap();

        let file = CandidateFile::from_path(&path).await.unwrap();
        assert_eq!(file.filename, "spam.eml");
        assert_eq!(file.content.len(), 19);
    }
}
