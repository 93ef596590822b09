use std::io::Read;

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FSError {
    #[error("failed to {operation} at: {key}, {message}")]
    Remote {
        operation: &'static str,
        key: String,
        message: String,
    },

    #[error("object not found: {0}")]
    NotFound(String),

    #[error("environment cannot open url stream: {0}")]
    EnvironmentCapability(String),

    #[error("path is outside of the root: {0}")]
    InvalidPath(String),

    #[error("failed to connect client: {0}")]
    Connect(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl FSError {
    pub fn remote(operation: &'static str, key: &str, err: impl ToString) -> Self {
        FSError::Remote {
            operation,
            key: key.to_string(),
            message: err.to_string(),
        }
    }

    /// Any failure reported by the store itself, including a missing object.
    pub fn is_remote(&self) -> bool {
        matches!(self, FSError::Remote { .. } | FSError::NotFound(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, FSError::NotFound(_))
    }

    pub fn is_environment(&self) -> bool {
        matches!(self, FSError::EnvironmentCapability(_))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    File,
    Dir,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FileMetadata {
    #[serde(rename = "type")]
    pub kind: EntryType,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mimetype: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl FileMetadata {
    pub fn file(path: &str) -> Self {
        FileMetadata {
            kind: EntryType::File,
            path: path.to_string(),
            mimetype: None,
            size: None,
            timestamp: None,
        }
    }

    pub fn dir(path: &str) -> Self {
        FileMetadata {
            kind: EntryType::Dir,
            ..FileMetadata::file(path)
        }
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryType::File
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryType::Dir
    }
}

/// One object as returned by a listing page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FSObject {
    pub key: String,
    pub size: i64,
    /// Unix seconds, `None` when the store did not report it.
    pub last_modified: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListRequest {
    pub prefix: String,
    pub delimiter: String,
    pub max_keys: i32,
    pub marker: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListPage {
    pub objects: Vec<FSObject>,
    pub common_prefixes: Vec<String>,
    /// Set when the listing is truncated; pass back as `ListRequest::marker`.
    pub next_marker: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ReadResponse {
    pub contents: Vec<u8>,
    pub path: String,
}

pub struct StreamResponse {
    pub stream: Box<dyn Read + Send>,
    pub path: String,
}

impl std::fmt::Debug for StreamResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamResponse")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let cases = vec![
            (
                FSError::remote("put_object", "a/b.txt", "access denied"),
                "failed to put_object at: a/b.txt, access denied",
            ),
            (
                FSError::NotFound("missing".to_string()),
                "object not found: missing",
            ),
            (
                FSError::InvalidPath("../x".to_string()),
                "path is outside of the root: ../x",
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.to_string(), expected, "failed for case: {}", expected);
        }
    }

    #[test]
    fn test_error_kinds() {
        assert!(FSError::remote("get_object", "k", "boom").is_remote());
        assert!(FSError::NotFound("k".to_string()).is_remote());
        assert!(FSError::NotFound("k".to_string()).is_not_found());
        assert!(FSError::EnvironmentCapability("no http".to_string()).is_environment());
        assert!(!FSError::EnvironmentCapability("no http".to_string()).is_remote());

        let io: FSError = std::io::Error::other("eof").into();
        assert!(matches!(io, FSError::Io(_)));
    }

    #[test]
    fn test_metadata_serialization() {
        let mut file = FileMetadata::file("a/b.txt");
        file.size = Some(5);
        file.mimetype = Some("text/plain".to_string());

        let json = serde_json::to_string(&file).unwrap();
        assert_eq!(
            json,
            r#"{"type":"file","path":"a/b.txt","mimetype":"text/plain","size":5}"#
        );

        let mut dir = FileMetadata::dir("a");
        dir.timestamp = Some(0);
        let json = serde_json::to_string(&dir).unwrap();
        assert_eq!(json, r#"{"type":"dir","path":"a","timestamp":0}"#);
    }
}
