use std::{collections::HashMap, io::Read};

use crate::model;

pub mod gcs;
pub mod http;
pub mod mock;
pub mod s3;

pub const CONTENT_TYPE: &str = "content-type";
pub const CONTENT_LENGTH: &str = "content-length";
pub const LAST_MODIFIED: &str = "last-modified";
pub const ETAG: &str = "etag";
pub const CACHE_CONTROL: &str = "cache-control";
pub const CONTENT_DISPOSITION: &str = "content-disposition";
pub const CONTENT_ENCODING: &str = "content-encoding";

/// Prefixes of user-metadata headers, stripped before handing the name to a client.
pub const META_PREFIXES: &[&str] = &["x-oss-meta-", "x-amz-meta-", "x-goog-meta-"];

/// Lowercase header name to value.
pub type Headers = HashMap<String, String>;

pub fn user_metadata(options: &Headers) -> HashMap<String, String> {
    let mut metadata = HashMap::new();
    for (header, value) in options {
        for prefix in META_PREFIXES {
            if let Some(name) = header.strip_prefix(prefix) {
                metadata.insert(name.to_string(), value.clone());
            }
        }
    }
    metadata
}

/// Object-storage calls the adapter is built on. Every call is one round trip.
pub trait ObjectClient: Send + Sync {
    fn fs_put_object(
        &self,
        bucket: &str,
        key: &str,
        content: Vec<u8>,
        options: &Headers,
    ) -> Result<(), model::fs::FSError>;

    fn fs_copy_object(
        &self,
        from_bucket: &str,
        from_key: &str,
        to_bucket: &str,
        to_key: &str,
    ) -> Result<(), model::fs::FSError>;

    fn fs_delete_object(&self, bucket: &str, key: &str) -> Result<(), model::fs::FSError>;

    fn fs_delete_objects(&self, bucket: &str, keys: &[String]) -> Result<(), model::fs::FSError>;

    /// Creates a zero-byte marker at `key` + `/`.
    fn fs_create_object_dir(
        &self,
        bucket: &str,
        key: &str,
        options: &Headers,
    ) -> Result<(), model::fs::FSError>;

    fn fs_does_object_exist(&self, bucket: &str, key: &str) -> Result<bool, model::fs::FSError>;

    fn fs_get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, model::fs::FSError>;

    fn fs_list_objects(
        &self,
        bucket: &str,
        request: &model::fs::ListRequest,
    ) -> Result<model::fs::ListPage, model::fs::FSError>;

    fn fs_get_object_meta(&self, bucket: &str, key: &str) -> Result<Headers, model::fs::FSError>;
}

/// Opens a readable stream on a URL.
pub trait UrlOpener: Send + Sync {
    fn open(&self, url: &str) -> Result<Box<dyn Read + Send>, model::fs::FSError>;
}

pub(crate) fn dir_marker(key: &str) -> String {
    if key.ends_with('/') {
        key.to_string()
    } else {
        format!("{}/", key)
    }
}
