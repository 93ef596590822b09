use serde::Deserialize;

use crate::model::fs::FSError;

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Any S3-compatible API: Aliyun OSS, AWS S3, MinIO.
    #[default]
    S3,
    Gcs,
}

pub fn parse_provider_from_uri(bucket_uri: &str) -> Result<Provider, FSError> {
    return if bucket_uri.starts_with("s3://") || bucket_uri.starts_with("oss://") {
        Ok(Provider::S3)
    } else if bucket_uri.starts_with("gs://") {
        Ok(Provider::Gcs)
    } else {
        Err(FSError::Config(format!(
            "failed to parse provider of: {}",
            bucket_uri
        )))
    };
}

/// Bucket name of `s3://bucket[/ignored]`; empty when the uri has no scheme.
pub fn parse_bucket_from_uri(bucket_uri: &str) -> &str {
    bucket_uri
        .split_once("://")
        .map(|(_, rest)| rest.split('/').next().unwrap_or(""))
        .unwrap_or("")
}

pub fn parse_bucket_uri(bucket_uri: &str) -> Result<(Provider, String), FSError> {
    let provider = parse_provider_from_uri(bucket_uri)?;
    let bucket = parse_bucket_from_uri(bucket_uri);
    if bucket.is_empty() {
        return Err(FSError::Config(format!(
            "missing bucket name in: {}",
            bucket_uri
        )));
    }

    Ok((provider, bucket.to_string()))
}
