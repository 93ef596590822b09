use aws_sdk_s3::{
    config::{BehaviorVersion, Credentials, Region},
    primitives::{ByteStream, DateTime},
    types::{Delete, ObjectIdentifier},
};
use tracing::info;

use crate::{adapters, config, model, util};

/// S3 caps DeleteObjects at this many keys per request.
const DELETE_BATCH: usize = 1000;

/// `bucket/key` for `x-amz-copy-source`, percent-encoding everything in the
/// key except unreserved characters and `/`.
fn copy_source(bucket: &str, key: &str) -> String {
    let mut source = format!("{}/", bucket);
    for byte in key.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                source.push(byte as char)
            }
            _ => source.push_str(&format!("%{:02X}", byte)),
        }
    }
    source
}

fn unix_secs(dt: Option<&DateTime>) -> Option<i64> {
    dt.map(|d| d.secs())
}

/// Builds a client for an S3-compatible endpoint. Empty credentials fall back
/// to the default AWS provider chain.
pub fn connect(config: &config::AdapterConfig) -> Result<aws_sdk_s3::Client, model::fs::FSError> {
    info!(bucket = %config.bucket, domain = %config.domain, is_cname = config.is_cname, "connecting s3 client");

    let mut loader = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(config.region.clone()));

    if let Some(endpoint) = config.endpoint_url() {
        loader = loader.endpoint_url(endpoint);
    }

    if !config.access_key.is_empty() {
        loader = loader.credentials_provider(Credentials::new(
            config.access_key.clone(),
            config.secret_key.clone(),
            None,
            None,
            "ossfs",
        ));
    }

    let sdk_config = util::poll::poll_until_ready(loader.load());

    // Virtual-host addressing would prepend the bucket to a custom domain.
    let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
        .force_path_style(config.is_cname)
        .build();

    Ok(aws_sdk_s3::Client::from_conf(s3_config))
}

impl adapters::ObjectClient for aws_sdk_s3::Client {
    fn fs_put_object(
        &self,
        bucket: &str,
        key: &str,
        content: Vec<u8>,
        options: &adapters::Headers,
    ) -> Result<(), model::fs::FSError> {
        let mut req = self
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(content));

        for (header, value) in options {
            req = match header.as_str() {
                adapters::CONTENT_TYPE => req.content_type(value),
                adapters::CONTENT_LENGTH => req.set_content_length(value.parse::<i64>().ok()),
                adapters::CACHE_CONTROL => req.cache_control(value),
                adapters::CONTENT_DISPOSITION => req.content_disposition(value),
                adapters::CONTENT_ENCODING => req.content_encoding(value),
                _ => req,
            };
        }

        for (name, value) in adapters::user_metadata(options) {
            req = req.metadata(name, value);
        }

        util::poll::poll_remote("put_object", key, req.send())?;

        Ok(())
    }

    fn fs_copy_object(
        &self,
        from_bucket: &str,
        from_key: &str,
        to_bucket: &str,
        to_key: &str,
    ) -> Result<(), model::fs::FSError> {
        let req = self
            .copy_object()
            .copy_source(copy_source(from_bucket, from_key))
            .bucket(to_bucket)
            .key(to_key);

        util::poll::poll_remote("copy_object", from_key, req.send())?;

        Ok(())
    }

    fn fs_delete_object(&self, bucket: &str, key: &str) -> Result<(), model::fs::FSError> {
        let req = self.delete_object().bucket(bucket).key(key);

        util::poll::poll_remote("delete_object", key, req.send())?;

        Ok(())
    }

    fn fs_delete_objects(&self, bucket: &str, keys: &[String]) -> Result<(), model::fs::FSError> {
        for chunk in keys.chunks(DELETE_BATCH) {
            let mut ids = Vec::with_capacity(chunk.len());
            for key in chunk {
                let id = ObjectIdentifier::builder()
                    .key(key)
                    .build()
                    .map_err(|err| model::fs::FSError::remote("delete_objects", key, err))?;
                ids.push(id);
            }

            let delete = Delete::builder()
                .set_objects(Some(ids))
                .quiet(true)
                .build()
                .map_err(|err| model::fs::FSError::remote("delete_objects", bucket, err))?;

            let req = self.delete_objects().bucket(bucket).delete(delete);
            let out = util::poll::poll_remote("delete_objects", bucket, req.send())?;

            if let Some(err) = out.errors().first() {
                return Err(model::fs::FSError::remote(
                    "delete_objects",
                    err.key().unwrap_or(""),
                    err.message().unwrap_or("unknown error"),
                ));
            }
        }

        Ok(())
    }

    fn fs_create_object_dir(
        &self,
        bucket: &str,
        key: &str,
        options: &adapters::Headers,
    ) -> Result<(), model::fs::FSError> {
        let mut options = options.clone();
        options.insert(adapters::CONTENT_LENGTH.to_string(), "0".to_string());

        self.fs_put_object(bucket, &adapters::dir_marker(key), Vec::new(), &options)
    }

    fn fs_does_object_exist(&self, bucket: &str, key: &str) -> Result<bool, model::fs::FSError> {
        let req = self.head_object().bucket(bucket).key(key);

        match util::poll::poll_until_ready(req.send()) {
            Err(err) => {
                if let Some(svc_err) = err.as_service_error() {
                    if svc_err.is_not_found() {
                        return Ok(false);
                    }
                }

                Err(model::fs::FSError::remote("head_object", key, err))
            }
            Ok(_) => Ok(true),
        }
    }

    fn fs_get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, model::fs::FSError> {
        let req = self.get_object().bucket(bucket).key(key);

        let o = match util::poll::poll_until_ready(req.send()) {
            Err(err) => {
                if let Some(svc_err) = err.as_service_error() {
                    if svc_err.is_no_such_key() {
                        return Err(model::fs::FSError::NotFound(key.to_string()));
                    }
                }

                return Err(model::fs::FSError::remote("get_object", key, err));
            }
            Ok(o) => o,
        };

        let bytes = util::poll::poll_remote("collect_body", key, o.body.collect())?;

        Ok(bytes.into_bytes().to_vec())
    }

    fn fs_list_objects(
        &self,
        bucket: &str,
        request: &model::fs::ListRequest,
    ) -> Result<model::fs::ListPage, model::fs::FSError> {
        let mut req = self
            .list_objects_v2()
            .bucket(bucket)
            .prefix(&request.prefix)
            .max_keys(request.max_keys);

        if !request.delimiter.is_empty() {
            req = req.delimiter(&request.delimiter);
        }

        if let Some(tok) = &request.marker {
            req = req.continuation_token(tok);
        }

        let lo = util::poll::poll_remote("list_objects", &request.prefix, req.send())?;

        let objects = lo
            .contents()
            .iter()
            .map(|o| model::fs::FSObject {
                key: o.key().unwrap_or("").to_string(),
                size: o.size().unwrap_or(0),
                last_modified: unix_secs(o.last_modified()),
            })
            .collect();

        let common_prefixes = lo
            .common_prefixes()
            .iter()
            .filter_map(|p| p.prefix().map(str::to_string))
            .collect();

        Ok(model::fs::ListPage {
            objects,
            common_prefixes,
            next_marker: lo.next_continuation_token().map(|tok| tok.to_string()),
        })
    }

    fn fs_get_object_meta(&self, bucket: &str, key: &str) -> Result<adapters::Headers, model::fs::FSError> {
        let req = self.head_object().bucket(bucket).key(key);

        let ho = match util::poll::poll_until_ready(req.send()) {
            Err(err) => {
                if let Some(svc_err) = err.as_service_error() {
                    if svc_err.is_not_found() {
                        return Err(model::fs::FSError::NotFound(key.to_string()));
                    }
                }

                return Err(model::fs::FSError::remote("head_object", key, err));
            }
            Ok(ho) => ho,
        };

        let mut headers = adapters::Headers::new();
        if let Some(ct) = ho.content_type() {
            headers.insert(adapters::CONTENT_TYPE.to_string(), ct.to_string());
        }
        if let Some(len) = ho.content_length() {
            headers.insert(adapters::CONTENT_LENGTH.to_string(), len.to_string());
        }
        if let Some(date) = unix_secs(ho.last_modified()).and_then(util::time::http_date) {
            headers.insert(adapters::LAST_MODIFIED.to_string(), date);
        }
        if let Some(etag) = ho.e_tag() {
            headers.insert(adapters::ETAG.to_string(), etag.to_string());
        }
        if let Some(metadata) = ho.metadata() {
            for (name, value) in metadata {
                headers.insert(format!("x-amz-meta-{}", name), value.clone());
            }
        }

        Ok(headers)
    }
}
