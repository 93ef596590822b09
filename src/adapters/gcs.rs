use google_cloud_storage::{
    client::{Client, ClientConfig},
    http::{
        objects::{
            copy::CopyObjectRequest,
            delete::DeleteObjectRequest,
            download::Range,
            get::GetObjectRequest,
            list::ListObjectsRequest,
            upload::{Media, UploadObjectRequest, UploadType},
            Object,
        },
        Error,
    },
};
use tracing::info;

use crate::{adapters, config, model, util};

/// Builds a client from the ambient Google credentials. `domain`, when set,
/// overrides the storage endpoint.
pub fn connect(config: &config::AdapterConfig) -> Result<Client, model::fs::FSError> {
    info!(bucket = %config.bucket, domain = %config.domain, "connecting gcs client");

    let mut client_config = util::poll::poll_until_ready(ClientConfig::default().with_auth())
        .map_err(|err| model::fs::FSError::Connect(err.to_string()))?;

    if let Some(endpoint) = config.endpoint_url() {
        client_config.storage_endpoint = endpoint;
    }

    Ok(Client::new(client_config))
}

fn map_error(operation: &'static str, key: &str, err: Error) -> model::fs::FSError {
    match err {
        Error::Response(resp) if resp.code == 404 => model::fs::FSError::NotFound(key.to_string()),
        err => model::fs::FSError::remote(operation, key, err),
    }
}

fn get_request(bucket: &str, key: &str) -> GetObjectRequest {
    GetObjectRequest {
        bucket: bucket.to_string(),
        object: key.to_string(),
        ..Default::default()
    }
}

fn object_headers(obj: &Object) -> adapters::Headers {
    let mut headers = adapters::Headers::new();
    if let Some(ct) = &obj.content_type {
        headers.insert(adapters::CONTENT_TYPE.to_string(), ct.clone());
    }
    headers.insert(adapters::CONTENT_LENGTH.to_string(), obj.size.to_string());
    if let Some(date) = obj
        .updated
        .and_then(|updated| util::time::http_date(updated.unix_timestamp()))
    {
        headers.insert(adapters::LAST_MODIFIED.to_string(), date);
    }
    if !obj.etag.is_empty() {
        headers.insert(adapters::ETAG.to_string(), obj.etag.clone());
    }
    if let Some(metadata) = &obj.metadata {
        for (name, value) in metadata {
            headers.insert(format!("x-goog-meta-{}", name), value.clone());
        }
    }
    headers
}

impl adapters::ObjectClient for Client {
    fn fs_put_object(
        &self,
        bucket: &str,
        key: &str,
        content: Vec<u8>,
        options: &adapters::Headers,
    ) -> Result<(), model::fs::FSError> {
        let req = UploadObjectRequest {
            bucket: bucket.to_string(),
            ..Default::default()
        };

        let mut media = Media::new(key.to_string());
        if let Some(ct) = options.get(adapters::CONTENT_TYPE) {
            media.content_type = ct.clone().into();
        }
        media.content_length = Some(content.len() as u64);

        util::poll::poll_remote(
            "put_object",
            key,
            self.upload_object(&req, content, &UploadType::Simple(media)),
        )?;

        Ok(())
    }

    fn fs_copy_object(
        &self,
        from_bucket: &str,
        from_key: &str,
        to_bucket: &str,
        to_key: &str,
    ) -> Result<(), model::fs::FSError> {
        let req = CopyObjectRequest {
            source_bucket: from_bucket.to_string(),
            source_object: from_key.to_string(),
            destination_bucket: to_bucket.to_string(),
            destination_object: to_key.to_string(),
            ..Default::default()
        };

        util::poll::poll_until_ready(self.copy_object(&req))
            .map_err(|err| map_error("copy_object", from_key, err))?;

        Ok(())
    }

    fn fs_delete_object(&self, bucket: &str, key: &str) -> Result<(), model::fs::FSError> {
        let req = DeleteObjectRequest {
            bucket: bucket.to_string(),
            object: key.to_string(),
            ..Default::default()
        };

        match util::poll::poll_until_ready(self.delete_object(&req)) {
            // Deleting a missing object is not an error on S3 either.
            Err(Error::Response(resp)) if resp.code == 404 => Ok(()),
            Err(err) => Err(model::fs::FSError::remote("delete_object", key, err)),
            Ok(()) => Ok(()),
        }
    }

    fn fs_delete_objects(&self, bucket: &str, keys: &[String]) -> Result<(), model::fs::FSError> {
        // The JSON API has no multi-object delete outside of batch requests.
        for key in keys {
            self.fs_delete_object(bucket, key)?;
        }

        Ok(())
    }

    fn fs_create_object_dir(
        &self,
        bucket: &str,
        key: &str,
        options: &adapters::Headers,
    ) -> Result<(), model::fs::FSError> {
        self.fs_put_object(bucket, &adapters::dir_marker(key), Vec::new(), options)
    }

    fn fs_does_object_exist(&self, bucket: &str, key: &str) -> Result<bool, model::fs::FSError> {
        match util::poll::poll_until_ready(self.get_object(&get_request(bucket, key))) {
            Err(Error::Response(resp)) if resp.code == 404 => Ok(false),
            Err(err) => Err(model::fs::FSError::remote("get_object", key, err)),
            Ok(_) => Ok(true),
        }
    }

    fn fs_get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, model::fs::FSError> {
        let req = get_request(bucket, key);

        util::poll::poll_until_ready(self.download_object(&req, &Range::default()))
            .map_err(|err| map_error("download_object", key, err))
    }

    fn fs_list_objects(
        &self,
        bucket: &str,
        request: &model::fs::ListRequest,
    ) -> Result<model::fs::ListPage, model::fs::FSError> {
        let req = ListObjectsRequest {
            bucket: bucket.to_string(),
            prefix: Some(request.prefix.clone()),
            delimiter: if request.delimiter.is_empty() {
                None
            } else {
                Some(request.delimiter.clone())
            },
            max_results: Some(request.max_keys),
            page_token: request.marker.clone(),
            ..Default::default()
        };

        let lo = util::poll::poll_until_ready(self.list_objects(&req))
            .map_err(|err| map_error("list_objects", &request.prefix, err))?;

        let objects = lo
            .items
            .unwrap_or_default()
            .into_iter()
            .map(|obj| model::fs::FSObject {
                last_modified: obj.updated.map(|updated| updated.unix_timestamp()),
                key: obj.name,
                size: obj.size,
            })
            .collect();

        Ok(model::fs::ListPage {
            objects,
            common_prefixes: lo.prefixes.unwrap_or_default(),
            next_marker: lo.next_page_token,
        })
    }

    fn fs_get_object_meta(&self, bucket: &str, key: &str) -> Result<adapters::Headers, model::fs::FSError> {
        let obj = util::poll::poll_until_ready(self.get_object(&get_request(bucket, key)))
            .map_err(|err| map_error("get_object", key, err))?;

        Ok(object_headers(&obj))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_headers() {
        let obj = Object {
            name: "a/b.txt".to_string(),
            size: 5,
            content_type: Some("text/plain".to_string()),
            updated: time::OffsetDateTime::from_unix_timestamp(784111777).ok(),
            etag: "abc".to_string(),
            ..Default::default()
        };

        let headers = object_headers(&obj);
        assert_eq!(headers.get(adapters::CONTENT_TYPE).map(String::as_str), Some("text/plain"));
        assert_eq!(headers.get(adapters::CONTENT_LENGTH).map(String::as_str), Some("5"));
        assert_eq!(
            headers.get(adapters::LAST_MODIFIED).map(String::as_str),
            Some("Sun, 06 Nov 1994 08:49:37 GMT")
        );
        assert_eq!(headers.get(adapters::ETAG).map(String::as_str), Some("abc"));
    }
}
