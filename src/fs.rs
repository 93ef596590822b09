use std::{collections::HashSet, io::Read, sync::OnceLock};

use tracing::{error, info, span, warn, Level};

use crate::{adapters, config, model, util};

pub const DELIMITER: &str = "/";

/// Builds the client handle the first time an operation needs it.
pub type Connector = Box<
    dyn Fn(&config::AdapterConfig) -> Result<Box<dyn adapters::ObjectClient>, model::fs::FSError>
        + Send
        + Sync,
>;

/// Filesystem operations on top of an object store bucket.
///
/// Paths are normalized and prefixed with the configured [`util::path::PathPrefix`]
/// before reaching the store; keys coming back have the prefix stripped.
pub struct StorageAdapter {
    config: config::AdapterConfig,
    client: OnceLock<Box<dyn adapters::ObjectClient>>,
    connector: Connector,
    opener: Option<Box<dyn adapters::UrlOpener>>,
}

impl StorageAdapter {
    pub fn new(config: config::AdapterConfig, connector: Connector) -> Self {
        Self {
            config,
            client: OnceLock::new(),
            connector,
            opener: None,
        }
    }

    /// Adapter over an already constructed client.
    pub fn with_client(config: config::AdapterConfig, client: Box<dyn adapters::ObjectClient>) -> Self {
        Self {
            config,
            client: OnceLock::from(client),
            connector: Box::new(already_connected),
            opener: None,
        }
    }

    /// Enables [`StorageAdapter::read_stream`].
    pub fn with_url_opener(mut self, opener: Box<dyn adapters::UrlOpener>) -> Self {
        self.opener = Some(opener);
        self
    }

    pub fn config(&self) -> &config::AdapterConfig {
        &self.config
    }

    pub fn get_client(&self) -> Result<&dyn adapters::ObjectClient, model::fs::FSError> {
        if let Some(client) = self.client.get() {
            return Ok(client.as_ref());
        }

        let client = (self.connector)(&self.config)
            .inspect_err(|err| error!(error_message = %err, error_group = "connect"))?;

        Ok(self.client.get_or_init(|| client).as_ref())
    }

    fn bucket(&self) -> &str {
        &self.config.bucket
    }

    fn apply_prefix(&self, path: &str) -> Result<String, model::fs::FSError> {
        self.config
            .prefix
            .apply(path)
            .inspect_err(|err| error!(error_message = %err, error_group = "invalid_path"))
    }

    pub fn write(
        &self,
        path: &str,
        contents: &[u8],
        cfg: &config::WriteConfig,
    ) -> Result<model::fs::FileMetadata, model::fs::FSError> {
        let span = span!(Level::INFO, "write", context = "write");
        let _e = span.enter();
        info!(path = path, size = contents.len(), "called");

        let object = self.apply_prefix(path)?;
        let mut options = config::options_from_config(&self.config.options, cfg);
        options
            .entry(adapters::CONTENT_LENGTH.to_string())
            .or_insert_with(|| contents.len().to_string());
        options
            .entry(adapters::CONTENT_TYPE.to_string())
            .or_insert_with(|| util::mime::guess_mime_type(&object, contents));

        self.get_client()?
            .fs_put_object(self.bucket(), &object, contents.to_vec(), &options)
            .inspect_err(|err| error!(error_message = %err, error_group = "put_object"))?;

        Ok(normalize_response(&options, &self.config.prefix.remove(&object)))
    }

    /// Drains `reader` into memory and writes it as one object.
    pub fn write_stream<R: Read>(
        &self,
        path: &str,
        mut reader: R,
        cfg: &config::WriteConfig,
    ) -> Result<model::fs::FileMetadata, model::fs::FSError> {
        let mut contents = Vec::new();
        reader
            .read_to_end(&mut contents)
            .inspect_err(|err| error!(error_message = %err, error_group = "read_stream_input"))?;

        self.write(path, &contents, cfg)
    }

    /// Delete followed by write. Not atomic: if the write fails the old
    /// object is already gone.
    pub fn update(
        &self,
        path: &str,
        contents: &[u8],
        cfg: &config::WriteConfig,
    ) -> Result<model::fs::FileMetadata, model::fs::FSError> {
        let span = span!(Level::INFO, "update", context = "update");
        let _e = span.enter();
        info!(path = path, "called");

        self.delete_before_update(path);
        self.write(path, contents, cfg)
    }

    pub fn update_stream<R: Read>(
        &self,
        path: &str,
        reader: R,
        cfg: &config::WriteConfig,
    ) -> Result<model::fs::FileMetadata, model::fs::FSError> {
        let span = span!(Level::INFO, "update_stream", context = "update_stream");
        let _e = span.enter();
        info!(path = path, "called");

        self.delete_before_update(path);
        self.write_stream(path, reader, cfg)
    }

    fn delete_before_update(&self, path: &str) {
        match self.delete(path) {
            Err(err) => warn!(error_message = %err, error_group = "delete_object", "continuing with write"),
            Ok(false) => warn!(path = path, "object still present before write"),
            Ok(true) => {}
        }
    }

    /// Copy then delete. A failed copy leaves the source untouched; a failed
    /// delete leaves both objects in place.
    pub fn rename(&self, path: &str, new_path: &str) -> Result<bool, model::fs::FSError> {
        let span = span!(Level::INFO, "rename", context = "rename");
        let _e = span.enter();
        info!(path = path, new_path = new_path, "called");

        self.copy(path, new_path)?;
        self.delete(path)
    }

    pub fn copy(&self, path: &str, new_path: &str) -> Result<(), model::fs::FSError> {
        let span = span!(Level::INFO, "copy", context = "copy");
        let _e = span.enter();
        info!(path = path, new_path = new_path, "called");

        let object = self.apply_prefix(path)?;
        let new_object = self.apply_prefix(new_path)?;

        self.get_client()?
            .fs_copy_object(self.bucket(), &object, self.bucket(), &new_object)
            .inspect_err(|err| error!(error_message = %err, error_group = "copy_object"))
    }

    /// `Ok(true)` only once the object is verified absent.
    pub fn delete(&self, path: &str) -> Result<bool, model::fs::FSError> {
        let span = span!(Level::INFO, "delete", context = "delete");
        let _e = span.enter();
        info!(path = path, "called");

        let object = self.apply_prefix(path)?;

        self.get_client()?
            .fs_delete_object(self.bucket(), &object)
            .inspect_err(|err| error!(error_message = %err, error_group = "delete_object"))?;

        Ok(!self.has(path))
    }

    /// Removes everything under `dirname`, markers included, with one batch delete.
    ///
    /// The batch is built from the keys the store listed, never from
    /// normalized paths, so `a//b` or `a/x/../y` style keys are removed as-is.
    pub fn delete_dir(&self, dirname: &str) -> Result<(), model::fs::FSError> {
        let span = span!(Level::INFO, "delete_dir", context = "delete_dir");
        let _e = span.enter();
        info!(dirname = dirname, "called");

        let prefix = self.list_prefix(dirname)?;

        let mut keys = Vec::new();
        let mut seen = HashSet::new();
        let mut push = |key: String| {
            if key.starts_with(prefix.as_str()) && seen.insert(key.clone()) {
                keys.push(key);
            }
        };

        if !prefix.is_empty() {
            push(prefix.clone());
        }

        self.walk(&prefix, true, &mut |listed| match listed {
            Listed::Marker(object) | Listed::File(object) => push(object.key),
            Listed::Prefix(common_prefix) => push(common_prefix),
        })?;

        info!(count = keys.len(), "deleting objects");

        self.get_client()?
            .fs_delete_objects(self.bucket(), &keys)
            .inspect_err(|err| error!(error_message = %err, error_group = "delete_objects"))
    }

    pub fn create_dir(
        &self,
        dirname: &str,
        cfg: &config::WriteConfig,
    ) -> Result<model::fs::FileMetadata, model::fs::FSError> {
        let span = span!(Level::INFO, "create_dir", context = "create_dir");
        let _e = span.enter();
        info!(dirname = dirname, "called");

        if util::path::normalize(dirname)?.is_empty() {
            return Err(model::fs::FSError::InvalidPath(dirname.to_string()));
        }

        let object = self.apply_prefix(dirname)?;
        let options = config::options_from_config(&self.config.options, cfg);

        self.get_client()?
            .fs_create_object_dir(self.bucket(), &object, &options)
            .inspect_err(|err| error!(error_message = %err, error_group = "create_object_dir"))?;

        Ok(model::fs::FileMetadata::dir(&self.config.prefix.remove(&object)))
    }

    /// False when the object is absent and also when the check itself fails.
    pub fn has(&self, path: &str) -> bool {
        let object = match self.apply_prefix(path) {
            Err(_) => return false,
            Ok(o) => o,
        };

        let client = match self.get_client() {
            Err(_) => return false,
            Ok(c) => c,
        };

        match client.fs_does_object_exist(self.bucket(), &object) {
            Err(err) => {
                error!(error_message = %err, error_group = "does_object_exist");
                false
            }
            Ok(exists) => exists,
        }
    }

    pub fn read(&self, path: &str) -> Result<model::fs::ReadResponse, model::fs::FSError> {
        let span = span!(Level::INFO, "read", context = "read");
        let _e = span.enter();
        info!(path = path, "called");

        let object = self.apply_prefix(path)?;

        let contents = self
            .get_client()?
            .fs_get_object(self.bucket(), &object)
            .inspect_err(|err| error!(error_message = %err, error_group = "get_object"))?;

        Ok(model::fs::ReadResponse {
            contents,
            path: self.config.prefix.remove(&object),
        })
    }

    /// Streams the object straight from its public URL.
    pub fn read_stream(&self, path: &str) -> Result<model::fs::StreamResponse, model::fs::FSError> {
        let span = span!(Level::INFO, "read_stream", context = "read_stream");
        let _e = span.enter();
        info!(path = path, "called");

        let object = self.apply_prefix(path)?;

        let opener = match &self.opener {
            None => {
                let err = model::fs::FSError::EnvironmentCapability(
                    "no url opener installed".to_string(),
                );
                error!(error_message = %err, error_group = "open_url");
                return Err(err);
            }
            Some(o) => o,
        };

        let url = self.config.object_url(&object);
        let stream = opener
            .open(&url)
            .inspect_err(|err| error!(error_message = %err, error_group = "open_url", url = %url))?;

        Ok(model::fs::StreamResponse {
            stream,
            path: self.config.prefix.remove(&object),
        })
    }

    pub fn list_contents(
        &self,
        directory: &str,
        recursive: bool,
    ) -> Result<Vec<model::fs::FileMetadata>, model::fs::FSError> {
        let span = span!(Level::INFO, "list_contents", context = "list_contents");
        let _e = span.enter();
        info!(directory = directory, recursive = recursive, "called");

        let prefix = self.list_prefix(directory)?;

        let mut result = Vec::new();
        self.walk(&prefix, recursive, &mut |listed| {
            let entry = match listed {
                Listed::Marker(object) => {
                    let path = self.config.prefix.remove(&object.key);
                    let mut dir = model::fs::FileMetadata::dir(path.trim_end_matches(DELIMITER));
                    dir.timestamp = Some(object.last_modified.unwrap_or(0));
                    dir
                }
                Listed::File(object) => {
                    let mut file = model::fs::FileMetadata::file(&self.config.prefix.remove(&object.key));
                    file.size = Some(object.size);
                    file.timestamp = Some(object.last_modified.unwrap_or(0));
                    file
                }
                Listed::Prefix(_) if recursive => return,
                Listed::Prefix(common_prefix) => {
                    let path = self.config.prefix.remove(&common_prefix);
                    let mut dir = model::fs::FileMetadata::dir(path.trim_end_matches(DELIMITER));
                    dir.timestamp = Some(0);
                    dir
                }
            };
            result.push(entry);
        })?;

        Ok(result)
    }

    /// Prefixed key of `directory` with a trailing delimiter, empty at the bucket root.
    fn list_prefix(&self, directory: &str) -> Result<String, model::fs::FSError> {
        let mut prefix = self.apply_prefix(directory)?;
        if !prefix.is_empty() && !prefix.ends_with(DELIMITER) {
            prefix.push_str(DELIMITER);
        }
        Ok(prefix)
    }

    /// Pages through `prefix` depth-first, handing every raw result to `visit`.
    /// Common prefixes are visited before being descended into.
    fn walk(
        &self,
        prefix: &str,
        recursive: bool,
        visit: &mut dyn FnMut(Listed),
    ) -> Result<(), model::fs::FSError> {
        let client = self.get_client()?;
        let mut marker = None;

        loop {
            let request = model::fs::ListRequest {
                prefix: prefix.to_string(),
                delimiter: DELIMITER.to_string(),
                max_keys: self.config.max_keys,
                marker: marker.take(),
            };

            let page = client
                .fs_list_objects(self.bucket(), &request)
                .inspect_err(|err| error!(error_message = %err, error_group = "list_objects"))?;

            for object in page.objects {
                if object.size == 0 && object.key == prefix {
                    visit(Listed::Marker(object));
                } else {
                    visit(Listed::File(object));
                }
            }

            for common_prefix in page.common_prefixes {
                visit(Listed::Prefix(common_prefix.clone()));
                if recursive {
                    self.walk(&common_prefix, recursive, visit)?;
                }
            }

            match page.next_marker {
                None => break,
                Some(next) => marker = Some(next),
            }
        }

        Ok(())
    }

    pub fn get_metadata(&self, path: &str) -> Result<model::fs::FileMetadata, model::fs::FSError> {
        let span = span!(Level::INFO, "get_metadata", context = "get_metadata");
        let _e = span.enter();
        info!(path = path, "called");

        let object = self.apply_prefix(path)?;

        let headers = self
            .get_client()?
            .fs_get_object_meta(self.bucket(), &object)
            .inspect_err(|err| error!(error_message = %err, error_group = "get_object_meta"))?;

        Ok(normalize_response(&headers, &self.config.prefix.remove(&object)))
    }

    pub fn get_size(&self, path: &str) -> Result<model::fs::FileMetadata, model::fs::FSError> {
        self.get_metadata(path)
    }

    pub fn get_mimetype(&self, path: &str) -> Result<model::fs::FileMetadata, model::fs::FSError> {
        self.get_metadata(path)
    }

    pub fn get_timestamp(&self, path: &str) -> Result<model::fs::FileMetadata, model::fs::FSError> {
        self.get_metadata(path)
    }
}

/// A listing result with the key exactly as the store returned it.
enum Listed {
    /// Zero-byte object whose key is the listed prefix itself.
    Marker(model::fs::FSObject),
    File(model::fs::FSObject),
    Prefix(String),
}

fn already_connected(
    _config: &config::AdapterConfig,
) -> Result<Box<dyn adapters::ObjectClient>, model::fs::FSError> {
    Err(model::fs::FSError::Connect("client already set".to_string()))
}

/// File metadata from request options or response headers.
pub fn normalize_response(headers: &adapters::Headers, path: &str) -> model::fs::FileMetadata {
    let mut metadata = model::fs::FileMetadata::file(path);
    metadata.mimetype = headers.get(adapters::CONTENT_TYPE).cloned();
    metadata.size = headers
        .get(adapters::CONTENT_LENGTH)
        .and_then(|len| len.parse().ok());
    metadata.timestamp = headers
        .get(adapters::LAST_MODIFIED)
        .map(|date| util::time::parse_http_date(date).unwrap_or(0));
    metadata
}
