use std::{
    collections::{BTreeMap, BTreeSet, HashSet},
    sync::{Arc, Mutex, MutexGuard},
};

use crate::{adapters, model, util};

#[derive(Clone, Debug)]
pub struct MockObject {
    pub content: Vec<u8>,
    pub headers: adapters::Headers,
    pub last_modified: i64,
}

#[derive(Debug, Default)]
struct MockState {
    objects: BTreeMap<(String, String), MockObject>,
    calls: Vec<String>,
    failing: HashSet<&'static str>,
    batches: Vec<Vec<String>>,
}

/// In-memory object store. Clones share the same state, so a test can keep a
/// handle while the adapter owns another.
#[derive(Clone, Debug, Default)]
pub struct MockClient {
    state: Arc<Mutex<MockState>>,
}

impl MockClient {
    pub fn new() -> Self {
        MockClient::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Makes every later call named `operation` (`"copy_object"`, ...) fail.
    pub fn fail_on(&self, operation: &'static str) {
        self.state().failing.insert(operation);
    }

    pub fn recover(&self, operation: &'static str) {
        self.state().failing.remove(operation);
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn delete_batches(&self) -> Vec<Vec<String>> {
        self.state().batches.clone()
    }

    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.state()
            .objects
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect()
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<MockObject> {
        self.state()
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// Stores an object directly, bypassing call recording.
    pub fn insert(&self, bucket: &str, key: &str, content: &[u8], last_modified: i64) {
        self.state().objects.insert(
            (bucket.to_string(), key.to_string()),
            MockObject {
                content: content.to_vec(),
                headers: adapters::Headers::new(),
                last_modified,
            },
        );
    }

    fn enter(&self, operation: &'static str, key: &str) -> Result<MutexGuard<'_, MockState>, model::fs::FSError> {
        let mut state = self.state();
        state.calls.push(format!("{} {}", operation, key));
        if state.failing.contains(operation) {
            return Err(model::fs::FSError::remote(operation, key, "injected failure"));
        }
        Ok(state)
    }
}

fn id(bucket: &str, key: &str) -> (String, String) {
    (bucket.to_string(), key.to_string())
}

impl adapters::ObjectClient for MockClient {
    fn fs_put_object(
        &self,
        bucket: &str,
        key: &str,
        content: Vec<u8>,
        options: &adapters::Headers,
    ) -> Result<(), model::fs::FSError> {
        let mut state = self.enter("put_object", key)?;
        state.objects.insert(
            id(bucket, key),
            MockObject {
                content,
                headers: options.clone(),
                last_modified: util::time::now(),
            },
        );
        Ok(())
    }

    fn fs_copy_object(
        &self,
        from_bucket: &str,
        from_key: &str,
        to_bucket: &str,
        to_key: &str,
    ) -> Result<(), model::fs::FSError> {
        let mut state = self.enter("copy_object", from_key)?;
        let mut object = match state.objects.get(&id(from_bucket, from_key)) {
            None => return Err(model::fs::FSError::NotFound(from_key.to_string())),
            Some(o) => o.clone(),
        };
        object.last_modified = util::time::now();
        state.objects.insert(id(to_bucket, to_key), object);
        Ok(())
    }

    fn fs_delete_object(&self, bucket: &str, key: &str) -> Result<(), model::fs::FSError> {
        let mut state = self.enter("delete_object", key)?;
        state.objects.remove(&id(bucket, key));
        Ok(())
    }

    fn fs_delete_objects(&self, bucket: &str, keys: &[String]) -> Result<(), model::fs::FSError> {
        let mut state = self.enter("delete_objects", &keys.join(","))?;
        state.batches.push(keys.to_vec());
        for key in keys {
            state.objects.remove(&id(bucket, key));
        }
        Ok(())
    }

    fn fs_create_object_dir(
        &self,
        bucket: &str,
        key: &str,
        options: &adapters::Headers,
    ) -> Result<(), model::fs::FSError> {
        let marker = adapters::dir_marker(key);
        let mut state = self.enter("create_object_dir", &marker)?;
        state.objects.insert(
            id(bucket, &marker),
            MockObject {
                content: Vec::new(),
                headers: options.clone(),
                last_modified: util::time::now(),
            },
        );
        Ok(())
    }

    fn fs_does_object_exist(&self, bucket: &str, key: &str) -> Result<bool, model::fs::FSError> {
        let state = self.enter("does_object_exist", key)?;
        Ok(state.objects.contains_key(&id(bucket, key)))
    }

    fn fs_get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, model::fs::FSError> {
        let state = self.enter("get_object", key)?;
        match state.objects.get(&id(bucket, key)) {
            None => Err(model::fs::FSError::NotFound(key.to_string())),
            Some(o) => Ok(o.content.clone()),
        }
    }

    fn fs_list_objects(
        &self,
        bucket: &str,
        request: &model::fs::ListRequest,
    ) -> Result<model::fs::ListPage, model::fs::FSError> {
        let state = self.enter("list_objects", &request.prefix)?;

        // Objects and collapsed prefixes merged in key order, as S3 pages them.
        let mut entries: BTreeMap<String, Option<model::fs::FSObject>> = BTreeMap::new();
        let mut prefixes = BTreeSet::new();
        for ((b, key), object) in state.objects.iter() {
            if b != bucket || !key.starts_with(&request.prefix) {
                continue;
            }

            let rest = &key[request.prefix.len()..];
            let split = if request.delimiter.is_empty() {
                None
            } else {
                rest.find(request.delimiter.as_str())
            };

            match split {
                Some(pos) => {
                    let prefix = format!("{}{}", request.prefix, &rest[..pos + request.delimiter.len()]);
                    if prefixes.insert(prefix.clone()) {
                        entries.insert(prefix, None);
                    }
                }
                None => {
                    entries.insert(
                        key.clone(),
                        Some(model::fs::FSObject {
                            key: key.clone(),
                            size: object.content.len() as i64,
                            last_modified: Some(object.last_modified),
                        }),
                    );
                }
            }
        }

        let remaining: Vec<(String, Option<model::fs::FSObject>)> = entries
            .into_iter()
            .filter(|(name, _)| match &request.marker {
                Some(marker) => name.as_str() > marker.as_str(),
                None => true,
            })
            .collect();

        let max_keys = request.max_keys.max(1) as usize;
        let truncated = remaining.len() > max_keys;

        let mut page = model::fs::ListPage::default();
        let mut last = None;
        for (name, entry) in remaining.into_iter().take(max_keys) {
            match entry {
                Some(object) => page.objects.push(object),
                None => page.common_prefixes.push(name.clone()),
            }
            last = Some(name);
        }

        if truncated {
            page.next_marker = last;
        }

        Ok(page)
    }

    fn fs_get_object_meta(&self, bucket: &str, key: &str) -> Result<adapters::Headers, model::fs::FSError> {
        let state = self.enter("get_object_meta", key)?;
        let object = match state.objects.get(&id(bucket, key)) {
            None => return Err(model::fs::FSError::NotFound(key.to_string())),
            Some(o) => o,
        };

        let mut headers = object.headers.clone();
        headers.insert(
            adapters::CONTENT_LENGTH.to_string(),
            object.content.len().to_string(),
        );
        if let Some(date) = util::time::http_date(object.last_modified) {
            headers.insert(adapters::LAST_MODIFIED.to_string(), date);
        }
        Ok(headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ObjectClient;

    fn list(client: &MockClient, prefix: &str, max_keys: i32, marker: Option<String>) -> model::fs::ListPage {
        client
            .fs_list_objects(
                "bucket",
                &model::fs::ListRequest {
                    prefix: prefix.to_string(),
                    delimiter: "/".to_string(),
                    max_keys,
                    marker,
                },
            )
            .unwrap()
    }

    #[test]
    fn test_list_objects_delimiter() {
        let client = MockClient::new();
        for key in ["a/", "a/x.txt", "a/sub/y.txt", "a/sub/z.txt", "ab.txt", "b/c.txt"] {
            client.insert("bucket", key, b"", 0);
        }
        client.insert("other", "a/elsewhere.txt", b"", 0);

        let page = list(&client, "a/", 1000, None);
        let keys: Vec<&str> = page.objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["a/", "a/x.txt"]);
        assert_eq!(page.common_prefixes, vec!["a/sub/".to_string()]);
        assert_eq!(page.next_marker, None);

        let root = list(&client, "", 1000, None);
        let keys: Vec<&str> = root.objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["ab.txt"]);
        assert_eq!(root.common_prefixes, vec!["a/".to_string(), "b/".to_string()]);
    }

    #[test]
    fn test_list_objects_pages() {
        let client = MockClient::new();
        for key in ["d/1", "d/2", "d/3", "d/s/4", "d/t/5"] {
            client.insert("bucket", key, b"x", 0);
        }

        let mut marker = None;
        let mut seen = Vec::new();
        let mut pages = 0;
        loop {
            let page = list(&client, "d/", 2, marker);
            pages += 1;
            seen.extend(page.objects.into_iter().map(|o| o.key));
            seen.extend(page.common_prefixes);
            marker = page.next_marker;
            if marker.is_none() {
                break;
            }
        }

        assert_eq!(pages, 3);
        assert_eq!(seen, vec!["d/1", "d/2", "d/3", "d/s/", "d/t/"]);
    }

    #[test]
    fn test_fail_on() {
        let client = MockClient::new();
        client.fail_on("get_object");
        client.insert("bucket", "k", b"v", 0);

        assert!(client.fs_get_object("bucket", "k").unwrap_err().is_remote());

        client.recover("get_object");
        assert_eq!(client.fs_get_object("bucket", "k").unwrap(), b"v".to_vec());
        assert_eq!(client.calls(), vec!["get_object k", "get_object k"]);
    }

    #[test]
    fn test_object_meta() {
        let client = MockClient::new();
        client.insert("bucket", "k", b"hello", 784111777);

        let headers = client.fs_get_object_meta("bucket", "k").unwrap();
        assert_eq!(headers.get(adapters::CONTENT_LENGTH).map(String::as_str), Some("5"));
        assert_eq!(
            headers.get(adapters::LAST_MODIFIED).map(String::as_str),
            Some("Sun, 06 Nov 1994 08:49:37 GMT")
        );
        assert!(client.fs_get_object_meta("bucket", "missing").unwrap_err().is_not_found());
    }
}
