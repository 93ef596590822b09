use std::collections::HashMap;

use crate::{adapters, util};

pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_MAX_KEYS: i32 = 1000;

/// Per-call setting names and the request header each one maps to.
pub const MAPPING_OPTIONS: &[(&str, &str)] = &[
    ("mimetype", adapters::CONTENT_TYPE),
    ("size", adapters::CONTENT_LENGTH),
];

/// Connection and namespace settings for one adapter.
#[derive(Clone, Debug)]
pub struct AdapterConfig {
    pub provider: util::object::Provider,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    /// Endpoint host, optionally with a scheme (`https://oss-cn-hangzhou.aliyuncs.com`).
    pub domain: String,
    /// `domain` is a custom domain bound to the bucket.
    pub is_cname: bool,
    pub region: String,
    pub max_keys: i32,
    pub prefix: util::path::PathPrefix,
    /// Extra request headers sent with every upload.
    pub options: HashMap<String, String>,
}

impl AdapterConfig {
    pub fn new(access_key: &str, secret_key: &str, bucket: &str, domain: &str, is_cname: bool) -> Self {
        AdapterConfig {
            provider: util::object::Provider::S3,
            access_key: access_key.to_string(),
            secret_key: secret_key.to_string(),
            bucket: bucket.to_string(),
            domain: domain.to_string(),
            is_cname,
            region: DEFAULT_REGION.to_string(),
            max_keys: DEFAULT_MAX_KEYS,
            prefix: util::path::PathPrefix::default(),
            options: HashMap::new(),
        }
    }

    pub fn with_provider(mut self, provider: util::object::Provider) -> Self {
        self.provider = provider;
        self
    }

    pub fn with_prefix(mut self, prefix: Option<&str>) -> Self {
        self.prefix = util::path::PathPrefix::new(prefix);
        self
    }

    pub fn with_region(mut self, region: &str) -> Self {
        self.region = region.to_string();
        self
    }

    pub fn with_max_keys(mut self, max_keys: i32) -> Self {
        self.max_keys = max_keys.max(1);
        self
    }

    pub fn with_option(mut self, header: &str, value: &str) -> Self {
        self.options
            .insert(header.to_ascii_lowercase(), value.to_string());
        self
    }

    pub fn with_options(mut self, options: HashMap<String, String>) -> Self {
        for (header, value) in options {
            self.options.insert(header.to_ascii_lowercase(), value);
        }
        self
    }

    /// `(scheme, host)` of the configured domain, defaulting to http.
    pub fn scheme_and_host(&self) -> (&str, &str) {
        let domain = self.domain.trim_end_matches('/');
        match domain.split_once("://") {
            Some((scheme, host)) => (scheme, host),
            None => ("http", domain),
        }
    }

    pub fn endpoint_url(&self) -> Option<String> {
        let (scheme, host) = self.scheme_and_host();
        if host.is_empty() {
            return None;
        }
        Some(format!("{}://{}", scheme, host))
    }

    /// Public URL of `key` for direct reads: the domain followed by the key.
    pub fn object_url(&self, key: &str) -> String {
        let (scheme, host) = self.scheme_and_host();
        format!("{}://{}/{}", scheme, host, key)
    }
}

/// Settings for a single write, keyed by name (`mimetype`, `size`, ...).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WriteConfig {
    settings: HashMap<String, String>,
}

impl WriteConfig {
    pub fn new() -> Self {
        WriteConfig::default()
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.settings.insert(key.to_string(), value.to_string());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.settings.get(key).map(String::as_str)
    }
}

/// Static extra options overlaid with whatever `config` maps onto a header.
pub fn options_from_config(static_options: &HashMap<String, String>, config: &WriteConfig) -> HashMap<String, String> {
    let mut options = static_options.clone();

    for (setting, header) in MAPPING_OPTIONS {
        if let Some(value) = config.get(setting) {
            options.insert(header.to_string(), value.to_string());
        }
    }

    options
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AdapterConfig::new("ak", "sk", "bucket", "oss-cn-hangzhou.aliyuncs.com", false);

        assert_eq!(config.region, DEFAULT_REGION);
        assert_eq!(config.max_keys, DEFAULT_MAX_KEYS);
        assert_eq!(config.provider, util::object::Provider::S3);
        assert_eq!(config.prefix.as_str(), "");
        assert!(config.options.is_empty());
    }

    #[test]
    fn test_endpoint_url() {
        let cases = vec![
            ("oss-cn-hangzhou.aliyuncs.com", Some("http://oss-cn-hangzhou.aliyuncs.com")),
            ("https://oss-cn-hangzhou.aliyuncs.com", Some("https://oss-cn-hangzhou.aliyuncs.com")),
            ("http://127.0.0.1:9000/", Some("http://127.0.0.1:9000")),
            ("", None),
        ];

        for (domain, expected) in cases {
            let config = AdapterConfig::new("ak", "sk", "bucket", domain, false);
            assert_eq!(
                config.endpoint_url().as_deref(),
                expected,
                "failed for case: {}",
                domain
            );
        }
    }

    #[test]
    fn test_object_url() {
        let cases = vec![
            ("media.oss-cn-hangzhou.aliyuncs.com", false, "http://media.oss-cn-hangzhou.aliyuncs.com/a/b.txt"),
            ("cdn.example.com", true, "http://cdn.example.com/a/b.txt"),
            ("https://cdn.example.com/", true, "https://cdn.example.com/a/b.txt"),
        ];

        for (domain, is_cname, expected) in cases {
            let config = AdapterConfig::new("ak", "sk", "media", domain, is_cname);
            assert_eq!(config.object_url("a/b.txt"), expected, "failed for case: {}", domain);
        }
    }

    #[test]
    fn test_options_from_config() {
        let config = AdapterConfig::new("ak", "sk", "bucket", "domain", false)
            .with_option("Cache-Control", "max-age=60")
            .with_option("Content-Type", "application/json");

        let options = options_from_config(&config.options, &WriteConfig::new());
        assert_eq!(options.get("content-type").map(String::as_str), Some("application/json"));
        assert_eq!(options.get("cache-control").map(String::as_str), Some("max-age=60"));

        let call = WriteConfig::new().with("mimetype", "text/html").with("size", "3").with("visibility", "public");
        let options = options_from_config(&config.options, &call);
        assert_eq!(options.get("content-type").map(String::as_str), Some("text/html"));
        assert_eq!(options.get("content-length").map(String::as_str), Some("3"));
        assert!(!options.contains_key("visibility"));
    }

    #[test]
    fn test_max_keys_floor() {
        let config = AdapterConfig::new("ak", "sk", "bucket", "domain", false).with_max_keys(0);
        assert_eq!(config.max_keys, 1);
    }
}
