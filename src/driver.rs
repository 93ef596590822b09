use std::collections::HashMap;

use serde::Deserialize;
use tracing::info;

use crate::{adapters, config, fs, model, util};

/// Name the adapter is registered under by hosts that pick storage by name.
pub const DRIVER_NAME: &str = "aliyun_oss";

/// Driver settings as they appear in a host's storage configuration.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct DriverConfig {
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    pub domain: String,
    #[serde(default)]
    pub is_cname: bool,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub provider: util::object::Provider,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub options: HashMap<String, String>,
}

impl DriverConfig {
    pub fn adapter_config(&self) -> config::AdapterConfig {
        let mut config = config::AdapterConfig::new(
            &self.access_key,
            &self.secret_key,
            &self.bucket,
            &self.domain,
            self.is_cname,
        )
        .with_provider(self.provider)
        .with_prefix(self.prefix.as_deref())
        .with_options(self.options.clone());

        if let Some(region) = &self.region {
            config = config.with_region(region);
        }

        config
    }
}

fn connect_s3(
    config: &config::AdapterConfig,
) -> Result<Box<dyn adapters::ObjectClient>, model::fs::FSError> {
    Ok(Box::new(adapters::s3::connect(config)?))
}

fn connect_gcs(
    config: &config::AdapterConfig,
) -> Result<Box<dyn adapters::ObjectClient>, model::fs::FSError> {
    Ok(Box::new(adapters::gcs::connect(config)?))
}

/// Adapter for `config`. The client is connected on first use.
pub fn from_config(config: config::AdapterConfig) -> fs::StorageAdapter {
    info!(provider = ?config.provider, bucket = %config.bucket, prefix = config.prefix.as_str(), "building adapter");

    let connector: fs::Connector = match config.provider {
        util::object::Provider::S3 => Box::new(connect_s3),
        util::object::Provider::Gcs => Box::new(connect_gcs),
    };

    fs::StorageAdapter::new(config, connector)
        .with_url_opener(Box::new(adapters::http::HttpOpener::new()))
}

pub fn create(driver: &DriverConfig) -> fs::StorageAdapter {
    from_config(driver.adapter_config())
}

/// Looks `name` up against [`DRIVER_NAME`] before building.
pub fn create_named(name: &str, driver: &DriverConfig) -> Result<fs::StorageAdapter, model::fs::FSError> {
    if name != DRIVER_NAME {
        return Err(model::fs::FSError::Config(format!(
            "unknown storage driver: {}",
            name
        )));
    }

    Ok(create(driver))
}

pub fn build(
    access_key: &str,
    secret_key: &str,
    bucket: &str,
    domain: &str,
    is_cname: bool,
) -> fs::StorageAdapter {
    from_config(config::AdapterConfig::new(
        access_key, secret_key, bucket, domain, is_cname,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_driver_config() {
        let cases = vec![
            (
                r#"{"access_key":"ak","secret_key":"sk","bucket":"b","domain":"oss-cn-hangzhou.aliyuncs.com"}"#,
                false,
                None,
                util::object::Provider::S3,
            ),
            (
                r#"{"access_key":"ak","secret_key":"sk","bucket":"b","domain":"cdn.example.com","is_cname":true,"prefix":"uploads"}"#,
                true,
                Some("uploads".to_string()),
                util::object::Provider::S3,
            ),
            (
                r#"{"access_key":"","secret_key":"","bucket":"b","domain":"","provider":"gcs"}"#,
                false,
                None,
                util::object::Provider::Gcs,
            ),
        ];

        for (raw, is_cname, prefix, provider) in cases {
            let driver: DriverConfig = serde_json::from_str(raw).unwrap();
            assert_eq!(driver.bucket, "b", "failed for case: {}", raw);
            assert_eq!(driver.is_cname, is_cname, "failed for case: {}", raw);
            assert_eq!(driver.prefix, prefix, "failed for case: {}", raw);
            assert_eq!(driver.provider, provider, "failed for case: {}", raw);
        }

        let missing: Result<DriverConfig, _> = serde_json::from_str(r#"{"bucket":"b"}"#);
        assert!(missing.is_err());
    }

    #[test]
    fn test_create() {
        let driver: DriverConfig = serde_json::from_str(
            r#"{"access_key":"ak","secret_key":"sk","bucket":"b","domain":"oss.example.com",
                "prefix":"/uploads/","region":"oss-cn-hangzhou","options":{"Cache-Control":"no-cache"}}"#,
        )
        .unwrap();

        let adapter = create_named(DRIVER_NAME, &driver).unwrap();
        let config = adapter.config();

        assert_eq!(config.bucket, "b");
        assert_eq!(config.prefix.as_str(), "/uploads/");
        assert_eq!(config.region, "oss-cn-hangzhou");
        assert_eq!(config.options.get("cache-control").map(String::as_str), Some("no-cache"));

        assert!(matches!(
            create_named("local", &driver),
            Err(model::fs::FSError::Config(_))
        ));
    }

    #[test]
    fn test_build() {
        let adapter = build("ak", "sk", "b", "cdn.example.com", true);

        assert!(adapter.config().is_cname);
        assert_eq!(adapter.config().provider, util::object::Provider::S3);
        assert_eq!(adapter.config().object_url("k"), "http://cdn.example.com/k");
    }
}
