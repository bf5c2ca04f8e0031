use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::errors::Error;
use crate::metadataservice::MetadataPaths;
use crate::metadataservice::bootstrap::DEFAULT_INTERFACE;
use crate::metadataservice::retry::RetryPolicy;

pub const DEFAULT_METADATA_HOST: &str = "http://169.254.169.254";

fn default_interface() -> String {
    DEFAULT_INTERFACE.to_string()
}

fn default_retry_delay() -> String {
    String::from("1s")
}

fn default_request_timeout() -> String {
    String::from("5s")
}

/// How to reach the metadata endpoint of the infrastructure the agent runs on.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct MetadataServiceConfig {
    pub metadata_host: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub user_data_path: String,
    #[serde(default)]
    pub instance_id_path: String,
    #[serde(default)]
    pub ssh_keys_path: String,
    #[serde(default = "default_interface")]
    pub default_interface: String,
    #[serde(default = "default_retry_delay")]
    pub retry_delay: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: String,
    pub operation_timeout: Option<String>,
}

impl MetadataServiceConfig {
    pub fn new(metadata_host: &str) -> Self {
        MetadataServiceConfig {
            metadata_host: metadata_host.to_string(),
            headers: HashMap::new(),
            user_data_path: String::new(),
            instance_id_path: String::new(),
            ssh_keys_path: String::new(),
            default_interface: default_interface(),
            retry_delay: default_retry_delay(),
            request_timeout: default_request_timeout(),
            operation_timeout: None,
        }
    }

    /// EC2 compatible layout as served by OpenStack.
    pub fn openstack() -> Self {
        MetadataServiceConfig {
            user_data_path: String::from("/latest/user-data"),
            instance_id_path: String::from("/latest/meta-data/instance-id"),
            ssh_keys_path: String::from("/latest/meta-data/public-keys/0/openssh-key"),
            ..Self::new(DEFAULT_METADATA_HOST)
        }
    }

    pub fn gce() -> Self {
        let mut headers = HashMap::new();
        headers.insert(String::from("Metadata-Flavor"), String::from("Google"));
        MetadataServiceConfig {
            headers,
            user_data_path: String::from("/computeMetadata/v1/instance/attributes/bosh_settings"),
            instance_id_path: String::from("/computeMetadata/v1/instance/name"),
            ..Self::new("http://metadata.google.internal")
        }
    }

    pub fn from_yaml(text: &str) -> Result<Self, Error> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigRead(path.display().to_string(), e))?;
        Self::from_yaml(&text)
    }

    pub fn paths(&self) -> MetadataPaths {
        MetadataPaths::new(
            &self.user_data_path,
            &self.instance_id_path,
            &self.ssh_keys_path,
        )
    }

    pub fn request_timeout(&self) -> Result<Duration, Error> {
        parse_duration(&self.request_timeout)
    }

    pub fn retry_policy(&self) -> Result<RetryPolicy, Error> {
        let policy = RetryPolicy::new(parse_duration(&self.retry_delay)?);
        Ok(match &self.operation_timeout {
            Some(timeout) => policy.with_timeout(parse_duration(timeout)?),
            None => policy,
        })
    }
}

fn parse_duration(value: &str) -> Result<Duration, Error> {
    let value = value.trim();
    if value == "0" {
        return Ok(Duration::ZERO);
    }
    Ok(humanize_rs::duration::parse(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_yaml_with_defaults() {
        let config = MetadataServiceConfig::from_yaml(
            r#"
metadata_host: http://169.254.169.254
user_data_path: /latest/user-data
headers:
  key: value
"#,
        )
        .unwrap();

        assert_eq!(config.metadata_host, "http://169.254.169.254");
        assert_eq!(config.headers.get("key").map(String::as_str), Some("value"));
        assert_eq!(config.user_data_path, "/latest/user-data");
        assert_eq!(config.instance_id_path, "");
        assert_eq!(config.default_interface, "eth0");
        assert_eq!(config.request_timeout().unwrap(), Duration::from_secs(5));

        let policy = config.retry_policy().unwrap();
        assert_eq!(policy.delay(), Duration::from_secs(1));
        assert_eq!(policy.max_attempts(), 10);
        assert_eq!(policy.timeout(), None);
    }

    #[test]
    fn parses_json_with_timeouts() {
        let config = MetadataServiceConfig::from_yaml(
            r#"{"metadata_host":"http://10.0.0.1","retry_delay":"0","request_timeout":"2s","operation_timeout":"60s"}"#,
        )
        .unwrap();

        let policy = config.retry_policy().unwrap();
        assert_eq!(policy.delay(), Duration::ZERO);
        assert_eq!(policy.timeout(), Some(Duration::from_secs(60)));
        assert_eq!(config.request_timeout().unwrap(), Duration::from_secs(2));
    }

    #[test]
    fn missing_host_is_an_error() {
        let err = MetadataServiceConfig::from_yaml("user_data_path: /user-data").unwrap_err();
        assert!(matches!(err, Error::Yaml(_)));
    }

    #[test]
    fn bad_duration_is_an_error() {
        let mut config = MetadataServiceConfig::new("http://10.0.0.1");
        config.retry_delay = String::from("soon");
        assert!(matches!(config.retry_policy(), Err(Error::ParseHumanize(_))));
    }

    #[test]
    fn presets_fill_paths() {
        let openstack = MetadataServiceConfig::openstack();
        assert_eq!(openstack.metadata_host, DEFAULT_METADATA_HOST);
        assert_eq!(
            openstack.paths(),
            MetadataPaths::new(
                "/latest/user-data",
                "/latest/meta-data/instance-id",
                "/latest/meta-data/public-keys/0/openssh-key"
            )
        );

        let gce = MetadataServiceConfig::gce();
        assert_eq!(gce.headers.get("Metadata-Flavor").map(String::as_str), Some("Google"));
        assert_eq!(gce.ssh_keys_path, "");
    }

    #[test]
    fn reads_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "metadata_host: http://192.0.2.1").unwrap();
        writeln!(file, "ssh_keys_path: /ssh-keys").unwrap();

        let config = MetadataServiceConfig::from_file(file.path()).unwrap();
        assert_eq!(config.metadata_host, "http://192.0.2.1");
        assert_eq!(config.ssh_keys_path, "/ssh-keys");
    }

    #[test]
    fn unreadable_file_names_the_path() {
        let err = MetadataServiceConfig::from_file(Path::new("/nonexistent/config.yml")).unwrap_err();
        assert!(err.to_string().starts_with("Error reading config file /nonexistent/config.yml"));
    }
}
