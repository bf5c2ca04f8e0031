use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::config::MetadataServiceConfig;
use crate::dns::DnsResolver;
use crate::errors::{Error, ResultExt};
use crate::metadataservice::bootstrap::{DEFAULT_INTERFACE, NetworkBootstrap};
use crate::metadataservice::retry::{
    DEFAULT_REQUEST_TIMEOUT, RetryPolicy, RetryableHttpClient, build_header_map,
};
use crate::metadataservice::userdata::{UserDataDocument, decode_user_data};
use crate::platform::NetworkBootstrapper;
use crate::settings::{Networks, Settings};

pub mod bootstrap;
pub mod retry;
pub mod userdata;

/// Identity and bootstrap configuration of the instance the agent runs on.
#[async_trait]
pub trait MetadataService: Send + Sync {
    fn is_available(&self) -> bool;
    async fn get_public_key(&self) -> Result<String, Error>;
    async fn get_instance_id(&self) -> Result<String, Error>;
    async fn get_server_name(&self) -> Result<String, Error>;
    async fn get_registry_endpoint(&self) -> Result<String, Error>;
    fn get_networks(&self) -> Option<Networks>;
}

/// A metadata service that can also serve settings and arbitrary paths.
#[async_trait]
pub trait DynamicMetadataService: MetadataService {
    async fn get_value_at_path(&self, path: &str) -> Result<String, Error>;
    async fn get_settings(&self) -> Result<Settings, Error>;
}

/// Relative paths below the metadata host. An empty path means the
/// infrastructure does not offer that piece of metadata.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MetadataPaths {
    pub user_data: String,
    pub instance_id: String,
    pub ssh_keys: String,
}

impl MetadataPaths {
    pub fn new(user_data: &str, instance_id: &str, ssh_keys: &str) -> Self {
        MetadataPaths {
            user_data: user_data.to_string(),
            instance_id: instance_id.to_string(),
            ssh_keys: ssh_keys.to_string(),
        }
    }
}

pub struct HttpMetadataService {
    client: RetryableHttpClient,
    paths: MetadataPaths,
    resolver: Arc<dyn DnsResolver>,
    bootstrap: NetworkBootstrap,
}

impl HttpMetadataService {
    pub fn new(
        metadata_host: &str,
        headers: HashMap<String, String>,
        paths: MetadataPaths,
        resolver: Arc<dyn DnsResolver>,
        platform: Arc<dyn NetworkBootstrapper>,
    ) -> Result<Self, Error> {
        Self::with_retry_policy(
            metadata_host,
            headers,
            paths,
            resolver,
            platform,
            RetryPolicy::default(),
        )
    }

    pub fn with_custom_retry_delay(
        metadata_host: &str,
        headers: HashMap<String, String>,
        paths: MetadataPaths,
        resolver: Arc<dyn DnsResolver>,
        platform: Arc<dyn NetworkBootstrapper>,
        retry_delay: Duration,
    ) -> Result<Self, Error> {
        Self::with_retry_policy(
            metadata_host,
            headers,
            paths,
            resolver,
            platform,
            RetryPolicy::new(retry_delay),
        )
    }

    pub fn with_retry_policy(
        metadata_host: &str,
        headers: HashMap<String, String>,
        paths: MetadataPaths,
        resolver: Arc<dyn DnsResolver>,
        platform: Arc<dyn NetworkBootstrapper>,
        policy: RetryPolicy,
    ) -> Result<Self, Error> {
        let client = RetryableHttpClient::new(
            metadata_host,
            build_header_map(&headers)?,
            policy,
            DEFAULT_REQUEST_TIMEOUT,
        )?;
        Ok(HttpMetadataService {
            client,
            paths,
            resolver,
            bootstrap: NetworkBootstrap::new(platform, DEFAULT_INTERFACE),
        })
    }

    pub fn from_config(
        config: &MetadataServiceConfig,
        resolver: Arc<dyn DnsResolver>,
        platform: Arc<dyn NetworkBootstrapper>,
    ) -> Result<Self, Error> {
        let client = RetryableHttpClient::new(
            &config.metadata_host,
            build_header_map(&config.headers)?,
            config.retry_policy()?,
            config.request_timeout()?,
        )?;
        Ok(HttpMetadataService {
            client,
            paths: config.paths(),
            resolver,
            bootstrap: NetworkBootstrap::new(platform, &config.default_interface),
        })
    }

    async fn get_user_data(&self) -> Result<UserDataDocument, Error> {
        self.bootstrap.ensure().await?;

        let url = self.client.url_for(&self.paths.user_data);
        let body = self
            .client
            .get(&self.paths.user_data)
            .await
            .wrap_err_with(|| format!("Getting user data from url {url}"))?;

        decode_user_data(body.as_bytes())
    }

    async fn get_optional_value(&self, path: &str, what: &str) -> Result<String, Error> {
        if path.is_empty() {
            debug!("No path configured for {}, skipping", what);
            return Ok(String::new());
        }

        self.bootstrap.ensure().await?;

        let url = self.client.url_for(path);
        self.client
            .get(path)
            .await
            .wrap_err_with(|| format!("Getting {what} from url {url}"))
    }
}

#[async_trait]
impl MetadataService for HttpMetadataService {
    fn is_available(&self) -> bool {
        true
    }

    #[instrument(skip(self))]
    async fn get_public_key(&self) -> Result<String, Error> {
        self.get_optional_value(&self.paths.ssh_keys, "open ssh key")
            .await
    }

    #[instrument(skip(self))]
    async fn get_instance_id(&self) -> Result<String, Error> {
        self.get_optional_value(&self.paths.instance_id, "instance id")
            .await
    }

    #[instrument(skip(self))]
    async fn get_server_name(&self) -> Result<String, Error> {
        let user_data = self.get_user_data().await.wrap_err("Getting user data")?;

        user_data
            .server_name()
            .map(|name| name.to_string())
            .ok_or_else(|| Error::MissingField(String::from("Empty server name")))
    }

    #[instrument(skip(self))]
    async fn get_registry_endpoint(&self) -> Result<String, Error> {
        let user_data = self.get_user_data().await.wrap_err("Getting user data")?;

        let endpoint = user_data.registry_endpoint().unwrap_or_default();
        let nameservers = user_data.nameservers();
        if nameservers.is_empty() {
            return Ok(endpoint.to_string());
        }

        debug!("Resolving {} through {:?}", endpoint, nameservers);
        self.resolver
            .lookup_host(nameservers, endpoint)
            .await
            .wrap_err("Resolving registry endpoint")
    }

    fn get_networks(&self) -> Option<Networks> {
        None
    }
}

#[async_trait]
impl DynamicMetadataService for HttpMetadataService {
    #[instrument(skip(self))]
    async fn get_value_at_path(&self, path: &str) -> Result<String, Error> {
        if path.is_empty() {
            return Err(Error::InvalidArgument(String::from(
                "Can not retrieve metadata value for empty path",
            )));
        }

        self.bootstrap.ensure().await?;

        let url = self.client.url_for(path);
        self.client
            .get(path)
            .await
            .wrap_err_with(|| format!("Getting value from url {url}"))
    }

    #[instrument(skip(self))]
    async fn get_settings(&self) -> Result<Settings, Error> {
        let user_data = self.get_user_data().await.wrap_err("Getting user data")?;

        user_data
            .settings()?
            .ok_or_else(|| Error::MissingField(String::from("Metadata does not provide settings")))
    }
}
