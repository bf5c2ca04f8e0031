use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use metadata_bootstrap::Error;
use metadata_bootstrap::config::MetadataServiceConfig;
use metadata_bootstrap::dns::HickoryDnsResolver;
use metadata_bootstrap::logging::setup_tracing;
use metadata_bootstrap::metadataservice::{
    DynamicMetadataService, HttpMetadataService, MetadataService,
};
use metadata_bootstrap::platform::IpCommandPlatform;
use metadata_bootstrap::utils::strings::get_version_string;
use tracing::debug;

const CONFIG_ENV: &str = "METADATA_BOOTSTRAP_CONFIG";
const USAGE: &str = "usage: metadata-bootstrap [--config FILE] \
    <available|instance-id|public-key|server-name|registry-endpoint|settings|networks|value PATH>";

fn config_path(args: &[String]) -> Option<PathBuf> {
    args.iter()
        .position(|arg| arg == "--config")
        .and_then(|index| args.get(index + 1))
        .map(PathBuf::from)
        .or_else(|| env::var_os(CONFIG_ENV).map(PathBuf::from))
}

/// Positional arguments with `--config FILE` removed.
fn positional(args: &[String]) -> Vec<&str> {
    let mut result = Vec::new();
    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        if arg == "--config" {
            iter.next();
        } else {
            result.push(arg.as_str());
        }
    }
    result
}

async fn run_query(service: &HttpMetadataService, query: &[&str]) -> Result<String, Error> {
    match query {
        ["available"] => Ok(service.is_available().to_string()),
        ["instance-id"] => service.get_instance_id().await,
        ["public-key"] => service.get_public_key().await,
        ["server-name"] => service.get_server_name().await,
        ["registry-endpoint"] => service.get_registry_endpoint().await,
        ["settings"] => {
            let settings = service.get_settings().await?;
            Ok(serde_json::to_string_pretty(&settings)?)
        }
        ["networks"] => Ok(serde_json::to_string_pretty(&service.get_networks())?),
        ["value", path] => service.get_value_at_path(path).await,
        _ => Err(Error::InvalidArgument(String::from(USAGE))),
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args: Vec<String> = env::args().collect();

    if args.contains(&String::from("--version")) {
        println!("{}", get_version_string());
        return Ok(());
    }

    setup_tracing()?;

    let config = match config_path(&args) {
        Some(path) => {
            debug!("Loading config from {}", path.display());
            MetadataServiceConfig::from_file(&path)?
        }
        None => MetadataServiceConfig::openstack(),
    };

    let service = HttpMetadataService::from_config(
        &config,
        Arc::new(HickoryDnsResolver::new()),
        Arc::new(IpCommandPlatform::new()),
    )?;

    let output = run_query(&service, &positional(&args)).await?;
    println!("{output}");
    Ok(())
}
