use async_trait::async_trait;
use std::collections::BTreeSet;
use tokio::process::Command;
use tracing::{debug, info, instrument};

use crate::errors::Error;
use crate::platform::NetworkBootstrapper;
use crate::settings::Networks;

const IP_EXECUTABLE: &str = "/usr/sbin/ip";
const DHCP_CLIENT_EXECUTABLE: &str = "/usr/sbin/dhclient";

async fn command(executable: &str, args: Vec<&str>) -> Result<String, Error> {
    let full_command = || {
        std::iter::once(executable)
            .chain(args.iter().copied())
            .map(|s| s.to_owned())
            .collect::<Vec<String>>()
    };

    let output = Command::new(executable)
        .args(&args)
        .output()
        .await
        .map_err(|e| Error::CommandSpawn(full_command(), e))?;

    if !output.status.success() {
        return Err(Error::CommandError(
            full_command(),
            String::from_utf8_lossy(&output.stderr).into_owned(),
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Interface names from `ip -o -4 addr show` output, in first-seen order.
fn parse_interface_names(output: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    output
        .lines()
        .filter_map(|line| line.split_whitespace().nth(1))
        .map(|name| name.trim_end_matches(':'))
        .map(|name| name.split('@').next().unwrap_or(name))
        .filter(|name| *name != "lo")
        .filter(|name| seen.insert(name.to_string()))
        .map(|name| name.to_string())
        .collect()
}

/// Bootstraps networking with the `ip` tool and a DHCP client.
#[derive(Debug, Clone)]
pub struct IpCommandPlatform {
    ip_executable: String,
    dhcp_client_executable: String,
}

impl IpCommandPlatform {
    pub fn new() -> Self {
        IpCommandPlatform {
            ip_executable: IP_EXECUTABLE.to_string(),
            dhcp_client_executable: DHCP_CLIENT_EXECUTABLE.to_string(),
        }
    }

    pub fn with_executables(ip_executable: &str, dhcp_client_executable: &str) -> Self {
        IpCommandPlatform {
            ip_executable: ip_executable.to_string(),
            dhcp_client_executable: dhcp_client_executable.to_string(),
        }
    }

    async fn ip_command(&self, args: Vec<&str>) -> Result<String, Error> {
        command(&self.ip_executable, args).await
    }
}

impl Default for IpCommandPlatform {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NetworkBootstrapper for IpCommandPlatform {
    #[instrument(skip(self))]
    async fn configured_interfaces(&self) -> Result<Vec<String>, Error> {
        let output = self
            .ip_command(vec!["-o", "-4", "addr", "show", "scope", "global"])
            .await?;
        let interfaces = parse_interface_names(&output);
        debug!("configured interfaces: {:?}", interfaces);
        Ok(interfaces)
    }

    #[instrument(skip(self))]
    async fn setup_networking(&self, networks: &Networks) -> Result<(), Error> {
        if let Some((name, _)) = networks.iter().find(|(_, network)| !network.is_dynamic()) {
            return Err(Error::NetworkSetup(format!(
                "Network {name} is not dynamic, only DHCP networks can be set up before metadata is available"
            )));
        }

        for interface in networks.keys() {
            info!("Starting DHCP on {}", interface);
            self.ip_command(vec!["link", "set", interface.as_str(), "up"]).await?;
            command(&self.dhcp_client_executable, vec!["-1", interface.as_str()]).await?;
        }
        Ok(())
    }
}
