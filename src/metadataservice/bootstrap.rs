use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::errors::{Error, ResultExt};
use crate::platform::NetworkBootstrapper;
use crate::settings::{Network, Networks};

pub const DEFAULT_INTERFACE: &str = "eth0";

/// Makes sure some network exists before the first metadata request.
///
/// The check runs until it succeeds once; after that the instance never looks
/// at the interfaces again. The lock is held across check and configure so
/// concurrent callers cannot both start DHCP.
pub struct NetworkBootstrap {
    platform: Arc<dyn NetworkBootstrapper>,
    default_interface: String,
    verified: Mutex<bool>,
}

impl NetworkBootstrap {
    pub fn new(platform: Arc<dyn NetworkBootstrapper>, default_interface: &str) -> Self {
        NetworkBootstrap {
            platform,
            default_interface: default_interface.to_string(),
            verified: Mutex::new(false),
        }
    }

    pub async fn is_verified(&self) -> bool {
        *self.verified.lock().await
    }

    pub async fn ensure(&self) -> Result<(), Error> {
        let mut verified = self.verified.lock().await;
        if *verified {
            return Ok(());
        }

        let interfaces = self
            .platform
            .configured_interfaces()
            .await
            .wrap_err("Getting configured network interfaces")?;

        if interfaces.is_empty() {
            info!(
                "No configured networks found, setting up DHCP network on {}",
                self.default_interface
            );
            let mut networks = Networks::new();
            networks.insert(self.default_interface.clone(), Network::dynamic());
            self.platform
                .setup_networking(&networks)
                .await
                .wrap_err("Setting up initial DHCP network")?;
        } else {
            debug!("Found configured networks: {:?}", interfaces);
        }

        *verified = true;
        Ok(())
    }
}
