use async_trait::async_trait;

use crate::errors::Error;
use crate::settings::Networks;

mod networking;

pub use networking::IpCommandPlatform;

/// The part of the host platform needed to bring up networking before any
/// metadata can be fetched.
#[async_trait]
pub trait NetworkBootstrapper: Send + Sync {
    /// Names of the interfaces that already have a usable configuration.
    async fn configured_interfaces(&self) -> Result<Vec<String>, Error>;

    /// Apply the given network configuration.
    async fn setup_networking(&self, networks: &Networks) -> Result<(), Error>;
}
