use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;
use tracing::debug;

use crate::errors::{Error, ResultExt};
use crate::settings::{Settings, null_as_default};

#[derive(Deserialize, Default, Debug, PartialEq, Eq, Clone)]
pub struct RegistrySection {
    pub endpoint: Option<String>,
}

#[derive(Deserialize, Default, Debug, PartialEq, Eq, Clone)]
pub struct DnsSection {
    #[serde(default, deserialize_with = "null_as_default")]
    pub nameserver: Vec<String>,
}

#[derive(Deserialize, Default, Debug, PartialEq, Eq, Clone)]
pub struct ServerSection {
    pub name: Option<String>,
}

/// The document served at the user data path. Every section is optional and
/// unknown fields are ignored, so a bare `{}` is a valid document.
///
/// `settings` stays untyped here so a settings block the agent cannot read
/// only fails [`UserDataDocument::settings`], not the other queries.
#[derive(Deserialize, Default, Debug, PartialEq, Eq, Clone)]
pub struct UserDataDocument {
    pub registry: Option<RegistrySection>,
    pub dns: Option<DnsSection>,
    pub server: Option<ServerSection>,
    pub settings: Option<serde_json::Value>,
}

impl UserDataDocument {
    pub fn registry_endpoint(&self) -> Option<&str> {
        self.registry
            .as_ref()
            .and_then(|registry| registry.endpoint.as_deref())
    }

    pub fn nameservers(&self) -> &[String] {
        self.dns
            .as_ref()
            .map(|dns| dns.nameserver.as_slice())
            .unwrap_or_default()
    }

    /// The server name, or `None` when it is absent or empty.
    pub fn server_name(&self) -> Option<&str> {
        self.server
            .as_ref()
            .and_then(|server| server.name.as_deref())
            .filter(|name| !name.is_empty())
    }

    /// The typed settings block, or `None` when the document has none.
    pub fn settings(&self) -> Result<Option<Settings>, Error> {
        self.settings
            .as_ref()
            .map(|value| Settings::deserialize(value).wrap_err("Unmarshalling settings"))
            .transpose()
    }
}

/// Parse a user data body, first as plain JSON and then as URL-safe unpadded
/// base64 wrapping the same JSON. A JSON `null` body is an empty document.
pub fn decode_user_data(body: &[u8]) -> Result<UserDataDocument, Error> {
    if let Ok(document) = serde_json::from_slice::<Option<UserDataDocument>>(body) {
        return Ok(document.unwrap_or_default());
    }

    debug!("user data is not plain JSON, trying url decoding");
    let decoded = URL_SAFE_NO_PAD
        .decode(body)
        .wrap_err("Decoding url encoded user data")?;

    serde_json::from_slice::<Option<UserDataDocument>>(&decoded)
        .map(Option::unwrap_or_default)
        .wrap_err_with(|| {
            format!(
                "Unmarshalling url decoded user data '{}'",
                String::from_utf8_lossy(&decoded)
            )
        })
}
