use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Network configuration keyed by interface name.
pub type Networks = BTreeMap<String, Network>;

/// Treat an explicit `null` like a missing key.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Network types are free-form strings on the wire; the ones the agent acts
/// on get their own variant.
#[derive(Default, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "String", into = "String")]
pub enum NetworkType {
    #[default]
    Dynamic,
    Manual,
    Vip,
    Other(String),
}

impl From<String> for NetworkType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "dynamic" => NetworkType::Dynamic,
            "manual" => NetworkType::Manual,
            "vip" => NetworkType::Vip,
            _ => NetworkType::Other(value),
        }
    }
}

impl From<NetworkType> for String {
    fn from(value: NetworkType) -> Self {
        match value {
            NetworkType::Dynamic => String::from("dynamic"),
            NetworkType::Manual => String::from("manual"),
            NetworkType::Vip => String::from("vip"),
            NetworkType::Other(other) => other,
        }
    }
}

#[derive(Serialize, Deserialize, Default, Debug, PartialEq, Eq, Clone)]
#[serde(default)]
pub struct Network {
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    pub network_type: NetworkType,
    pub ip: Option<String>,
    pub netmask: Option<String>,
    pub gateway: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub dns: Vec<String>,
    pub mac: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub default: Vec<String>,
}

impl Network {
    pub fn dynamic() -> Self {
        Network {
            network_type: NetworkType::Dynamic,
            ..Default::default()
        }
    }

    pub fn is_dynamic(&self) -> bool {
        self.network_type == NetworkType::Dynamic
    }
}

#[derive(Serialize, Deserialize, Default, Debug, PartialEq, Eq, Clone)]
#[serde(default)]
pub struct Blobstore {
    #[serde(deserialize_with = "null_as_default")]
    pub provider: String,
    #[serde(deserialize_with = "null_as_default")]
    pub options: BTreeMap<String, serde_json::Value>,
}

#[derive(Serialize, Deserialize, Default, Debug, PartialEq, Eq, Clone)]
#[serde(default)]
pub struct Disks {
    pub system: Option<String>,
    pub ephemeral: Option<serde_json::Value>,
    #[serde(deserialize_with = "null_as_default")]
    pub persistent: BTreeMap<String, serde_json::Value>,
}

#[derive(Serialize, Deserialize, Default, Debug, PartialEq, Eq, Clone)]
#[serde(default)]
pub struct Vm {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
}

/// Agent settings as delivered inside the user data document.
#[derive(Serialize, Deserialize, Default, Debug, PartialEq, Eq, Clone)]
#[serde(default)]
pub struct Settings {
    #[serde(deserialize_with = "null_as_default")]
    pub agent_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub mbus: String,
    #[serde(deserialize_with = "null_as_default")]
    pub ntp: Vec<String>,
    pub blobstore: Option<Blobstore>,
    pub disks: Option<Disks>,
    pub env: Option<serde_json::Value>,
    pub vm: Option<Vm>,
    pub networks: Option<Networks>,
}
