//! Client configuration: which groups to look for and which remote object to bind.

use serde::Deserialize;

use crate::transport::InterfaceContract;

/// Reverse-URL prefix shared by every SimpleService group advertisement.
pub const DEFAULT_GROUP_PREFIX: &str = "org.alljoyn.bus.samples.simple";

/// Path of the service object that implements the interface.
pub const DEFAULT_OBJECT_PATH: &str = "/SimpleService";

pub const DEFAULT_INTERFACE_NAME: &str = "org.alljoyn.bus.samples.simple.SimpleInterface";

/// The one remote method this client calls.
pub const PING_METHOD: &str = "Ping";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Discovery matches advertised group names starting with this prefix.
    #[serde(default = "default_group_prefix")]
    pub group_prefix: String,
    #[serde(default = "default_object_path")]
    pub object_path: String,
    #[serde(default)]
    pub interface: InterfaceContract,
    /// Method invoked by `Command::Call`. Must be one of the interface's methods.
    #[serde(default = "default_method")]
    pub method: String,
}

fn default_group_prefix() -> String {
    DEFAULT_GROUP_PREFIX.to_string()
}
fn default_object_path() -> String {
    DEFAULT_OBJECT_PATH.to_string()
}
fn default_method() -> String {
    PING_METHOD.to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            group_prefix: default_group_prefix(),
            object_path: default_object_path(),
            interface: InterfaceContract::default(),
            method: default_method(),
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.group_prefix.is_empty() {
            return Err(ConfigError::EmptyGroupPrefix);
        }
        if !self.object_path.starts_with('/') {
            return Err(ConfigError::InvalidObjectPath(self.object_path.clone()));
        }
        if !self.interface.has_method(&self.method) {
            return Err(ConfigError::UnknownMethod {
                interface: self.interface.name.clone(),
                method: self.method.clone(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("group prefix must not be empty")]
    EmptyGroupPrefix,
    #[error("object path must be absolute: {0:?}")]
    InvalidObjectPath(String),
    #[error("interface {interface} has no method {method}")]
    UnknownMethod { interface: String, method: String },
}
