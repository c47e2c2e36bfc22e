use crate::config::AdminConfig;
use crate::error::{AdminError, Result};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

/// Logical name of a service the admin facade knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceName {
    Ecostreet,
    Database,
    Configuration,
    Play,
    #[serde(rename = "self")]
    SelfService,
}

impl ServiceName {
    /// Every known service, in the order `/adgetconfig` lists them
    pub const ALL: [ServiceName; 5] = [
        ServiceName::Ecostreet,
        ServiceName::Configuration,
        ServiceName::Database,
        ServiceName::Play,
        ServiceName::SelfService,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceName::Ecostreet => "ecostreet",
            ServiceName::Database => "database",
            ServiceName::Configuration => "configuration",
            ServiceName::Play => "play",
            ServiceName::SelfService => "self",
        }
    }
}

impl std::fmt::Display for ServiceName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceName {
    type Err = AdminError;

    /// Accepts both the short name and the `<name>_core_service` form
    /// used by the configuration service.
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ecostreet" | "ecostreet_core_service" => Ok(ServiceName::Ecostreet),
            "database" | "database_core_service" => Ok(ServiceName::Database),
            "configuration" | "configuration_core_service" => Ok(ServiceName::Configuration),
            "play" | "play_core_service" => Ok(ServiceName::Play),
            "self" | "admin_core_service" => Ok(ServiceName::SelfService),
            other => Err(AdminError::UnknownService(other.to_string())),
        }
    }
}

/// Process-wide table of service name to current address.
///
/// Every `ServiceName` always has a binding. Addresses are swapped whole,
/// so readers see either the old or the new value, and writers to
/// different names land on different shards.
#[derive(Debug, Clone)]
pub struct ServiceRegistry {
    entries: Arc<DashMap<ServiceName, Arc<str>>>,
}

impl ServiceRegistry {
    /// Create a registry seeded with the given addresses
    pub fn new<F>(seed: F) -> Self
    where
        F: Fn(ServiceName) -> String,
    {
        let entries = DashMap::with_capacity(ServiceName::ALL.len());
        for name in ServiceName::ALL {
            entries.insert(name, Arc::from(seed(name)));
        }

        Self {
            entries: Arc::new(entries),
        }
    }

    /// Seed the registry from the loaded configuration
    pub fn from_config(config: &AdminConfig) -> Self {
        let registry = Self::new(|name| match name {
            ServiceName::Ecostreet => config.services.ecostreet.clone(),
            ServiceName::Database => config.services.database.clone(),
            ServiceName::Configuration => config.services.configuration.clone(),
            ServiceName::Play => config.services.play.clone(),
            ServiceName::SelfService => config.identity.ip.clone(),
        });

        info!(services = ServiceName::ALL.len(), "Service registry seeded");
        registry
    }

    /// Resolve a service by name, failing for names outside the known set
    pub fn get(&self, name: &str) -> Result<String> {
        let service = name.parse::<ServiceName>()?;
        Ok(self.address(service))
    }

    /// Current address of a known service
    pub fn address(&self, name: ServiceName) -> String {
        self.entries
            .get(&name)
            .map(|entry| entry.value().to_string())
            .unwrap_or_default()
    }

    /// Overwrite the binding for `name`.
    ///
    /// Unknown names are ignored and reported with `false`.
    pub fn update(&self, name: &str, address: &str) -> bool {
        match name.parse::<ServiceName>() {
            Ok(service) => {
                self.set(service, address);
                true
            }
            Err(_) => {
                debug!(name = %name, "Ignoring registry update for unknown service");
                false
            }
        }
    }

    /// Overwrite the binding for a known service
    pub fn set(&self, name: ServiceName, address: &str) {
        let previous = self.entries.insert(name, Arc::from(address));
        info!(
            service = %name,
            previous = previous.as_deref().unwrap_or(""),
            address = %address,
            "Registry entry updated"
        );
    }

    /// Current addresses in `ServiceName::ALL` order
    pub fn addresses(&self) -> Vec<String> {
        ServiceName::ALL
            .iter()
            .map(|name| self.address(*name))
            .collect()
    }

    /// Render the current addresses as `['a', 'b', ...]`
    pub fn listing(&self) -> String {
        let quoted: Vec<String> = self
            .addresses()
            .into_iter()
            .map(|address| format!("'{}'", address))
            .collect();
        format!("[{}]", quoted.join(", "))
    }
}
