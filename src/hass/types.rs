//! Data shapes exchanged with Home Assistant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Snapshot of an entity as reported by Home Assistant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    pub entity_id: String,
    /// Raw state string, e.g. `"2"`, `"unavailable"`
    pub state: String,
    #[serde(default)]
    pub attributes: Option<Map<String, Value>>,
    #[serde(default)]
    pub last_changed: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

impl EntityState {
    /// State interpreted as a number. Anything that is not a finite number
    /// (`unknown`, `unavailable`, `NaN`) counts as zero.
    pub fn numeric_value(&self) -> f64 {
        self.state
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .unwrap_or(0.0)
    }
}

/// Payload of a `state_changed` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateChange {
    pub entity_id: String,
    #[serde(default)]
    pub old_state: Option<EntityState>,
    #[serde(default)]
    pub new_state: Option<EntityState>,
}

/// An outbound service call: `<domain>.<service>` with its data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceCall {
    pub domain: String,
    pub service: String,
    pub service_data: Value,
}

impl ServiceCall {
    pub fn new(domain: impl Into<String>, service: impl Into<String>, service_data: Value) -> Self {
        Self {
            domain: domain.into(),
            service: service.into(),
            service_data,
        }
    }
}

/// Services registered in Home Assistant, keyed by domain then service name.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct ServiceCatalog(HashMap<String, HashMap<String, Value>>);

impl ServiceCatalog {
    pub fn has_service(&self, domain: &str, service: &str) -> bool {
        self.0
            .get(domain)
            .is_some_and(|services| services.contains_key(service))
    }
}

impl FromIterator<(String, String)> for ServiceCatalog {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut catalog: HashMap<String, HashMap<String, Value>> = HashMap::new();
        for (domain, service) in iter {
            catalog
                .entry(domain)
                .or_default()
                .insert(service, Value::Object(Map::new()));
        }
        Self(catalog)
    }
}
