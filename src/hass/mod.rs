//! Home Assistant access.
//!
//! The notifier only talks to Home Assistant through the three traits in
//! this module. [`HassClient`] implements all of them over the WebSocket API;
//! tests substitute in-memory fakes.

mod client;
mod protocol;
mod types;

use crate::error::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

pub use client::HassClient;
pub use types::{EntityState, ServiceCall, ServiceCatalog, StateChange};

/// Read access to entity states and their change stream.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Current state of `entity_id`, or `None` if the entity does not exist.
    async fn get_state(&self, entity_id: &str) -> Result<Option<EntityState>>;

    /// Stream of every state change of `entity_id`, including attribute-only
    /// changes. The stream ends when the connection is lost.
    async fn subscribe_state_changes(
        &self,
        entity_id: &str,
    ) -> Result<mpsc::UnboundedReceiver<StateChange>>;
}

/// Outbound service calls.
#[async_trait]
pub trait ServiceCaller: Send + Sync {
    async fn call_service(&self, call: ServiceCall) -> Result<()>;
}

/// Service discovery.
#[async_trait]
pub trait ServiceRegistry: Send + Sync {
    async fn get_services(&self) -> Result<ServiceCatalog>;
}
