//! Weather warning notifier.
//!
//! Watches one sensor whose state is the number of active weather warnings
//! and whose attributes carry `warning_<n>_headline` / `warning_<n>_description`.
//! Every observed state is mirrored into five notification slots, each of
//! which is created or dismissed as a persistent notification and on every
//! available mobile notify service.

mod channels;
mod services;
mod slots;

pub use services::{filter_available, resolve_mobile_services, service_name};
pub use slots::{NotificationSlot, WARNING_SLOTS, derive_slots};

use crate::config::{NotifierConfig, NotifierSettings};
use crate::error::Result;
use crate::hass::{EntityState, EntityStore, ServiceCaller, ServiceRegistry, StateChange};
use log::{debug, error, info, warn};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Dispatches notification service calls for observed sensor states.
pub struct WarningNotifier<C> {
    settings: NotifierSettings,
    mobile_services: Vec<String>,
    caller: C,
}

/// A started notifier together with its state change stream.
pub struct ActiveNotifier<C> {
    notifier: WarningNotifier<C>,
    changes: mpsc::UnboundedReceiver<StateChange>,
}

impl<C: ServiceCaller> WarningNotifier<C> {
    pub fn new(settings: NotifierSettings, mobile_services: Vec<String>, caller: C) -> Self {
        Self {
            settings,
            mobile_services,
            caller,
        }
    }

    /// Validate the configuration, resolve mobile services, announce the
    /// current state and subscribe to changes.
    ///
    /// Returns `Ok(None)` when the notifier must stay inert: the warning
    /// entity is not configured or does not exist. Errors are reserved for
    /// failures talking to Home Assistant.
    pub async fn start<S, R>(
        config: &NotifierConfig,
        store: &S,
        registry: &R,
        caller: C,
    ) -> Result<Option<ActiveNotifier<C>>>
    where
        S: EntityStore + ?Sized,
        R: ServiceRegistry + ?Sized,
    {
        debug!("[Notifier] Startup started");

        let Ok(settings) = NotifierSettings::resolve(config) else {
            return Ok(None);
        };

        let entity_id = settings.weather_warning_entity.clone();
        if store.get_state(&entity_id).await?.is_none() {
            error!("Entity '{}' not found.", entity_id);
            return Ok(None);
        }

        // Subscribe before reading the initial state so nothing in between is
        // lost; queued changes are processed once `run` starts.
        let changes = store.subscribe_state_changes(&entity_id).await?;

        let mobile_services =
            resolve_mobile_services(registry, &settings.mobile_notify_services).await?;

        let notifier = Self::new(settings, mobile_services, caller);

        let current = store.get_state(&entity_id).await?;
        if let Err(e) = notifier.dispatch(current.as_ref()).await {
            error!("[Notifier] Failed to announce current warnings: {}", e);
        }

        info!(
            "[Notifier] Watching {} ({} mobile service(s), persistent notification {})",
            entity_id,
            notifier.mobile_services.len(),
            if notifier.settings.persistent_notification {
                "on"
            } else {
                "off"
            }
        );
        debug!("[Notifier] Startup finished");

        Ok(Some(ActiveNotifier { notifier, changes }))
    }

    /// Mobile notify services that passed discovery.
    pub fn mobile_services(&self) -> &[String] {
        &self.mobile_services
    }

    /// Handle one state change event.
    pub async fn on_change(&self, change: &StateChange) -> Result<()> {
        self.dispatch(change.new_state.as_ref()).await
    }

    /// Run one dispatch pass for `state`.
    ///
    /// Does nothing when the state or its attributes are missing. Every slot
    /// is sent on every channel even when some calls fail; the first failure
    /// is returned once the pass is complete.
    pub async fn dispatch(&self, state: Option<&EntityState>) -> Result<()> {
        let Some(state) = state else {
            debug!("[Notifier] No state available, skipping");
            return Ok(());
        };
        let Some(slots) = derive_slots(state, &self.settings.title_prefix, &self.settings.notify_id)
        else {
            debug!("[Notifier] {} has no attributes, skipping", state.entity_id);
            return Ok(());
        };

        let mut first_error = None;
        for slot in &slots {
            let mut calls = Vec::with_capacity(self.mobile_services.len() + 1);
            if self.settings.persistent_notification {
                calls.push(channels::persistent_notification(slot));
            }
            for service in &self.mobile_services {
                calls.push(channels::mobile_notification(service, slot));
            }

            for call in calls {
                if let Err(e) = self.caller.call_service(call).await {
                    error!("[Notifier] {} not updated: {}", slot.id, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        let active = slots.iter().filter(|slot| slot.is_active()).count();
        match first_error {
            Some(e) => Err(e),
            None => {
                info!("[Notifier] {} active weather warning(s) mirrored", active);
                Ok(())
            }
        }
    }
}

impl<C: ServiceCaller> ActiveNotifier<C> {
    pub fn notifier(&self) -> &WarningNotifier<C> {
        &self.notifier
    }

    /// Process state changes one at a time until `shutdown` fires or the
    /// change stream ends.
    pub async fn run(mut self, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("[Notifier] Shutting down");
                    break;
                }
                change = self.changes.recv() => match change {
                    Some(change) => {
                        if let Err(e) = self.notifier.on_change(&change).await {
                            error!("[Notifier] Failed to update notifications: {}", e);
                        }
                    }
                    None => {
                        warn!("[Notifier] State change stream closed");
                        break;
                    }
                },
            }
        }
    }
}
