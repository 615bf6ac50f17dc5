//! Weather Warning Notifier library.
//!
//! Mirrors a Home Assistant weather warning sensor into persistent
//! notifications and mobile push notifications.

pub mod config;
pub mod error;
pub mod hass;
pub mod instance_lock;
pub mod notifier;
