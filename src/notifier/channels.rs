//! Service calls for the two notification channels.

use super::slots::NotificationSlot;
use crate::hass::ServiceCall;
use serde_json::json;

pub const PERSISTENT_NOTIFICATION_DOMAIN: &str = "persistent_notification";
pub const NOTIFY_DOMAIN: &str = "notify";

/// Message that tells the companion app to remove the notification with the
/// given tag.
const CLEAR_NOTIFICATION: &str = "clear_notification";

/// Opened when the notification itself is tapped (`url` on iOS,
/// `clickAction` on Android).
const DASHBOARD_PATH: &str = "/config/dashboard";

/// Create or dismiss the persistent notification for `slot`.
pub fn persistent_notification(slot: &NotificationSlot) -> ServiceCall {
    if slot.is_active() {
        ServiceCall::new(
            PERSISTENT_NOTIFICATION_DOMAIN,
            "create",
            json!({
                "title": slot.title,
                "message": slot.message,
                "notification_id": slot.id,
            }),
        )
    } else {
        ServiceCall::new(
            PERSISTENT_NOTIFICATION_DOMAIN,
            "dismiss",
            json!({ "notification_id": slot.id }),
        )
    }
}

/// Push or clear the mobile notification for `slot` via `notify.<service>`.
pub fn mobile_notification(service: &str, slot: &NotificationSlot) -> ServiceCall {
    let data = if slot.is_active() {
        json!({
            "title": slot.title,
            "message": slot.message,
            "data": {
                "tag": slot.id,
                "url": DASHBOARD_PATH,
                "clickAction": DASHBOARD_PATH,
                "actions": [
                    { "action": "URI", "title": "Open Addons", "uri": "/hassio/dashboard" },
                    { "action": "URI", "title": "Open HACS", "uri": "/hacs" },
                ],
            },
        })
    } else {
        json!({
            "message": CLEAR_NOTIFICATION,
            "data": { "tag": slot.id },
        })
    };

    ServiceCall::new(NOTIFY_DOMAIN, service, data)
}
