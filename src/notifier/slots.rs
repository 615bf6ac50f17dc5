//! Warning slots derived from the sensor state.

use crate::hass::EntityState;
use log::{debug, warn};
use serde_json::{Map, Value};

/// Number of warnings mirrored into notifications. Warnings beyond this
/// count are never shown.
pub const WARNING_SLOTS: usize = 5;

/// One notification slot. An empty message means the slot is cleared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationSlot {
    pub id: String,
    pub title: String,
    pub message: String,
}

impl NotificationSlot {
    fn cleared(id: String) -> Self {
        Self {
            id,
            title: String::new(),
            message: String::new(),
        }
    }

    /// Whether this slot carries a warning (create) or not (dismiss).
    pub fn is_active(&self) -> bool {
        !self.message.is_empty()
    }
}

/// Derive all [`WARNING_SLOTS`] slots from `state`.
///
/// Returns `None` when the state carries no attribute map, in which case
/// nothing should be dispatched. Slot `i` (1-based) is active when
/// `i <= numeric state`.
pub fn derive_slots(
    state: &EntityState,
    title_prefix: &str,
    notify_id: &str,
) -> Option<Vec<NotificationSlot>> {
    let attributes = state.attributes.as_ref()?;

    for (key, value) in attributes {
        debug!("[Notifier] Attribute: {} -> {}", key, value);
    }

    let count = state.numeric_value();
    debug!("[Notifier] Count of weather warnings: {}", count);

    let slots = (1..=WARNING_SLOTS)
        .map(|i| {
            let id = format!("{}_{}", notify_id, i);
            if (i as f64) <= count {
                let headline = attribute_text(attributes, &format!("warning_{}_headline", i));
                let description =
                    attribute_text(attributes, &format!("warning_{}_description", i));
                NotificationSlot {
                    id,
                    title: format!("{}{}", title_prefix, headline),
                    message: description.to_string(),
                }
            } else {
                NotificationSlot::cleared(id)
            }
        })
        .collect();

    Some(slots)
}

/// String value of an attribute; missing or non-string values read as empty.
fn attribute_text<'a>(attributes: &'a Map<String, Value>, key: &str) -> &'a str {
    match attributes.get(key) {
        Some(Value::String(text)) => text.as_str(),
        Some(Value::Null) | None => {
            warn!("[Notifier] Attribute '{}' is missing", key);
            ""
        }
        Some(other) => {
            warn!("[Notifier] Attribute '{}' is not a string: {}", key, other);
            ""
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn warnings_state(count: &str, warnings: usize) -> EntityState {
        let mut attributes = Map::new();
        for i in 1..=warnings {
            attributes.insert(
                format!("warning_{}_headline", i),
                json!(format!("Headline {}", i)),
            );
            attributes.insert(
                format!("warning_{}_description", i),
                json!(format!("Description {}", i)),
            );
        }
        EntityState {
            entity_id: "sensor.warnings".to_string(),
            state: count.to_string(),
            attributes: Some(attributes),
            last_changed: None,
            last_updated: None,
        }
    }

    fn active_ids(slots: &[NotificationSlot]) -> Vec<&str> {
        slots
            .iter()
            .filter(|s| s.is_active())
            .map(|s| s.id.as_str())
            .collect()
    }

    #[test]
    fn test_always_five_slots() {
        for (count, warnings) in [("0", 0), ("2", 2), ("5", 5), ("9", 9), ("unavailable", 0)] {
            let slots = derive_slots(&warnings_state(count, warnings), "", "wx").unwrap();
            assert_eq!(slots.len(), WARNING_SLOTS);
            let ids: Vec<&str> = slots.iter().map(|s| s.id.as_str()).collect();
            assert_eq!(ids, vec!["wx_1", "wx_2", "wx_3", "wx_4", "wx_5"]);
        }
    }

    #[test]
    fn test_zero_or_negative_count_clears_all_slots() {
        for count in ["0", "-3", "unknown"] {
            let slots = derive_slots(&warnings_state(count, 3), "", "wx").unwrap();
            assert!(slots.iter().all(|s| !s.is_active()));
            assert!(slots.iter().all(|s| s.title.is_empty() && s.message.is_empty()));
        }
    }

    #[test]
    fn test_partial_count() {
        let slots = derive_slots(&warnings_state("3", 3), "", "wx").unwrap();
        assert_eq!(active_ids(&slots), vec!["wx_1", "wx_2", "wx_3"]);
        assert_eq!(slots[2].title, "Headline 3");
        assert_eq!(slots[2].message, "Description 3");
        assert_eq!(slots[3], NotificationSlot::cleared("wx_4".to_string()));
    }

    #[test]
    fn test_count_above_five_is_truncated() {
        let slots = derive_slots(&warnings_state("7", 7), "", "wx").unwrap();
        assert_eq!(
            active_ids(&slots),
            vec!["wx_1", "wx_2", "wx_3", "wx_4", "wx_5"]
        );
        assert!(slots.iter().all(|s| s.message != "Description 6"));
    }

    #[test]
    fn test_title_prefix() {
        let slots = derive_slots(&warnings_state("1", 1), "DWD: ", "wx").unwrap();
        assert_eq!(slots[0].title, "DWD: Headline 1");
        assert_eq!(slots[0].message, "Description 1");
        assert_eq!(slots[1].title, "");
    }

    #[test]
    fn test_missing_attributes_yields_nothing() {
        let mut state = warnings_state("2", 2);
        state.attributes = None;
        assert!(derive_slots(&state, "", "wx").is_none());
    }

    #[test]
    fn test_non_string_attributes_read_as_empty() {
        let mut state = warnings_state("2", 2);
        let attributes = state.attributes.as_mut().unwrap();
        attributes.insert("warning_1_headline".to_string(), json!(42));
        attributes.insert("warning_2_description".to_string(), json!({ "text": "x" }));

        let slots = derive_slots(&state, "P: ", "wx").unwrap();
        assert_eq!(slots[0].title, "P: ");
        assert_eq!(slots[0].message, "Description 1");
        assert_eq!(slots[1].title, "P: Headline 2");
        assert!(!slots[1].is_active());
    }

    #[test]
    fn test_count_larger_than_present_attributes() {
        let slots = derive_slots(&warnings_state("2", 1), "", "wx").unwrap();
        assert_eq!(active_ids(&slots), vec!["wx_1"]);
    }
}
