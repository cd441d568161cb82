//! Event values passed to listeners

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Ordered event parameters.
///
/// Insertion order is kept, so listeners see parameters in the order the
/// emitter added them.
pub type EventParams = Map<String, Value>;

/// A named notification delivered to every listener attached under `name`.
///
/// Listeners receive the event by mutable reference: they may inspect or add
/// parameters, and may call [`Event::stop_propagation`] to keep the remaining
/// listeners from running.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique event ID
    pub id: Uuid,

    /// Event name listeners are keyed by
    pub name: String,

    /// Identity of whatever raised the event
    pub target: Option<String>,

    /// Event parameters
    pub params: EventParams,

    /// Timestamp when the event was created
    pub timestamp: DateTime<Utc>,

    propagation_stopped: bool,
}

impl Event {
    /// Create a new event with no target and no parameters
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            target: None,
            params: EventParams::new(),
            timestamp: Utc::now(),
            propagation_stopped: false,
        }
    }

    /// Set the target
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Add a single parameter
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Merge parameters into the event. Incoming values win on key collision.
    pub fn merge_params(&mut self, params: EventParams) {
        for (key, value) in params {
            self.params.insert(key, value);
        }
    }

    /// Look up a parameter
    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    /// Stop (or resume) propagation to the remaining listeners
    pub fn stop_propagation(&mut self, stop: bool) {
        self.propagation_stopped = stop;
    }

    pub fn propagation_is_stopped(&self) -> bool {
        self.propagation_stopped
    }
}

impl From<&str> for Event {
    fn from(name: &str) -> Self {
        Event::new(name)
    }
}

impl From<String> for Event {
    fn from(name: String) -> Self {
        Event::new(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_event_propagates() {
        let event = Event::new("user.created");

        assert_eq!(event.name, "user.created");
        assert!(event.target.is_none());
        assert!(event.params.is_empty());
        assert!(!event.propagation_is_stopped());
    }

    #[test]
    fn test_merge_params_later_wins() {
        let mut event = Event::new("e").with_param("a", 1).with_param("b", 2);

        let mut extra = EventParams::new();
        extra.insert("b".to_string(), json!(20));
        extra.insert("c".to_string(), json!(30));
        event.merge_params(extra);

        assert_eq!(event.param("a"), Some(&json!(1)));
        assert_eq!(event.param("b"), Some(&json!(20)));
        assert_eq!(event.param("c"), Some(&json!(30)));
        let keys: Vec<_> = event.params.keys().cloned().collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_stop_propagation_toggle() {
        let mut event = Event::from("e");
        event.stop_propagation(true);
        assert!(event.propagation_is_stopped());
        event.stop_propagation(false);
        assert!(!event.propagation_is_stopped());
    }
}
