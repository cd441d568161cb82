//! Event manager implementation

use crate::event::{Event, EventParams};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// A listener callback.
///
/// Listeners are compared by pointer identity when detaching, so keep a clone
/// of the `Arc` you attached if you intend to remove it later.
pub type Listener = Arc<dyn Fn(&mut Event) + Send + Sync>;

/// Wrap a closure as a [`Listener`].
pub fn listener<F>(f: F) -> Listener
where
    F: Fn(&mut Event) + Send + Sync + 'static,
{
    Arc::new(f)
}

#[derive(Clone)]
struct Registration {
    listener: Listener,
    priority: i32,
}

/// Event manager for named, in-process notifications
///
/// Cloning is cheap and clones share the same listener table, which is how an
/// application and the nested dispatchers it spawns observe one set of
/// listeners.
#[derive(Clone)]
pub struct EventManager {
    /// Registrations per event name, kept sorted by descending priority
    listeners: Arc<DashMap<String, Vec<Registration>>>,

    /// Configuration
    config: Arc<EventManagerConfig>,
}

/// Event manager configuration
#[derive(Debug, Clone)]
pub struct EventManagerConfig {
    /// Enable event logging
    pub enable_logging: bool,
}

impl Default for EventManagerConfig {
    fn default() -> Self {
        Self {
            enable_logging: true,
        }
    }
}

impl EventManager {
    /// Create new event manager
    pub fn new() -> Self {
        Self::with_config(EventManagerConfig::default())
    }

    /// Create event manager with custom config
    pub fn with_config(config: EventManagerConfig) -> Self {
        Self {
            listeners: Arc::new(DashMap::new()),
            config: Arc::new(config),
        }
    }

    /// Attach a listener to an event name
    ///
    /// Listeners with a higher priority run first. Listeners sharing a
    /// priority run in the order they were attached.
    ///
    /// # Examples
    ///
    /// ```
    /// use conduit_events::{listener, EventManager};
    ///
    /// let events = EventManager::new();
    /// events.attach("before.dispatch", listener(|event| {
    ///     event.params.insert("seen".into(), true.into());
    /// }), 10);
    ///
    /// let event = events.trigger("before.dispatch", None, Default::default());
    /// assert_eq!(event.param("seen"), Some(&true.into()));
    /// ```
    pub fn attach(&self, name: impl Into<String>, listener: Listener, priority: i32) {
        let name = name.into();
        let mut registrations = self.listeners.entry(name.clone()).or_default();

        let position = registrations
            .iter()
            .position(|r| r.priority < priority)
            .unwrap_or(registrations.len());
        registrations.insert(position, Registration { listener, priority });

        if self.config.enable_logging {
            debug!(event = %name, priority, "Attached listener");
        }
    }

    /// Detach every registration of `listener` under `name`
    ///
    /// Returns `true` if at least one registration was removed.
    pub fn detach(&self, name: &str, listener: &Listener) -> bool {
        let Some(mut registrations) = self.listeners.get_mut(name) else {
            return false;
        };

        let before = registrations.len();
        registrations.retain(|r| !Arc::ptr_eq(&r.listener, listener));
        let removed = before - registrations.len();
        let now_empty = registrations.is_empty();
        drop(registrations);

        if now_empty {
            self.listeners.remove_if(name, |_, regs| regs.is_empty());
        }

        if self.config.enable_logging && removed > 0 {
            debug!(event = %name, removed, "Detached listener");
        }

        removed > 0
    }

    /// Clear the listeners of one event, or of every event when `name` is `None`
    pub fn clear_listeners(&self, name: Option<&str>) {
        match name {
            Some(name) => {
                self.listeners.remove(name);
            }
            None => self.listeners.clear(),
        }

        if self.config.enable_logging {
            debug!(event = ?name, "Cleared listeners");
        }
    }

    /// Trigger an event
    ///
    /// `event` is either a bare name, which creates a fresh event, or an
    /// [`Event`] that is used as-is. A `target` replaces the event's target
    /// and `params` are merged into its parameters. The event is returned
    /// after the listeners have seen it.
    pub fn trigger(
        &self,
        event: impl Into<Event>,
        target: Option<&str>,
        params: EventParams,
    ) -> Event {
        let mut event = event.into();
        if let Some(target) = target {
            event.target = Some(target.to_string());
        }
        event.merge_params(params);

        // Snapshot so listeners may attach or detach while running
        let registrations = match self.listeners.get(&event.name) {
            Some(registrations) => registrations.clone(),
            None => return event,
        };

        if self.config.enable_logging {
            trace!(
                event = %event.name,
                target = ?event.target,
                listeners = registrations.len(),
                "Triggering event"
            );
        }

        for registration in &registrations {
            (registration.listener)(&mut event);

            if event.propagation_is_stopped() {
                if self.config.enable_logging {
                    debug!(event = %event.name, "Propagation stopped by listener");
                }
                break;
            }
        }

        event
    }

    /// Listeners attached to `name`, in execution order
    pub fn get_listeners(&self, name: &str) -> Vec<Listener> {
        self.listeners
            .get(name)
            .map(|regs| regs.iter().map(|r| r.listener.clone()).collect())
            .unwrap_or_default()
    }

    /// Whether any listener is attached to `name`
    pub fn has_listeners(&self, name: &str) -> bool {
        self.listeners.contains_key(name)
    }
}

impl Default for EventManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let events: Vec<String> = self.listeners.iter().map(|e| e.key().clone()).collect();
        f.debug_struct("EventManager")
            .field("events", &events)
            .field("config", &self.config)
            .finish()
    }
}
