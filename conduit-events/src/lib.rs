//! Named event notifications for Conduit
//!
//! A small publish/subscribe mechanism keyed by event name. The dispatcher in
//! `conduit-core` uses it to announce its lifecycle (`before.dispatch`,
//! `after.dispatch`, `done.dispatch`), and applications may use it for their
//! own events.
//!
//! ## Features
//!
//! - **Prioritized listeners** - Higher priority runs first, ties keep attach order
//! - **Propagation control** - A listener may stop the remaining listeners
//! - **Shared tables** - Clones of an [`EventManager`] share one listener table
//!
//! ## Quick Start
//!
//! ```
//! use conduit_events::{listener, Event, EventManager, EventParams};
//!
//! let events = EventManager::new();
//!
//! events.attach("user.created", listener(|event: &mut Event| {
//!     event.stop_propagation(true);
//! }), 100);
//! events.attach("user.created", listener(|_| unreachable!()), 0);
//!
//! let event = events.trigger("user.created", Some("signup"), EventParams::new());
//! assert!(event.propagation_is_stopped());
//! ```

pub mod event;
pub mod manager;

pub use event::{Event, EventParams};
pub use manager::{listener, EventManager, EventManagerConfig, Listener};
