//! Publish/subscribe event hub for spine.
//!
//! - [`Events<A>`]: a hub of named bindings whose callbacks receive `&A`
//! - [`Callback<A>`]: a shared callback handle with a stable identity
//! - [`Emits<A>`]: the event capability an entity gets by owning a hub
//! - [`Listening`]: a tracked listener → listenee edge created by
//!   `listen_to`, torn down by `stop_listening` or when its last binding goes
//!
//! # Invariants
//!
//! 1. Bindings fire in registration order; wildcard ([`ALL`]) bindings fire
//!    after the named bindings of the same trigger.
//! 2. A binding added during a trigger does not fire for that trigger.
//! 3. A listening edge with no bindings does not survive: it is removed from
//!    both the listener and the listenee.
//! 4. Everything is single-threaded and re-entrant. Callbacks may bind,
//!    unbind and trigger on any hub, including the one currently firing.

mod callback;
mod emits;
mod error;
mod hub;
mod listening;

pub use callback::{Callback, CallbackKey};
pub use emits::Emits;
pub use error::{EventsError, EventsResult};
pub use hub::{ALL, Events};
pub use listening::{ListenTarget, Listenable, Listening};
