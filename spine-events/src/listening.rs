//! Listening edges: the bookkeeping behind `listen_to` / `stop_listening`.
//!
//! An edge is owned by the listener (in its outbound map, keyed by the
//! listenee's id). When the listenee is an [`Events`](crate::Events) hub the
//! edge is also registered in the listenee's inbound map and the listenee
//! counts the bindings attributed to it. A foreign listenee never sees the
//! edge; the edge then remembers its own bindings ("interop" mode).
//!
//! Either way an edge is cleaned up as soon as it carries no bindings.

use crate::callback::{Callback, CallbackKey};
use crate::error::EventsResult;
use spine_types::ListenId;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use tracing::trace;

pub(crate) type EdgeMap = HashMap<ListenId, Rc<Listening>>;

/// The listenee side of an edge, as seen by the listener.
///
/// Object-safe so an edge can refer to listenees of any event argument type.
pub trait ListenTarget {
    /// Removes the bindings `listener` placed on this target, filtered by
    /// event names and callback.
    fn unsubscribe(&self, names: Option<&str>, callback: Option<CallbackKey>, listener: ListenId);

    /// Drops this target's inbound record of `listener`.
    fn forget_listener(&self, listener: ListenId);
}

/// Something that can be listened to with callbacks taking `A`.
///
/// Every [`Emits`](crate::Emits) implementor is `Listenable`. Implement it
/// directly to make a non-hub source usable with `listen_to`; such sources
/// ignore the edge passed to `subscribe` and the edge tracks itself.
pub trait Listenable<A> {
    /// Stable identity used to key the listener's edge.
    fn listen_id(&self) -> ListenId;

    /// Weak handle the edge uses to unsubscribe later.
    fn listen_target(&self) -> Weak<dyn ListenTarget>;

    /// Binds `callback` to `names` on behalf of `listening`'s listener.
    ///
    /// `original` is the user's callback when `callback` is a one-shot
    /// wrapper around it.
    fn subscribe(
        &self,
        names: &str,
        callback: &Callback<A>,
        original: Option<CallbackKey>,
        listening: &Rc<Listening>,
    ) -> EventsResult<()>;
}

#[derive(Debug)]
struct Tracked {
    name: String,
    callback: CallbackKey,
    original: Option<CallbackKey>,
}

/// A one-directional subscription edge from a listener to a listenee.
pub struct Listening {
    listener: ListenId,
    target_id: ListenId,
    listener_edges: Weak<RefCell<EdgeMap>>,
    target: Weak<dyn ListenTarget>,
    interop: Cell<bool>,
    count: Cell<usize>,
    tracked: RefCell<Vec<Tracked>>,
}

impl Listening {
    pub(crate) fn new(
        listener: ListenId,
        listener_edges: Weak<RefCell<EdgeMap>>,
        target_id: ListenId,
        target: Weak<dyn ListenTarget>,
    ) -> Self {
        Self {
            listener,
            target_id,
            listener_edges,
            target,
            interop: Cell::new(true),
            count: Cell::new(0),
            tracked: RefCell::new(Vec::new()),
        }
    }

    /// The listening side.
    #[must_use]
    pub fn listener(&self) -> ListenId {
        self.listener
    }

    /// The listened-to side.
    #[must_use]
    pub fn target_id(&self) -> ListenId {
        self.target_id
    }

    /// Number of live bindings carried by this edge.
    #[must_use]
    pub fn count(&self) -> usize {
        if self.interop.get() {
            self.tracked.borrow().len()
        } else {
            self.count.get()
        }
    }

    /// Whether the edge tracks its own bindings.
    #[must_use]
    pub fn is_interop(&self) -> bool {
        self.interop.get()
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.count() == 0
    }

    pub(crate) fn target(&self) -> Option<Rc<dyn ListenTarget>> {
        self.target.upgrade()
    }

    /// Called by a hub listenee for every binding it attributes to this edge.
    pub(crate) fn attach(&self) {
        self.interop.set(false);
        self.count.set(self.count.get() + 1);
    }

    /// Interop mode: remember bindings the foreign listenee will not count.
    pub(crate) fn track(&self, names: &str, callback: CallbackKey, original: Option<CallbackKey>) {
        let mut tracked = self.tracked.borrow_mut();
        for name in names.split_whitespace() {
            tracked.push(Tracked {
                name: name.to_owned(),
                callback,
                original,
            });
        }
    }

    /// Accounts for removed bindings and cleans the edge up once it is empty.
    pub(crate) fn release(&self, name: Option<&str>, callback: Option<CallbackKey>) {
        let idle = if self.interop.get() {
            let mut tracked = self.tracked.borrow_mut();
            tracked.retain(|t| {
                let name_hit = name.is_none_or(|n| n.split_whitespace().any(|n| n == t.name));
                let callback_hit =
                    callback.is_none_or(|k| k == t.callback || Some(k) == t.original);
                !(name_hit && callback_hit)
            });
            tracked.is_empty()
        } else {
            let remaining = self.count.get().saturating_sub(1);
            self.count.set(remaining);
            remaining == 0
        };
        if idle {
            self.cleanup();
        }
    }

    /// Removes the edge from the listener and, for hub listenees, from the
    /// listenee's inbound map.
    pub(crate) fn cleanup(&self) {
        if let Some(edges) = self.listener_edges.upgrade() {
            edges.borrow_mut().remove(&self.target_id);
        }
        if !self.interop.get() {
            if let Some(target) = self.target.upgrade() {
                target.forget_listener(self.listener);
            }
        }
        trace!(listener = %self.listener, target = %self.target_id, "listening edge closed");
    }
}

impl std::fmt::Debug for Listening {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listening")
            .field("listener", &self.listener)
            .field("target", &self.target_id)
            .field("interop", &self.interop.get())
            .field("count", &self.count())
            .finish()
    }
}
