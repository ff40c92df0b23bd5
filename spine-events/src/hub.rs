//! The event hub.
//!
//! Binding lists are copy-on-write: `trigger` iterates an `Rc` snapshot of
//! the list, and any `on`/`off` issued from inside a callback replaces the
//! list instead of mutating the one being iterated. No `RefCell` borrow is
//! held while a callback runs.

use crate::callback::{Callback, CallbackKey};
use crate::error::EventsResult;
use crate::listening::{EdgeMap, ListenTarget, Listenable, Listening};
use spine_types::ListenId;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::trace;

/// The wildcard event name. Its bindings fire after the named bindings of
/// every trigger and receive the triggered name.
pub const ALL: &str = "all";

struct Binding<A> {
    callback: Callback<A>,
    original: Option<CallbackKey>,
    context: Option<ListenId>,
    listening: Option<Rc<Listening>>,
}

impl<A> Clone for Binding<A> {
    fn clone(&self) -> Self {
        Self {
            callback: self.callback.clone(),
            original: self.original,
            context: self.context,
            listening: self.listening.clone(),
        }
    }
}

impl<A: 'static> Binding<A> {
    fn matches(&self, callback: Option<CallbackKey>, context: Option<ListenId>) -> bool {
        let callback_hit =
            callback.is_none_or(|k| k == self.callback.key() || Some(k) == self.original);
        let context_hit = context.is_none_or(|c| Some(c) == self.context);
        callback_hit && context_hit
    }
}

struct Hub<A> {
    id: ListenId,
    handlers: RefCell<HashMap<String, Rc<Vec<Binding<A>>>>>,
    /// Outbound edges, keyed by listenee.
    listening_to: Rc<RefCell<EdgeMap>>,
    /// Inbound edges, keyed by listener.
    listeners: RefCell<EdgeMap>,
}

impl<A: 'static> Hub<A> {
    fn push(&self, name: &str, binding: Binding<A>) {
        if let Some(listening) = &binding.listening {
            listening.attach();
        }
        let mut handlers = self.handlers.borrow_mut();
        Rc::make_mut(handlers.entry(name.to_owned()).or_default()).push(binding);
    }

    fn fire(&self, name: &str, args: &A) {
        let (named, wildcard) = {
            let handlers = self.handlers.borrow();
            (handlers.get(name).cloned(), handlers.get(ALL).cloned())
        };
        if let Some(bindings) = named {
            for binding in bindings.iter() {
                binding.callback.call(name, args);
            }
        }
        if let Some(bindings) = wildcard {
            for binding in bindings.iter() {
                binding.callback.call(name, args);
            }
        }
    }

    fn remove_bindings(
        &self,
        names: Option<&str>,
        callback: Option<CallbackKey>,
        context: Option<ListenId>,
    ) {
        if names.is_none() && callback.is_none() && context.is_none() {
            let dropped = std::mem::take(&mut *self.handlers.borrow_mut());
            let inbound: Vec<Rc<Listening>> = self.listeners.borrow().values().cloned().collect();
            for listening in inbound {
                listening.cleanup();
            }
            drop(dropped);
            return;
        }

        let targets: Vec<String> = match names {
            Some(names) => names.split_whitespace().map(str::to_owned).collect(),
            None => self.handlers.borrow().keys().cloned().collect(),
        };

        let mut released = Vec::new();
        {
            let mut handlers = self.handlers.borrow_mut();
            for name in targets {
                let Some(bindings) = handlers.get(&name) else {
                    continue;
                };
                let (gone, kept): (Vec<_>, Vec<_>) = bindings
                    .iter()
                    .cloned()
                    .partition(|b| b.matches(callback, context));
                if gone.is_empty() {
                    continue;
                }
                released.extend(
                    gone.into_iter()
                        .filter_map(|b| b.listening)
                        .map(|l| (name.clone(), l)),
                );
                if kept.is_empty() {
                    handlers.remove(&name);
                } else {
                    handlers.insert(name, Rc::new(kept));
                }
            }
        }

        for (name, listening) in released {
            listening.release(Some(&name), callback);
        }
    }

    fn stop_edges(
        &self,
        targets: Option<&[ListenId]>,
        names: Option<&str>,
        callback: Option<CallbackKey>,
    ) {
        let edges: Vec<Rc<Listening>> = {
            let map = self.listening_to.borrow();
            match targets {
                Some(ids) => ids.iter().filter_map(|id| map.get(id).cloned()).collect(),
                None => map.values().cloned().collect(),
            }
        };
        for listening in edges {
            let Some(target) = listening.target() else {
                listening.cleanup();
                continue;
            };
            target.unsubscribe(names, callback, self.id);
            if listening.is_interop() {
                listening.release(names, callback);
            }
        }
    }
}

impl<A: 'static> ListenTarget for Hub<A> {
    fn unsubscribe(&self, names: Option<&str>, callback: Option<CallbackKey>, listener: ListenId) {
        self.remove_bindings(names, callback, Some(listener));
    }

    fn forget_listener(&self, listener: ListenId) {
        self.listeners.borrow_mut().remove(&listener);
    }
}

/// A publish/subscribe hub.
///
/// Cloning an `Events` yields another handle to the same hub. Entities that
/// emit events hold one and expose it through [`Emits`](crate::Emits).
///
/// ```
/// use spine_events::{Callback, Events};
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// let hub: Events<u32> = Events::new();
/// let seen = Rc::new(RefCell::new(Vec::new()));
/// let sink = Rc::clone(&seen);
/// let cb = Callback::new(move |name: &str, n: &u32| sink.borrow_mut().push(format!("{name}={n}")));
///
/// hub.on("ping pong", &cb);
/// hub.trigger("ping", &1).trigger("pong", &2);
/// hub.off(Some("ping"), Some(&cb), None);
/// hub.trigger("ping", &3);
///
/// assert_eq!(*seen.borrow(), vec!["ping=1", "pong=2"]);
/// ```
pub struct Events<A: 'static> {
    hub: Rc<Hub<A>>,
}

impl<A: 'static> Events<A> {
    /// Creates an empty hub with a fresh identity.
    #[must_use]
    pub fn new() -> Self {
        Self {
            hub: Rc::new(Hub {
                id: ListenId::new(),
                handlers: RefCell::new(HashMap::new()),
                listening_to: Rc::new(RefCell::new(HashMap::new())),
                listeners: RefCell::new(HashMap::new()),
            }),
        }
    }

    /// The hub's identity, used for listening edges and as its binding context.
    #[must_use]
    pub fn id(&self) -> ListenId {
        self.hub.id
    }

    // ── Binding ──────────────────────────────────────────────────

    /// Binds `callback` to each of the space-separated `names`.
    pub fn on(&self, names: &str, callback: &Callback<A>) -> &Self {
        self.bind(names, callback, None, None, None);
        self
    }

    /// Like [`on`](Self::on), tagging the bindings with a context so they
    /// can be removed together with `off(None, None, Some(context))`.
    pub fn on_with_context(&self, names: &str, callback: &Callback<A>, context: ListenId) -> &Self {
        self.bind(names, callback, None, Some(context), None);
        self
    }

    /// Binds several callbacks at once, one per event name.
    pub fn on_map<'a, I>(&self, map: I) -> &Self
    where
        I: IntoIterator<Item = (&'a str, Callback<A>)>,
    {
        for (names, callback) in map {
            self.bind(names, &callback, None, None, None);
        }
        self
    }

    /// Binds a callback that unbinds itself after its first invocation.
    ///
    /// Each of the space-separated names gets its own one-shot binding.
    pub fn once(&self, names: &str, callback: &Callback<A>) -> &Self {
        for name in names.split_whitespace() {
            let hub = Rc::downgrade(&self.hub);
            let wrapper = one_shot(name, callback, move |name, key| {
                if let Some(hub) = hub.upgrade() {
                    hub.remove_bindings(Some(name), Some(key), None);
                }
            });
            self.bind(name, &wrapper, Some(callback.key()), None, None);
        }
        self
    }

    /// Removes bindings matching every given filter.
    ///
    /// With no filters at all, removes every binding and tears down every
    /// inbound listening edge. `callback` also matches one-shot bindings
    /// created from it.
    pub fn off(
        &self,
        names: Option<&str>,
        callback: Option<&Callback<A>>,
        context: Option<ListenId>,
    ) -> &Self {
        self.hub
            .remove_bindings(names, callback.map(Callback::key), context);
        self
    }

    /// Fires each of the space-separated `names`: named bindings first, then
    /// the wildcard bindings, all in registration order.
    pub fn trigger(&self, names: &str, args: &A) -> &Self {
        for name in names.split_whitespace() {
            self.hub.fire(name, args);
        }
        self
    }

    // ── Inversion of control ─────────────────────────────────────

    /// Binds `callback` on `other` and records the edge on this hub, so
    /// [`stop_listening`](Self::stop_listening) can undo it later.
    pub fn listen_to<B, L>(&self, other: &L, names: &str, callback: &Callback<B>) -> EventsResult<&Self>
    where
        B: 'static,
        L: Listenable<B> + ?Sized,
    {
        self.listen(other, names, callback, None)?;
        Ok(self)
    }

    /// Like [`listen_to`](Self::listen_to), but each name's binding removes
    /// itself after firing once.
    pub fn listen_to_once<B, L>(
        &self,
        other: &L,
        names: &str,
        callback: &Callback<B>,
    ) -> EventsResult<&Self>
    where
        B: 'static,
        L: Listenable<B> + ?Sized,
    {
        let target = other.listen_id();
        for name in names.split_whitespace() {
            let hub = Rc::downgrade(&self.hub);
            let wrapper = one_shot(name, callback, move |name, key| {
                if let Some(hub) = hub.upgrade() {
                    hub.stop_edges(Some(std::slice::from_ref(&target)), Some(name), Some(key));
                }
            });
            self.listen(other, name, &wrapper, Some(callback.key()))?;
        }
        Ok(self)
    }

    /// Tears down every outbound listening edge.
    pub fn stop_listening(&self) -> &Self {
        self.hub.stop_edges(None, None, None);
        self
    }

    /// Removes this hub's bindings on `other`, filtered by names and callback.
    pub fn stop_listening_to<B, L>(
        &self,
        other: &L,
        names: Option<&str>,
        callback: Option<&Callback<B>>,
    ) -> &Self
    where
        B: 'static,
        L: Listenable<B> + ?Sized,
    {
        let target = other.listen_id();
        self.hub.stop_edges(
            Some(std::slice::from_ref(&target)),
            names,
            callback.map(Callback::key),
        );
        self
    }

    // ── Introspection ────────────────────────────────────────────

    /// Number of bindings for `name`, or across all names.
    #[must_use]
    pub fn binding_count(&self, name: Option<&str>) -> usize {
        let handlers = self.hub.handlers.borrow();
        match name {
            Some(name) => handlers.get(name).map_or(0, |b| b.len()),
            None => handlers.values().map(|b| b.len()).sum(),
        }
    }

    /// Number of bindings tagged with `context` (a listener's bindings carry
    /// the listener's id).
    #[must_use]
    pub fn bindings_for_context(&self, context: ListenId) -> usize {
        self.hub
            .handlers
            .borrow()
            .values()
            .flat_map(|b| b.iter())
            .filter(|b| b.context == Some(context))
            .count()
    }

    /// Number of outbound listening edges.
    #[must_use]
    pub fn listening_count(&self) -> usize {
        self.hub.listening_to.borrow().len()
    }

    /// Number of inbound listening edges.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.hub.listeners.borrow().len()
    }

    /// The outbound edge to `target`, if any.
    #[must_use]
    pub fn listening(&self, target: ListenId) -> Option<Rc<Listening>> {
        self.hub.listening_to.borrow().get(&target).cloned()
    }

    // ── Internals ────────────────────────────────────────────────

    fn bind(
        &self,
        names: &str,
        callback: &Callback<A>,
        original: Option<CallbackKey>,
        context: Option<ListenId>,
        listening: Option<&Rc<Listening>>,
    ) {
        for name in names.split_whitespace() {
            self.hub.push(
                name,
                Binding {
                    callback: callback.clone(),
                    original,
                    context,
                    listening: listening.cloned(),
                },
            );
        }
    }

    fn listen<B, L>(
        &self,
        other: &L,
        names: &str,
        callback: &Callback<B>,
        original: Option<CallbackKey>,
    ) -> EventsResult<()>
    where
        B: 'static,
        L: Listenable<B> + ?Sized,
    {
        if names.split_whitespace().next().is_none() {
            return Ok(());
        }
        let target = other.listen_id();
        let existing = self.hub.listening_to.borrow().get(&target).cloned();
        let (listening, created) = match existing {
            Some(listening) => (listening, false),
            None => {
                let listening = Rc::new(Listening::new(
                    self.hub.id,
                    Rc::downgrade(&self.hub.listening_to),
                    target,
                    other.listen_target(),
                ));
                self.hub
                    .listening_to
                    .borrow_mut()
                    .insert(target, Rc::clone(&listening));
                trace!(listener = %self.hub.id, target = %target, "listening edge opened");
                (listening, true)
            }
        };

        if let Err(err) = other.subscribe(names, callback, original, &listening) {
            if created && listening.is_idle() {
                self.hub.listening_to.borrow_mut().remove(&target);
            }
            return Err(err);
        }

        if listening.is_interop() {
            listening.track(names, callback.key(), original);
        }
        Ok(())
    }

    /// Binds on behalf of a listener whose edge this hub will count.
    pub(crate) fn attach_listener(
        &self,
        names: &str,
        callback: &Callback<A>,
        original: Option<CallbackKey>,
        listening: &Rc<Listening>,
    ) {
        if names.split_whitespace().next().is_none() {
            return;
        }
        self.bind(
            names,
            callback,
            original,
            Some(listening.listener()),
            Some(listening),
        );
        self.hub
            .listeners
            .borrow_mut()
            .insert(listening.listener(), Rc::clone(listening));
    }

    pub(crate) fn target(&self) -> Weak<dyn ListenTarget> {
        let weak: Weak<Hub<A>> = Rc::downgrade(&self.hub);
        weak
    }
}

impl<A: 'static> Default for Events<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: 'static> Clone for Events<A> {
    fn clone(&self) -> Self {
        Self {
            hub: Rc::clone(&self.hub),
        }
    }
}

impl<A: 'static> fmt::Debug for Events<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Events")
            .field("id", &self.hub.id)
            .field("bindings", &self.binding_count(None))
            .field("listening_to", &self.listening_count())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Wraps `callback` so it runs at most once, calling `offer` with the bound
/// name and the wrapper's own key before delegating.
fn one_shot<A, F>(name: &str, callback: &Callback<A>, offer: F) -> Callback<A>
where
    A: 'static,
    F: Fn(&str, CallbackKey) + 'static,
{
    let own_key: Rc<Cell<Option<CallbackKey>>> = Rc::new(Cell::new(None));
    let fired = Cell::new(false);
    let inner = callback.clone();
    let bound = name.to_owned();
    let slot = Rc::clone(&own_key);
    let wrapper = Callback::new(move |event: &str, args: &A| {
        if fired.replace(true) {
            return;
        }
        if let Some(key) = slot.get() {
            offer(&bound, key);
        }
        inner.call(event, args);
    });
    own_key.set(Some(wrapper.key()));
    wrapper
}
