use crate::callback::{Callback, CallbackKey};
use crate::error::EventsResult;
use crate::hub::Events;
use crate::listening::{ListenTarget, Listenable, Listening};
use spine_types::ListenId;
use std::rc::{Rc, Weak};

/// The event capability of an entity that owns an [`Events`] hub.
///
/// Implementors only provide [`events`](Self::events); the rest of the
/// publish/subscribe surface comes for free and returns `&Self` for chaining.
pub trait Emits<A: 'static> {
    /// The hub this entity emits through.
    fn events(&self) -> &Events<A>;

    /// See [`Events::on`].
    fn on(&self, names: &str, callback: &Callback<A>) -> &Self {
        self.events().on(names, callback);
        self
    }

    /// See [`Events::once`].
    fn once(&self, names: &str, callback: &Callback<A>) -> &Self {
        self.events().once(names, callback);
        self
    }

    /// See [`Events::off`].
    fn off(
        &self,
        names: Option<&str>,
        callback: Option<&Callback<A>>,
        context: Option<ListenId>,
    ) -> &Self {
        self.events().off(names, callback, context);
        self
    }

    /// See [`Events::trigger`].
    fn trigger(&self, names: &str, args: &A) -> &Self {
        self.events().trigger(names, args);
        self
    }

    /// See [`Events::listen_to`].
    fn listen_to<B, L>(&self, other: &L, names: &str, callback: &Callback<B>) -> EventsResult<&Self>
    where
        B: 'static,
        L: Listenable<B> + ?Sized,
    {
        self.events().listen_to(other, names, callback)?;
        Ok(self)
    }

    /// See [`Events::listen_to_once`].
    fn listen_to_once<B, L>(
        &self,
        other: &L,
        names: &str,
        callback: &Callback<B>,
    ) -> EventsResult<&Self>
    where
        B: 'static,
        L: Listenable<B> + ?Sized,
    {
        self.events().listen_to_once(other, names, callback)?;
        Ok(self)
    }

    /// See [`Events::stop_listening`].
    fn stop_listening(&self) -> &Self {
        self.events().stop_listening();
        self
    }

    /// See [`Events::stop_listening_to`].
    fn stop_listening_to<B, L>(
        &self,
        other: &L,
        names: Option<&str>,
        callback: Option<&Callback<B>>,
    ) -> &Self
    where
        B: 'static,
        L: Listenable<B> + ?Sized,
    {
        self.events().stop_listening_to(other, names, callback);
        self
    }
}

impl<A: 'static> Emits<A> for Events<A> {
    fn events(&self) -> &Events<A> {
        self
    }
}

impl<A, T> Listenable<A> for T
where
    A: 'static,
    T: Emits<A> + ?Sized,
{
    fn listen_id(&self) -> ListenId {
        self.events().id()
    }

    fn listen_target(&self) -> Weak<dyn ListenTarget> {
        self.events().target()
    }

    fn subscribe(
        &self,
        names: &str,
        callback: &Callback<A>,
        original: Option<CallbackKey>,
        listening: &Rc<Listening>,
    ) -> EventsResult<()> {
        self.events()
            .attach_listener(names, callback, original, listening);
        Ok(())
    }
}
