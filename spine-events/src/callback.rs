use std::fmt;
use std::rc::Rc;

/// Identity of a callback, used to match bindings when unbinding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackKey(usize);

/// A shared event callback.
///
/// Receives the event name and the event arguments. Two clones of the same
/// `Callback` share one identity, so the handle passed to `on` can later be
/// passed to `off` to remove exactly that binding.
pub struct Callback<A>(Rc<dyn Fn(&str, &A)>);

impl<A: 'static> Callback<A> {
    /// Wraps a closure.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&str, &A) + 'static,
    {
        Self(Rc::new(f))
    }

    /// Returns the identity of this callback.
    #[must_use]
    pub fn key(&self) -> CallbackKey {
        CallbackKey(Rc::as_ptr(&self.0) as *const () as usize)
    }

    /// Invokes the callback.
    pub fn call(&self, name: &str, args: &A) {
        (self.0)(name, args);
    }
}

impl<A> Clone for Callback<A> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<A: 'static> PartialEq for Callback<A> {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl<A: 'static> fmt::Debug for Callback<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Callback").field(&self.key()).finish()
    }
}
