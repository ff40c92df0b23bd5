//! Transport layer abstraction.
//!
//! Records and sets never talk to the network themselves. They shape a
//! [`Request`] and hand it to a [`Transport`] together with a
//! [`Completion`]; the transport finishes the request later by calling one
//! of the completion's two callbacks.

use crate::error::SyncError;
use crate::request::Request;
use serde_json::Value;
use std::fmt;

type OnSuccess = Box<dyn FnOnce(Value)>;
type OnError = Box<dyn FnOnce(SyncError)>;

/// The pair of callbacks that finishes a request. Exactly one runs.
pub struct Completion {
    success: OnSuccess,
    error: OnError,
}

impl Completion {
    pub fn new<S, E>(success: S, error: E) -> Self
    where
        S: FnOnce(Value) + 'static,
        E: FnOnce(SyncError) + 'static,
    {
        Self {
            success: Box::new(success),
            error: Box::new(error),
        }
    }

    /// Delivers the server's response body.
    pub fn succeed(self, response: Value) {
        (self.success)(response);
    }

    /// Delivers a failure.
    pub fn fail(self, error: SyncError) {
        (self.error)(error);
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion").finish_non_exhaustive()
    }
}

/// Identifies an in-flight request within its transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestHandle(pub u64);

/// Something that can carry requests to a server.
///
/// `send` must not complete the request before returning; callers emit
/// their `"request"` event after handing the request off.
pub trait Transport {
    fn send(&self, request: Request, completion: Completion) -> RequestHandle;
}

/// A mock transport for testing.
pub mod mock {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;

    /// Records every request and holds it until the test completes it.
    #[derive(Debug, Default)]
    pub struct MockTransport {
        sent: RefCell<Vec<Request>>,
        pending: RefCell<VecDeque<(RequestHandle, Completion)>>,
        next: Cell<u64>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Every request sent so far, oldest first.
        pub fn requests(&self) -> Vec<Request> {
            self.sent.borrow().clone()
        }

        /// The most recent request.
        pub fn last_request(&self) -> Option<Request> {
            self.sent.borrow().last().cloned()
        }

        /// Number of requests still waiting for completion.
        pub fn pending(&self) -> usize {
            self.pending.borrow().len()
        }

        /// Completes the oldest pending request successfully.
        /// Returns `false` when nothing is pending.
        pub fn respond(&self, response: Value) -> bool {
            match self.take() {
                Some(completion) => {
                    completion.succeed(response);
                    true
                }
                None => false,
            }
        }

        /// Fails the oldest pending request.
        /// Returns `false` when nothing is pending.
        pub fn fail(&self, error: SyncError) -> bool {
            match self.take() {
                Some(completion) => {
                    completion.fail(error);
                    true
                }
                None => false,
            }
        }

        fn take(&self) -> Option<Completion> {
            self.pending.borrow_mut().pop_front().map(|(_, c)| c)
        }
    }

    impl Transport for MockTransport {
        fn send(&self, request: Request, completion: Completion) -> RequestHandle {
            let handle = RequestHandle(self.next.get());
            self.next.set(handle.0 + 1);
            self.sent.borrow_mut().push(request);
            self.pending.borrow_mut().push_back((handle, completion));
            handle
        }
    }
}
