use pretty_assertions::assert_eq;
use spine_events::{
    Callback, CallbackKey, Emits, Events, EventsError, EventsResult, ListenTarget, Listenable,
    Listening,
};
use spine_types::ListenId;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

type Log = Rc<RefCell<Vec<String>>>;

fn log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

fn recorder(log: &Log, tag: &'static str) -> Callback<i32> {
    let log = Rc::clone(log);
    Callback::new(move |name: &str, n: &i32| log.borrow_mut().push(format!("{tag}:{name}:{n}")))
}

// ── listen_to ────────────────────────────────────────────────────

#[test]
fn listen_to_receives_events_and_records_edge() {
    let view: Events<()> = Events::new();
    let model: Events<i32> = Events::new();
    let seen = log();
    view.listen_to(&model, "change", &recorder(&seen, "v")).unwrap();

    model.trigger("change", &5);
    assert_eq!(*seen.borrow(), vec!["v:change:5"]);
    assert_eq!(view.listening_count(), 1);
    assert_eq!(model.listener_count(), 1);
    assert_eq!(model.bindings_for_context(view.id()), 1);

    let edge = view.listening(model.id()).unwrap();
    assert_eq!(edge.listener(), view.id());
    assert_eq!(edge.target_id(), model.id());
    assert!(!edge.is_interop());
    assert_eq!(edge.count(), 1);
}

#[test]
fn repeated_listen_to_reuses_edge() {
    let view: Events<()> = Events::new();
    let model: Events<i32> = Events::new();
    let seen = log();
    view.listen_to(&model, "a b", &recorder(&seen, "v")).unwrap();
    view.listen_to(&model, "c", &recorder(&seen, "w")).unwrap();
    assert_eq!(view.listening_count(), 1);
    assert_eq!(view.listening(model.id()).unwrap().count(), 3);
}

#[test]
fn listen_to_without_names_opens_no_edge() {
    let view: Events<()> = Events::new();
    let model: Events<i32> = Events::new();
    let seen = log();
    view.listen_to(&model, "", &recorder(&seen, "v")).unwrap();
    view.listen_to(&model, "   ", &recorder(&seen, "v")).unwrap();

    assert_eq!(view.listening_count(), 0);
    assert_eq!(model.listener_count(), 0);
    assert_eq!(model.binding_count(None), 0);

    view.stop_listening();
    assert_eq!(model.listener_count(), 0);
}

#[test]
fn stop_listening_tears_down_every_edge() {
    let view: Events<()> = Events::new();
    let a: Events<i32> = Events::new();
    let b: Events<i32> = Events::new();
    let seen = log();
    view.listen_to(&a, "x y", &recorder(&seen, "a")).unwrap();
    view.listen_to(&b, "x", &recorder(&seen, "b")).unwrap();
    a.on("x", &recorder(&seen, "own"));

    view.stop_listening();

    assert_eq!(view.listening_count(), 0);
    assert_eq!(a.listener_count(), 0);
    assert_eq!(b.listener_count(), 0);
    assert_eq!(a.bindings_for_context(view.id()), 0);
    assert_eq!(b.bindings_for_context(view.id()), 0);

    a.trigger("x", &1);
    b.trigger("x", &1);
    assert_eq!(*seen.borrow(), vec!["own:x:1"]);
}

#[test]
fn stop_listening_to_one_name_keeps_edge_alive() {
    let view: Events<()> = Events::new();
    let model: Events<i32> = Events::new();
    let seen = log();
    view.listen_to(&model, "a b", &recorder(&seen, "v")).unwrap();

    view.stop_listening_to(&model, Some("a"), None::<&Callback<i32>>);
    assert_eq!(view.listening(model.id()).unwrap().count(), 1);

    view.stop_listening_to(&model, Some("b"), None::<&Callback<i32>>);
    assert!(view.listening(model.id()).is_none());
    assert_eq!(model.listener_count(), 0);
}

#[test]
fn stop_listening_to_by_callback() {
    let view: Events<()> = Events::new();
    let model: Events<i32> = Events::new();
    let seen = log();
    let keep = recorder(&seen, "keep");
    let drop = recorder(&seen, "drop");
    view.listen_to(&model, "e", &keep).unwrap();
    view.listen_to(&model, "e", &drop).unwrap();

    view.stop_listening_to(&model, None, Some(&drop));
    model.trigger("e", &1);
    assert_eq!(*seen.borrow(), vec!["keep:e:1"]);
    assert_eq!(view.listening(model.id()).unwrap().count(), 1);
}

#[test]
fn listenee_off_cleans_up_listener_edge() {
    let view: Events<()> = Events::new();
    let model: Events<i32> = Events::new();
    let seen = log();
    view.listen_to(&model, "e", &recorder(&seen, "v")).unwrap();

    model.off(Some("e"), None, None);
    assert_eq!(view.listening_count(), 0);
    assert_eq!(model.listener_count(), 0);
}

#[test]
fn listenee_off_all_tears_down_inbound_edges() {
    let view: Events<()> = Events::new();
    let other: Events<()> = Events::new();
    let model: Events<i32> = Events::new();
    let seen = log();
    view.listen_to(&model, "e", &recorder(&seen, "v")).unwrap();
    other.listen_to(&model, "f", &recorder(&seen, "o")).unwrap();

    model.off(None, None, None);
    assert_eq!(view.listening_count(), 0);
    assert_eq!(other.listening_count(), 0);
    assert_eq!(model.listener_count(), 0);
}

#[test]
fn listening_to_self_is_supported() {
    let hub: Events<i32> = Events::new();
    let seen = log();
    hub.listen_to(&hub, "e", &recorder(&seen, "me")).unwrap();
    hub.trigger("e", &1);
    hub.stop_listening();
    hub.trigger("e", &2);
    assert_eq!(*seen.borrow(), vec!["me:e:1"]);
    assert_eq!(hub.listening_count(), 0);
    assert_eq!(hub.listener_count(), 0);
}

#[test]
fn dropped_listenee_edge_is_cleaned_on_stop() {
    let view: Events<()> = Events::new();
    let seen = log();
    {
        let model: Events<i32> = Events::new();
        view.listen_to(&model, "e", &recorder(&seen, "v")).unwrap();
    }
    assert_eq!(view.listening_count(), 1);
    view.stop_listening();
    assert_eq!(view.listening_count(), 0);
}

// ── listen_to_once ───────────────────────────────────────────────

#[test]
fn listen_to_once_fires_once_and_closes_edge() {
    let view: Events<()> = Events::new();
    let model: Events<i32> = Events::new();
    let seen = log();
    view.listen_to_once(&model, "e", &recorder(&seen, "v")).unwrap();

    model.trigger("e", &1).trigger("e", &2);
    assert_eq!(*seen.borrow(), vec!["v:e:1"]);
    assert_eq!(view.listening_count(), 0);
    assert_eq!(model.listener_count(), 0);
}

#[test]
fn listen_to_once_per_name() {
    let view: Events<()> = Events::new();
    let model: Events<i32> = Events::new();
    let seen = log();
    view.listen_to_once(&model, "a b", &recorder(&seen, "v")).unwrap();

    model.trigger("a", &1);
    assert_eq!(view.listening(model.id()).unwrap().count(), 1);
    model.trigger("b", &2).trigger("a", &3);
    assert_eq!(*seen.borrow(), vec!["v:a:1", "v:b:2"]);
    assert_eq!(view.listening_count(), 0);
}

#[test]
fn listen_to_once_can_be_cancelled_with_original_callback() {
    let view: Events<()> = Events::new();
    let model: Events<i32> = Events::new();
    let seen = log();
    let cb = recorder(&seen, "v");
    view.listen_to_once(&model, "e", &cb).unwrap();
    view.stop_listening_to(&model, Some("e"), Some(&cb));
    model.trigger("e", &1);
    assert!(seen.borrow().is_empty());
    assert_eq!(view.listening_count(), 0);
}

// ── Foreign listenees ────────────────────────────────────────────

/// A listenee that keeps its own subscriber list and knows nothing of edges.
struct Relay {
    id: ListenId,
    inner: Rc<RelayInner>,
}

#[derive(Default)]
struct RelayInner {
    subscribers: RefCell<Vec<(String, Callback<i32>)>>,
    refuse: Cell<bool>,
}

impl ListenTarget for RelayInner {
    fn unsubscribe(&self, names: Option<&str>, callback: Option<CallbackKey>, _: ListenId) {
        self.subscribers.borrow_mut().retain(|(name, cb)| {
            let name_hit = names.is_none_or(|n| n.split_whitespace().any(|n| n == name));
            let cb_hit = callback.is_none_or(|k| k == cb.key());
            !(name_hit && cb_hit)
        });
    }

    fn forget_listener(&self, _: ListenId) {}
}

impl Relay {
    fn new() -> Self {
        Self {
            id: ListenId::new(),
            inner: Rc::new(RelayInner::default()),
        }
    }

    fn emit(&self, name: &str, n: i32) {
        let subscribers = self.inner.subscribers.borrow().clone();
        for (bound, cb) in subscribers {
            if bound == name {
                cb.call(name, &n);
            }
        }
    }
}

impl Listenable<i32> for Relay {
    fn listen_id(&self) -> ListenId {
        self.id
    }

    fn listen_target(&self) -> Weak<dyn ListenTarget> {
        let weak: Weak<RelayInner> = Rc::downgrade(&self.inner);
        weak
    }

    fn subscribe(
        &self,
        names: &str,
        callback: &Callback<i32>,
        _: Option<CallbackKey>,
        _: &Rc<Listening>,
    ) -> EventsResult<()> {
        if self.inner.refuse.get() {
            return Err(EventsError::Subscribe {
                target: self.id,
                reason: "closed".into(),
            });
        }
        let mut subscribers = self.inner.subscribers.borrow_mut();
        for name in names.split_whitespace() {
            subscribers.push((name.to_owned(), callback.clone()));
        }
        Ok(())
    }
}

#[test]
fn foreign_listenee_uses_interop_edge() {
    let view: Events<()> = Events::new();
    let relay = Relay::new();
    let seen = log();
    view.listen_to(&relay, "a b", &recorder(&seen, "v")).unwrap();

    let edge = view.listening(relay.id).unwrap();
    assert!(edge.is_interop());
    assert_eq!(edge.count(), 2);

    relay.emit("a", 1);
    view.stop_listening_to(&relay, Some("a"), None::<&Callback<i32>>);
    relay.emit("a", 2);
    assert_eq!(*seen.borrow(), vec!["v:a:1"]);
    assert_eq!(view.listening(relay.id).unwrap().count(), 1);

    view.stop_listening();
    assert_eq!(view.listening_count(), 0);
    assert!(relay.inner.subscribers.borrow().is_empty());
}

#[test]
fn failed_subscription_rolls_back_new_edge() {
    let view: Events<()> = Events::new();
    let relay = Relay::new();
    relay.inner.refuse.set(true);
    let seen = log();

    let err = view
        .listen_to(&relay, "a", &recorder(&seen, "v"))
        .unwrap_err();
    assert!(matches!(err, EventsError::Subscribe { target, .. } if target == relay.id));
    assert_eq!(view.listening_count(), 0);
}

#[test]
fn failed_subscription_keeps_existing_edge() {
    let view: Events<()> = Events::new();
    let relay = Relay::new();
    let seen = log();
    view.listen_to(&relay, "a", &recorder(&seen, "v")).unwrap();

    relay.inner.refuse.set(true);
    assert!(view.listen_to(&relay, "b", &recorder(&seen, "w")).is_err());
    assert_eq!(view.listening(relay.id).unwrap().count(), 1);
}

// ── Emits entities ───────────────────────────────────────────────

struct Widget {
    events: Events<i32>,
}

impl Emits<i32> for Widget {
    fn events(&self) -> &Events<i32> {
        &self.events
    }
}

#[test]
fn entities_listen_to_each_other() {
    let source = Widget { events: Events::new() };
    let sink = Widget { events: Events::new() };
    let seen = log();

    sink.listen_to(&source, "ping", &recorder(&seen, "sink")).unwrap();
    source.trigger("ping", &3);
    sink.stop_listening();
    source.trigger("ping", &4);

    assert_eq!(*seen.borrow(), vec!["sink:ping:3"]);
    assert_eq!(source.events().listener_count(), 0);
}
