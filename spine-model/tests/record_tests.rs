use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::{Value, json};
use spine_model::{
    Attributes, Callback, Emits, ModelError, Options, Payload, Record, RecordHooks, RecordSchema,
    ValidationError, Validator,
};
use std::cell::RefCell;
use std::rc::Rc;

fn attrs(v: Value) -> Attributes {
    v.as_object().cloned().unwrap()
}

type Log = Rc<RefCell<Vec<String>>>;

fn log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

/// Records event names, with the new value for `change:<attr>` events.
fn recorder(log: &Log) -> Callback<Payload> {
    let log = Rc::clone(log);
    Callback::new(move |name: &str, payload: &Payload| {
        let entry = match payload {
            Payload::AttributeChanged { value, .. } => {
                format!("{name}={}", value.clone().unwrap_or(Value::Null))
            }
            _ => name.to_owned(),
        };
        log.borrow_mut().push(entry);
    })
}

fn rejecting_empty_title() -> RecordSchema {
    RecordSchema::new().with_hooks(Validator(|attrs: &Attributes| {
        match attrs.get("title") {
            Some(Value::String(s)) if s.is_empty() => {
                Err(ValidationError::for_attribute("title", "title must not be empty"))
            }
            _ => Ok(()),
        }
    }))
}

// ── Construction ─────────────────────────────────────────────────

#[test]
fn new_record_lays_attributes_over_defaults() {
    let schema = RecordSchema::new().with_defaults(attrs(json!({"a": 1, "b": 2})));
    let record = Record::new(&schema, attrs(json!({"b": 5})));
    assert_eq!(record.attributes(), attrs(json!({"a": 1, "b": 5})));
    assert!(!record.has_changed(None));
    assert!(record.is_new());
}

#[test]
fn identity_is_cached_from_custom_attribute() {
    let schema = RecordSchema::new().with_id_attribute("_key");
    let record = Record::new(&schema, attrs(json!({"_key": "k1"})));
    assert_eq!(record.id(), Some(json!("k1")));
    assert!(!record.is_new());

    record.set_attr("_key", json!("k2"), &Options::new());
    assert_eq!(record.id(), Some(json!("k2")));
}

#[test]
fn clone_record_copies_attributes_only() {
    let record = Record::new(&RecordSchema::new(), attrs(json!({"x": 1})));
    let copy = record.clone_record();
    assert_ne!(copy, record);
    assert_ne!(copy.cid(), record.cid());
    assert_eq!(copy.attributes(), record.attributes());
}

#[test]
fn parse_option_runs_schema_hook() {
    struct Envelope;
    impl RecordHooks for Envelope {
        fn parse(&self, response: Value, _: &Options) -> Value {
            response.get("data").cloned().unwrap_or(Value::Null)
        }
    }

    let schema = RecordSchema::new().with_hooks(Envelope);
    let record = Record::with_options(
        &schema,
        attrs(json!({"data": {"x": 1}})),
        &Options::new().parse(true),
    );
    assert_eq!(record.attributes(), attrs(json!({"x": 1})));
}

#[test]
fn non_object_parse_result_yields_no_attributes() {
    let record = Record::new(&RecordSchema::new(), Attributes::new());
    assert!(record.parse(json!([1, 2]), &Options::new()).is_empty());
    assert!(record.parse(Value::Null, &Options::new()).is_empty());
}

// ── Change tracking ──────────────────────────────────────────────

#[test]
fn scenario_defaults_then_set() {
    let schema = RecordSchema::new().with_defaults(attrs(json!({"a": 1})));
    let record = Record::new(&schema, Attributes::new());

    assert!(record.set(attrs(json!({"a": 2, "b": 3})), &Options::new()));
    assert_eq!(record.changed(), attrs(json!({"a": 2, "b": 3})));
    assert_eq!(record.previous("a"), Some(json!(1)));
    assert_eq!(record.get("b"), Some(json!(3)));
}

#[test]
fn set_fires_attribute_events_then_change() {
    let record = Record::new(&RecordSchema::new(), attrs(json!({"a": 1})));
    let seen = log();
    record.on("all", &recorder(&seen));

    record.set(attrs(json!({"a": 2, "b": "x"})), &Options::new());
    assert_eq!(
        *seen.borrow(),
        vec!["change:a=2", "change:b=\"x\"", "change"]
    );
}

#[test]
fn silent_set_applies_without_events() {
    let record = Record::new(&RecordSchema::new(), Attributes::new());
    let seen = log();
    record.on("all", &recorder(&seen));

    record.set(attrs(json!({"a": 1})), &Options::new().silent());
    assert_eq!(record.get("a"), Some(json!(1)));
    assert!(seen.borrow().is_empty());
    assert!(record.has_changed(Some("a")));
}

#[test]
fn unset_removes_and_reports_null() {
    let record = Record::new(&RecordSchema::new(), attrs(json!({"a": 1, "b": 2})));
    let seen = log();
    record.on("all", &recorder(&seen));

    record.unset("a", &Options::new());
    assert!(!record.has("a"));
    assert_eq!(record.get("a"), None);
    assert_eq!(record.changed(), attrs(json!({"a": null})));
    assert_eq!(*seen.borrow(), vec!["change:a=null", "change"]);
}

#[test]
fn unset_of_missing_attribute_is_quiet() {
    let record = Record::new(&RecordSchema::new(), attrs(json!({"a": 1})));
    let seen = log();
    record.on("all", &recorder(&seen));
    record.unset("zzz", &Options::new());
    assert!(seen.borrow().is_empty());
}

#[test]
fn clear_removes_everything() {
    let record = Record::new(&RecordSchema::new(), attrs(json!({"id": 4, "a": 1})));
    record.clear(&Options::new());
    assert!(record.attributes().is_empty());
    assert_eq!(record.id(), None);
    assert!(record.is_new());
}

#[test]
fn changed_attributes_against_diff() {
    let record = Record::new(&RecordSchema::new(), attrs(json!({"a": 1})));
    assert_eq!(record.changed_attributes(None), None);
    assert_eq!(
        record.changed_attributes(Some(&attrs(json!({"a": 1, "b": 2})))),
        Some(attrs(json!({"b": 2})))
    );
    assert_eq!(record.changed_attributes(Some(&attrs(json!({"a": 1})))), None);

    record.set_attr("a", json!(5), &Options::new());
    assert_eq!(record.changed_attributes(None), Some(attrs(json!({"a": 5}))));
}

#[test]
fn numeric_representations_compare_equal() {
    let record = Record::new(&RecordSchema::new(), attrs(json!({"n": 1})));
    let seen = log();
    record.on("all", &recorder(&seen));
    record.set(attrs(json!({"n": 1.0})), &Options::new());
    assert!(seen.borrow().is_empty());
}

#[test]
fn matches_checks_every_pair() {
    let record = Record::new(&RecordSchema::new(), attrs(json!({"a": 1, "b": "x"})));
    assert!(record.matches(&attrs(json!({"a": 1}))));
    assert!(record.matches(&attrs(json!({}))));
    assert!(!record.matches(&attrs(json!({"a": 1, "b": "y"}))));
    assert!(!record.matches(&attrs(json!({"c": null, "a": 1, "d": 0}))));
}

// ── Nested transactions ──────────────────────────────────────────

#[test]
fn nested_set_joins_outer_transaction() {
    let record = Record::new(&RecordSchema::new(), Attributes::new());
    let handle = record.clone();
    record.on(
        "change:a",
        &Callback::new(move |_: &str, _: &Payload| {
            handle.set_attr("b", json!(2), &Options::new());
        }),
    );
    let seen = log();
    record.on("change", &recorder(&seen));

    record.set_attr("a", json!(1), &Options::new());
    assert_eq!(*seen.borrow(), vec!["change"]);
    assert_eq!(record.changed(), attrs(json!({"a": 1, "b": 2})));
    assert!(record.previous_attributes().is_empty());
}

#[test]
fn change_listener_mutation_settles_in_a_second_round() {
    let record = Record::new(&RecordSchema::new(), attrs(json!({"a": 0})));
    let handle = record.clone();
    record.on(
        "change",
        &Callback::new(move |_: &str, _: &Payload| {
            if !handle.has("c") {
                handle.set_attr("c", json!(true), &Options::new());
            }
        }),
    );
    let seen = log();
    record.on("change", &recorder(&seen));

    record.set_attr("a", json!(1), &Options::new());
    assert_eq!(*seen.borrow(), vec!["change", "change"]);
    assert_eq!(record.changed(), attrs(json!({"a": 1, "c": true})));
    assert_eq!(record.previous("a"), Some(json!(0)));
}

#[test]
fn transaction_reopens_after_outermost_returns() {
    let record = Record::new(&RecordSchema::new(), attrs(json!({"a": 0})));
    record.set_attr("a", json!(1), &Options::new());
    record.set_attr("b", json!(1), &Options::new());
    assert_eq!(record.changed(), attrs(json!({"b": 1})));
    assert_eq!(record.previous("a"), Some(json!(1)));
}

// ── Validation ───────────────────────────────────────────────────

#[test]
fn scenario_rejected_set_leaves_record_untouched() {
    let record = Record::new(&rejecting_empty_title(), attrs(json!({"title": "ok"})));
    let errors: Rc<RefCell<Vec<ValidationError>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&errors);
    record.on(
        "invalid",
        &Callback::new(move |_: &str, payload: &Payload| {
            if let Payload::Invalid { error, options, .. } = payload {
                assert_eq!(options.validation_error.as_ref(), Some(error));
                sink.borrow_mut().push(error.clone());
            }
        }),
    );

    let applied = record.set(attrs(json!({"title": ""})), &Options::new().validate(true));
    assert!(!applied);
    assert_eq!(record.get("title"), Some(json!("ok")));
    assert_eq!(errors.borrow().len(), 1);
    assert_eq!(errors.borrow()[0].attribute.as_deref(), Some("title"));
    assert_eq!(record.validation_error(), Some(errors.borrow()[0].clone()));
}

#[test]
fn validation_is_off_by_default_for_set() {
    let record = Record::new(&rejecting_empty_title(), Attributes::new());
    assert!(record.set(attrs(json!({"title": ""})), &Options::new()));
    assert!(!record.is_valid(&Options::new()));
    assert!(record.validation_error().is_some());
}

#[test]
fn silent_validation_failure_is_not_announced() {
    let record = Record::new(&rejecting_empty_title(), Attributes::new());
    let seen = log();
    record.on("invalid", &recorder(&seen));
    let applied = record.set(
        attrs(json!({"title": ""})),
        &Options::new().validate(true).silent(),
    );
    assert!(!applied);
    assert!(seen.borrow().is_empty());
    assert!(record.validation_error().is_some());
}

#[test]
fn successful_validation_clears_previous_error() {
    let record = Record::new(&rejecting_empty_title(), Attributes::new());
    let strict = Options::new().validate(true);
    record.set(attrs(json!({"title": ""})), &strict);
    assert!(record.validation_error().is_some());
    record.set(attrs(json!({"title": "fine"})), &strict);
    assert_eq!(record.validation_error(), None);
}

// ── Location ─────────────────────────────────────────────────────

#[test]
fn url_appends_escaped_identity() {
    let schema = RecordSchema::new().with_url_root("/items");
    let record = Record::new(&schema, attrs(json!({"id": "a b/c"})));
    assert_eq!(record.url().unwrap(), "/items/a%20b%2Fc");

    let fresh = Record::new(&schema, Attributes::new());
    assert_eq!(fresh.url().unwrap(), "/items");
}

#[test]
fn url_root_trailing_slash_is_not_doubled() {
    let schema = RecordSchema::new().with_url_root("/items/");
    let record = Record::new(&schema, attrs(json!({"id": 7})));
    assert_eq!(record.url().unwrap(), "/items/7");
}

#[test]
fn url_without_any_location_is_an_error() {
    let record = Record::new(&RecordSchema::new(), attrs(json!({"id": 1})));
    assert!(matches!(record.url(), Err(ModelError::MissingUrl)));
}

// ── Properties ───────────────────────────────────────────────────

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(Value::from),
        "[a-z]{0,6}".prop_map(Value::from),
        any::<bool>().prop_map(Value::from),
    ]
}

proptest! {
    #[test]
    fn resetting_current_value_is_not_a_change(value in scalar()) {
        let record = Record::new(&RecordSchema::new(), attrs(json!({"x": value.clone()})));
        let seen = log();
        record.on("all", &recorder(&seen));

        let mut same = Attributes::new();
        same.insert("x".into(), value);
        record.set(same, &Options::new());

        prop_assert!(seen.borrow().is_empty());
        prop_assert!(!record.has_changed(Some("x")));
    }

    #[test]
    fn chained_nested_sets_settle_once(values in prop::collection::vec(any::<i64>(), 1..6)) {
        let record = Record::new(&RecordSchema::new(), Attributes::new());
        for i in 0..values.len() - 1 {
            let handle = record.clone();
            let next = values[i + 1];
            record.on(
                &format!("change:k{i}"),
                &Callback::new(move |_: &str, _: &Payload| {
                    handle.set_attr(&format!("k{}", i + 1), json!(next), &Options::new());
                }),
            );
        }
        let seen = log();
        record.on("change", &recorder(&seen));

        record.set_attr("k0", json!(values[0]), &Options::new());

        let expected: Attributes = values
            .iter()
            .enumerate()
            .map(|(i, v)| (format!("k{i}"), json!(v)))
            .collect();
        prop_assert_eq!(seen.borrow().len(), 1);
        prop_assert_eq!(record.changed(), expected.clone());
        prop_assert_eq!(record.attributes(), expected);
        prop_assert!(record.previous_attributes().is_empty());
    }
}
