use spine_types::{ClientId, ListenId};
use std::collections::HashSet;

// ── ClientId ──────────────────────────────────────────────────────

#[test]
fn client_id_new_is_unique() {
    let a = ClientId::new();
    let b = ClientId::new();
    assert_ne!(a, b);
}

#[test]
fn client_id_display_is_prefixed() {
    let id = ClientId::new();
    assert!(id.to_string().starts_with("c-"));
    assert_ne!(id.to_string(), ClientId::new().to_string());
}

#[test]
fn client_ids_are_time_ordered() {
    let a = ClientId::new();
    let b = ClientId::new();
    assert!(a < b);
}

// ── ListenId ──────────────────────────────────────────────────────

#[test]
fn listen_id_default_is_unique() {
    let mut set = HashSet::new();
    for _ in 0..32 {
        set.insert(ListenId::default());
    }
    assert_eq!(set.len(), 32);
}

#[test]
fn listen_id_display_is_prefixed() {
    let id = ListenId::new();
    assert!(id.to_string().starts_with("l-"));
}
