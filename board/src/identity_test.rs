use super::*;

#[test]
fn authenticated_uses_email_and_name() {
    let id = Identity::authenticated("ada@example.com", Some("Ada"));
    assert_eq!(id.user_id, "ada@example.com");
    assert_eq!(id.display_name, "Ada");
    assert!(!id.is_anonymous);
}

#[test]
fn authenticated_without_name_uses_local_part() {
    let id = Identity::authenticated("ada@example.com", Some("  "));
    assert_eq!(id.display_name, "ada");
    assert_eq!(Identity::authenticated("ada@example.com", None).display_name, "ada");
}

#[test]
fn anonymous_id_format() {
    let id = generate_anonymous_id(1_700_000_000_000);
    let rest = id.strip_prefix("anonymous_").unwrap();
    let (random, ms) = rest.split_once('_').unwrap();
    assert_eq!(random.len(), 9);
    assert!(random.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    assert_eq!(ms, "1700000000000");
    assert!(is_anonymous_id(&id));
}

#[test]
fn anonymous_ids_differ() {
    assert_ne!(generate_anonymous_id(1), generate_anonymous_id(1));
}

#[test]
fn anonymous_name_from_word_lists() {
    for _ in 0..20 {
        let name = generate_anonymous_name();
        let (adjective, animal) = name.split_once(' ').unwrap();
        assert!(ADJECTIVES.contains(&adjective));
        assert!(ANIMALS.contains(&animal));
    }
}

#[test]
fn anonymous_identity_persists_across_loads() {
    let mut storage = MemoryStorage::default();
    let first = Identity::anonymous(&mut storage, 10);
    assert!(first.is_anonymous);
    assert_eq!(storage.get(ANONYMOUS_ID_KEY).as_deref(), Some(first.user_id.as_str()));
    assert_eq!(storage.get(ANONYMOUS_NAME_KEY).as_deref(), Some(first.display_name.as_str()));

    let second = Identity::anonymous(&mut storage, 20);
    assert_eq!(first, second);
}

#[test]
fn anonymous_identity_replaces_foreign_stored_id() {
    let mut storage = MemoryStorage::default();
    storage.set(ANONYMOUS_ID_KEY, "someone@example.com");
    let id = Identity::anonymous(&mut storage, 10);
    assert!(is_anonymous_id(&id.user_id));
}

#[test]
fn email_is_not_anonymous() {
    assert!(!is_anonymous_id("ada@example.com"));
}
