use account_selfcare::{ProfileStore, StoreError};

#[test]
fn missing_file_means_no_profiles() {
    let dir = tempfile::tempdir().unwrap();
    let store = ProfileStore::open(&dir.path().join("nested")).unwrap();
    assert!(store.profiles().is_empty());
    assert!(!store.path().exists());
}

#[test]
fn add_is_an_upsert_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    let store = ProfileStore::open(dir.path()).unwrap();

    store.add_profile("91234567", Some("Work")).unwrap();
    store.add_profile("81234567", None).unwrap();
    store.add_profile("91234567", Some("Personal")).unwrap();

    let reopened = ProfileStore::open(dir.path()).unwrap();
    let profiles = reopened.profiles();
    assert_eq!(profiles.len(), 2);
    let work = reopened.get("91234567").unwrap();
    assert_eq!(work.label.as_deref(), Some("Personal"));
}

#[test]
fn profiles_are_most_recent_first() {
    let dir = tempfile::tempdir().unwrap();
    let store = ProfileStore::open(dir.path()).unwrap();

    store.add_profile("81111111", None).unwrap();
    std::thread::sleep(std::time::Duration::from_millis(5));
    store.add_profile("92222222", None).unwrap();
    assert_eq!(store.profiles()[0].phone_number, "92222222");

    std::thread::sleep(std::time::Duration::from_millis(5));
    assert!(store.update_last_used("81111111").unwrap());
    assert_eq!(store.profiles()[0].phone_number, "81111111");
}

#[test]
fn update_last_used_of_unknown_number_is_false() {
    let dir = tempfile::tempdir().unwrap();
    let store = ProfileStore::open(dir.path()).unwrap();
    assert!(!store.update_last_used("91234567").unwrap());
}

#[test]
fn delete_removes_only_that_number() {
    let dir = tempfile::tempdir().unwrap();
    let store = ProfileStore::open(dir.path()).unwrap();
    store.add_profile("91234567", None).unwrap();
    store.add_profile("81234567", None).unwrap();

    store.delete_profile("91234567").unwrap();
    store.delete_profile("99999999").unwrap();

    let reopened = ProfileStore::open(dir.path()).unwrap();
    let numbers: Vec<_> = reopened
        .profiles()
        .into_iter()
        .map(|p| p.phone_number)
        .collect();
    assert_eq!(numbers, ["81234567"]);
}

#[test]
fn corrupt_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("profiles.json"), "{not json").unwrap();

    let err = ProfileStore::open(dir.path()).err().unwrap();
    assert!(matches!(err, StoreError::Json(_)));
}
