use ose_store::doc;
use ose_store::errors::ErrorKind;
use ose_store::store::Store;
use ose_store_int_test::test_util::{insert_sample_items, SAMPLE_COLLECTION};

#[ctor::ctor]
fn init() {
    colog::init();
}

#[test]
fn test_default_store() {
    let store = Store::builder().open().unwrap();
    assert_eq!(store.config().field_separator(), ".");
    assert_eq!(store.config().timestamp_field(), None);
    assert_eq!(store.config().max_result_window(), None);
}

#[test]
fn test_config_frozen_after_open() {
    let store = Store::builder().field_separator("|").open().unwrap();
    let err = store.config().set_field_separator(".").unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::InvalidOperation);
    assert_eq!(store.config().field_separator(), "|");
}

#[test]
fn test_invalid_settings_surface_on_open() {
    let err = Store::builder().field_separator("").open().err().unwrap();
    assert_eq!(err.kind(), &ErrorKind::InvalidOperation);

    let err = Store::builder().timestamp_field("_key").open().err().unwrap();
    assert_eq!(err.kind(), &ErrorKind::InvalidOperation);

    let err = Store::builder().max_result_window(0).open().err().unwrap();
    assert_eq!(err.kind(), &ErrorKind::InvalidOperation);
}

#[test]
fn test_result_window_caps_finds() {
    let store = Store::builder().max_result_window(5).open().unwrap();
    let coll = store.collection(SAMPLE_COLLECTION);
    insert_sample_items(&coll, 20).unwrap();

    let found = coll
        .find("FOR t IN coll_sample FILTER t.rnd == 1 RETURN t", doc! {})
        .unwrap();
    assert_eq!(found.len(), 5);
    assert_eq!(
        coll.find_equal_asc(doc! { "rnd": 1 }, vec!["index"], 0, 100).unwrap().len(),
        5
    );
    assert_eq!(coll.count_equal(doc! { "rnd": 1 }), 20);
}

#[test]
fn test_custom_separator_paths() {
    let store = Store::builder().field_separator("|").open().unwrap();
    let coll = store.collection("nested");
    coll.upsert(doc! { "_key": "a", "address": { "city": "Rome" }, "a.b": 1 })
        .unwrap();

    assert_eq!(coll.count_equal(doc! { "address|city": "Rome" }), 1);
    assert_eq!(coll.count_equal(doc! { "a.b": 1 }), 1);
    assert_eq!(
        coll.count_query("FOR d IN nested FILTER d.address.city == 'Rome' RETURN d", doc! {})
            .unwrap(),
        1
    );
}
