use ose_store::doc;
use ose_store_int_test::test_util::{
    cleanup, create_test_context, insert_sample_items, keys, run_test,
};
use std::cell::Cell;

#[ctor::ctor]
fn init() {
    colog::init();
}

#[test]
fn test_callback_stops_on_third() {
    run_test(
        create_test_context,
        |ctx| {
            let coll = ctx.sample();
            coll.add_index(vec!["rnd"], false)?;
            insert_sample_items(&coll, 20)?;

            let calls = Cell::new(0);
            let delivered = coll.for_each_equal(doc! { "rnd": 1 }, |_| {
                calls.set(calls.get() + 1);
                calls.get() == 3
            });
            assert_eq!(delivered, 3);
            assert_eq!(calls.get(), 3);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_callback_falsy_visits_all() {
    run_test(
        create_test_context,
        |ctx| {
            let coll = ctx.sample();
            insert_sample_items(&coll, 20)?;

            let mut seen = Vec::new();
            let delivered = coll.for_each_equal(doc! { "rnd": 1 }, |doc| {
                seen.push(doc.key().unwrap().to_string());
                false
            });
            assert_eq!(delivered, 20);
            assert_eq!(seen.len(), 20);
            assert_eq!(seen[0], "sample_item_0");

            // no match, no call
            let delivered = coll.for_each_equal(doc! { "rnd": 5 }, |_| false);
            assert_eq!(delivered, 0);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_iterator_break() {
    run_test(
        create_test_context,
        |ctx| {
            let coll = ctx.sample();
            insert_sample_items(&coll, 20)?;

            let first_three: Vec<_> = coll.iter_equal(doc! { "rnd": 1 }).take(3).collect();
            assert_eq!(
                keys(&first_three),
                vec!["sample_item_0", "sample_item_1", "sample_item_2"]
            );
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_callback_may_write_to_collection() {
    run_test(
        create_test_context,
        |ctx| {
            let coll = ctx.sample();
            coll.add_index(vec!["rnd"], false)?;
            insert_sample_items(&coll, 10)?;

            let delivered = coll.for_each_equal(doc! { "rnd": 1 }, |doc| {
                let key = doc.key().unwrap().to_string();
                if key == "sample_item_0" {
                    // deleted before delivery: skipped
                    coll.delete("sample_item_5").unwrap();
                }
                // moves out of the match set but was already snapshotted
                coll.upsert(doc! { "_key": (key), "rnd": 2 }).unwrap();
                false
            });

            assert_eq!(delivered, 9);
            assert_eq!(coll.count_equal(doc! { "rnd": 2 }), 9);
            assert_eq!(coll.count_equal(doc! { "rnd": 1 }), 0);
            Ok(())
        },
        cleanup,
    )
}
