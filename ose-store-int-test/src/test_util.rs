use fake::faker::address::en::CityName;
use fake::faker::name::en::{FirstName, LastName};
use fake::Fake;
use ose_store::collection::{Collection, Document};
use ose_store::common::Value;
use ose_store::doc;
use ose_store::errors::StoreResult;
use ose_store::store::Store;
use std::backtrace::Backtrace;
use std::time::Instant;

pub const SAMPLE_COLLECTION: &str = "coll_sample";

/// Runs `test` between `before` and `after`, reporting errors and panics
/// with the elapsed time and a backtrace. `after` always runs once a context
/// exists.
pub fn run_test<T, B, A>(before: B, test: T, after: A)
where
    T: Fn(TestContext) -> StoreResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    B: Fn() -> StoreResult<TestContext> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    A: Fn(TestContext) -> StoreResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
{
    let start_time = Instant::now();

    let result = std::panic::catch_unwind(|| {
        let backtrace = Backtrace::capture();
        match before() {
            Ok(ctx) => match test(ctx.clone()) {
                Ok(_) => after(ctx)
                    .map_err(|e| (format!("After run failed: {:?}", e), backtrace.to_string())),
                Err(e) => {
                    let _ = after(ctx);
                    Err((format!("Test failed: {:?}", e), backtrace.to_string()))
                }
            },
            Err(e) => Err((format!("Before run failed: {:?}", e), backtrace.to_string())),
        }
    });

    let elapsed = start_time.elapsed();
    let (error, backtrace) = match result {
        Ok(Ok(_)) => return,
        Ok(Err((e, bt))) => (e, bt),
        Err(panic_err) => {
            let message = if let Some(s) = panic_err.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = panic_err.downcast_ref::<String>() {
                s.clone()
            } else {
                "Unknown panic".to_string()
            };
            (format!("Panic: {}", message), Backtrace::capture().to_string())
        }
    };

    eprintln!("\n==================== TEST FAILED ====================");
    eprintln!("Failed after {:?}", elapsed);
    eprintln!("Error: {}", error);
    if !backtrace.is_empty() && !backtrace.contains("disabled") {
        eprintln!("\nBacktrace:\n{}", backtrace);
    }
    eprintln!("=====================================================\n");

    panic!("Test failed: {}", error);
}

#[derive(Clone)]
pub struct TestContext {
    store: Store,
}

impl TestContext {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn store(&self) -> Store {
        self.store.clone()
    }

    /// The collection the sample scripts work on.
    pub fn sample(&self) -> Collection {
        self.store.collection(SAMPLE_COLLECTION)
    }
}

pub fn create_test_context() -> StoreResult<TestContext> {
    Ok(TestContext::new(Store::builder().open()?))
}

/// A store stamping every upsert with a `timestamp` field.
pub fn create_stamped_test_context() -> StoreResult<TestContext> {
    Ok(TestContext::new(
        Store::builder().timestamp_field("timestamp").open()?,
    ))
}

pub fn cleanup(ctx: TestContext) -> StoreResult<()> {
    let store = ctx.store();
    for name in store.collection_names() {
        log::debug!("Dropping test collection {}", name);
        store.drop_collection(&name);
    }
    Ok(())
}

/// The sample item `i`: `index` is `i` except for item 17, whose index is
/// the string `"🤘"`.
pub fn sample_item(i: i64) -> Document {
    let index: Value = if i == 17 { "🤘".into() } else { i.into() };
    doc! {
        "_key": (format!("sample_item_{}", i)),
        "index": index,
        "rnd": 1,
    }
}

pub fn insert_sample_items(coll: &Collection, count: i64) -> StoreResult<()> {
    for i in 0..count {
        coll.upsert(sample_item(i))?;
    }
    Ok(())
}

/// A person with generated name, city and age.
pub fn fake_person(key: &str) -> Document {
    let first_name: String = FirstName().fake();
    let last_name: String = LastName().fake();
    let city: String = CityName().fake();
    let age: i64 = (18..90).fake();
    doc! {
        "_key": key,
        "first_name": first_name,
        "last_name": last_name,
        "address": { "city": city },
        "age": age,
    }
}

pub fn keys(documents: &[Document]) -> Vec<String> {
    documents
        .iter()
        .filter_map(|doc| doc.key().ok().map(str::to_string))
        .collect()
}

/// Whether `documents` are ordered over `field` in ascending (or descending)
/// order; a missing field counts as the smallest value.
pub fn is_sorted(documents: &[Document], field: &str, ascending: bool) -> bool {
    documents.windows(2).all(|pair| {
        let left = pair[0].get_path(field, ".");
        let right = pair[1].get_path(field, ".");
        if ascending {
            left <= right
        } else {
            left >= right
        }
    })
}

pub fn now() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
