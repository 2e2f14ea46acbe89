use crate::errors::{StoreError, StoreResult};
use crate::store::Store;
use crate::store_config::StoreConfig;

/// Fluent builder for a [Store].
///
/// Setter failures are captured and reported by [StoreBuilder::open], so a
/// chain of calls never needs intermediate error handling.
///
/// ```rust
/// use ose_store::store::Store;
///
/// let store = Store::builder()
///     .field_separator("::")
///     .timestamp_field("timestamp")
///     .max_result_window(100)
///     .open()
///     .unwrap();
/// assert_eq!(store.config().field_separator(), "::");
/// ```
#[derive(Default)]
pub struct StoreBuilder {
    error: Option<StoreError>,
    config: StoreConfig,
}

impl StoreBuilder {
    pub fn new() -> Self {
        StoreBuilder {
            error: None,
            config: StoreConfig::new(),
        }
    }

    /// Separator of nested field paths. Must not be empty.
    pub fn field_separator(self, separator: &str) -> Self {
        self.apply(|config| config.set_field_separator(separator))
    }

    /// Stamps every upserted document with the write time under `field`.
    pub fn timestamp_field(self, field: &str) -> Self {
        self.apply(|config| config.set_timestamp_field(field))
    }

    /// Caps the number of documents a single `find*` call returns.
    pub fn max_result_window(self, window: usize) -> Self {
        self.apply(|config| config.set_max_result_window(window))
    }

    /// Freezes the configuration and opens the store.
    pub fn open(self) -> StoreResult<Store> {
        if let Some(error) = self.error {
            return Err(error);
        }
        Ok(Store::with_config(self.config))
    }

    fn apply(mut self, setter: impl FnOnce(&StoreConfig) -> StoreResult<()>) -> Self {
        if self.error.is_none() {
            if let Err(e) = setter(&self.config) {
                self.error = Some(e);
            }
        }
        self
    }
}
